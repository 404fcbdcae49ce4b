use std::io::{self, Write};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use reportchat::api::DEFAULT_PAGE_SIZE;
use reportchat::{
    ApiClient, AuthContext, ChatController, ChatError, ChatObserver, ChatState, ClientConfig, MessageKind,
    SendOptions, TurnOutcome,
};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("missing user id; pass --user-id, set CHAT_USER_ID, or log in")]
    MissingUserId,
    #[error("chat turn task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stdout write failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "reportchat", about = "Streaming chat client")]
struct Cli {
    /// Overrides CHAT_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides CHAT_USER_ID.
    #[arg(long)]
    user_id: Option<String>,

    /// Overrides CHAT_ACCESS_TOKEN.
    #[arg(long)]
    access_token: Option<String>,

    /// Overrides CHAT_REFRESH_TOKEN.
    #[arg(long)]
    refresh_token: Option<String>,

    #[arg(long, env = "CHAT_USERNAME", requires = "password")]
    username: Option<String>,

    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and stream the reply to stdout. Ctrl-C aborts.
    Send(SendArgs),
    /// List chat sessions.
    Sessions {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Print the messages of a session.
    History { chat_id: String },
    /// Delete a session.
    Delete { chat_id: String },
    /// List model providers.
    Providers,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(required_unless_present = "regenerate")]
    message: Option<String>,

    /// Continue an existing session instead of starting a new one.
    #[arg(long)]
    chat_id: Option<String>,

    /// Regenerate the session's last reply instead of sending `message`.
    #[arg(long, default_value_t = false, requires = "chat_id")]
    regenerate: bool,

    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    model: Option<String>,
}

struct CliObserver;

impl ChatObserver for CliObserver {
    fn session_created(&self, chat_id: &str) {
        info!(chat_id, "new chat session");
    }

    fn title_updated(&self, chat_id: Option<&str>, title: &str) {
        info!(?chat_id, title, "chat titled");
    }

    fn turn_failed(&self, error: &ChatError) {
        error!(code = error.error_code(), %error, "chat turn failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    config.user_id = cli.user_id.or(config.user_id);
    config.access_token = cli.access_token.or(config.access_token);
    config.refresh_token = cli.refresh_token.or(config.refresh_token);

    let auth = Arc::new(AuthContext::from_config(&config));
    let api = Arc::new(ApiClient::new(&config, auth.clone())?);

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        let user = api.login(username, password).await?;
        info!(username, user_id = ?user.as_ref().map(|u| u.id.as_str()), "logged in");
    }

    match cli.command {
        Command::Send(args) => {
            let user_id = match config.user_id {
                Some(id) => id,
                None => auth.user().await.map(|u| u.id).ok_or(CliError::MissingUserId)?,
            };
            run_send(api, user_id, args).await
        }
        Command::Sessions { page, page_size } => print_json(&api.list_chats(page, page_size).await?),
        Command::History { chat_id } => print_json(&api.chat_messages(&chat_id).await?),
        Command::Delete { chat_id } => {
            api.delete_chat(&chat_id).await?;
            println!("deleted {chat_id}");
            Ok(())
        }
        Command::Providers => print_json(&api.list_providers().await?),
    }
}

async fn run_send(api: Arc<ApiClient>, user_id: String, args: SendArgs) -> Result<(), CliError> {
    let controller = ChatController::new(api, Arc::new(CliObserver), user_id);
    if let Some(chat_id) = &args.chat_id {
        controller.switch_chat(chat_id).await?;
    }

    let mut updates = controller.subscribe();
    updates.mark_unchanged();
    let options = SendOptions { provider_id: args.provider, model_name: args.model };
    let mut turn = {
        let controller = controller.clone();
        let message = args.message.unwrap_or_default();
        let regenerate = args.regenerate;
        tokio::spawn(async move {
            if regenerate {
                controller.regenerate_last_message(options).await
            } else {
                controller.send_message(&message, options).await
            }
        })
    };

    let mut printed = String::new();
    let result = loop {
        tokio::select! {
            joined = &mut turn => break joined?,
            Ok(()) = updates.changed() => {
                print_reply_delta(&updates.borrow_and_update(), &mut printed)?;
            }
            Ok(()) = tokio::signal::ctrl_c() => {
                if controller.abort() {
                    warn!("aborting turn");
                }
            }
        }
    };

    print_reply_delta(&controller.snapshot(), &mut printed)?;
    println!();

    let state = controller.snapshot();
    if let Some(chat_id) = state.session.server_id() {
        eprintln!("chat_id: {chat_id}");
    }
    match result? {
        TurnOutcome::Cancelled => eprintln!("[cancelled]"),
        TurnOutcome::Skipped | TurnOutcome::Busy => eprintln!("[nothing sent]"),
        TurnOutcome::Completed | TurnOutcome::Superseded => {}
    }
    Ok(())
}

/// Write whatever the AI reply gained since the last call. A reply that no
/// longer extends what was printed (the failure text) is left to the error.
fn print_reply_delta(state: &ChatState, printed: &mut String) -> Result<(), CliError> {
    let Some(reply) = state.messages.last().filter(|m| m.kind == MessageKind::Ai) else {
        return Ok(());
    };
    if let Some(delta) = reply.content.strip_prefix(printed.as_str()) {
        if !delta.is_empty() {
            let mut out = io::stdout().lock();
            out.write_all(delta.as_bytes())?;
            out.flush()?;
            printed.push_str(delta);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

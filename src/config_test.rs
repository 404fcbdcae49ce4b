use super::*;
use std::sync::Mutex;

// Serializes the tests below that mutate process env.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_chat_env() {
    unsafe {
        std::env::remove_var("CHAT_BASE_URL");
        std::env::remove_var("CHAT_USER_ID");
        std::env::remove_var("CHAT_ACCESS_TOKEN");
        std::env::remove_var("CHAT_REFRESH_TOKEN");
        std::env::remove_var("CHAT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("CHAT_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("CHAT_STREAM_IDLE_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_chat_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.user_id, None);
    assert_eq!(cfg.access_token, None);
    assert_eq!(cfg.timeouts, HttpTimeouts::default());
}

#[test]
fn from_env_reads_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_chat_env();
        std::env::set_var("CHAT_BASE_URL", "https://chat.example.test/");
        std::env::set_var("CHAT_USER_ID", "u-7");
        std::env::set_var("CHAT_ACCESS_TOKEN", "tok");
        std::env::set_var("CHAT_REFRESH_TOKEN", "");
        std::env::set_var("CHAT_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("CHAT_CONNECT_TIMEOUT_SECS", "nope");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://chat.example.test");
    assert_eq!(cfg.user_id.as_deref(), Some("u-7"));
    assert_eq!(cfg.access_token.as_deref(), Some("tok"));
    assert_eq!(cfg.refresh_token, None);
    assert_eq!(cfg.timeouts, HttpTimeouts {
            request_secs: 42,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            stream_idle_secs: DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
        });

    unsafe { clear_chat_env() };
}

#[test]
fn normalize_base_url_rejects_non_http() {
    let err = normalize_base_url("ftp://example.test").unwrap_err();
    assert!(err.to_string().contains("CHAT_BASE_URL"));
}

#[test]
fn normalize_base_url_trims_slashes_and_whitespace() {
    assert_eq!(normalize_base_url(" http://localhost:8000// ").unwrap(), "http://localhost:8000");
}

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__CHAT_TEST_MISSING_KEY__", 9);
    assert_eq!(val, 9);
}

#[test]
fn with_base_url_overrides_and_validates() {
    let cfg = ClientConfig {
        base_url: DEFAULT_BASE_URL.to_string(),
        user_id: None,
        access_token: None,
        refresh_token: None,
        timeouts: HttpTimeouts::default(),
    };
    let cfg = cfg.with_base_url("https://other.test/").unwrap();
    assert_eq!(cfg.base_url, "https://other.test");
    assert!(matches!(cfg.with_base_url("other.test"), Err(ChatError::Config(_))));
}

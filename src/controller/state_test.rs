use super::*;

#[test]
fn server_id_only_for_server_sessions() {
    assert_eq!(SessionRef::None.server_id(), None);
    assert_eq!(SessionRef::local().server_id(), None);
    assert_eq!(SessionRef::Server("c1".into()).server_id(), Some("c1"));
}

#[test]
fn local_placeholders_are_unique() {
    assert_ne!(SessionRef::local(), SessionRef::local());
}

#[test]
fn last_user_index_skips_trailing_ai() {
    let mut state = ChatState::default();
    assert_eq!(state.last_user_index(), None);

    state.messages.push(Message::user("A"));
    state.messages.push(Message::ai_placeholder());
    state.messages.push(Message::user("C"));
    state.messages.push(Message::ai_placeholder());
    assert_eq!(state.last_user_index(), Some(2));
}

#[test]
fn reset_clears_and_bumps_epoch() {
    let mut state = ChatState {
        messages: vec![Message::user("A")],
        session: SessionRef::Server("c1".into()),
        title: Some("T".into()),
        is_new_chat: true,
        is_loading: true,
        epoch: 3,
    };
    state.reset(SessionRef::Server("c2".into()));
    assert!(state.messages.is_empty());
    assert_eq!(state.session, SessionRef::Server("c2".into()));
    assert!(state.title.is_none());
    assert!(!state.is_new_chat);
    assert!(!state.is_loading);
    assert_eq!(state.epoch, 4);
}

#[test]
fn serializes_session_with_tag() {
    let json = serde_json::to_value(SessionRef::Server("c1".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "server", "id": "c1" }));
}

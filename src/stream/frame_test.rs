use super::*;

#[test]
fn done_sentinel() {
    assert_eq!(parse_payload("[DONE]").unwrap(), StreamEvent::Done);
    assert_eq!(parse_payload("  [DONE] ").unwrap(), StreamEvent::Done);
}

#[test]
fn content_frame() {
    let StreamEvent::Frame(frame) = parse_payload(r#"{"content":"Hi"}"#).unwrap() else {
        panic!("expected frame");
    };
    assert_eq!(frame.content(), Some("Hi"));
    assert!(frame.chat_id().is_none());
    assert!(frame.reasoning().is_none());
}

#[test]
fn combined_frame_carries_all_fields() {
    let json = r#"{"chat_id":"c1","title":"Greeting","reasoning_content":"hmm","content":"ok","extra":1}"#;
    let StreamEvent::Frame(frame) = parse_payload(json).unwrap() else {
        panic!("expected frame");
    };
    assert_eq!(frame.chat_id(), Some("c1"));
    assert_eq!(frame.title(), Some("Greeting"));
    assert_eq!(frame.reasoning(), Some("hmm"));
    assert_eq!(frame.content(), Some("ok"));
}

#[test]
fn numeric_chat_id_becomes_string() {
    let StreamEvent::Frame(frame) = parse_payload(r#"{"chat_id":42}"#).unwrap() else {
        panic!("expected frame");
    };
    assert_eq!(frame.chat_id(), Some("42"));
}

#[test]
fn null_and_empty_fields_read_as_absent() {
    let StreamEvent::Frame(frame) = parse_payload(r#"{"chat_id":null,"content":"","title":null}"#).unwrap() else {
        panic!("expected frame");
    };
    assert!(frame.chat_id().is_none());
    assert!(frame.content().is_none());
    assert!(frame.title().is_none());
}

#[test]
fn malformed_json_is_an_error() {
    assert!(parse_payload("{not json").is_err());
    assert!(parse_payload("DONE").is_err());
}

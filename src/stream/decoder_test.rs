use super::*;

// =============================================================================
// line splitting
// =============================================================================

#[test]
fn single_chunk_with_two_lines() {
    let mut dec = SseDecoder::new();
    let out = dec.push(b"data: {\"content\":\"Hi\"}\ndata: [DONE]\n");
    assert_eq!(out, vec![r#"{"content":"Hi"}"#.to_string(), "[DONE]".to_string()]);
    assert_eq!(dec.pending(), 0);
}

#[test]
fn line_split_across_chunks() {
    let mut dec = SseDecoder::new();
    assert!(dec.push(b"data: {\"cont").is_empty());
    assert!(dec.pending() > 0);
    let out = dec.push(b"ent\":\"x\"}\n");
    assert_eq!(out, vec![r#"{"content":"x"}"#.to_string()]);
}

#[test]
fn multibyte_char_split_across_chunks() {
    let line = "data: {\"content\":\"héllo 你好\"}\n".as_bytes();
    // Split inside the 3-byte encoding of '你'.
    let cut = line.iter().position(|&b| b == 0xE4).unwrap() + 1;
    let mut dec = SseDecoder::new();
    assert!(dec.push(&line[..cut]).is_empty());
    let out = dec.push(&line[cut..]);
    assert_eq!(out, vec![r#"{"content":"héllo 你好"}"#.to_string()]);
}

#[test]
fn crlf_line_endings() {
    let mut dec = SseDecoder::new();
    let out = dec.push(b"data: [DONE]\r\n");
    assert_eq!(out, vec!["[DONE]".to_string()]);
}

// =============================================================================
// field filtering
// =============================================================================

#[test]
fn non_data_lines_are_ignored() {
    let mut dec = SseDecoder::new();
    let out = dec.push(b": keep-alive\nevent: message\nid: 7\n\ndata: {}\n");
    assert_eq!(out, vec!["{}".to_string()]);
}

#[test]
fn data_without_space_is_accepted() {
    let mut dec = SseDecoder::new();
    assert_eq!(dec.push(b"data:[DONE]\n"), vec!["[DONE]".to_string()]);
}

#[test]
fn empty_data_line_yields_nothing() {
    let mut dec = SseDecoder::new();
    assert!(dec.push(b"data: \n").is_empty());
}

// =============================================================================
// finish
// =============================================================================

#[test]
fn finish_flushes_unterminated_line() {
    let mut dec = SseDecoder::new();
    assert!(dec.push(b"data: [DONE]").is_empty());
    assert_eq!(dec.finish().as_deref(), Some("[DONE]"));
    assert_eq!(dec.pending(), 0);
}

#[test]
fn finish_on_empty_buffer_is_none() {
    let mut dec = SseDecoder::new();
    dec.push(b"data: {}\n");
    assert!(dec.finish().is_none());
}

// =============================================================================
// long lines
// =============================================================================

#[test]
fn line_fed_byte_by_byte() {
    let line = b"data: {\"content\":\"slow\"}\n";
    let mut dec = SseDecoder::new();
    let mut out = Vec::new();
    for byte in line {
        out.extend(dec.push(std::slice::from_ref(byte)));
    }
    assert_eq!(out, vec![r#"{"content":"slow"}"#.to_string()]);
    assert_eq!(dec.pending(), 0);
}

#[test]
fn oversized_line_is_dropped_and_decoding_resumes() {
    let mut dec = SseDecoder::new();
    let mut big = b"data: ".to_vec();
    big.resize(MAX_LINE_BYTES + 10, b'x');

    assert!(dec.push(&big).is_empty());
    assert_eq!(dec.pending(), 0);
    // Tail of the oversized line, then a normal line.
    let out = dec.push(b"xxxx\ndata: [DONE]\n");
    assert_eq!(out, vec!["[DONE]".to_string()]);
}

#[test]
fn finish_inside_oversized_line_is_none() {
    let mut dec = SseDecoder::new();
    dec.push(&vec![b'x'; MAX_LINE_BYTES + 1]);
    assert!(dec.finish().is_none());
    assert_eq!(dec.push(b"data: ok\n"), vec!["ok".to_string()]);
}

//! Integration tests for the rtlog-core wire protocol.
//!
//! These tests go through the public API only and pin the byte-exact
//! behaviour a browser depends on: the handshake accept token, the outbound
//! frame layout and the shape of the JSON log payload.

use chrono::{TimeZone, Utc};
use rtlog_core::protocol::frame::{decode_header, encode_text_frame, Opcode, PONG_FRAME};
use rtlog_core::protocol::handshake::{switching_protocols, validate_upgrade};
use rtlog_core::protocol::http::{find_header_end, HttpResponse};
use rtlog_core::{compute_accept_key, LogEvent, LogLevel, RequestHead};

#[test]
fn test_accept_token_fixed_vector() {
    assert_eq!(
        compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
    );
}

#[test]
fn test_frame_header_for_10_byte_payload() {
    let frame = encode_text_frame(&[b'z'; 10]);
    assert_eq!(&frame[..2], &[0x81, 0x0A]);
}

#[test]
fn test_frame_header_for_200_byte_payload() {
    let frame = encode_text_frame(&[b'z'; 200]);
    assert_eq!(&frame[..4], &[0x81, 126, 0x00, 0xC8]);
}

#[test]
fn test_frame_header_for_70000_byte_payload() {
    let frame = encode_text_frame(&vec![b'z'; 70_000]);
    let mut expected = vec![0x81, 127];
    expected.extend_from_slice(&70_000u64.to_be_bytes());
    assert_eq!(&frame[..10], expected.as_slice());
}

#[test]
fn test_outbound_frame_decodes_with_inbound_header_parser() {
    // The server's own frames are valid input for the header decoder, which
    // is what a browser's WebSocket implementation does with them.
    for len in [0usize, 125, 126, 65_535, 65_536] {
        let frame = encode_text_frame(&vec![0u8; len]);
        let header = decode_header(&frame).unwrap().unwrap();
        assert_eq!(header.opcode, Opcode::Text);
        assert!(header.fin);
        assert!(!header.masked);
        assert_eq!(header.payload_len, len as u64);
        assert_eq!(header.frame_len(), frame.len() as u64);
    }
}

#[test]
fn test_browser_close_frame_is_detected_despite_mask() {
    // Masked close frame carrying status 1000 (0x03E8), as Chrome sends it.
    let bytes = [0x88, 0x82, 0x37, 0xFA, 0x21, 0x3D, 0x34, 0x12];
    let header = decode_header(&bytes).unwrap().unwrap();
    assert_eq!(header.opcode, Opcode::Close);
    assert_eq!(header.frame_len(), bytes.len() as u64);
}

#[test]
fn test_pong_reply_is_two_bytes() {
    assert_eq!(PONG_FRAME, [0x8A, 0x00]);
}

#[test]
fn test_full_upgrade_exchange() {
    // Arrange: a browser upgrade request with a pipelined frame behind it
    let mut wire = b"GET /ws HTTP/1.1\r\n\
        Host: 127.0.0.1:8080\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n"
        .to_vec();
    wire.extend_from_slice(&[0x89, 0x80, 1, 2, 3, 4]);

    // Act
    let end = find_header_end(&wire).expect("complete head");
    let head = RequestHead::parse(&wire[..end]).unwrap();
    let accept = validate_upgrade(&head).unwrap();
    let response = switching_protocols(&accept);

    // Assert
    assert_eq!(head.method, "GET");
    assert_eq!(head.path, "/ws");
    assert_eq!(
        response.header("Sec-WebSocket-Accept"),
        Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
    );
    assert_eq!(&wire[end..], &[0x89, 0x80, 1, 2, 3, 4]);
}

#[test]
fn test_error_response_body_is_reason_phrase() {
    let resp = HttpResponse::not_found();
    assert_eq!(resp.status.code(), 404);
    assert_eq!(resp.body.as_deref(), Some(&b"Not Found"[..]));
}

#[test]
fn test_log_event_frame_payload_is_json_object() {
    // Arrange
    let time = Utc.with_ymd_and_hms(2025, 4, 25, 12, 0, 0).unwrap();
    let event = LogEvent::at(time, LogLevel::Error, "X");

    // Act
    let frame = event.to_frame().unwrap();
    let header = decode_header(&frame).unwrap().unwrap();
    let payload = &frame[header.header_len..];
    let value: serde_json::Value = serde_json::from_slice(payload).unwrap();

    // Assert
    assert_eq!(value["timestamp"], "2025-04-25T12:00:00Z");
    assert_eq!(value["level"], "error");
    assert_eq!(value["message"], "X");
}

//! Wire protocol: the HTTP subset, the WebSocket handshake and the frame codec.

pub mod frame;
pub mod handshake;
pub mod http;

pub use frame::{decode_header, encode_text_frame, FrameError, FrameHeader, Opcode, PONG_FRAME};
pub use handshake::{compute_accept_key, switching_protocols, validate_upgrade, HandshakeError};
pub use http::{content_type_for, find_header_end, HttpResponse, RequestError, RequestHead, StatusCode};

//! WebSocket frame codec (RFC 6455 §5.2), restricted to what a push-only log
//! stream needs.
//!
//! Wire format of the first two bytes:
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-------+-+-------------+
//! |F|R|R|R| opcode|M| Payload len |
//! |I|S|S|S|  (4)  |A|     (7)     |
//! |N|V|V|V|       |S|             |
//! | |1|2|3|       |K|             |
//! +-+-+-+-+-------+-+-------------+
//! ```
//! A 7-bit length of 126 is followed by a 16-bit big-endian length, 127 by a
//! 64-bit big-endian length.  When the MASK bit is set a 4-byte masking key
//! precedes the payload.
//!
//! # Direction asymmetry
//!
//! - **Outbound** (server → browser): only unmasked, final text frames are
//!   ever produced, plus the fixed two-byte Pong reply.
//! - **Inbound** (browser → server): only the header is decoded.  The
//!   payload is skipped, never unmasked and never interpreted; the opcode
//!   alone decides what happens next.

use thiserror::Error;

/// FIN bit of the first header byte.
pub const FIN_BIT: u8 = 0x80;

/// MASK bit of the second header byte.
pub const MASK_BIT: u8 = 0x80;

/// Largest payload that fits in the 7-bit length field.
pub const MAX_SHORT_PAYLOAD: usize = 125;

/// Marker value selecting the 16-bit extended length.
pub const EXTENDED_16: u8 = 126;

/// Marker value selecting the 64-bit extended length.
pub const EXTENDED_64: u8 = 127;

/// The complete Pong reply sent for every inbound Ping: FIN + opcode 0xA,
/// zero-length payload.
pub const PONG_FRAME: [u8; 2] = [0x8A, 0x00];

/// Errors produced while decoding an inbound frame header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// A control frame (Close/Ping/Pong) declared a payload longer than the
    /// 125 bytes RFC 6455 §5.5 allows.
    #[error("control frame payload too long: {0} bytes")]
    OversizedControlFrame(u64),

    /// The 64-bit extended length had its most significant bit set.
    #[error("invalid 64-bit payload length: {0:#x}")]
    InvalidLength(u64),
}

// ── Opcode ────────────────────────────────────────────────────────────────────

/// The 4-bit frame opcode.
///
/// Reserved values are kept as [`Opcode::Reserved`] rather than rejected: the
/// server discards any frame it does not act on, whatever its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl Opcode {
    /// Extracts the opcode from the low 4 bits of the first header byte.
    ///
    /// The FIN/RSV bits and the MASK bit (which lives in the *second* byte)
    /// have no influence on the result, so a masked Close from a browser is
    /// detected exactly like an unmasked one.
    pub fn from_first_byte(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Reserved(other),
        }
    }

    /// Returns the raw 4-bit value.
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(v) => v,
        }
    }

    /// Close, Ping and Pong are control frames.
    pub fn is_control(self) -> bool {
        self.as_u8() & 0x08 != 0
    }
}

// ── Outbound encoding ─────────────────────────────────────────────────────────

/// Encodes `payload` as a single final, unmasked text frame.
///
/// # Examples
///
/// ```rust
/// use rtlog_core::protocol::frame::encode_text_frame;
///
/// let frame = encode_text_frame(b"hello");
/// assert_eq!(frame, [0x81, 0x05, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn encode_text_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(header_len_for(payload.len()) + payload.len());
    write_header(&mut buf, Opcode::Text, payload.len());
    buf.extend_from_slice(payload);
    buf
}

/// Writes the FIN + opcode byte followed by the shortest length encoding for
/// `len`.  Server frames are never masked, so the MASK bit is always clear.
pub fn write_header(buf: &mut Vec<u8>, opcode: Opcode, len: usize) {
    buf.push(FIN_BIT | opcode.as_u8());
    if len <= MAX_SHORT_PAYLOAD {
        buf.push(len as u8);
    } else if len <= u16::MAX as usize {
        buf.push(EXTENDED_16);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(EXTENDED_64);
        buf.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Size of the header [`write_header`] produces for a payload of `len` bytes.
pub fn header_len_for(len: usize) -> usize {
    if len <= MAX_SHORT_PAYLOAD {
        2
    } else if len <= u16::MAX as usize {
        4
    } else {
        10
    }
}

// ── Inbound decoding ──────────────────────────────────────────────────────────

/// A decoded inbound frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// FIN bit.
    pub fin: bool,
    /// Frame type.
    pub opcode: Opcode,
    /// Whether a masking key follows the length field.
    pub masked: bool,
    /// Declared payload length in bytes.
    pub payload_len: u64,
    /// Bytes occupied by the header, including the masking key if present.
    pub header_len: usize,
}

impl FrameHeader {
    /// Total size of the frame on the wire (header + payload).
    pub fn frame_len(&self) -> u64 {
        self.header_len as u64 + self.payload_len
    }
}

/// Attempts to decode a frame header from the start of `bytes`.
///
/// Returns `Ok(None)` when more bytes are needed before the header is
/// complete.  This mirrors how a TCP reader works: keep appending to a buffer
/// and call again after every read.
///
/// # Errors
///
/// Returns [`FrameError`] for headers that violate RFC 6455 framing rules.
///
/// # Examples
///
/// ```rust
/// use rtlog_core::protocol::frame::{decode_header, Opcode};
///
/// // A masked Ping with an empty payload, as a browser would send it.
/// let bytes = [0x89, 0x80, 0x01, 0x02, 0x03, 0x04];
/// let header = decode_header(&bytes).unwrap().unwrap();
/// assert_eq!(header.opcode, Opcode::Ping);
/// assert_eq!(header.header_len, 6);
/// ```
pub fn decode_header(bytes: &[u8]) -> Result<Option<FrameHeader>, FrameError> {
    if bytes.len() < 2 {
        return Ok(None);
    }

    let fin = bytes[0] & FIN_BIT != 0;
    let opcode = Opcode::from_first_byte(bytes[0]);
    let masked = bytes[1] & MASK_BIT != 0;
    let short_len = bytes[1] & 0x7F;

    let (payload_len, mut header_len) = match short_len {
        EXTENDED_16 => {
            if bytes.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([bytes[2], bytes[3]]) as u64, 4)
        }
        EXTENDED_64 => {
            if bytes.len() < 10 {
                return Ok(None);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[2..10]);
            let len = u64::from_be_bytes(raw);
            if len & (1 << 63) != 0 {
                return Err(FrameError::InvalidLength(len));
            }
            (len, 10)
        }
        n => (n as u64, 2),
    };

    if opcode.is_control() && payload_len > MAX_SHORT_PAYLOAD as u64 {
        return Err(FrameError::OversizedControlFrame(payload_len));
    }

    if masked {
        header_len += 4;
    }
    if bytes.len() < header_len {
        return Ok(None);
    }

    Ok(Some(FrameHeader {
        fin,
        opcode,
        masked,
        payload_len,
        header_len,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

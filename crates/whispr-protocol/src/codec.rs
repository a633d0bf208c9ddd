//! The Whispr frame codec.
//!
//! ## Frame format
//!
//! ```text
//! +------+------+-----------+---------+-----------+---------+-----
//! | code | type | len (6)   | field 1 | len (6)   | field 2 | ...
//! | 1 ch | 1 ch | "000005"  | "alice" | "000002"  | "hi"    |
//! +------+------+-----------+---------+-----------+---------+-----
//! ```
//!
//! Every quantity is ASCII: the header is two decimal digits, and each
//! field is a six-digit zero-padded byte length followed by that many
//! UTF-8 bytes. How many fields follow depends on the code.
//!
//! Once a session key exists, every frame except the handshake carries
//! exactly one field instead: the hex text of the sealed concatenation
//! of the padded plaintext fields. Decoding opens it and parses the
//! plaintext fields back out.
//!
//! Two decoders share the parsing rules. [`FrameDecoder`] is incremental
//! and never blocks, which is what the server's event loop uses.
//! [`read_message`] pulls exactly one frame from an async reader, which
//! is what the client uses.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use whispr_crypto::SessionKey;

use crate::{FramingError, HANDSHAKE_CODE, Message, MessageType, Request, Response};

/// Width of every length prefix, in ASCII digits.
pub const LENGTH_FIELD_WIDTH: usize = 6;

/// The largest field a six-digit prefix can describe.
pub const MAX_FIELD_LEN: usize = 999_999;

const HEADER_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Appends `field` to `out`, preceded by its six-digit byte length.
///
/// # Errors
/// [`FramingError::FieldTooLarge`] if the field does not fit the prefix.
/// Nothing is appended in that case.
pub fn pad_with_length(field: &[u8], out: &mut Vec<u8>) -> Result<(), FramingError> {
    if field.len() > MAX_FIELD_LEN {
        return Err(FramingError::FieldTooLarge(field.len()));
    }
    out.extend_from_slice(format!("{:0width$}", field.len(), width = LENGTH_FIELD_WIDTH).as_bytes());
    out.extend_from_slice(field);
    Ok(())
}

/// Encodes a message into a complete frame.
///
/// With `key` set and a code other than the handshake, the fields are
/// sealed into a single envelope field.
pub fn encode<M: Message>(message: &M, key: Option<&SessionKey>) -> Result<Vec<u8>, FramingError> {
    let code = message.code();
    let mut body = Vec::new();
    for field in message.fields() {
        pad_with_length(field.as_bytes(), &mut body)?;
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.push(b'0' + code);
    frame.push(b'0' + message.message_type().digit());

    match key {
        Some(key) if code != HANDSHAKE_CODE => {
            let sealed = key.seal(&body)?;
            pad_with_length(hex::encode(sealed).as_bytes(), &mut frame)?;
        }
        _ => frame.extend_from_slice(&body),
    }
    Ok(frame)
}

/// Checks that [`encode`] would accept `message`, without encrypting
/// anything. `sealed` says whether the frame will go through the
/// envelope (the handshake code never does).
///
/// # Errors
/// [`FramingError::FieldTooLarge`] with the size of the first field that
/// would overflow its length prefix.
pub fn check_encodable<M: Message>(message: &M, sealed: bool) -> Result<(), FramingError> {
    let mut body_len = 0;
    for field in message.fields() {
        if field.len() > MAX_FIELD_LEN {
            return Err(FramingError::FieldTooLarge(field.len()));
        }
        body_len += LENGTH_FIELD_WIDTH + field.len();
    }
    if sealed && message.code() != HANDSHAKE_CODE {
        let envelope_len = 2 * SessionKey::sealed_len(body_len);
        if envelope_len > MAX_FIELD_LEN {
            return Err(FramingError::FieldTooLarge(envelope_len));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared parsing rules
// ---------------------------------------------------------------------------

/// A validated header.
struct Header {
    code: u8,
    message_type: MessageType,
    /// Fields after decryption.
    arity: usize,
    /// Whether the fields on the wire are a single sealed envelope.
    sealed: bool,
}

fn parse_header<M: Message>(
    bytes: [u8; HEADER_LEN],
    key: Option<&SessionKey>,
) -> Result<Header, FramingError> {
    let code = ascii_digit(bytes[0])?;
    let type_digit = ascii_digit(bytes[1])?;
    let arity = M::plaintext_arity(code)
        .ok_or_else(|| FramingError::malformed(format!("unknown code {code}")))?;
    let message_type = MessageType::from_digit(type_digit)
        .ok_or_else(|| FramingError::malformed(format!("unknown message type {type_digit}")))?;
    Ok(Header {
        code,
        message_type,
        arity,
        sealed: key.is_some() && code != HANDSHAKE_CODE,
    })
}

impl Header {
    fn wire_fields(&self) -> usize {
        if self.sealed { 1 } else { self.arity }
    }
}

fn ascii_digit(byte: u8) -> Result<u8, FramingError> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(FramingError::malformed(format!("expected a digit, got byte {byte:#04x}")))
    }
}

fn parse_length(prefix: &[u8]) -> Result<usize, FramingError> {
    prefix.iter().try_fold(0usize, |acc, &b| {
        ascii_digit(b).map(|d| acc * 10 + usize::from(d))
    })
    .map_err(|_| {
        FramingError::malformed(format!(
            "length prefix {:?} is not numeric",
            String::from_utf8_lossy(prefix)
        ))
    })
}

/// Parses one length-prefixed field at the start of `buf`.
///
/// Returns the field and the bytes consumed, or `None` if `buf` does
/// not yet hold all of it.
fn parse_field(buf: &[u8]) -> Result<Option<(&[u8], usize)>, FramingError> {
    if buf.len() < LENGTH_FIELD_WIDTH {
        return Ok(None);
    }
    let len = parse_length(&buf[..LENGTH_FIELD_WIDTH])?;
    let end = LENGTH_FIELD_WIDTH + len;
    if buf.len() < end {
        return Ok(None);
    }
    Ok(Some((&buf[LENGTH_FIELD_WIDTH..end], end)))
}

fn into_text(bytes: Vec<u8>) -> Result<String, FramingError> {
    String::from_utf8(bytes).map_err(|_| FramingError::malformed("field is not valid UTF-8"))
}

/// Splits decrypted plaintext into exactly `arity` fields.
fn split_plaintext(plain: &[u8], arity: usize) -> Result<Vec<String>, FramingError> {
    let mut fields = Vec::with_capacity(arity);
    let mut offset = 0;
    for _ in 0..arity {
        let (field, used) = parse_field(&plain[offset..])?
            .ok_or_else(|| FramingError::malformed("envelope plaintext is truncated"))?;
        fields.push(into_text(field.to_vec())?);
        offset += used;
    }
    if offset != plain.len() {
        return Err(FramingError::malformed(format!(
            "{} trailing bytes in envelope plaintext",
            plain.len() - offset
        )));
    }
    Ok(fields)
}

/// Turns the raw wire fields of a complete frame into a typed message.
fn finish<M: Message>(
    header: &Header,
    wire: Vec<Vec<u8>>,
    key: Option<&SessionKey>,
) -> Result<M, FramingError> {
    let fields = match (header.sealed, key) {
        (true, Some(key)) => {
            let [envelope]: [Vec<u8>; 1] = wire.try_into().map_err(|w: Vec<Vec<u8>>| {
                FramingError::malformed(format!("expected one envelope field, got {}", w.len()))
            })?;
            let sealed = hex::decode(&envelope)
                .map_err(|e| FramingError::malformed(format!("envelope is not hex: {e}")))?;
            let plain = key.open(&sealed)?;
            split_plaintext(&plain, header.arity)?
        }
        _ => wire.into_iter().map(into_text).collect::<Result<_, _>>()?,
    };
    M::from_fields(header.code, header.message_type, fields)
}

// ---------------------------------------------------------------------------
// FrameDecoder
// ---------------------------------------------------------------------------

/// Incremental decoder over a growing byte buffer.
///
/// Push bytes as they arrive and call [`decode`](Self::decode) until it
/// returns `Ok(None)`. A partial frame stays buffered; nothing is
/// consumed until a whole frame is present.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the next complete frame, if there is one.
    ///
    /// `key` is the session key in effect for *this* frame; a frame that
    /// installs a key is decoded before the next call sees it.
    ///
    /// # Errors
    /// Any [`FramingError`]. The buffer is left in an unspecified state
    /// and the connection should be dropped.
    pub fn decode<M: Message>(
        &mut self,
        key: Option<&SessionKey>,
    ) -> Result<Option<M>, FramingError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let header = parse_header::<M>([self.buffer[0], self.buffer[1]], key)?;

        let mut offset = HEADER_LEN;
        let mut wire = Vec::with_capacity(header.wire_fields());
        for _ in 0..header.wire_fields() {
            match parse_field(&self.buffer[offset..])? {
                Some((field, used)) => {
                    wire.push(field.to_vec());
                    offset += used;
                }
                None => return Ok(None),
            }
        }
        self.buffer.advance(offset);

        finish(&header, wire, key).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Async reader
// ---------------------------------------------------------------------------

async fn read_fixed<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), FramingError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(FramingError::ConnectionClosed)
        }
        Err(e) => Err(FramingError::Io(e)),
    }
}

/// Reads exactly one frame from `reader`.
///
/// Reads the header, then each length prefix and exactly as many bytes
/// as it declares.
///
/// # Errors
/// [`FramingError::ConnectionClosed`] if the stream ends anywhere inside
/// the frame, otherwise any decode error.
pub async fn read_message<M, R>(reader: &mut R, key: Option<&SessionKey>) -> Result<M, FramingError>
where
    M: Message,
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; HEADER_LEN];
    read_fixed(reader, &mut head).await?;
    let header = parse_header::<M>(head, key)?;

    let mut wire = Vec::with_capacity(header.wire_fields());
    for _ in 0..header.wire_fields() {
        let mut prefix = [0u8; LENGTH_FIELD_WIDTH];
        read_fixed(reader, &mut prefix).await?;
        let mut field = vec![0u8; parse_length(&prefix)?];
        read_fixed(reader, &mut field).await?;
        wire.push(field);
    }
    finish(&header, wire, key)
}

/// Reads one client command.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    key: Option<&SessionKey>,
) -> Result<Request, FramingError> {
    read_message(reader, key).await
}

/// Reads one server response.
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
    key: Option<&SessionKey>,
) -> Result<Response, FramingError> {
    read_message(reader, key).await
}

use bytes::{Buf, Bytes, BytesMut};

use super::types::RespValue;
use crate::error::{Error, Result};

/// Largest bulk string a sentinel is expected to send (512 MB, the Redis limit)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Incremental RESP2 reply parser
pub struct Parser;

/// A frame header: type byte, the text up to CRLF, and bytes consumed
struct Header<'a> {
    tag: u8,
    text: &'a [u8],
    len: usize,
}

impl Parser {
    /// Decode one reply from the front of `buf`, consuming it.
    /// `Ok(None)` means more bytes are needed; `buf` is left untouched.
    #[inline]
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>> {
        let Some((value, consumed)) = Self::decode(buf)? else {
            return Ok(None);
        };
        buf.advance(consumed);
        Ok(Some(value))
    }

    fn decode(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        let Some(header) = Self::header(buf) else {
            return Ok(None);
        };

        match header.tag {
            b'+' => Ok(Some((
                RespValue::SimpleString(Bytes::copy_from_slice(header.text)),
                header.len,
            ))),
            b'-' => Ok(Some((
                RespValue::Error(Bytes::copy_from_slice(header.text)),
                header.len,
            ))),
            b':' => {
                let n = Self::number(header.text, "integer")?;
                Ok(Some((RespValue::Integer(n), header.len)))
            }
            b'$' => Self::bulk(buf, &header),
            b'*' => Self::array(buf, &header),
            other => Err(Error::Protocol(format!(
                "unexpected type byte '{}'",
                other as char
            ))),
        }
    }

    /// Split off the first line. None until a full CRLF has arrived.
    #[inline]
    fn header(buf: &[u8]) -> Option<Header<'_>> {
        let (&tag, rest) = buf.split_first()?;
        let cr = memchr::memchr(b'\r', rest)?;
        if rest.get(cr + 1) != Some(&b'\n') {
            return None;
        }
        Some(Header {
            tag,
            text: &rest[..cr],
            len: cr + 3,
        })
    }

    fn number(text: &[u8], what: &str) -> Result<i64> {
        std::str::from_utf8(text)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Protocol(format!("invalid {}", what)))
    }

    fn bulk(buf: &[u8], header: &Header<'_>) -> Result<Option<(RespValue, usize)>> {
        let size = match Self::number(header.text, "bulk length")? {
            -1 => return Ok(Some((RespValue::Null, header.len))),
            n if (0..=MAX_BULK_LEN).contains(&n) => n as usize,
            n => return Err(Error::Protocol(format!("invalid bulk length {}", n))),
        };

        // payload plus its trailing CRLF
        let end = header.len + size;
        match buf.get(header.len..end + 2) {
            Some(frame) if frame.ends_with(b"\r\n") => Ok(Some((
                RespValue::BulkString(Bytes::copy_from_slice(&buf[header.len..end])),
                end + 2,
            ))),
            Some(_) => Err(Error::Protocol("bulk string not terminated by CRLF".into())),
            None => Ok(None),
        }
    }

    fn array(buf: &[u8], header: &Header<'_>) -> Result<Option<(RespValue, usize)>> {
        let count = match Self::number(header.text, "array length")? {
            -1 => return Ok(Some((RespValue::NullArray, header.len))),
            n if n >= 0 => n as usize,
            n => return Err(Error::Protocol(format!("invalid array length {}", n))),
        };

        let mut items = Vec::with_capacity(count.min(64));
        let mut offset = header.len;
        while items.len() < count {
            let Some((item, used)) = Self::decode(&buf[offset..])? else {
                return Ok(None);
            };
            items.push(item);
            offset += used;
        }

        Ok(Some((RespValue::Array(items), offset)))
    }
}

//! Parsing traits for typed netlink messages.

use winnow::binary::le_u16;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::attr::{NLA_HDRLEN, NLA_TYPE_MASK, nla_align};
use super::error::{Error, Result};

/// Result type for winnow parsers in this crate.
pub type PResult<T> = std::result::Result<T, ErrMode<ContextError>>;

/// A message type that can be decoded from a netlink payload.
pub trait FromNetlink: Sized {
    /// Write the fixed header required by a dump request for this type.
    fn write_dump_header(buf: &mut Vec<u8>);

    /// Parse from the payload that follows `nlmsghdr`.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse a complete payload.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = data;
        Self::parse(&mut input).map_err(|e| Error::Parse(format!("{:?}", e)))
    }
}

/// Shorthand for the hard failure used by the fixed-header parsers.
pub(crate) fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Little-endian u16.
pub(crate) fn u16_le(input: &mut &[u8]) -> PResult<u16> {
    le_u16.parse_next(input)
}

/// Take exactly `n` bytes.
pub(crate) fn bytes<'a>(input: &mut &'a [u8], n: usize) -> PResult<&'a [u8]> {
    take(n).parse_next(input)
}

/// Parse the next attribute from `input`, consuming its padding.
///
/// Returns `None` once the remaining input cannot hold a well-formed
/// attribute. The returned type has the nested/byteorder flags masked off.
pub(crate) fn next_attr<'a>(input: &mut &'a [u8]) -> PResult<Option<(u16, &'a [u8])>> {
    if input.len() < NLA_HDRLEN {
        return Ok(None);
    }

    let len = u16_le(input)? as usize;
    let attr_type = u16_le(input)?;

    let payload_len = match len.checked_sub(NLA_HDRLEN) {
        Some(n) if n <= input.len() => n,
        _ => return Ok(None),
    };
    let payload = bytes(input, payload_len)?;

    let padding = nla_align(len) - len;
    if input.len() >= padding {
        bytes(input, padding)?;
    } else {
        *input = &[];
    }

    Ok(Some((attr_type & NLA_TYPE_MASK, payload)))
}

/// Read a (possibly null-terminated) string out of an attribute payload.
pub fn parse_string_from_bytes(data: &[u8]) -> String {
    let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..len]).into_owned()
}

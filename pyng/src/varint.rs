//! [VarInt and VarLong](https://wiki.vg/Protocol#VarInt_and_VarLong) encoding
//! plus the length-prefixed string built on top of it.
//!
//! Values are stored little-endian in groups of 7 bits; the high bit of every
//! byte is set while more bytes follow. Negative numbers are encoded through
//! their two's complement bits and therefore always take the maximum width.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Error;

const SEGMENT_BITS: u64 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// The longest a VarInt may be on the wire.
pub const MAX_VARINT_LEN: usize = 5;
/// The longest a VarLong may be on the wire.
pub const MAX_VARLONG_LEN: usize = 10;

fn encode(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        if value & !SEGMENT_BITS == 0 {
            #[allow(clippy::cast_possible_truncation)]
            buf.push(value as u8);
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        buf.push((value & SEGMENT_BITS) as u8 | CONTINUE_BIT);
        value >>= 7;
    }
}

fn decode(buf: &mut &[u8], max_len: usize) -> Result<u64, Error> {
    let mut value = 0u64;
    for position in 0..max_len {
        let (&byte, rest) = buf.split_first().ok_or(Error::TruncatedRead)?;
        *buf = rest;
        value |= (u64::from(byte) & SEGMENT_BITS) << (7 * position);
        if byte & CONTINUE_BIT == 0 {
            return Ok(value);
        }
    }
    Err(Error::MalformedVarint(max_len))
}

/// Number of bytes [`write_varint`] will emit for `value`.
#[must_use]
pub const fn varint_len(value: i32) -> usize {
    #[allow(clippy::cast_sign_loss)]
    let bits = 32 - (value as u32).leading_zeros() as usize;
    if bits == 0 { 1 } else { bits.div_ceil(7) }
}

/// Append `value` to `buf` as a VarInt.
#[allow(clippy::cast_sign_loss)]
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    encode(buf, u64::from(value as u32));
}

/// Append `value` to `buf` as a VarLong.
#[allow(clippy::cast_sign_loss)]
pub fn write_varlong(buf: &mut Vec<u8>, value: i64) {
    encode(buf, value as u64);
}

/// Append `value` as a VarInt byte length followed by its UTF-8 bytes.
///
/// # Panics
/// If the string is longer than `i32::MAX` bytes, which no packet can carry.
pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    let len = i32::try_from(value.len()).expect("string length exceeds i32::MAX");
    write_varint(buf, len);
    buf.extend_from_slice(value.as_bytes());
}

/// Decode a VarInt from the front of `buf`, advancing it past the value.
///
/// # Errors
/// [`Error::TruncatedRead`] if `buf` ends mid-value, [`Error::MalformedVarint`]
/// if more than [`MAX_VARINT_LEN`] bytes carry the continuation bit.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn read_varint(buf: &mut &[u8]) -> Result<i32, Error> {
    decode(buf, MAX_VARINT_LEN).map(|value| value as u32 as i32)
}

/// Decode a VarLong from the front of `buf`, advancing it past the value.
///
/// # Errors
/// Same conditions as [`read_varint`], with a limit of [`MAX_VARLONG_LEN`].
#[allow(clippy::cast_possible_wrap)]
pub fn read_varlong(buf: &mut &[u8]) -> Result<i64, Error> {
    decode(buf, MAX_VARLONG_LEN).map(|value| value as i64)
}

/// Decode a length-prefixed UTF-8 string from the front of `buf`.
///
/// # Errors
/// [`Error::InvalidLength`] for a negative length, [`Error::TruncatedRead`]
/// if fewer bytes remain than declared, [`Error::InvalidString`] for bad UTF-8.
pub fn read_string(buf: &mut &[u8]) -> Result<String, Error> {
    let declared = read_varint(buf)?;
    let len = usize::try_from(declared).map_err(|_| Error::InvalidLength(declared))?;
    if buf.len() < len {
        return Err(Error::TruncatedRead);
    }
    let (bytes, rest) = buf.split_at(len);
    *buf = rest;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Read a VarInt directly off a stream, one byte at a time.
///
/// # Errors
/// [`Error::ConnectionClosed`] if the stream ends first, or
/// [`Error::MalformedVarint`] once [`MAX_VARINT_LEN`] bytes have been consumed
/// without a terminating byte.
pub async fn read_varint_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, Error> {
    let mut bytes = [0u8; MAX_VARINT_LEN];
    for position in 0..MAX_VARINT_LEN {
        bytes[position] = reader.read_u8().await.map_err(closed_on_eof)?;
        if bytes[position] & CONTINUE_BIT == 0 {
            return read_varint(&mut &bytes[..=position]);
        }
    }
    Err(Error::MalformedVarint(MAX_VARINT_LEN))
}

pub(crate) fn closed_on_eof(error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        Error::IoError(error)
    }
}

//! Length-prefixed stream framing: a 4-byte big-endian length followed by
//! the frame body. Readers must treat a short read as failure, never as
//! success with less data.

use std::io::{Read, Write};

use crate::{Error, Result};

/// Maximum frame body length accepted by [`read_frame`]. Chosen generously
/// above the multiplexer's 65535-byte receive buffer so legitimate framed
/// packets never trip it, while still bounding a hostile length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Reads exactly `buf.len()` bytes from `reader`, looping across partial
/// reads. Fails with [`Error::UnexpectedEof`] the moment `read` returns 0
/// before `buf` is full — a short read is never treated as success.
pub fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::UnexpectedEof {
                expected: buf.len(),
                actual: filled,
            });
        }
        filled += n;
    }
    Ok(())
}

/// Reads one length-framed message: a 4-byte big-endian length prefix
/// followed by that many body bytes, both read with [`read_full`]
/// semantics.
pub fn read_frame(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    read_full(reader, &mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(Error::TruncatedPacket {
            expected: len as usize,
            actual: 0,
        });
    }
    let mut body = vec![0u8; len as usize];
    read_full(reader, &mut body)?;
    Ok(body)
}

/// Writes one length-framed message: a 4-byte big-endian length prefix
/// followed by `body`.
pub fn write_frame(writer: &mut impl Write, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| Error::TruncatedPacket {
        expected: u32::MAX as usize,
        actual: body.len(),
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    Ok(())
}

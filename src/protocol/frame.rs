use crate::error::{EngineError, EngineResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Reads one length-prefixed frame (4-byte big-endian length, spec §6
/// "Request framing") off an async stream. Grounded on the root crate's
/// `MessageProtocol::read_message` length-prefix convention, generalized to
/// return the raw payload bytes instead of a bincode-decoded message since
/// this protocol's payload shape is opcode-specific.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> EngineResult<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> EngineResult<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// A cursor over one decoded frame's bytes, decoding the big-endian integers
/// and 16-bit-length-prefixed UTF-8 strings spec §6's wire format specifies.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FrameReader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(EngineError::parse_error("frame truncated"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> EngineResult<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> EngineResult<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> EngineResult<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_string(&mut self) -> EngineResult<String> {
        let len = u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| EngineError::parse_error(e.to_string()))
    }

    pub fn read_bytes(&mut self, len: usize) -> EngineResult<&'a [u8]> {
        self.take(len)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Accumulates a frame's payload bytes in the same primitive encoding
/// `FrameReader` decodes.
#[derive(Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        FrameWriter { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut w = FrameWriter::new();
        w.write_u32(42).write_string("hello").write_u64(9_000_000_000);
        let bytes = w.into_bytes();
        let mut r = FrameReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_string().unwrap(), "hello");
        assert_eq!(r.read_u64().unwrap(), 9_000_000_000);
    }

    #[test]
    fn truncated_frame_errors() {
        let bytes = [0u8, 1];
        let mut r = FrameReader::new(&bytes);
        assert!(r.read_u32().is_err());
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state data ended early (needed {needed} more bytes)")]
    UnexpectedEof { needed: usize },

    #[error("not a save state (bad magic)")]
    BadMagic,

    #[error("unsupported save state version: {0}")]
    UnsupportedVersion(u16),

    #[error("save state was taken with a different cartridge (mapper {expected} != {found})")]
    CartridgeMismatch { expected: u8, found: u8 },

    #[error("save state field '{0}' holds an invalid value")]
    InvalidField(&'static str),
}

/// Components write themselves as a flat, fixed-order byte stream.
/// Everything that affects future behavior belongs in here, decay timers
/// and one-cycle latches included, so a restored machine resumes bit-exact.
pub trait Persist {
    fn save(&self, w: &mut StateWriter);
    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError>;
}

#[derive(Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> StateWriter {
        StateWriter { buf: Vec::new() }
    }

    pub fn push_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn push_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> StateReader<'a> {
        StateReader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        if self.pos + len > self.data.len() {
            return Err(StateError::UnexpectedEof {
                needed: self.pos + len - self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, StateError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, StateError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, StateError> {
        let b = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), StateError> {
        let b = self.take(out.len())?;
        out.copy_from_slice(b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        let mut w = StateWriter::new();
        w.push_u8(0xAB);
        w.push_bool(true);
        w.push_u16(0x1234);
        w.push_u32(0xDEAD_BEEF);
        w.push_u64(0x0123_4567_89AB_CDEF);
        w.push_bytes(&[1, 2, 3]);

        let bytes = w.into_bytes();
        let mut r = StateReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
        let mut tail = [0u8; 3];
        r.read_bytes(&mut tail).unwrap();
        assert_eq!(tail, [1, 2, 3]);
    }

    #[test]
    fn short_input_is_rejected_not_read_past() {
        let bytes = vec![0x01, 0x02];
        let mut r = StateReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        match r.read_u32() {
            Err(StateError::UnexpectedEof { needed }) => assert_eq!(needed, 3),
            other => panic!("expected EOF error, got {:?}", other.map(|_| ())),
        }
        // the failed read must not have consumed anything
        assert_eq!(r.read_u8().unwrap(), 0x02);
    }
}

use crate::crypto::{Hash, HASH_SIZE};
use std::{array::TryFromSliceError, string::FromUtf8Error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Not enough bytes available: requested {0}, remaining {1}")]
    NotEnoughBytes(usize, usize),
    #[error("Invalid value")]
    InvalidValue,
    #[error("Invalid hex")]
    InvalidHex,
    #[error("Invalid string: {0}")]
    InvalidString(#[from] FromUtf8Error),
    #[error("Error on try into: {0}")]
    ErrorTryInto(#[from] TryFromSliceError),
    #[error("All bytes were not read: {0} remaining")]
    DirtyBuffer(usize),
}

// A cursor over a borrowed byte slice.
// Every read advances the internal position and fails cleanly when the
// buffer is exhausted, so malformed input can never panic.
pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, total: 0 }
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ReaderError> {
        Ok(self.read_bytes_ref(n)?.to_vec())
    }

    pub fn read_bytes_ref(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if n > self.size() {
            return Err(ReaderError::NotEnoughBytes(n, self.size()));
        }

        let bytes = &self.bytes[self.total..self.total + n];
        self.total += n;
        Ok(bytes)
    }

    pub fn read_bytes_32(&mut self) -> Result<[u8; 32], ReaderError> {
        let bytes = self.read_bytes_ref(32)?;
        Ok(bytes.try_into()?)
    }

    pub fn read_bytes_64(&mut self) -> Result<[u8; 64], ReaderError> {
        let bytes = self.read_bytes_ref(64)?;
        Ok(bytes.try_into()?)
    }

    pub fn read_hash(&mut self) -> Result<Hash, ReaderError> {
        let bytes = self.read_bytes_ref(HASH_SIZE)?;
        Ok(Hash::new(bytes.try_into()?))
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        let bytes = self.read_bytes_ref(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let bytes = self.read_bytes_ref(2)?;
        Ok(u16::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let bytes = self.read_bytes_ref(4)?;
        Ok(u32::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let bytes = self.read_bytes_ref(8)?;
        Ok(u64::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_u128(&mut self) -> Result<u128, ReaderError> {
        let bytes = self.read_bytes_ref(16)?;
        Ok(u128::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ReaderError> {
        let bytes = self.read_bytes_ref(2)?;
        Ok(i16::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ReaderError> {
        let bytes = self.read_bytes_ref(8)?;
        Ok(i64::from_le_bytes(bytes.try_into()?))
    }

    pub fn read_string_with_size(&mut self, size: usize) -> Result<String, ReaderError> {
        let bytes = self.read_bytes(size)?;
        Ok(String::from_utf8(bytes)?)
    }

    // u16 length prefix followed by UTF-8 bytes
    pub fn read_string(&mut self) -> Result<String, ReaderError> {
        let size = self.read_u16()? as usize;
        self.read_string_with_size(size)
    }

    // Remaining unread bytes
    pub fn size(&self) -> usize {
        self.bytes.len() - self.total
    }

    // Bytes consumed so far
    pub fn total_read(&self) -> usize {
        self.total
    }

    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }
}

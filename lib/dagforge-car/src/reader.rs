use std::io::{Cursor, Read};

use ipld_core::cid::Cid;
use serde::{Deserialize, Serialize};

use crate::error::CarError;

/// Largest section the reader will allocate for. CAR imposes no limit, but
/// unbounded attacker-controlled lengths must not drive allocation.
pub(crate) const MAX_ALLOC: usize = 4 * 1024 * 1024;

/// The DAG-CBOR header at the front of a CARv1 file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

/// Sequential reader over the `varint ++ cid ++ payload` sections of a CARv1
/// stream.
pub struct CarReader<R: Read> {
    reader: R,
    header: CarHeader,
    buffer: Vec<u8>,
}

impl<R: Read> CarReader<R> {
    pub fn new(mut reader: R) -> Result<Self, CarError> {
        let header_len = read_varint(&mut reader)?
            .ok_or_else(|| CarError::HeaderDecode("missing header".to_string()))?;
        if header_len > MAX_ALLOC {
            return Err(CarError::SectionTooLarge(header_len));
        }
        let mut buf = vec![0u8; header_len];
        reader.read_exact(&mut buf)?;
        let header: CarHeader = serde_ipld_dagcbor::from_slice(&buf)
            .map_err(|e| CarError::HeaderDecode(e.to_string()))?;
        if header.version != 1 {
            return Err(CarError::UnsupportedVersion(header.version));
        }
        Ok(Self {
            reader,
            header,
            buffer: vec![0u8; 1024],
        })
    }

    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }

    /// The next `(cid, payload)` section, or `None` at end of stream.
    pub fn next_block(&mut self) -> Result<Option<(Cid, Vec<u8>)>, CarError> {
        let Some(length) = read_varint(&mut self.reader)? else {
            return Ok(None);
        };
        if length > MAX_ALLOC {
            return Err(CarError::SectionTooLarge(length));
        }
        if length > self.buffer.len() {
            self.buffer.resize(length, 0);
        }
        self.reader.read_exact(&mut self.buffer[..length])?;

        let mut cursor = Cursor::new(&self.buffer[..length]);
        let cid = Cid::read_bytes(&mut cursor)?;
        let pos = cursor.position() as usize;
        Ok(Some((cid, self.buffer[pos..length].to_vec())))
    }
}

/// Reads a varint from the provided reader. Returns `Ok(None)` on `EOF`.
pub(crate) fn read_varint<R: Read>(reader: &mut R) -> Result<Option<usize>, CarError> {
    let mut b = unsigned_varint::encode::usize_buffer();
    for i in 0..b.len() {
        let n = reader.read(&mut b[i..i + 1])?;
        if n == 0 {
            return Ok(None);
        }
        if unsigned_varint::decode::is_last(b[i]) {
            let (num, _) = unsigned_varint::decode::usize(&b[..=i])?;
            return Ok(Some(num));
        }
    }
    Err(unsigned_varint::decode::Error::Overflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        for value in [0usize, 1, 127, 128, 300, MAX_ALLOC] {
            let mut buf = unsigned_varint::encode::usize_buffer();
            let encoded = unsigned_varint::encode::usize(value, &mut buf);
            let mut cursor = Cursor::new(encoded.to_vec());
            assert_eq!(read_varint(&mut cursor).unwrap(), Some(value));
        }
    }

    #[test]
    fn varint_eof_is_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(read_varint(&mut cursor).unwrap(), None);
    }

    #[test]
    fn rejects_wrong_version() {
        let header = CarHeader {
            roots: vec![],
            version: 2,
        };
        let header_bytes = serde_ipld_dagcbor::to_vec(&header).unwrap();
        let mut data = Vec::new();
        let mut buf = unsigned_varint::encode::usize_buffer();
        data.extend_from_slice(unsigned_varint::encode::usize(header_bytes.len(), &mut buf));
        data.extend_from_slice(&header_bytes);
        assert!(matches!(
            CarReader::new(Cursor::new(data)),
            Err(CarError::UnsupportedVersion(2))
        ));
    }
}

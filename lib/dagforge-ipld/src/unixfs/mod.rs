mod proto;

pub use proto::{Data, DataType};

/// The UnixFS `hashType` identifier for murmur3-x64-64, the only hash
/// function HAMT-sharded directories use in practice.
pub const HASH_MURMUR3: u64 = 0x22;

impl<'a> TryFrom<&'a [u8]> for Data<'a> {
    type Error = quick_protobuf::Error;

    fn try_from(data: &'a [u8]) -> Result<Self, Self::Error> {
        use quick_protobuf::{BytesReader, MessageRead};
        Data::from_reader(&mut BytesReader::from_bytes(data), data)
    }
}

impl Data<'_> {
    /// Serializes the message back to its wire form, without any length
    /// prefix, ready to be embedded in a DAG-PB `Data` field.
    pub fn to_vec(&self) -> Result<Vec<u8>, quick_protobuf::Error> {
        use quick_protobuf::{MessageWrite, Writer};
        let mut out = Vec::with_capacity(self.get_size());
        let mut writer = Writer::new(&mut out);
        self.write_message(&mut writer)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn roundtrip_file_framing() {
        let data = Data {
            Type: DataType::File,
            filesize: Some(300),
            blocksizes: vec![100, 100, 100],
            ..Default::default()
        };
        let bytes = data.to_vec().unwrap();
        let decoded = Data::try_from(bytes.as_slice()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrip_shard_framing() {
        let data = Data {
            Type: DataType::HAMTShard,
            Data: Cow::Borrowed(&[0xde, 0xad]),
            hashType: Some(HASH_MURMUR3),
            fanout: Some(16),
            ..Default::default()
        };
        let bytes = data.to_vec().unwrap();
        let decoded = Data::try_from(bytes.as_slice()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn unknown_enum_value_is_preserved() {
        let data = Data {
            Type: DataType::Unknown(9),
            ..Default::default()
        };
        let bytes = data.to_vec().unwrap();
        let decoded = Data::try_from(bytes.as_slice()).unwrap();
        assert_eq!(decoded.Type, DataType::Unknown(9));
    }
}

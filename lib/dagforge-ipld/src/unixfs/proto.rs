//! quick-protobuf model of the UnixFS `Data` message carried in the `Data`
//! field of a DAG-PB node. Field numbers follow the UnixFS protobuf schema.
#![allow(non_snake_case)]

use std::borrow::Cow;

use quick_protobuf::sizeofs::*;
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result, Writer, WriterBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HAMTShard,
    /// A wire value outside the schema, preserved for error reporting.
    Unknown(i32),
}

impl DataType {
    pub fn value(&self) -> i32 {
        match self {
            DataType::Raw => 0,
            DataType::Directory => 1,
            DataType::File => 2,
            DataType::Metadata => 3,
            DataType::Symlink => 4,
            DataType::HAMTShard => 5,
            DataType::Unknown(v) => *v,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Raw
    }
}

impl From<i32> for DataType {
    fn from(i: i32) -> Self {
        match i {
            0 => DataType::Raw,
            1 => DataType::Directory,
            2 => DataType::File,
            3 => DataType::Metadata,
            4 => DataType::Symlink,
            5 => DataType::HAMTShard,
            v => DataType::Unknown(v),
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct Data<'a> {
    pub Type: DataType,
    pub Data: Cow<'a, [u8]>,
    pub filesize: Option<u64>,
    pub blocksizes: Vec<u64>,
    pub hashType: Option<u64>,
    pub fanout: Option<u64>,
}

impl<'a> MessageRead<'a> for Data<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.Type = r.read_enum(bytes)?,
                Ok(18) => msg.Data = Cow::Borrowed(r.read_bytes(bytes)?),
                Ok(24) => msg.filesize = Some(r.read_uint64(bytes)?),
                Ok(32) => msg.blocksizes.push(r.read_uint64(bytes)?),
                Ok(34) => {
                    let packed = r.read_packed(bytes, |r, bytes| r.read_uint64(bytes))?;
                    msg.blocksizes.extend(packed);
                }
                Ok(40) => msg.hashType = Some(r.read_uint64(bytes)?),
                Ok(48) => msg.fanout = Some(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for Data<'_> {
    fn get_size(&self) -> usize {
        let mut size = 1 + sizeof_varint(self.Type.value() as u64);
        if !self.Data.is_empty() {
            size += 1 + sizeof_len(self.Data.len());
        }
        if let Some(s) = self.filesize {
            size += 1 + sizeof_varint(s);
        }
        size += self
            .blocksizes
            .iter()
            .map(|s| 1 + sizeof_varint(*s))
            .sum::<usize>();
        if let Some(s) = self.hashType {
            size += 1 + sizeof_varint(s);
        }
        if let Some(s) = self.fanout {
            size += 1 + sizeof_varint(s);
        }
        size
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_with_tag(8, |w| w.write_enum(self.Type.value()))?;
        if !self.Data.is_empty() {
            w.write_with_tag(18, |w| w.write_bytes(&self.Data))?;
        }
        if let Some(s) = self.filesize {
            w.write_with_tag(24, |w| w.write_uint64(s))?;
        }
        for s in &self.blocksizes {
            w.write_with_tag(32, |w| w.write_uint64(*s))?;
        }
        if let Some(s) = self.hashType {
            w.write_with_tag(40, |w| w.write_uint64(s))?;
        }
        if let Some(s) = self.fanout {
            w.write_with_tag(48, |w| w.write_uint64(s))?;
        }
        Ok(())
    }
}

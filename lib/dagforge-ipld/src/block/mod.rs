mod navigate;
mod print;

use std::fmt;

use bytes::Bytes;
use ipld_core::cid::Cid;
use ipld_core::codec::Codec;
use ipld_dagpb::{DagPbCodec, PbNode};
use once_cell::unsync::OnceCell;

use crate::errors::IpldError;
use crate::path::Path;
use crate::store::LinkSystem;
use crate::unixfs::{Data, DataType as UnixFsType};

pub use navigate::Visitor;
pub use print::{printable_query, writing_visitor};

const CODEC_DAG_PB: u64 = 0x70;
const CODEC_RAW: u64 = 0x55;

/// The classified kind of a loaded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// A bare byte leaf with no UnixFS framing (raw codec).
    RawLeaf,
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
    /// Marker for a block that could not be loaded under `ignore_missing`.
    Missing,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::RawLeaf => "RawLeaf",
            DataType::Raw => "Raw",
            DataType::Directory => "Directory",
            DataType::File => "File",
            DataType::Metadata => "Metadata",
            DataType::Symlink => "Symlink",
            DataType::HamtShard => "HAMTShard",
            DataType::Missing => "Missing",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded, classified UnixFS block. Children are held as lazy handles and
/// only hydrated when a traversal reaches them.
#[derive(Debug)]
pub struct Block {
    cid: Cid,
    ipld_path: Path,
    unixfs_path: Path,
    data_type: DataType,
    children: Vec<Child>,
    byte_offset: u64,
    byte_size: u64,
    block_sizes: Vec<u64>,
    arity: u64,
    field_data: Bytes,
    shard_index: Option<String>,
}

/// A link to a child block: everything known about the target before it is
/// loaded, plus a one-shot slot memoizing the loaded block.
#[derive(Debug)]
pub struct Child {
    cid: Cid,
    ipld_path: Path,
    unixfs_path: Path,
    byte_offset: u64,
    shard_index: Option<String>,
    slot: OnceCell<Block>,
}

impl Child {
    fn new(
        cid: Cid,
        ipld_path: Path,
        unixfs_path: Path,
        byte_offset: u64,
        shard_index: Option<String>,
    ) -> Self {
        Self {
            cid,
            ipld_path,
            unixfs_path,
            byte_offset,
            shard_index,
            slot: OnceCell::new(),
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn unixfs_path(&self) -> &Path {
        &self.unixfs_path
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Loads the target block on first access and memoizes it for the rest
    /// of the traversal.
    pub fn block(&self, ls: &dyn LinkSystem) -> Result<&Block, IpldError> {
        self.slot.get_or_try_init(|| {
            Block::load(
                ls,
                self.cid,
                self.ipld_path.clone(),
                self.unixfs_path.clone(),
                self.byte_offset,
                self.shard_index.clone(),
            )
        })
    }

    /// A synthetic stand-in emitted for this child when its block cannot be
    /// loaded and the traversal was asked to keep going.
    pub(crate) fn missing_block(&self) -> Block {
        Block {
            cid: self.cid,
            ipld_path: self.ipld_path.clone(),
            unixfs_path: self.unixfs_path.clone(),
            data_type: DataType::Missing,
            children: Vec::new(),
            byte_offset: self.byte_offset,
            byte_size: 0,
            block_sizes: Vec::new(),
            arity: 0,
            field_data: Bytes::new(),
            shard_index: self.shard_index.clone(),
        }
    }
}

impl Block {
    /// Loads and classifies the root of a DAG.
    pub fn new(ls: &dyn LinkSystem, root: Cid) -> Result<Self, IpldError> {
        Self::load(ls, root, Path::default(), Path::default(), 0, None)
    }

    fn load(
        ls: &dyn LinkSystem,
        cid: Cid,
        ipld_path: Path,
        unixfs_path: Path,
        byte_offset: u64,
        shard_index: Option<String>,
    ) -> Result<Self, IpldError> {
        let bytes = ls.load(&cid)?;

        match cid.codec() {
            CODEC_RAW => Ok(Self {
                cid,
                ipld_path,
                unixfs_path,
                data_type: DataType::RawLeaf,
                children: Vec::new(),
                byte_offset,
                byte_size: bytes.len() as u64,
                block_sizes: Vec::new(),
                arity: 0,
                field_data: Bytes::new(),
                shard_index,
            }),
            CODEC_DAG_PB => {
                let node: PbNode = DagPbCodec::decode_from_slice(&bytes)?;
                let data_bytes = node.data.clone().ok_or(IpldError::NoUnixFsData(cid))?;
                let data = Data::try_from(data_bytes.as_ref())?;
                Self::from_unixfs(cid, ipld_path, unixfs_path, byte_offset, shard_index, &node, &data)
            }
            codec => Err(IpldError::UnsupportedCodec { cid, codec }),
        }
    }

    fn from_unixfs(
        cid: Cid,
        ipld_path: Path,
        unixfs_path: Path,
        byte_offset: u64,
        shard_index: Option<String>,
        node: &PbNode,
        data: &Data<'_>,
    ) -> Result<Self, IpldError> {
        let mut block = Self {
            cid,
            ipld_path,
            unixfs_path,
            data_type: DataType::Raw,
            children: Vec::new(),
            byte_offset,
            byte_size: 0,
            block_sizes: Vec::new(),
            arity: 0,
            field_data: Bytes::new(),
            shard_index,
        };

        match data.Type {
            UnixFsType::Raw => {
                block.data_type = DataType::Raw;
                block.byte_size = data.Data.len() as u64;
            }
            UnixFsType::Directory => {
                block.data_type = DataType::Directory;
                for (i, link) in node.links.iter().enumerate() {
                    let name = link
                        .name
                        .as_deref()
                        .ok_or(IpldError::MissingLinkName { cid, index: i })?;
                    block.children.push(Child::new(
                        link.cid,
                        block.ipld_path.link(i),
                        block.unixfs_path.append(name),
                        0,
                        None,
                    ));
                }
            }
            UnixFsType::File => {
                block.data_type = DataType::File;
                block.block_sizes = data.blocksizes.clone();
                if node.links.len() != block.block_sizes.len() {
                    return Err(IpldError::BlockSizeMismatch {
                        cid,
                        links: node.links.len(),
                        sizes: block.block_sizes.len(),
                    });
                }
                let mut offset = byte_offset;
                for (i, link) in node.links.iter().enumerate() {
                    block.children.push(Child::new(
                        link.cid,
                        block.ipld_path.link(i),
                        block.unixfs_path.clone(),
                        offset,
                        None,
                    ));
                    offset += block.block_sizes[i];
                }
                block.byte_size = if block.block_sizes.is_empty() {
                    data.Data.len() as u64
                } else {
                    block.block_sizes.iter().sum()
                };
            }
            UnixFsType::HAMTShard => {
                block.data_type = DataType::HamtShard;
                let fanout = data
                    .fanout
                    .ok_or(IpldError::MalformedShard("no fanout (arity) for hamt node"))?;
                if fanout == 0 || !fanout.is_power_of_two() {
                    return Err(IpldError::MalformedShard("fanout is not a power of two"));
                }
                block.arity = fanout;
                block.field_data = Bytes::copy_from_slice(&data.Data);
                let prefix_len = format!("{:X}", fanout - 1).len();
                for (i, link) in node.links.iter().enumerate() {
                    let name = link
                        .name
                        .as_deref()
                        .ok_or(IpldError::MissingLinkName { cid, index: i })?;
                    let (prefix, suffix) = match (name.get(..prefix_len), name.get(prefix_len..)) {
                        (Some(prefix), Some(suffix)) => (prefix, suffix),
                        _ => {
                            return Err(IpldError::MalformedShard(
                                "link name shorter than shard prefix",
                            ))
                        }
                    };
                    let child_path = if suffix.is_empty() {
                        block.unixfs_path.clone()
                    } else {
                        block.unixfs_path.append(suffix)
                    };
                    block.children.push(Child::new(
                        link.cid,
                        block.ipld_path.link(i),
                        child_path,
                        0,
                        Some(prefix.to_string()),
                    ));
                }
            }
            UnixFsType::Metadata => return Err(IpldError::UnsupportedUnixfsType("Metadata")),
            UnixFsType::Symlink => return Err(IpldError::UnsupportedUnixfsType("Symlink")),
            UnixFsType::Unknown(v) => return Err(IpldError::UnknownDataType(v)),
        }

        Ok(block)
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn ipld_path(&self) -> &Path {
        &self.ipld_path
    }

    pub fn unixfs_path(&self) -> &Path {
        &self.unixfs_path
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Bytes contributed by this block: payload length for leaves, the
    /// `blocksizes` total for file roots, zero for directories and shards.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// The per-child byte-length table of a file block.
    pub fn block_sizes(&self) -> &[u64] {
        &self.block_sizes
    }

    /// Total length of the file rooted at this block.
    pub fn length(&self) -> u64 {
        self.byte_size
    }

    /// Shard fanout; zero for anything but a `HAMTShard`.
    pub fn arity(&self) -> u64 {
        self.arity
    }

    /// The bit-presence bitmap of a `HAMTShard`.
    pub fn field_data(&self) -> &Bytes {
        &self.field_data
    }

    /// The hex index prefix this shard block was linked under, when it is an
    /// intermediate `HAMTShard` node.
    pub fn shard_index(&self) -> Option<&str> {
        self.shard_index.as_deref()
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use crate::unixfs::DataType as UnixFsType;

    #[test]
    fn loads_raw_leaf() {
        let store = TestStore::default();
        let cid = put_raw(&store, b"hello world");
        let block = Block::new(&store, cid).unwrap();
        assert_eq!(block.data_type(), DataType::RawLeaf);
        assert_eq!(block.byte_size(), 11);
        assert!(block.children().is_empty());
    }

    #[test]
    fn loads_directory_with_named_children() {
        let store = TestStore::default();
        let a = put_raw(&store, b"aaa");
        let b = put_raw(&store, b"bbbb");
        let dir = put_dir(&store, &[("a.txt", a), ("b.txt", b)]);

        let block = Block::new(&store, dir).unwrap();
        assert_eq!(block.data_type(), DataType::Directory);
        assert_eq!(block.children().len(), 2);
        assert_eq!(block.children()[0].unixfs_path().to_string(), "a.txt");
        assert_eq!(
            block.children()[1].block(&store).unwrap().byte_size(),
            4
        );
        assert_eq!(block.children()[0].block(&store).unwrap().ipld_path().to_string(), "Links/0/Hash");
    }

    #[test]
    fn loads_file_with_cumulative_offsets() {
        let store = TestStore::default();
        let file = put_file(&store, &[b"0123456789".as_slice(), b"abcde", b"xyz"]);
        let block = Block::new(&store, file).unwrap();
        assert_eq!(block.data_type(), DataType::File);
        assert_eq!(block.byte_size(), 18);
        assert_eq!(block.block_sizes(), &[10, 5, 3]);
        assert_eq!(block.children().len(), block.block_sizes().len());
        let offsets: Vec<u64> = block.children().iter().map(Child::byte_offset).collect();
        assert_eq!(offsets, vec![0, 10, 15]);
        let leaf = block.children()[2].block(&store).unwrap();
        assert_eq!(leaf.byte_offset(), 15);
        assert_eq!(leaf.byte_size(), 3);
    }

    #[test]
    fn file_link_count_must_match_block_sizes() {
        let store = TestStore::default();
        let leaf = put_raw(&store, b"abc");
        let data = Data {
            Type: UnixFsType::File,
            blocksizes: vec![3, 3],
            ..Default::default()
        };
        let bad = put_node(
            &store,
            &data,
            vec![ipld_dagpb::PbLink {
                cid: leaf,
                name: None,
                size: None,
            }],
        );
        assert!(matches!(
            Block::new(&store, bad),
            Err(IpldError::BlockSizeMismatch { .. })
        ));
    }

    #[test]
    fn directory_link_without_name_is_an_error() {
        let store = TestStore::default();
        let leaf = put_raw(&store, b"abc");
        let data = Data {
            Type: UnixFsType::Directory,
            ..Default::default()
        };
        let dir = put_node(
            &store,
            &data,
            vec![ipld_dagpb::PbLink {
                cid: leaf,
                name: None,
                size: None,
            }],
        );
        assert!(matches!(
            Block::new(&store, dir),
            Err(IpldError::MissingLinkName { .. })
        ));
    }

    #[test]
    fn shard_prefixes_are_stripped_from_paths() {
        let store = TestStore::default();
        let a = put_raw(&store, b"aaa");
        let shard = put_shard(&store, 16, &[("thing", a)]);
        let block = Block::new(&store, shard).unwrap();
        assert_eq!(block.data_type(), DataType::HamtShard);
        assert_eq!(block.arity(), 16);
        assert_eq!(block.children().len(), 1);
        assert_eq!(block.children()[0].unixfs_path().to_string(), "thing");
    }

    #[test]
    fn shard_fanout_must_be_power_of_two() {
        let store = TestStore::default();
        let data = Data {
            Type: UnixFsType::HAMTShard,
            Data: vec![0u8; 2].into(),
            fanout: Some(12),
            ..Default::default()
        };
        let bad = put_node(&store, &data, Vec::new());
        assert!(matches!(
            Block::new(&store, bad),
            Err(IpldError::MalformedShard(_))
        ));
    }

    #[test]
    fn metadata_and_symlink_are_unsupported() {
        let store = TestStore::default();
        for t in [UnixFsType::Metadata, UnixFsType::Symlink] {
            let data = Data {
                Type: t,
                ..Default::default()
            };
            let cid = put_node(&store, &data, Vec::new());
            assert!(matches!(
                Block::new(&store, cid),
                Err(IpldError::UnsupportedUnixfsType(_))
            ));
        }
    }

    #[test]
    fn child_slot_memoizes() {
        let store = TestStore::default();
        let a = put_raw(&store, b"aaa");
        let dir = put_dir(&store, &[("a", a)]);
        let block = Block::new(&store, dir).unwrap();
        let first = block.children()[0].block(&store).unwrap() as *const Block;
        let second = block.children()[0].block(&store).unwrap() as *const Block;
        assert_eq!(first, second);
    }
}

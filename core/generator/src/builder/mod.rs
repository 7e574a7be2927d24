mod shard;

use std::io::Read;

use bytes::Bytes;
use dagforge_ipld::store::LinkStore;
use dagforge_ipld::unixfs::{Data, DataType};
use ipld_core::cid::Cid;
use ipld_core::codec::Codec;
use ipld_dagpb::{DagPbCodec, PbLink, PbNode};
use multihash_codetable::{Code, MultihashDigest};

use crate::error::GenError;

const CODEC_DAG_PB: u64 = 0x70;
const CODEC_RAW: u64 = 0x55;

/// Raw-leaf chunk size for generated files.
const CHUNK_SIZE: u64 = 256 * 1024;
/// Upper bound on links per file node; wider files get deeper DAGs.
const MAX_LINKS: usize = 174;

/// A materialized entity: its root CID, its path within the generated tree,
/// the total encoded size of its sub-DAG, and the entries it holds when it
/// is a directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub root: Cid,
    pub path: String,
    pub tsize: u64,
    pub children: Vec<DirEntry>,
}

/// Produces the next child of a directory being built, or `None` when the
/// directory is complete. Receives a proposed path-qualified name drawn from
/// the random source; implementations may override its last component.
pub type ChildGenerator<'a> =
    dyn FnMut(&str, &dyn LinkStore, &mut dyn Read) -> Result<Option<DirEntry>, GenError> + 'a;

/// Builds a file of `size` bytes read from `reader`, chunked into raw
/// leaves. A file that fits a single chunk is stored as one raw block;
/// anything larger gets a balanced DAG-PB file DAG.
pub fn build_file(
    store: &dyn LinkStore,
    size: u64,
    reader: &mut dyn Read,
) -> Result<DirEntry, GenError> {
    let mut nodes: Vec<FileNode> = Vec::new();
    let mut remaining = size;
    loop {
        let chunk_len = remaining.min(CHUNK_SIZE);
        let mut chunk = vec![0u8; chunk_len as usize];
        reader.read_exact(&mut chunk)?;
        nodes.push(put_raw(store, chunk.into())?);
        remaining -= chunk_len;
        if remaining == 0 {
            break;
        }
    }

    while nodes.len() > 1 {
        nodes = nodes
            .chunks(MAX_LINKS)
            .map(|group| put_file_node(store, group))
            .collect::<Result<_, _>>()?;
    }
    let root = nodes.remove(0);
    Ok(DirEntry {
        root: root.cid,
        path: String::new(),
        tsize: root.tsize,
        children: Vec::new(),
    })
}

/// Builds a directory by draining `next_child`, then committing either a
/// plain name-sorted directory node or a HAMT shard tree over the entries.
pub fn build_directory(
    store: &dyn LinkStore,
    shard_bitwidth: Option<u32>,
    dirname: &str,
    reader: &mut dyn Read,
    next_child: &mut ChildGenerator<'_>,
) -> Result<DirEntry, GenError> {
    let mut entries = Vec::new();
    loop {
        let proposed = propose_name(dirname, reader)?;
        match next_child(&proposed, store, reader)? {
            Some(entry) => entries.push(entry),
            None => break,
        }
    }
    match shard_bitwidth {
        Some(bitwidth) => shard::build_sharded(store, bitwidth, dirname, entries),
        None => build_plain(store, dirname, entries),
    }
}

fn build_plain(
    store: &dyn LinkStore,
    dirname: &str,
    entries: Vec<DirEntry>,
) -> Result<DirEntry, GenError> {
    let mut links: Vec<PbLink> = entries
        .iter()
        .map(|entry| PbLink {
            cid: entry.root,
            name: Some(entry_name(&entry.path).to_string()),
            size: Some(entry.tsize),
        })
        .collect();
    links.sort_by(|a, b| a.name.cmp(&b.name));

    let data = Data {
        Type: DataType::Directory,
        ..Default::default()
    };
    let (cid, encoded_len) = put_node(store, &data, links)?;
    let tsize = encoded_len + entries.iter().map(|e| e.tsize).sum::<u64>();
    Ok(DirEntry {
        root: cid,
        path: dirname.to_string(),
        tsize,
        children: entries,
    })
}

/// The directory-entry name is the last component of the entry's path.
pub(crate) fn entry_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

struct FileNode {
    cid: Cid,
    /// Payload bytes reachable through this node.
    content_len: u64,
    /// Encoded bytes of this sub-DAG, for link `Tsize` fields.
    tsize: u64,
}

fn put_file_node(store: &dyn LinkStore, children: &[FileNode]) -> Result<FileNode, GenError> {
    let blocksizes: Vec<u64> = children.iter().map(|c| c.content_len).collect();
    let content_len = blocksizes.iter().sum();
    let data = Data {
        Type: DataType::File,
        filesize: Some(content_len),
        blocksizes,
        ..Default::default()
    };
    let links = children
        .iter()
        .map(|child| PbLink {
            cid: child.cid,
            name: None,
            size: Some(child.tsize),
        })
        .collect();
    let (cid, encoded_len) = put_node(store, &data, links)?;
    Ok(FileNode {
        cid,
        content_len,
        tsize: encoded_len + children.iter().map(|c| c.tsize).sum::<u64>(),
    })
}

fn put_raw(store: &dyn LinkStore, payload: Bytes) -> Result<FileNode, GenError> {
    let cid = Cid::new_v1(CODEC_RAW, Code::Sha2_256.digest(&payload));
    let len = payload.len() as u64;
    store.store(cid, payload)?;
    Ok(FileNode {
        cid,
        content_len: len,
        tsize: len,
    })
}

/// Encodes a UnixFS-framed DAG-PB node, stores it, and returns its CID and
/// encoded length.
pub(crate) fn put_node(
    store: &dyn LinkStore,
    data: &Data<'_>,
    links: Vec<PbLink>,
) -> Result<(Cid, u64), GenError> {
    let node = PbNode {
        links,
        data: Some(Bytes::from(data.to_vec()?)),
    };
    let encoded = DagPbCodec::encode_to_vec(&node).map_err(dagforge_ipld::errors::IpldError::from)?;
    let cid = Cid::new_v1(CODEC_DAG_PB, Code::Sha2_256.digest(&encoded));
    let encoded_len = encoded.len() as u64;
    store.store(cid, Bytes::from(encoded))?;
    Ok((cid, encoded_len))
}

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A deterministic proposed entry name under `dirname`: 4 to 15 characters
/// drawn from the random source.
fn propose_name(dirname: &str, reader: &mut dyn Read) -> Result<String, GenError> {
    let mut len_byte = [0u8; 1];
    reader.read_exact(&mut len_byte)?;
    let len = 4 + (len_byte[0] % 12) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let name: String = buf
        .iter()
        .map(|b| NAME_ALPHABET[*b as usize % NAME_ALPHABET.len()] as char)
        .collect();
    if dirname.is_empty() {
        Ok(name)
    } else {
        Ok(format!("{dirname}/{name}"))
    }
}

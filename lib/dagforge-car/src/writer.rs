use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use dagforge_ipld::errors::IpldError;
use dagforge_ipld::store::LinkSystem;
use ipld_core::cid::Cid;
use ipld_core::codec::Codec;
use ipld_dagpb::{DagPbCodec, PbNode};
use tracing::debug;

use crate::error::CarError;
use crate::reader::CarHeader;

const CODEC_DAG_PB: u64 = 0x70;

/// Writes the DAG rooted at `root` as a CARv1 stream: blocks appear in
/// depth-first link order, each CID once, at its first appearance. The
/// output is a pure function of the DAG, which is what makes generated
/// fixtures byte-identical for a fixed seed.
pub fn write_car<W: Write>(ls: &dyn LinkSystem, root: Cid, w: &mut W) -> Result<(), CarError> {
    let header = CarHeader {
        roots: vec![root],
        version: 1,
    };
    let header_bytes =
        serde_ipld_dagcbor::to_vec(&header).map_err(|e| CarError::HeaderEncode(e.to_string()))?;
    write_section(w, &header_bytes)?;

    let mut seen = HashSet::new();
    write_block(ls, root, w, &mut seen)
}

/// Writes the DAG rooted at `root` to `path` as a CARv1 file.
pub fn write_car_file(ls: &dyn LinkSystem, root: Cid, path: &Path) -> Result<(), CarError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_car(ls, root, &mut writer)?;
    writer.flush()?;
    debug!(%root, path = %path.display(), "wrote car file");
    Ok(())
}

fn write_block<W: Write>(
    ls: &dyn LinkSystem,
    cid: Cid,
    w: &mut W,
    seen: &mut HashSet<Cid>,
) -> Result<(), CarError> {
    if !seen.insert(cid) {
        return Ok(());
    }
    let data = ls.load(&cid)?;

    let mut section = cid.to_bytes();
    section.extend_from_slice(&data);
    write_section(w, &section)?;

    if cid.codec() == CODEC_DAG_PB {
        let node: PbNode = DagPbCodec::decode_from_slice(&data).map_err(IpldError::from)?;
        for link in node.links {
            write_block(ls, link.cid, w, seen)?;
        }
    }
    Ok(())
}

fn write_section<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), CarError> {
    let mut buf = unsigned_varint::encode::usize_buffer();
    w.write_all(unsigned_varint::encode::usize(payload.len(), &mut buf))?;
    w.write_all(payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use dagforge_ipld::store::LinkStore;
    use ipld_dagpb::PbLink;
    use multihash_codetable::{Code, MultihashDigest};

    use super::*;
    use crate::reader::CarReader;
    use crate::store::MemoryBlockstore;

    fn put_raw(store: &MemoryBlockstore, payload: &[u8]) -> Cid {
        let cid = Cid::new_v1(0x55, Code::Sha2_256.digest(payload));
        store.store(cid, Bytes::copy_from_slice(payload)).unwrap();
        cid
    }

    fn put_pb(store: &MemoryBlockstore, links: Vec<PbLink>) -> Cid {
        let node = PbNode {
            links,
            data: Some(Bytes::from_static(&[0x08, 0x01])),
        };
        let encoded = DagPbCodec::encode_to_vec(&node).unwrap();
        let cid = Cid::new_v1(CODEC_DAG_PB, Code::Sha2_256.digest(&encoded));
        store.store(cid, Bytes::from(encoded)).unwrap();
        cid
    }

    fn link(cid: Cid, name: &str) -> PbLink {
        PbLink {
            cid,
            name: Some(name.to_string()),
            size: None,
        }
    }

    #[test]
    fn blocks_appear_in_depth_first_order_once() {
        let store = MemoryBlockstore::new();
        let shared = put_raw(&store, b"shared");
        let a = put_pb(&store, vec![link(shared, "s")]);
        let b = put_pb(&store, vec![link(shared, "s")]);
        let root = put_pb(&store, vec![link(a, "a"), link(b, "b")]);

        let mut out = Vec::new();
        write_car(&store, root, &mut out).unwrap();

        let mut reader = CarReader::new(out.as_slice()).unwrap();
        assert_eq!(reader.roots(), &[root]);
        let mut order = Vec::new();
        while let Some((cid, _)) = reader.next_block().unwrap() {
            order.push(cid);
        }
        // Depth-first: root, a, shared (first appearance), then b only.
        assert_eq!(order, vec![root, a, shared, b]);
    }

    #[test]
    fn output_is_deterministic() {
        let store = MemoryBlockstore::new();
        let leaf = put_raw(&store, b"leafdata");
        let root = put_pb(&store, vec![link(leaf, "l")]);

        let mut first = Vec::new();
        write_car(&store, root, &mut first).unwrap();
        let mut second = Vec::new();
        write_car(&store, root, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_block_aborts_write() {
        let store = MemoryBlockstore::new();
        let ghost = Cid::new_v1(0x55, Code::Sha2_256.digest(b"ghost"));
        let root = put_pb(&store, vec![link(ghost, "g")]);
        let mut out = Vec::new();
        assert!(matches!(
            write_car(&store, root, &mut out),
            Err(CarError::Ipld(IpldError::Load { .. }))
        ));
    }
}

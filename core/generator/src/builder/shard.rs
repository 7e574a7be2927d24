use std::borrow::Cow;

use dagforge_ipld::hamt::{hash, HashBits};
use dagforge_ipld::store::LinkStore;
use dagforge_ipld::unixfs::{Data, DataType, HASH_MURMUR3};
use ipld_core::cid::Cid;
use ipld_dagpb::PbLink;

use crate::error::GenError;

use super::{entry_name, put_node, DirEntry};

/// Bitwidths past this exhaust the 64-bit digest in under five levels and
/// ask for absurd fanouts; reject them up front.
const MAX_BITWIDTH: u32 = 16;

/// Commits `entries` as a murmur3 HAMT with fanout `2^bitwidth`. Entry links
/// carry a `HEXPREFIX ++ name` label; sub-shard links carry the prefix
/// alone. Slot collisions push the colliding entries one level down.
pub(crate) fn build_sharded(
    store: &dyn LinkStore,
    bitwidth: u32,
    dirname: &str,
    entries: Vec<DirEntry>,
) -> Result<DirEntry, GenError> {
    if bitwidth == 0 || bitwidth > MAX_BITWIDTH {
        return Err(GenError::ShardBitwidth(bitwidth));
    }
    let fanout: u64 = 1 << bitwidth;

    let mut root = ShardNode::new(fanout as usize);
    for (i, entry) in entries.iter().enumerate() {
        root.insert(0, bitwidth, entry_name(&entry.path).to_string(), i)?;
    }

    let prefix_len = format!("{:X}", fanout - 1).len();
    let (cid, tsize) = root.commit(store, fanout, prefix_len, &entries)?;
    Ok(DirEntry {
        root: cid,
        path: dirname.to_string(),
        tsize,
        children: entries,
    })
}

struct ShardNode {
    slots: Vec<Slot>,
}

enum Slot {
    Empty,
    /// An entry, held as an index into the entries being committed.
    Leaf { name: String, entry: usize },
    Shard(Box<ShardNode>),
}

impl ShardNode {
    fn new(fanout: usize) -> Self {
        Self {
            slots: (0..fanout).map(|_| Slot::Empty).collect(),
        }
    }

    fn insert(
        &mut self,
        depth: usize,
        bitwidth: u32,
        name: String,
        entry: usize,
    ) -> Result<(), GenError> {
        let index = slot_index(&name, depth, bitwidth)?;
        match &mut self.slots[index] {
            Slot::Empty => self.slots[index] = Slot::Leaf { name, entry },
            Slot::Shard(child) => child.insert(depth + 1, bitwidth, name, entry)?,
            Slot::Leaf { .. } => {
                let Slot::Leaf {
                    name: other_name,
                    entry: other_entry,
                } = std::mem::replace(&mut self.slots[index], Slot::Empty)
                else {
                    unreachable!()
                };
                let mut child = ShardNode::new(self.slots.len());
                child.insert(depth + 1, bitwidth, other_name, other_entry)?;
                child.insert(depth + 1, bitwidth, name, entry)?;
                self.slots[index] = Slot::Shard(Box::new(child));
            }
        }
        Ok(())
    }

    fn commit(
        &self,
        store: &dyn LinkStore,
        fanout: u64,
        prefix_len: usize,
        entries: &[DirEntry],
    ) -> Result<(Cid, u64), GenError> {
        let mut bitmap = vec![0u8; (fanout as usize).div_ceil(8)];
        let mut links = Vec::new();
        let mut children_tsize = 0u64;

        for (index, slot) in self.slots.iter().enumerate() {
            let (cid, name, tsize) = match slot {
                Slot::Empty => continue,
                Slot::Leaf { name, entry } => {
                    let entry = &entries[*entry];
                    (
                        entry.root,
                        format!("{index:0prefix_len$X}{name}"),
                        entry.tsize,
                    )
                }
                Slot::Shard(child) => {
                    let (cid, tsize) = child.commit(store, fanout, prefix_len, entries)?;
                    (cid, format!("{index:0prefix_len$X}"), tsize)
                }
            };
            let byte = bitmap.len() - 1 - index / 8;
            bitmap[byte] |= 1 << (index % 8);
            children_tsize += tsize;
            links.push(PbLink {
                cid,
                name: Some(name),
                size: Some(tsize),
            });
        }

        let data = Data {
            Type: DataType::HAMTShard,
            Data: Cow::Owned(bitmap),
            hashType: Some(HASH_MURMUR3),
            fanout: Some(fanout),
            ..Default::default()
        };
        let (cid, encoded_len) = put_node(store, &data, links)?;
        Ok((cid, encoded_len + children_tsize))
    }
}

/// The slot an entry name occupies at `depth`: the digest's bits
/// `[depth*bitwidth, (depth+1)*bitwidth)`.
fn slot_index(name: &str, depth: usize, bitwidth: u32) -> Result<usize, GenError> {
    let mut bits = HashBits::new(hash(name.as_bytes()));
    for _ in 0..depth {
        bits.next(bitwidth)?;
    }
    Ok(bits.next(bitwidth)? as usize)
}

#[cfg(test)]
mod tests {
    use dagforge_ipld::block::{Block, DataType as BlockType};

    use super::super::build_file;
    use super::super::tests::TestStore;
    use super::*;
    use std::io::Read;

    struct FixedReader;

    impl Read for FixedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            buf.fill(0x5a);
            Ok(buf.len())
        }
    }

    fn entry(store: &TestStore, name: &str) -> DirEntry {
        let mut entry = build_file(store, 8, &mut FixedReader).unwrap();
        entry.path = name.to_string();
        entry
    }

    #[test]
    fn rejects_oversized_bitwidth() {
        let store = TestStore::default();
        assert!(matches!(
            build_sharded(&store, 20, "", Vec::new()),
            Err(GenError::ShardBitwidth(20))
        ));
    }

    #[test]
    fn shard_roundtrips_through_the_loader() {
        let store = TestStore::default();
        let names: Vec<String> = (0..40).map(|i| format!("entry-{i}")).collect();
        let entries: Vec<DirEntry> = names.iter().map(|n| entry(&store, n)).collect();
        let dir = build_sharded(&store, 4, "", entries).unwrap();

        let block = Block::new(&store, dir.root).unwrap();
        assert_eq!(block.data_type(), BlockType::HamtShard);
        assert_eq!(block.arity(), 16);
        // The presence bitmap ranks must agree with the link table.
        let popcount: u32 = block.field_data().iter().map(|b| b.count_ones()).sum();
        assert_eq!(popcount as usize, block.children().len());
    }

    #[test]
    fn every_entry_is_findable() {
        use dagforge_ipld::path::Path;
        use dagforge_ipld::query::{ByteRange, DagScope};

        let store = TestStore::default();
        let names: Vec<String> = (0..50).map(|i| format!("file-{i}.dat")).collect();
        let entries: Vec<DirEntry> = names.iter().map(|n| entry(&store, n)).collect();
        let dir = build_sharded(&store, 4, "", entries).unwrap();
        let block = Block::new(&store, dir.root).unwrap();

        for name in &names {
            let mut found = Vec::new();
            block
                .navigate(
                    &store,
                    &Path::parse(name),
                    DagScope::Block,
                    ByteRange::default(),
                    false,
                    &mut |_, depth, b| {
                        found.push((depth, b.unixfs_path().to_string(), b.data_type()));
                        Ok(())
                    },
                )
                .unwrap();
            // Root shard first, leaf last; intermediates at increasing depth.
            assert_eq!(found.first().unwrap().2, BlockType::HamtShard);
            let (leaf_depth, leaf_path, _) = found.last().unwrap();
            assert_eq!(leaf_path, name);
            let depths: Vec<usize> = found.iter().map(|(d, _, _)| *d).collect();
            let mut sorted = depths.clone();
            sorted.sort_unstable();
            assert_eq!(depths, sorted);
            assert!(*leaf_depth >= 1);
        }
    }

    #[test]
    fn missing_name_is_not_found() {
        use dagforge_ipld::errors::IpldError;
        use dagforge_ipld::path::Path;
        use dagforge_ipld::query::{ByteRange, DagScope};

        let store = TestStore::default();
        let names: Vec<String> = (0..10).map(|i| format!("present-{i}")).collect();
        let entries: Vec<DirEntry> = names.iter().map(|n| entry(&store, n)).collect();
        let dir = build_sharded(&store, 4, "", entries).unwrap();
        let block = Block::new(&store, dir.root).unwrap();

        let err = block
            .navigate(
                &store,
                &Path::parse("definitely-not-here"),
                DagScope::Block,
                ByteRange::default(),
                false,
                &mut |_, _, _| Ok(()),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            IpldError::HamtNotFound | IpldError::UnexpectedShardChild { .. }
        ));
    }

    #[test]
    fn deep_collisions_build_nested_shards() {
        let store = TestStore::default();
        // Tiny fanout forces collisions and sub-shards with 12 entries.
        let names: Vec<String> = (0..12).map(|i| format!("n{i}")).collect();
        let entries: Vec<DirEntry> = names.iter().map(|n| entry(&store, n)).collect();
        let dir = build_sharded(&store, 1, "", entries).unwrap();

        let block = Block::new(&store, dir.root).unwrap();
        assert_eq!(block.arity(), 2);
        // At fanout 2 with 12 entries there must be intermediate shards.
        let has_shard_child = block.children().iter().any(|c| {
            c.block(&store)
                .map(|b| b.data_type() == BlockType::HamtShard)
                .unwrap_or(false)
        });
        assert!(has_shard_child);
    }
}

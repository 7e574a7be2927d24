use crate::errors::IpldError;
use crate::hamt::{hash, HashBits};
use crate::path::Path;
use crate::query::{ByteRange, DagScope};
use crate::store::LinkSystem;

use super::{Block, DataType};

/// Callback invoked for every block a query materializes, in the order a
/// trustless verifier would observe them. Returning an error aborts the
/// traversal immediately.
pub type Visitor<'a> = dyn FnMut(&Path, usize, &Block) -> Result<(), IpldError> + 'a;

impl Block {
    /// Executes a trustless query rooted at this block: walk `path`, then
    /// expand the terminal block's subtree according to `scope`, pruning file
    /// leaves against `bytes` under entity scope.
    ///
    /// With `ignore_missing`, loader failures during subtree expansion are
    /// downgraded to a visit of a synthetic [`DataType::Missing`] block;
    /// failures while walking the path still abort.
    pub fn navigate(
        &self,
        ls: &dyn LinkSystem,
        path: &Path,
        scope: DagScope,
        bytes: ByteRange,
        ignore_missing: bool,
        visit: &mut Visitor<'_>,
    ) -> Result<(), IpldError> {
        visit(&Path::default(), 0, self)?;

        let mut progress = Path::default();
        let mut curr = self;
        let mut depth = 0;

        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            progress = progress.append(segment.clone());

            match curr.data_type {
                DataType::Directory => {
                    let child = curr
                        .children
                        .iter()
                        .find(|child| child.unixfs_path == progress)
                        .ok_or_else(|| IpldError::SegmentNotFound {
                            data_type: curr.data_type.name(),
                            segment: segment.clone(),
                            remaining: segments[i + 1..].join("/"),
                        })?;
                    let block = child.block(ls)?;
                    depth += 1;
                    visit(&progress, depth, block)?;
                    curr = block;
                }
                DataType::HamtShard => {
                    let (block, leaf_depth) = curr.find_in_hamt(ls, &progress, depth + 1, visit)?;
                    depth = leaf_depth;
                    visit(&progress, depth, block)?;
                    curr = block;
                }
                other => return Err(IpldError::UnsupportedForPath(other.name())),
            }
        }

        match scope {
            DagScope::Block => Ok(()),
            DagScope::Entity => {
                curr.visit_all_entity(ls, &progress, bytes, depth + 1, ignore_missing, visit)
            }
            DagScope::All => curr.visit_all(ls, &progress, depth + 1, ignore_missing, visit),
        }
    }

    fn visit_all(
        &self,
        ls: &dyn LinkSystem,
        p: &Path,
        depth: usize,
        ignore_missing: bool,
        visit: &mut Visitor<'_>,
    ) -> Result<(), IpldError> {
        for child in &self.children {
            let block = match child.block(ls) {
                Ok(block) => block,
                Err(IpldError::Load { .. }) if ignore_missing => {
                    visit(p, depth, &child.missing_block())?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            visit(p, depth, block)?;
            block.visit_all(ls, p, depth + 1, ignore_missing, visit)?;
        }
        Ok(())
    }

    fn visit_all_entity(
        &self,
        ls: &dyn LinkSystem,
        p: &Path,
        bytes: ByteRange,
        depth: usize,
        ignore_missing: bool,
        visit: &mut Visitor<'_>,
    ) -> Result<(), IpldError> {
        if self.data_type == DataType::File {
            return self.visit_all_file(ls, p, bytes, depth, ignore_missing, visit);
        }

        // Only the entity's own blocks: HAMT internals share the terminal
        // path's last segment, sibling entries do not.
        for child in &self.children {
            let block = match child.block(ls) {
                Ok(block) => block,
                Err(IpldError::Load { .. }) if ignore_missing => {
                    if child.unixfs_path.last() == p.last() {
                        visit(p, depth, &child.missing_block())?;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            if block.unixfs_path.last() != p.last() {
                continue;
            }
            visit(p, depth, block)?;
            block.visit_all_entity(ls, p, bytes, depth + 1, ignore_missing, visit)?;
        }
        Ok(())
    }

    fn visit_all_file(
        &self,
        ls: &dyn LinkSystem,
        p: &Path,
        bytes: ByteRange,
        depth: usize,
        ignore_missing: bool,
        visit: &mut Visitor<'_>,
    ) -> Result<(), IpldError> {
        let length = self.length() as i64;
        let mut from = bytes.from;
        // The inclusive upper bound becomes exclusive here.
        let mut to = match bytes.to {
            None => i64::MAX,
            // Inclusive bound becomes exclusive; negative bounds stay as-is
            // and are re-anchored to the file length below.
            Some(to) if to >= 0 => to + 1,
            Some(to) => to,
        };
        if from < 0 {
            from = (length + from).max(0);
        }
        if to < 0 {
            to = (length + to).max(0);
        }
        if from > to {
            return Err(IpldError::InvalidByteRange {
                len: self.byte_size,
                from,
                to,
                orig: bytes.to_string(),
            });
        }
        self.visit_file_range(ls, p, from, to, depth, ignore_missing, visit)
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_file_range(
        &self,
        ls: &dyn LinkSystem,
        p: &Path,
        from: i64,
        to: i64,
        depth: usize,
        ignore_missing: bool,
        visit: &mut Visitor<'_>,
    ) -> Result<(), IpldError> {
        if !self.children.is_empty() && self.data_type != DataType::File {
            return Err(IpldError::ExpectedFile);
        }
        for (i, child) in self.children.iter().enumerate() {
            let offset = child.byte_offset as i64;
            if offset + self.block_sizes[i] as i64 - 1 < from {
                continue;
            }
            if offset >= to {
                continue;
            }
            let block = match child.block(ls) {
                Ok(block) => block,
                Err(IpldError::Load { .. }) if ignore_missing => {
                    visit(p, depth, &child.missing_block())?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            visit(p, depth, block)?;
            block.visit_file_range(ls, p, from, to, depth + 1, ignore_missing, visit)?;
        }
        Ok(())
    }

    /// Resolves `p.last()` under this shard root, descending intermediate
    /// shard nodes and emitting a visit for each one passed through. Returns
    /// the leaf block and the depth it was reached at.
    fn find_in_hamt<'s>(
        &'s self,
        ls: &dyn LinkSystem,
        p: &Path,
        mut depth: usize,
        visit: &mut Visitor<'_>,
    ) -> Result<(&'s Block, usize), IpldError> {
        if self.arity == 0 {
            return Err(IpldError::MalformedShard("no fanout (arity) for hamt node"));
        }
        let key = p.last();
        let mut hv = HashBits::new(hash(key.as_bytes()));
        let log2 = self.arity.trailing_zeros();
        let mut node = self;
        loop {
            // descend into hamt
            let child_index = hv.next(log2)? as usize;
            if node.field_data.is_empty() {
                return Err(IpldError::MalformedShard("no field data for hamt node"));
            }
            if node.arity != self.arity {
                return Err(IpldError::MalformedShard("inconsistent arity"));
            }
            if !bitfield_bit(&node.field_data, child_index) {
                return Err(IpldError::HamtNotFound);
            }
            let link_index = bitfield_ones_before(&node.field_data, child_index);
            if link_index >= node.children.len() {
                return Err(IpldError::MalformedShard("bad shard indexing"));
            }
            let child = &node.children[link_index];
            let block = child.block(ls)?;
            if block.data_type == DataType::HamtShard && block.unixfs_path == self.unixfs_path {
                visit(&p.pop(), depth, block)?;
                node = block;
                depth += 1;
            } else if child.unixfs_path.last() == key {
                return Ok((block, depth));
            } else if block.data_type == DataType::HamtShard {
                return Err(IpldError::MalformedShard(
                    "intermediate shard path diverges from shard root",
                ));
            } else {
                return Err(IpldError::UnexpectedShardChild {
                    found: child.unixfs_path.last().to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
}

/// Bit `i` of the shard presence bitmap, which is laid out as a big-endian
/// integer over the byte array.
fn bitfield_bit(data: &[u8], i: usize) -> bool {
    let byte = i / 8;
    if byte >= data.len() {
        return false;
    }
    data[data.len() - 1 - byte] & (1 << (i % 8)) != 0
}

/// Number of set bits strictly below `i` — the link index of slot `i`.
fn bitfield_ones_before(data: &[u8], i: usize) -> usize {
    let mut count = 0;
    let mut remaining = i;
    let mut byte = 0;
    while remaining >= 8 && byte < data.len() {
        count += data[data.len() - 1 - byte].count_ones() as usize;
        remaining -= 8;
        byte += 1;
    }
    if remaining > 0 && byte < data.len() {
        let mask = (1u16 << remaining) as u8 - 1;
        count += (data[data.len() - 1 - byte] & mask).count_ones() as usize;
    }
    count
}

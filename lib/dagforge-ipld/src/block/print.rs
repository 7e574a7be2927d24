use std::collections::HashSet;
use std::io::Write;

use ipld_core::cid::Cid;

use crate::errors::IpldError;
use crate::path::Path;
use crate::query::{ByteRange, DagScope};

use super::{Block, DataType};

/// Builds a visitor that renders each visited block as one trace line:
/// CID, data-type name, depth-indented path, and a byte interval for leaves
/// or the shard index for intermediate HAMT nodes.
///
/// With `duplicates` off, repeat appearances of a CID are suppressed. With
/// `full_path` off, only the last path segment is printed.
pub fn writing_visitor<'a, W: Write + 'a>(
    mut w: W,
    duplicates: bool,
    full_path: bool,
) -> impl FnMut(&Path, usize, &Block) -> Result<(), IpldError> + 'a {
    let mut last_depth = 0;
    let mut seen: HashSet<Cid> = HashSet::new();

    move |_p, depth, block| {
        if !duplicates && seen.contains(block.cid()) {
            return Ok(());
        }
        seen.insert(*block.cid());

        let mut pad = "  ".repeat(depth);
        if depth > last_depth {
            pad.truncate(pad.len() - 2);
            pad.push_str("↳ ");
        }
        let mut fo = if full_path {
            format!("/{}", block.unixfs_path())
        } else {
            format!("/{}", block.unixfs_path().last())
        };
        if block.byte_size() > 0 {
            fo.push_str(&format!(
                " [{}:{}] ({} B)",
                block.byte_offset(),
                block.byte_offset() + block.byte_size() - 1,
                comma(block.byte_size())
            ));
        } else if block.data_type() == DataType::HamtShard {
            if let Some(index) = block.shard_index() {
                fo.push_str(&format!(" [{index}]"));
            }
        }
        writeln!(w, "{:<10} | {:<9} | {}{}", block.cid(), block.data_type(), pad, fo)?;
        last_depth = depth;
        Ok(())
    }
}

/// The canonical printable form of a query, mirroring what the parser
/// accepts.
pub fn printable_query(
    root: &Cid,
    path: &Path,
    scope: DagScope,
    byte_range: Option<ByteRange>,
    duplicates: bool,
) -> String {
    let path = match path.to_string() {
        p if p.is_empty() => p,
        p => format!("/{p}"),
    };
    let bytes = byte_range
        .map(|br| format!("&entity-bytes={br}"))
        .unwrap_or_default();
    let dups = if duplicates { "" } else { "&dups=n" };
    format!("/ipfs/{root}{path}?dag-scope={scope}{bytes}{dups}")
}

/// Thousands-grouped decimal rendering (`262144` -> `"262,144"`).
fn comma(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

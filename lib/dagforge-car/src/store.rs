use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bytes::Bytes;
use dagforge_ipld::errors::IpldError;
use dagforge_ipld::store::{LinkStore, LinkSystem};
use ipld_core::cid::Cid;
use tracing::debug;

use crate::error::CarError;
use crate::reader::CarReader;

/// In-memory content-addressed block store. Loads are trusted; payloads are
/// kept exactly as inserted.
#[derive(Debug, Default)]
pub struct MemoryBlockstore {
    blocks: RefCell<HashMap<Cid, Bytes>>,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every section of a CARv1 stream. Returns the store and the
    /// root, when the header carries exactly one.
    pub fn from_car<R: Read>(reader: R) -> Result<(Self, Option<Cid>), CarError> {
        let mut car = CarReader::new(reader)?;
        let root = match car.roots() {
            [root] => Some(*root),
            _ => None,
        };
        let store = Self::new();
        while let Some((cid, data)) = car.next_block()? {
            store.blocks.borrow_mut().insert(cid, data.into());
        }
        debug!(blocks = store.len(), "loaded car into memory");
        Ok((store, root))
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blocks.borrow().contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.borrow().is_empty()
    }
}

impl LinkSystem for MemoryBlockstore {
    fn load(&self, cid: &Cid) -> Result<Bytes, IpldError> {
        self.blocks
            .borrow()
            .get(cid)
            .cloned()
            .ok_or_else(|| IpldError::Load {
                cid: *cid,
                reason: "block not found in store".to_string(),
            })
    }
}

impl LinkStore for MemoryBlockstore {
    fn store(&self, cid: Cid, data: Bytes) -> Result<(), IpldError> {
        self.blocks.borrow_mut().insert(cid, data);
        Ok(())
    }
}

/// Opens a CAR file into memory. When the header does not pin down a single
/// root, the root is inferred from the `<root-cid>.car` file name; failure to
/// infer is not fatal since the caller may know the root from another source.
pub fn open_car_file(path: &Path) -> Result<(MemoryBlockstore, Option<Cid>), CarError> {
    let file = File::open(path)?;
    let (store, mut root) = MemoryBlockstore::from_car(BufReader::new(file))?;
    if root.is_none() {
        root = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| Cid::try_from(stem).ok());
    }
    Ok((store, root))
}

#[cfg(test)]
mod tests {
    use multihash_codetable::{Code, MultihashDigest};

    use super::*;
    use crate::writer::write_car;

    fn raw_cid(payload: &[u8]) -> Cid {
        Cid::new_v1(0x55, Code::Sha2_256.digest(payload))
    }

    #[test]
    fn load_miss_is_a_load_error() {
        let store = MemoryBlockstore::new();
        let missing = raw_cid(b"nope");
        assert!(matches!(
            store.load(&missing),
            Err(IpldError::Load { cid, .. }) if cid == missing
        ));
    }

    #[test]
    fn car_roundtrip_through_store() {
        let store = MemoryBlockstore::new();
        let cid = raw_cid(b"hello");
        store.store(cid, Bytes::from_static(b"hello")).unwrap();

        let mut out = Vec::new();
        write_car(&store, cid, &mut out).unwrap();

        let (restored, root) = MemoryBlockstore::from_car(out.as_slice()).unwrap();
        assert_eq!(root, Some(cid));
        assert_eq!(restored.load(&cid).unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn root_inferred_from_file_name() {
        let store = MemoryBlockstore::new();
        let cid = raw_cid(b"rooted");
        store.store(cid, Bytes::from_static(b"rooted")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{cid}.car"));
        // Write a header with no usable root by writing two roots.
        let mut out = Vec::new();
        {
            use crate::reader::CarHeader;
            let header = CarHeader {
                roots: vec![cid, cid],
                version: 1,
            };
            let header_bytes = serde_ipld_dagcbor::to_vec(&header).unwrap();
            let mut buf = unsigned_varint::encode::usize_buffer();
            out.extend_from_slice(unsigned_varint::encode::usize(header_bytes.len(), &mut buf));
            out.extend_from_slice(&header_bytes);
            let mut section = cid.to_bytes();
            section.extend_from_slice(b"rooted");
            out.extend_from_slice(unsigned_varint::encode::usize(section.len(), &mut buf));
            out.extend_from_slice(&section);
        }
        std::fs::write(&path, out).unwrap();

        let (_, root) = open_car_file(&path).unwrap();
        assert_eq!(root, Some(cid));
    }
}

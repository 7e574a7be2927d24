use bytes::Bytes;
use ipld_core::cid::Cid;

use crate::errors::IpldError;

/// Read interface over a content-addressed block store.
///
/// Loads are trusted: implementations are not required to re-verify the
/// payload against the CID digest. A traversal borrows the link system for
/// its whole duration and hydrates child blocks through it on demand.
pub trait LinkSystem {
    /// Returns the payload behind `cid`, or [`IpldError::Load`] when the
    /// store cannot produce it.
    fn load(&self, cid: &Cid) -> Result<Bytes, IpldError>;
}

/// Write extension used by DAG generation.
pub trait LinkStore: LinkSystem {
    fn store(&self, cid: Cid, data: Bytes) -> Result<(), IpldError>;
}

/// This module contains declaration of `thiserror` error types.
pub mod errors;
/// Ordered-segment paths used for both the IPLD structural path
/// (`Links/3/Hash`) and the logical UnixFS path of a block.
pub mod path;
/// This module contains declaration of UnixFS data types.
pub mod unixfs;
/// Murmur3 hashing and the bit-cursor used for HAMT shard descent.
pub mod hamt;
/// Typed block model, the lazy block loader and the query navigator.
///
/// - `Block::new` loads and classifies the root of a DAG.
/// - `Block::navigate` executes a trustless path/scope/byte-range query,
///   invoking a visitor for every block the query materializes.
/// - `writing_visitor` renders the visit stream as a human-readable trace.
pub mod block;
/// Trustless URL-form query parsing (`/ipfs/<cid>/<path>?dag-scope=...`).
pub mod query;
/// Read and write interfaces over a content-addressed block store.
pub mod store;

pub use ipld_core::cid::Cid;

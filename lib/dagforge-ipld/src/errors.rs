use ipld_core::cid::Cid;
use thiserror::Error;

/// Error type for block loading and navigation.
#[derive(Debug, Error)]
pub enum IpldError {
    #[error("error parsing cid: {0}")]
    CidParse(#[from] ipld_core::cid::Error),

    #[error("error decoding DAG-PB data: {0}")]
    DagPb(#[from] ipld_dagpb::Error),

    #[error("error decoding UnixFS data: {0}")]
    UnixFsProtobuf(#[from] quick_protobuf::Error),

    #[error("block {0} has no UnixFS data")]
    NoUnixFsData(Cid),

    #[error("unsupported codec {codec:#x} in cid {cid}")]
    UnsupportedCodec { cid: Cid, codec: u64 },

    #[error("link {index} of block {cid} has no name")]
    MissingLinkName { cid: Cid, index: usize },

    #[error("file block {cid} has {links} links but {sizes} block sizes")]
    BlockSizeMismatch { cid: Cid, links: usize, sizes: usize },

    #[error("failed to load block {cid}: {reason}")]
    Load { cid: Cid, reason: String },

    #[error("segment not found in {data_type}: {segment} / {remaining}")]
    SegmentNotFound {
        data_type: &'static str,
        segment: String,
        remaining: String,
    },

    #[error("unsupported data type for path navigation: {0}")]
    UnsupportedForPath(&'static str),

    #[error("not found in HAMT")]
    HamtNotFound,

    #[error("malformed shard: {0}")]
    MalformedShard(&'static str),

    #[error("hamt is too deep")]
    HamtTooDeep,

    #[error("unexpected hamt child, {found} != {key}")]
    UnexpectedShardChild { found: String, key: String },

    #[error("unsupported unixfs type: {0}")]
    UnsupportedUnixfsType(&'static str),

    #[error("unknown data type: {0}")]
    UnknownDataType(i32),

    #[error("invalid range (len={len}) {from}:{to} (orig={orig})")]
    InvalidByteRange {
        len: u64,
        from: i64,
        to: i64,
        orig: String,
    },

    #[error("expected file")]
    ExpectedFile,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

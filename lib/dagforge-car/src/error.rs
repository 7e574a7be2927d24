use thiserror::Error;

/// Error type for CAR reading and writing.
#[derive(Debug, Error)]
pub enum CarError {
    #[error("car io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode car header: {0}")]
    HeaderDecode(String),

    #[error("failed to encode car header: {0}")]
    HeaderEncode(String),

    #[error("unsupported car version {0}")]
    UnsupportedVersion(u64),

    #[error("car section too large ({0} bytes)")]
    SectionTooLarge(usize),

    #[error("invalid cid in car section: {0}")]
    Cid(#[from] ipld_core::cid::Error),

    #[error("invalid varint in car framing: {0}")]
    Varint(#[from] unsigned_varint::decode::Error),

    #[error(transparent)]
    Ipld(#[from] dagforge_ipld::errors::IpldError),
}

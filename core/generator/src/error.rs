use thiserror::Error;

/// Error type for descriptor parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DslError {
    #[error("parse error at position {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("parse error at position {pos}: can't name a {kind} with a multiplier")]
    NameOnMultipliedEntity { pos: usize, kind: &'static str },

    #[error("root entity must be strictly singular")]
    RootMultiplierDisallowed,

    #[error("root entity can't be named")]
    NamedRootDisallowed,
}

impl DslError {
    /// Byte offset into the descriptor the error points at, when positional.
    pub fn position(&self) -> Option<usize> {
        match self {
            DslError::Parse { pos, .. } | DslError::NameOnMultipliedEntity { pos, .. } => {
                Some(*pos)
            }
            _ => None,
        }
    }
}

/// Error type for DAG generation.
#[derive(Debug, Error)]
pub enum GenError {
    #[error(transparent)]
    Ipld(#[from] dagforge_ipld::errors::IpldError),

    #[error("error encoding unixfs data: {0}")]
    Proto(#[from] quick_protobuf::Error),

    #[error("invalid distribution: {0}")]
    Distribution(String),

    #[error("unusable shard bitwidth {0}")]
    ShardBitwidth(u32),

    #[error("error reading random source: {0}")]
    Io(#[from] std::io::Error),
}

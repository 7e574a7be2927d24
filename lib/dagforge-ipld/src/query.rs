use std::fmt;
use std::str::FromStr;

use ipld_core::cid::Cid;

use crate::errors::IpldError;
use crate::path::Path;

/// How much of the DAG beyond the terminal block a query materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DagScope {
    #[default]
    All,
    Entity,
    Block,
}

impl FromStr for DagScope {
    type Err = IpldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(DagScope::All),
            "entity" => Ok(DagScope::Entity),
            "block" => Ok(DagScope::Block),
            other => Err(IpldError::InvalidQuery(format!("invalid scope: {other}"))),
        }
    }
}

impl fmt::Display for DagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DagScope::All => "all",
            DagScope::Entity => "entity",
            DagScope::Block => "block",
        })
    }
}

/// Byte range applied to the terminal file of a query path. Bounds are
/// inclusive; `to == None` means the end of the file and negative values are
/// measured from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: i64,
    pub to: Option<i64>,
}

impl Default for ByteRange {
    fn default() -> Self {
        Self { from: 0, to: None }
    }
}

impl ByteRange {
    /// Parses the `from:to` form, where `to` may be `*` for "until the end".
    pub fn parse(s: &str) -> Result<Self, IpldError> {
        let invalid = || IpldError::InvalidQuery(format!("invalid byte range: {s}"));
        let (from, to) = s.split_once(':').ok_or_else(invalid)?;
        let from = from.parse::<i64>().map_err(|_| invalid())?;
        let to = match to {
            "*" => None,
            to => Some(to.parse::<i64>().map_err(|_| invalid())?),
        };
        Ok(Self { from, to })
    }

    pub fn is_default(&self) -> bool {
        self.from == 0 && self.to.is_none()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "{}:{}", self.from, to),
            None => write!(f, "{}:*", self.from),
        }
    }
}

/// A parsed trustless query.
#[derive(Debug, Clone)]
pub struct Query {
    pub root: Cid,
    pub path: Path,
    pub scope: DagScope,
    /// `false` when the query carried `dups=n`.
    pub duplicates: bool,
    pub byte_range: Option<ByteRange>,
}

/// Parses the URL form
/// `/ipfs/<cid>[/<path>][?dag-scope=<s>][&entity-bytes=<r>][&dups=(y|n)]`.
pub fn parse_query(spec: &str) -> Result<Query, IpldError> {
    let mut parts = spec.split('?');
    let url_path = parts.next().unwrap_or_default();
    let query_string = parts.next();
    if parts.next().is_some() {
        return Err(IpldError::InvalidQuery(format!("invalid query: {spec}")));
    }

    let (root, path) = parse_url_path(url_path)?;

    let mut scope = DagScope::All;
    let mut duplicates = true;
    let mut byte_range = None;
    if let Some(qs) = query_string {
        for (key, value) in url::form_urlencoded::parse(qs.as_bytes()) {
            match key.as_ref() {
                "dag-scope" => scope = value.parse()?,
                "dups" => duplicates = value != "n",
                "entity-bytes" if !value.is_empty() => {
                    byte_range = Some(ByteRange::parse(&value)?)
                }
                _ => {}
            }
        }
    }

    Ok(Query {
        root,
        path,
        scope,
        duplicates,
        byte_range,
    })
}

fn parse_url_path(url_path: &str) -> Result<(Cid, Path), IpldError> {
    let mut segments = url_path.split('/');
    if segments.next() != Some("") || segments.next() != Some("ipfs") {
        return Err(IpldError::InvalidQuery(format!(
            "not a /ipfs/<cid> path: {url_path}"
        )));
    }
    let root = segments
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| IpldError::InvalidQuery(format!("missing root cid: {url_path}")))?;
    let root = Cid::try_from(root)?;
    let mut path = Path::default();
    for segment in segments.filter(|s| !s.is_empty()) {
        path = path.append(segment);
    }
    Ok((root, path))
}

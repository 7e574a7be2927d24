use std::fmt;

/// An ordered sequence of path segments.
///
/// The same representation serves the IPLD structural path through DAG-PB
/// fields (`Links/3/Hash`) and the logical UnixFS path built from directory
/// entry names. The root path is empty and displays as an empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses a `/`-separated path, dropping empty segments, so that
    /// `"/a/b"`, `"a/b"` and `"a//b"` are all `["a", "b"]`.
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s
                .split('/')
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns the parent path, or the empty path when already at the root.
    pub fn pop(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// The last segment, or `""` for the root path.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The structural path of link `index`: `<self>/Links/<index>/Hash`.
    pub fn link(&self, index: usize) -> Self {
        self.append("Links").append(index.to_string()).append("Hash")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

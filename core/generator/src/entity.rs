use std::fmt;
use std::io::Read;

use dagforge_ipld::store::LinkStore;
use tracing::debug;

use crate::builder::{self, DirEntry};
use crate::error::GenError;
use crate::humanize;
use crate::random::{rand_norm_int, ZeroReader};

/// A parsed descriptor entity. The variants share naming, multiplicity and
/// generation behavior; the generator dispatches on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    File(File),
    Directory(Directory),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub name: Option<String>,
    pub size: u64,
    pub random_size: bool,
    pub zero_content: bool,
    pub multiplier: u64,
    pub random_multiplier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Plain,
    Sharded { bitwidth: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub kind: DirKind,
    pub name: Option<String>,
    pub multiplier: u64,
    pub random_multiplier: bool,
    pub children: Vec<Entity>,
}

impl Entity {
    pub fn name(&self) -> Option<&str> {
        match self {
            Entity::File(f) => f.name.as_deref(),
            Entity::Directory(d) => d.name.as_deref(),
        }
    }

    pub fn multiplier(&self) -> u64 {
        match self {
            Entity::File(f) => f.multiplier,
            Entity::Directory(d) => d.multiplier,
        }
    }

    pub fn is_random_multiplier(&self) -> bool {
        match self {
            Entity::File(f) => f.random_multiplier,
            Entity::Directory(d) => d.random_multiplier,
        }
    }

    /// A human-readable, indented summary of what this descriptor builds.
    pub fn describe(&self, indent: &str) -> String {
        match self {
            Entity::File(f) => f.describe(indent),
            Entity::Directory(d) => d.describe(indent),
        }
    }

    /// Materializes the described DAG into `store`, drawing payloads, names
    /// and approximate counts/sizes from `reader`.
    pub fn generate(
        &self,
        store: &dyn LinkStore,
        reader: &mut dyn Read,
    ) -> Result<DirEntry, GenError> {
        match self {
            Entity::File(f) => f.generate(store, reader),
            Entity::Directory(d) => d.generate("", store, reader),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::File(file) => fmt::Display::fmt(file, f),
            Entity::Directory(dir) => fmt::Display::fmt(dir, f),
        }
    }
}

impl File {
    fn describe(&self, indent: &str) -> String {
        let mut out = String::new();
        if !indent.is_empty() {
            out.push_str(indent);
            out.push_str("→ ");
        }
        if self.random_multiplier {
            out.push_str(&format!("Approximately {}", self.multiplier));
        } else if self.multiplier > 1 {
            out.push_str(&self.multiplier.to_string());
        } else {
            out.push('A');
        }
        out.push_str(" file");
        if self.multiplier > 1 {
            out.push('s');
        }
        if let Some(name) = &self.name {
            out.push_str(&format!(" named \"{name}\""));
        }
        out.push_str(" of ");
        if self.random_size {
            out.push_str("approximately ");
        }
        out.push_str(&display_size(self.size));
        if self.zero_content {
            out.push_str(" containing just zeros");
        }
        out
    }

    /// Generate _one_ of the files described by this descriptor. If there
    /// are multiple, call this once per copy.
    pub fn generate(
        &self,
        store: &dyn LinkStore,
        reader: &mut dyn Read,
    ) -> Result<DirEntry, GenError> {
        let mut target = self.size as i64;
        // A constant stream cannot drive distribution sampling, so an
        // approximate size on a zero-content file resolves to its mean.
        if self.random_size && !self.zero_content {
            loop {
                target = rand_norm_int(reader, target)?;
                if target > 0 {
                    break;
                }
            }
        }
        debug!(size = target, zero = self.zero_content, "generating file");
        if self.zero_content {
            builder::build_file(store, target as u64, &mut ZeroReader)
        } else {
            builder::build_file(store, target as u64, reader)
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.random_multiplier {
            write!(f, "~")?;
        }
        if self.random_multiplier || self.multiplier > 1 {
            write!(f, "{}*", self.multiplier)?;
        }
        write!(f, "file:")?;
        if self.random_size {
            write!(f, "~")?;
        }
        write!(f, "{}", size_literal(self.size))?;
        let mut options = Vec::new();
        if self.zero_content {
            options.push("zero".to_string());
        }
        if let Some(name) = &self.name {
            options.push(format!("name:\"{name}\""));
        }
        if !options.is_empty() {
            write!(f, "{{{}}}", options.join(","))?;
        }
        Ok(())
    }
}

impl Directory {
    fn describe(&self, indent: &str) -> String {
        let mut out = String::new();
        if !indent.is_empty() {
            out.push_str(indent);
            out.push_str("→ ");
        }
        if self.random_multiplier {
            out.push_str(&format!("Approximately {}", self.multiplier));
        } else if self.multiplier > 1 {
            out.push_str(&self.multiplier.to_string());
        } else {
            out.push('A');
        }
        if self.multiplier > 1 {
            out.push_str(" directories");
        } else {
            out.push_str(" directory");
        }
        if let Some(name) = &self.name {
            out.push_str(&format!(" named \"{name}\""));
        }
        if let DirKind::Sharded { bitwidth } = self.kind {
            out.push_str(&format!(" sharded with bitwidth {bitwidth}"));
        }
        out.push_str(" containing:");
        for child in &self.children {
            out.push('\n');
            out.push_str(&child.describe(&format!("{indent}  ")));
        }
        out
    }

    fn generate(
        &self,
        parent_name: &str,
        store: &dyn LinkStore,
        reader: &mut dyn Read,
    ) -> Result<DirEntry, GenError> {
        let bitwidth = match self.kind {
            DirKind::Sharded { bitwidth } => Some(bitwidth),
            DirKind::Plain => None,
        };

        let mut expanded: Vec<&Entity> = Vec::new();
        for child in &self.children {
            let mut multiplier = child.multiplier() as i64;
            if child.is_random_multiplier() {
                loop {
                    multiplier = rand_norm_int(reader, multiplier)?;
                    if multiplier >= 0 {
                        // could be zero!
                        break;
                    }
                }
            }
            for _ in 0..multiplier {
                expanded.push(child);
            }
        }
        debug!(
            dir = parent_name,
            children = expanded.len(),
            sharded = bitwidth.is_some(),
            "generating directory"
        );

        let mut index = 0;
        builder::build_directory(
            store,
            bitwidth,
            parent_name,
            reader,
            &mut |proposed, store, reader| {
                if index >= expanded.len() {
                    return Ok(None);
                }
                let child = expanded[index];
                index += 1;
                let name = match child.name() {
                    // an explicit name overrides the proposed one
                    Some(name) => replace_last_component(proposed, name),
                    None => proposed.to_string(),
                };
                let mut entry = match child {
                    Entity::File(f) => f.generate(store, reader)?,
                    Entity::Directory(d) => d.generate(&name, store, reader)?,
                };
                entry.path = name;
                Ok(Some(entry))
            },
        )
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.random_multiplier {
            write!(f, "~")?;
        }
        if self.random_multiplier || self.multiplier > 1 {
            write!(f, "{}*", self.multiplier)?;
        }
        write!(f, "dir")?;
        let mut options = Vec::new();
        if let DirKind::Sharded { bitwidth } = self.kind {
            options.push(format!("sharded:{bitwidth}"));
        }
        if let Some(name) = &self.name {
            options.push(format!("name:\"{name}\""));
        }
        if !options.is_empty() {
            write!(f, "{{{}}}", options.join(","))?;
        }
        write!(f, "(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            fmt::Display::fmt(child, f)?;
        }
        write!(f, ")")
    }
}

fn replace_last_component(proposed: &str, name: &str) -> String {
    match proposed.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{name}"),
        None => name.to_string(),
    }
}

/// Binary units for sizes that divide evenly into them, decimal otherwise.
fn display_size(size: u64) -> String {
    if size % 1024 == 0 {
        humanize::format_ibytes(size)
    } else {
        humanize::format_bytes(size)
    }
}

/// The size as descriptor text: the humanized form when it re-parses to the
/// same byte count, the exact integer otherwise.
fn size_literal(size: u64) -> String {
    let formatted = display_size(size).replace(' ', "");
    match humanize::parse_bytes(&formatted) {
        Ok(parsed) if parsed == size => formatted,
        _ => size.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_literal_is_exact() {
        assert_eq!(size_literal(1024), "1.0KiB");
        assert_eq!(size_literal(1000), "1.0kB");
        assert_eq!(size_literal(101), "101B");
        // 1234 humanizes to "1.2 kB" which re-parses to 1200; fall back.
        assert_eq!(size_literal(1234), "1234");
    }

    #[test]
    fn replace_last_component_handles_roots() {
        assert_eq!(replace_last_component("a/b/random", "named"), "a/b/named");
        assert_eq!(replace_last_component("random", "named"), "named");
    }
}

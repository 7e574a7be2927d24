//! Parser for the descriptor language:
//!
//! ```text
//! entity   := [ "~" ] [ int "*" ] ( file | dir )
//! file     := "file:" [ "~" ] size [ "{" fileOpts "}" ]
//! dir      := "dir" [ "{" dirOpts "}" ] "(" entity { "," entity } ")"
//! fileOpts := opt { "," opt }        ; opt in { zero, name:"..." }
//! dirOpts  := opt { "," opt }        ; opt in { sharded[:int], name:"..." }
//! size     := human readable bytes   ; 1KiB, 1.0MB, 101
//! ```
//!
//! A directory that contains ~5 files of alternating sizes, 2 directories
//! each holding ~10 files of the same size, and 1 large all-zeros file:
//!
//! ```text
//! dir(~5*file:1KB,~5*file:100KB,2*dir(~10*file:50KB),file:1GB{zero})
//! ```

use crate::entity::{DirKind, Directory, Entity, File};
use crate::error::DslError;
use crate::humanize;

/// Parses a descriptor into its AST, enforcing that the root entity is
/// singular, non-random and unnamed.
pub fn parse(input: &str) -> Result<Entity, DslError> {
    let mut p = Parser { input, pos: 0 };
    let entity = p.parse_entity()?;
    if !p.input[p.pos..].trim().is_empty() {
        return Err(p.error("unexpected trailing characters"));
    }
    if entity.multiplier() != 1 || entity.is_random_multiplier() {
        return Err(DslError::RootMultiplierDisallowed);
    }
    if entity.name().is_some() {
        return Err(DslError::NamedRootDisallowed);
    }
    Ok(entity)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: impl Into<String>) -> DslError {
        DslError::Parse {
            pos: self.pos,
            msg: msg.into(),
        }
    }

    fn has_more(&self) -> bool {
        self.pos < self.input.len()
    }

    /// Whether the next byte is `ch`, erroring at end of input.
    fn next_char(&self, ch: u8) -> Result<bool, DslError> {
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        Ok(self.input.as_bytes()[self.pos] == ch)
    }

    fn parse_entity(&mut self) -> Result<Entity, DslError> {
        let random = self.slurp_random()?;
        let multiplier = self.slurp_multiplier()?;
        match self.slurp_type()? {
            EntityType::File => self.parse_file(multiplier, random),
            EntityType::Dir => self.parse_dir(multiplier, random),
        }
    }

    fn parse_file(&mut self, multiplier: u64, random: bool) -> Result<Entity, DslError> {
        // must be followed by a human readable size
        let (size, random_size) = self.slurp_size()?;
        let (name, zero) = self.slurp_file_options()?;
        if name.is_some() && (multiplier > 1 || random) {
            return Err(DslError::NameOnMultipliedEntity {
                pos: self.pos,
                kind: "file",
            });
        }
        Ok(Entity::File(File {
            name,
            multiplier,
            random_multiplier: random,
            size,
            random_size,
            zero_content: zero,
        }))
    }

    fn parse_dir(&mut self, multiplier: u64, random: bool) -> Result<Entity, DslError> {
        let (name, shard_bitwidth) = self.slurp_dir_options()?;
        if name.is_some() && (multiplier > 1 || random) {
            return Err(DslError::NameOnMultipliedEntity {
                pos: self.pos,
                kind: "directory",
            });
        }
        self.slurp_open()?;
        let kind = match shard_bitwidth {
            Some(bitwidth) => DirKind::Sharded { bitwidth },
            None => DirKind::Plain,
        };
        let mut children = Vec::new();
        loop {
            children.push(self.parse_entity()?);
            if !self.slurp_comma()? {
                break;
            }
        }
        self.slurp_close()?;
        Ok(Entity::Directory(Directory {
            kind,
            name,
            multiplier,
            random_multiplier: random,
            children,
        }))
    }

    /// An optional `{}` block which may contain `zero` and `name:"foo"`,
    /// comma separated.
    fn slurp_file_options(&mut self) -> Result<(Option<String>, bool), DslError> {
        if !self.has_more() || !self.next_char(b'{')? {
            return Ok((None, false));
        }
        self.pos += 1;
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        let mut name = None;
        let mut zero = false;
        let mut options = 0;
        while self.has_more() {
            if self.next_char(b'}')? {
                self.pos += 1;
                break;
            }
            if options > 0 {
                if !self.next_char(b',')? {
                    return Err(self.error("expected ','"));
                }
                self.pos += 1;
            }
            if self.input[self.pos..].starts_with("zero") {
                self.pos += 4;
                zero = true;
                options += 1;
                continue;
            }
            if self.input[self.pos..].starts_with("name") {
                self.pos += 4;
                if !self.next_char(b':')? {
                    return Err(self.error("expected ':'"));
                }
                self.pos += 1;
                name = Some(self.slurp_quoted_string()?);
                options += 1;
                continue;
            }
            return Err(self.error("expected 'zero' or 'name'"));
        }
        Ok((name, zero))
    }

    /// An optional `{}` block which may contain `name:"foo"`, `sharded:N` or
    /// bare `sharded` (bitwidth 4), comma separated.
    fn slurp_dir_options(&mut self) -> Result<(Option<String>, Option<u32>), DslError> {
        if !self.has_more() || !self.next_char(b'{')? {
            return Ok((None, None));
        }
        self.pos += 1;
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        let mut name = None;
        let mut shard_bitwidth = None;
        let mut options = 0;
        while self.has_more() {
            if self.next_char(b'}')? {
                self.pos += 1;
                break;
            }
            if options > 0 {
                if !self.next_char(b',')? {
                    return Err(self.error("expected ','"));
                }
                self.pos += 1;
            }
            if self.input[self.pos..].starts_with("sharded") {
                self.pos += 7;
                shard_bitwidth = Some(4);
                if self.next_char(b':')? {
                    // optional bitwidth specified
                    self.pos += 1;
                    match self.slurp_integer()? {
                        Some(0) => return Err(self.error("expected integer > 0")),
                        Some(bitwidth) => shard_bitwidth = Some(bitwidth as u32),
                        None => return Err(self.error("expected integer")),
                    }
                }
                options += 1;
                continue;
            }
            if self.input[self.pos..].starts_with("name") {
                self.pos += 4;
                if !self.next_char(b':')? {
                    return Err(self.error("expected ':'"));
                }
                self.pos += 1;
                name = Some(self.slurp_quoted_string()?);
                options += 1;
                continue;
            }
            return Err(self.error("expected 'sharded' or 'name'"));
        }
        Ok((name, shard_bitwidth))
    }

    /// A quoted string, which is always required where it is looked for.
    fn slurp_quoted_string(&mut self) -> Result<String, DslError> {
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        if !self.next_char(b'"')? {
            return Err(self.error("expected '\"'"));
        }
        self.pos += 1;
        let end = self.input[self.pos..]
            .find('"')
            .map(|i| self.pos + i)
            .unwrap_or(self.input.len());
        if end == self.pos {
            return Err(self.error("expected name"));
        }
        let name = self.input[self.pos..end].to_string();
        self.pos = end;
        if !self.next_char(b'"')? {
            return Err(self.error("expected '\"'"));
        }
        self.pos += 1;
        Ok(name)
    }

    /// An integer, if one is next; `None` otherwise.
    fn slurp_integer(&mut self) -> Result<Option<u64>, DslError> {
        let end = self.input[self.pos..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count()
            + self.pos;
        if end == self.pos {
            return Ok(None);
        }
        let value = self.input[self.pos..end]
            .parse::<u64>()
            .map_err(|_| self.error("expected integer"))?;
        self.pos = end;
        Ok(Some(value))
    }

    /// A ':' followed by a human readable byte size, with an optional '~'
    /// marking the size as approximate.
    fn slurp_size(&mut self) -> Result<(u64, bool), DslError> {
        if !self.next_char(b':')? {
            return Err(self.error("expected ':'"));
        }
        self.pos += 1;
        let random = self.slurp_random()?;
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        // the number portion
        let mut end = self.pos
            + self.input[self.pos..]
                .bytes()
                .take_while(|b| b.is_ascii_digit() || *b == b'.')
                .count();
        if end == self.pos {
            return Err(self.error("expected size"));
        }
        // skip over spaces
        end += self.input[end..]
            .bytes()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        // the units portion after the number
        end += self.input[end..]
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        let size = humanize::parse_bytes(&self.input[self.pos..end])
            .map_err(|e| self.error(format!("expected human readable size: {e}")))?;
        self.pos = end;
        Ok((size, random))
    }

    /// A ',', which is optional and indicates further list items.
    fn slurp_comma(&mut self) -> Result<bool, DslError> {
        if self.next_char(b',')? {
            self.pos += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// A '(', which is strictly required.
    fn slurp_open(&mut self) -> Result<(), DslError> {
        if !self.next_char(b'(')? {
            return Err(self.error("expected '('"));
        }
        self.pos += 1;
        Ok(())
    }

    /// A ')', which is strictly required.
    fn slurp_close(&mut self) -> Result<(), DslError> {
        if !self.next_char(b')')? {
            return Err(self.error("expected ')'"));
        }
        self.pos += 1;
        Ok(())
    }

    /// A '~', which is always optional.
    fn slurp_random(&mut self) -> Result<bool, DslError> {
        if self.next_char(b'~')? {
            self.pos += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// An optional integer multiplier, which must be followed by '*'.
    fn slurp_multiplier(&mut self) -> Result<u64, DslError> {
        let Some(multiplier) = self.slurp_integer()? else {
            return Ok(1);
        };
        if !self.next_char(b'*')? {
            return Err(self.error("expected '*'"));
        }
        self.pos += 1;
        Ok(multiplier)
    }

    /// The strings "file" or "dir", which one of is strictly required next.
    fn slurp_type(&mut self) -> Result<EntityType, DslError> {
        if !self.has_more() {
            return Err(self.error("unexpected end"));
        }
        if self.input[self.pos..].starts_with("file") {
            self.pos += 4;
            return Ok(EntityType::File);
        }
        if self.input[self.pos..].starts_with("dir") {
            self.pos += 3;
            return Ok(EntityType::Dir);
        }
        Err(self.error("expected 'file' or 'dir'"))
    }
}

enum EntityType {
    File,
    Dir,
}

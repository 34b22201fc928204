//! store::object
//!
//! Encoding of tree and commit objects.
//!
//! Both formats are git's, so ids computed here agree with any git object
//! database:
//!
//! - tree: a sequence of `<octal mode> <name>\0<raw id>` records in
//!   canonical order (byte-wise over names, where trees compare as if their
//!   name ended in `/`)
//! - commit: `tree`, `parent`*, `author`, `committer` headers, an optional
//!   `encoding` header, a blank line, then the message
//!
//! Encoding a tree sorts its entries, so the same entry set always yields
//! the same bytes regardless of insertion order.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, TimeZone};

use super::StoreError;
use crate::core::types::Oid;

/// Mode of a tree entry.
///
/// Dataset trees only hold directories and regular files. The other git
/// modes are read so that entries added by plain git pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    Tree,
    Regular,
    Executable,
    Symlink,
    /// A submodule commit.
    Gitlink,
}

impl FileMode {
    /// Mode as written in tree objects (`40000`, `100644`, ...).
    pub fn as_octal(&self) -> &'static str {
        match self {
            FileMode::Tree => "40000",
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, FileMode::Tree)
    }

    fn parse(mode: &str) -> Option<Self> {
        match mode {
            "40000" | "040000" => Some(FileMode::Tree),
            "100644" | "100664" => Some(FileMode::Regular),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "160000" => Some(FileMode::Gitlink),
            _ => None,
        }
    }
}

/// One named entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub oid: Oid,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, oid: Oid) -> Self {
        Self {
            name: name.into(),
            mode,
            oid,
        }
    }
}

/// Canonical ordering of tree entry names.
///
/// # Example
///
/// ```
/// use datagit::store::object::canonical_cmp;
/// use std::cmp::Ordering;
///
/// // "a.json" sorts before the tree "a" because '.' < '/'
/// assert_eq!(canonical_cmp("a.json", false, "a", true), Ordering::Less);
/// // ...but after the blob "a"
/// assert_eq!(canonical_cmp("a.json", false, "a", false), Ordering::Greater);
/// ```
pub fn canonical_cmp(a: &str, a_is_tree: bool, b: &str, b_is_tree: bool) -> Ordering {
    let a_key = a.bytes().chain(a_is_tree.then_some(b'/'));
    let b_key = b.bytes().chain(b_is_tree.then_some(b'/'));
    a_key.cmp(b_key)
}

/// Encode entries into a tree object body, sorted canonically.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] if two entries share a name or a name is
/// not a valid single path segment.
pub fn encode_tree(mut entries: Vec<TreeEntry>) -> Result<Vec<u8>, StoreError> {
    entries.sort_by(|a, b| canonical_cmp(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree()));

    let mut out = Vec::new();
    let mut previous: Option<&str> = None;
    for entry in &entries {
        if entry.name.is_empty() || entry.name.contains(['/', '\0']) {
            return Err(StoreError::Corrupt {
                oid: String::new(),
                message: format!("invalid tree entry name '{}'", entry.name),
            });
        }
        if previous == Some(entry.name.as_str()) {
            return Err(StoreError::Corrupt {
                oid: String::new(),
                message: format!("duplicate tree entry '{}'", entry.name),
            });
        }
        previous = Some(&entry.name);

        out.extend_from_slice(entry.mode.as_octal().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.name.as_bytes());
        out.push(0);
        out.extend_from_slice(&entry.oid.to_bytes());
    }
    Ok(out)
}

/// Decode a tree object body whose ids are `id_len` bytes long.
pub fn decode_tree(oid: &Oid, data: &[u8], id_len: usize) -> Result<Vec<TreeEntry>, StoreError> {
    let corrupt = |message: &str| StoreError::Corrupt {
        oid: oid.to_string(),
        message: message.to_string(),
    };

    let mut entries = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| corrupt("missing mode separator"))?;
        let mode = std::str::from_utf8(&rest[..space]).map_err(|_| corrupt("mode is not ascii"))?;
        let mode = FileMode::parse(mode)
            .ok_or_else(|| corrupt(&format!("unsupported entry mode {mode}")))?;
        rest = &rest[space + 1..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt("missing name terminator"))?;
        let name = std::str::from_utf8(&rest[..nul])
            .map_err(|_| corrupt("entry name is not utf-8"))?
            .to_string();
        rest = &rest[nul + 1..];

        if rest.len() < id_len {
            return Err(corrupt("truncated entry id"));
        }
        let entry_oid = Oid::from_bytes(&rest[..id_len]).map_err(|e| corrupt(&e.to_string()))?;
        rest = &rest[id_len..];

        entries.push(TreeEntry::new(name, mode, entry_oid));
    }
    Ok(entries)
}

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        when: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Identity stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, chrono::Local::now().fixed_offset())
    }

    /// `name <email> <seconds> <+hhmm>`
    fn encode(&self) -> String {
        let offset = self.when.offset().local_minus_utc() / 60;
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.abs();
        format!(
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.when.timestamp(),
            sign,
            offset / 60,
            offset % 60
        )
    }

    fn decode(line: &str) -> Option<Self> {
        let open = line.find('<')?;
        let close = line.rfind('>')?;
        if close < open {
            return None;
        }
        let name = line[..open].trim_end().to_string();
        let email = line[open + 1..close].to_string();

        let mut parts = line[close + 1..].split_whitespace();
        let seconds: i64 = parts.next()?.parse().ok()?;
        let tz = parts.next()?;
        let sign = tz.get(..1)?;
        let digits = tz.get(1..)?;
        let hours: i32 = digits.get(..2)?.parse().ok()?;
        let minutes: i32 = digits.get(2..4)?.parse().ok()?;
        let mut offset = (hours * 60 + minutes) * 60;
        if sign == "-" {
            offset = -offset;
        }
        let zone = FixedOffset::east_opt(offset)?;
        let when = zone.timestamp_opt(seconds, 0).single()?;
        Some(Self { name, email, when })
    }
}

/// The content of a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub tree: Oid,
    /// Parent ids; order is significant.
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    /// Message encoding; `None` means UTF-8.
    pub encoding: Option<String>,
    pub message: String,
}

impl CommitRecord {
    pub fn new(
        tree: Oid,
        parents: Vec<Oid>,
        identity: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author: identity.clone(),
            committer: identity,
            encoding: None,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", self.author.encode()));
        out.push_str(&format!("committer {}\n", self.committer.encode()));
        if let Some(encoding) = &self.encoding {
            if !encoding.eq_ignore_ascii_case("utf-8") {
                out.push_str(&format!("encoding {encoding}\n"));
            }
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    /// Decode a commit object body. Unknown headers (e.g. signatures) are ignored.
    pub fn decode(oid: &Oid, data: &[u8]) -> Result<Self, StoreError> {
        let corrupt = |message: &str| StoreError::Corrupt {
            oid: oid.to_string(),
            message: message.to_string(),
        };
        let text = std::str::from_utf8(data).map_err(|_| corrupt("commit is not utf-8"))?;
        let (headers, message) = text
            .split_once("\n\n")
            .unwrap_or((text.trim_end_matches('\n'), ""));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut encoding = None;
        for line in headers.lines() {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "tree" => tree = Some(Oid::new(value).map_err(|e| corrupt(&e.to_string()))?),
                "parent" => parents.push(Oid::new(value).map_err(|e| corrupt(&e.to_string()))?),
                "author" => author = Signature::decode(value),
                "committer" => committer = Signature::decode(value),
                "encoding" => encoding = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| corrupt("missing tree header"))?,
            parents,
            author: author.ok_or_else(|| corrupt("missing or malformed author"))?,
            committer: committer.ok_or_else(|| corrupt("missing or malformed committer"))?,
            encoding,
            message: message.to_string(),
        })
    }
}

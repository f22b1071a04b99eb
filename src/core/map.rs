//! VirtualMap type for per-process memory mapping records.
//!
//! A `VirtualMap` is one parsed line of a `/proc/<pid>/maps`-style listing:
//! an immutable half-open address range plus its permission flags and
//! backing object. Maps carry no identity beyond their field values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Backing object of a mapped region.
///
/// The three variants make the resolver's path rules structural: heap
/// lookup matches `Pseudo("[heap]")`, the memory-span computation excludes
/// every `Pseudo` map, and bss detection requires `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapPath {
    /// File-backed mapping with a filesystem path.
    File(PathBuf),
    /// Kernel-synthesized pseudo mapping such as `[heap]`, `[stack]`,
    /// `[vdso]`, stored verbatim including the brackets. Unrecognized
    /// bracket forms land here too.
    Pseudo(String),
    /// Anonymous mapping backed by no named object.
    Anonymous,
}

impl MapPath {
    /// Classify the raw trailing text of a maps line. Empty text is an
    /// anonymous mapping; any `[...]` form is a pseudo mapping.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            MapPath::Anonymous
        } else if raw.starts_with('[') && raw.ends_with(']') {
            MapPath::Pseudo(raw.to_string())
        } else {
            MapPath::File(PathBuf::from(raw))
        }
    }

    /// The filesystem path, if this is a file-backed mapping.
    pub fn as_file(&self) -> Option<&Path> {
        match self {
            MapPath::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, MapPath::Pseudo(_))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, MapPath::Anonymous)
    }
}

impl fmt::Display for MapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapPath::File(path) => write!(f, "{}", path.display()),
            MapPath::Pseudo(name) => write!(f, "{}", name),
            MapPath::Anonymous => Ok(()),
        }
    }
}

/// One mapped virtual-memory range of a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualMap {
    /// Start address (inclusive)
    pub start: u64,
    /// End address (exclusive)
    pub end: u64,
    /// File offset into the backing object
    pub offset: u64,
    /// Device identifier as published by the listing, verbatim. The two
    /// hex groups are variable width, so this stays a string.
    pub device: String,
    /// 4-character permission string, e.g. `r-xp`. Tested by membership,
    /// not position.
    pub flags: String,
    /// Inode of the backing object (0 for anonymous/pseudo maps)
    pub inode: u64,
    /// Backing object of the mapping
    pub path: MapPath,
}

impl VirtualMap {
    /// Size of the mapped range in bytes.
    pub fn filesize(&self) -> u64 {
        self.end - self.start
    }

    /// Whether `addr` falls inside the half-open range `[start, end)`.
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains('r')
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains('w')
    }

    pub fn is_executable(&self) -> bool {
        self.flags.contains('x')
    }

    pub fn is_private(&self) -> bool {
        self.flags.contains('p')
    }
}

impl fmt::Display for VirtualMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}-{:x} {} {:08x} {} {}",
            self.start, self.end, self.flags, self.offset, self.device, self.inode
        )?;
        if !self.path.is_anonymous() {
            write!(f, " {}", self.path)?;
        }
        Ok(())
    }
}

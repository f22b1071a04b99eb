//! Acquisition and resolution of per-process memory mappings.
//!
//! This module owns the two halves of the pipeline: reading a process's
//! maps listing into an ordered sequence of [`VirtualMap`] values, and
//! resolving that sequence into the small set of maps the inspection
//! layers care about (interpreter image, libpython, bss, heap, overall
//! span).
//!
//! Listing order is semantic everywhere in the resolver: every rule is
//! "first match wins" over the published order, so no stage may sort or
//! otherwise reorder the sequence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::core::map::{MapPath, VirtualMap};
use crate::core::memory_range::MemoryRange;
use crate::error::{PymapsError, Result};

/// One maps-listing record. Addresses, offset and the device groups are
/// variable-width hex; the trailing path, when present, is taken verbatim.
static MAP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<start>[0-9a-fA-F]+)-(?P<end>[0-9a-fA-F]+)\s+(?P<flags>[rwxps\-]{4})\s+(?P<offset>[0-9a-fA-F]+)\s+(?P<device>[0-9a-fA-F]+:[0-9a-fA-F]+)\s+(?P<inode>\d+)(?:\s+(?P<path>\S.*))?$",
    )
    .expect("valid maps line regex")
});

/// Runtime-library naming convention: `libpython`, optional version,
/// optional ABI letters, a shared-object marker, optional trailing
/// version components (e.g. `libpython3.9d.so.1.0`).
static LIBPYTHON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^libpython(\d+(\.\d+)?)?[a-z]*\.so(\.\d+)*$").expect("valid libpython regex")
});

/// Parse one listing line. Returns `None` for anything that does not match
/// the record grammar; malformed lines are never an error.
fn parse_map_line(line: &str) -> Option<VirtualMap> {
    let caps = MAP_LINE.captures(line.trim())?;
    let start = u64::from_str_radix(&caps["start"], 16).ok()?;
    let end = u64::from_str_radix(&caps["end"], 16).ok()?;
    let offset = u64::from_str_radix(&caps["offset"], 16).ok()?;
    let inode = caps["inode"].parse().ok()?;
    let path = MapPath::from_raw(caps.name("path").map_or("", |m| m.as_str()));
    Some(VirtualMap {
        start,
        end,
        offset,
        device: caps["device"].to_string(),
        flags: caps["flags"].to_string(),
        inode,
        path,
    })
}

/// Forward-only iterator over the maps published by a listing.
///
/// The iterator is single-pass and non-restartable: re-reading requires a
/// fresh listing, and two reads of a live process are independent
/// snapshots that need not be consistent with each other. Lines that do
/// not match the record grammar are skipped silently; a mid-stream read
/// error ends the sequence after a warning, leaving the maps already
/// produced valid.
#[derive(Debug)]
pub struct VirtualMapIter<R> {
    reader: R,
    buffer: String,
}

impl<R: BufRead> VirtualMapIter<R> {
    /// Wrap a buffered reader over maps-listing text.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(0x100),
        }
    }
}

impl<R: BufRead> Iterator for VirtualMapIter<R> {
    type Item = VirtualMap;

    fn next(&mut self) -> Option<VirtualMap> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "Stopping maps read after I/O error");
                    return None;
                }
            }
            match parse_map_line(&self.buffer) {
                Some(map) => return Some(map),
                None => trace!(line = %self.buffer.trim_end(), "Skipping unrecognized maps line"),
            }
        }
    }
}

/// Open the maps listing of the process identified by `pid` and return a
/// lazy iterator over its records.
///
/// The underlying file handle is owned by the iterator and closed when it
/// is dropped, whether or not the sequence was exhausted. Fails with
/// [`PymapsError::ProcessNotFound`] when the listing cannot be opened
/// (process exited, or not inspectable by this user).
pub fn generate_maps_for_process(pid: u32) -> Result<VirtualMapIter<BufReader<File>>> {
    let file =
        File::open(format!("/proc/{pid}/maps")).map_err(|_| PymapsError::ProcessNotFound(pid))?;
    Ok(VirtualMapIter::new(BufReader::new(file)))
}

/// Eager variant of [`generate_maps_for_process`] that materializes the
/// entire listing into a vector before returning.
pub fn collect_maps_for_process(pid: u32) -> Result<Vec<VirtualMap>> {
    Ok(generate_maps_for_process(pid)?.collect())
}

/// The maps an inspection step needs, resolved from one listing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMapInfo {
    /// Map of the interpreter executable itself
    pub python: VirtualMap,
    /// Map of the dynamically linked libpython, when the interpreter is
    /// not statically built
    pub libpython: Option<VirtualMap>,
    /// Anonymous readable map holding the zero-initialized data of the
    /// interpreter binary or of libpython
    pub bss: Option<VirtualMap>,
    /// The `[heap]` pseudo map, when present
    pub heap: Option<VirtualMap>,
    /// Span over every non-pseudo map. `{0, 0}` in the degenerate case
    /// where no non-pseudo map exists.
    pub memory: MemoryRange,
}

fn missing_executable_error(binary: &Path, maps: &[VirtualMap]) -> PymapsError {
    let candidates: Vec<String> = maps
        .iter()
        .filter(|map| {
            !map.path.is_anonymous() && map.is_readable() && map.is_executable()
        })
        .map(|map| map.path.to_string())
        .collect();
    let message = if candidates.is_empty() {
        "There are no available executable maps".to_string()
    } else {
        format!(
            "No map found for executable {}. Available executable maps: {}",
            binary.display(),
            candidates.join(", ")
        )
    };
    PymapsError::MissingExecutableMaps(message)
}

/// Resolve the interpreter-relevant maps out of one listing snapshot.
///
/// Pure and deterministic: the same `binary` and `maps` always produce the
/// same result or the same failure. Listing order decides every rule, so
/// callers must pass the sequence as published.
///
/// Known surprising case, preserved on purpose: the interpreter map is the
/// *first* map whose path equals `binary`, with permission flags ignored.
/// If the text segment was already unmapped by the time the listing was
/// taken, a non-executable segment of the same file is accepted.
///
/// The bss scan runs from the anchor (libpython when resolved, the
/// interpreter map otherwise) to the end of the sequence; in unusual
/// layouts an unrelated anonymous readable map far downstream can be
/// picked up. The scan is deliberately not bounded.
pub fn parse_maps_file_for_binary(binary: &Path, maps: &[VirtualMap]) -> Result<BinaryMapInfo> {
    // Step 1: exact-path match for the interpreter executable.
    let python_index = maps
        .iter()
        .position(|map| map.path.as_file() == Some(binary))
        .ok_or_else(|| missing_executable_error(binary, maps))?;
    let python = maps[python_index].clone();

    // Step 2: distinct libpython paths, in scan order.
    let mut library_paths: Vec<&PathBuf> = Vec::new();
    for map in maps {
        if let MapPath::File(path) = &map.path {
            let matches_convention = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| LIBPYTHON.is_match(name));
            if matches_convention && !library_paths.contains(&path) {
                library_paths.push(path);
            }
        }
    }
    let libpython_index = match library_paths.as_slice() {
        [] => None,
        [only] => maps
            .iter()
            .position(|map| map.path.as_file() == Some(only.as_path())),
        many => {
            let listing: Vec<String> =
                many.iter().map(|path| path.display().to_string()).collect();
            return Err(PymapsError::AmbiguousLibraryMaps(listing.join(", ")));
        }
    };
    let libpython = libpython_index.map(|index| maps[index].clone());

    // Step 3: first anonymous readable map after the anchor.
    let anchor_index = libpython_index.unwrap_or(python_index);
    let bss = maps[anchor_index + 1..]
        .iter()
        .find(|map| map.path.is_anonymous() && map.is_readable())
        .cloned();

    // Step 4: the [heap] pseudo map.
    let heap = maps
        .iter()
        .find(|map| matches!(&map.path, MapPath::Pseudo(name) if name == "[heap]"))
        .cloned();

    // Step 5: span over everything that is not kernel-synthesized.
    let mut min_addr = u64::MAX;
    let mut max_addr = 0;
    for map in maps.iter().filter(|map| !map.path.is_pseudo()) {
        min_addr = min_addr.min(map.start);
        max_addr = max_addr.max(map.end);
    }
    let memory = if min_addr > max_addr {
        MemoryRange::new(0, 0)
    } else {
        MemoryRange::new(min_addr, max_addr)
    };

    debug!(
        %memory,
        has_libpython = libpython.is_some(),
        has_bss = bss.is_some(),
        has_heap = heap.is_some(),
        "Resolved binary maps"
    );

    Ok(BinaryMapInfo {
        python,
        libpython,
        bss,
        heap,
        memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_simple_line() {
        let map = parse_map_line(
            "7f1ac1e2b000-7f1ac1e50000 r--p 00000000 08:12 8398159   /usr/lib/libc-2.31.so",
        )
        .unwrap();
        assert_eq!(map.start, 0x7f1ac1e2b000);
        assert_eq!(map.end, 0x7f1ac1e50000);
        assert_eq!(map.offset, 0);
        assert_eq!(map.device, "08:12");
        assert_eq!(map.flags, "r--p");
        assert_eq!(map.inode, 8398159);
        assert_eq!(
            map.path,
            MapPath::File(PathBuf::from("/usr/lib/libc-2.31.so"))
        );
        assert_eq!(map.filesize(), 151552);
    }

    #[test]
    fn test_parse_long_device_numbers() {
        let map = parse_map_line(
            "7f1ac1e2b000-7f1ac1e50000 r--p 00000000 0123:4567 8398159 /usr/lib/libc-2.31.so",
        )
        .unwrap();
        assert_eq!(map.device, "0123:4567");
    }

    #[test]
    fn test_parse_line_without_path_is_anonymous() {
        let map =
            parse_map_line("7f1ac1e2b000-7f1ac1e50000 r--p 00000000 08:12 8398159").unwrap();
        assert_eq!(map.path, MapPath::Anonymous);
    }

    #[test]
    fn test_parse_pseudo_path() {
        let map = parse_map_line(
            "555f1ab1c000-555f1ab3d000 rw-p 00000000 00:00 0          [heap]",
        )
        .unwrap();
        assert_eq!(map.path, MapPath::Pseudo("[heap]".to_string()));
    }

    #[test]
    fn test_parse_full_width_addresses() {
        let map = parse_map_line(
            "ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0 [vsyscall]",
        )
        .unwrap();
        assert_eq!(map.start, 0xffffffffff600000);
        assert_eq!(map.end, 0xffffffffff601000);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_map_line("I am an unexpected line").is_none());
        assert!(parse_map_line("").is_none());
        assert!(parse_map_line("7f1a-7f1b").is_none());
        // truncated after flags
        assert!(parse_map_line("7f1a-7f1b r--p").is_none());
        // flags field of the wrong width
        assert!(parse_map_line("7f1a-7f1b r--pp 0 08:12 0").is_none());
    }

    #[test]
    fn test_iterator_skips_garbage_and_keeps_order() {
        let text = "\nheader noise\n\
                    1000-2000 r--p 00000000 08:12 1 /bin/a\n\
                    more noise\n\
                    3000-4000 rw-p 00000000 08:12 2 /bin/b\n";
        let maps: Vec<VirtualMap> = VirtualMapIter::new(Cursor::new(text)).collect();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].path, MapPath::File(PathBuf::from("/bin/a")));
        assert_eq!(maps[1].path, MapPath::File(PathBuf::from("/bin/b")));
    }

    #[test]
    fn test_libpython_naming_convention() {
        for name in [
            "libpython.so",
            "libpython3.8.so",
            "libpython2.7.so",
            "libpython3.so",
            "libpython3.9d.so.1.0",
            "libpython3.11.so.1",
        ] {
            assert!(LIBPYTHON.is_match(name), "{name} should match");
        }
        for name in [
            "libpython",
            "libpythonfoo",
            "libc-2.31.so",
            "python3.9",
            "alibpython3.9.so",
            "libpython3.9.sox",
        ] {
            assert!(!LIBPYTHON.is_match(name), "{name} should not match");
        }
    }
}

//! pymaps: memory-map acquisition and binary-segment resolution for
//! inspecting live Python processes.
//!
//! The crate turns a process's `/proc/<pid>/maps`-style listing into an
//! ordered sequence of [`VirtualMap`] records, then resolves that
//! sequence into the handful of maps downstream inspection steps depend
//! on: the interpreter executable, its libpython (if dynamically
//! linked), the matching bss region, the heap, and the overall
//! inspectable span.
//!
//! Reading is single-pass and snapshot-based: each
//! [`generate_maps_for_process`] call opens the listing fresh, and two
//! reads of a live process are not guaranteed consistent with each
//! other.

/// Core data types module
pub mod core;

/// Error types
pub mod error;

/// Logging and tracing setup
pub mod logging;

/// Maps listing reader and binary resolver
pub mod maps;

pub use crate::core::map::{MapPath, VirtualMap};
pub use crate::core::memory_range::MemoryRange;
pub use crate::error::{PymapsError, Result};
pub use crate::maps::{
    collect_maps_for_process, generate_maps_for_process, parse_maps_file_for_binary,
    BinaryMapInfo, VirtualMapIter,
};

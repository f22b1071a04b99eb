//! MemoryRange type for the overall inspectable address span.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open address span `[min_addr, max_addr)` covering every map a
/// structural memory scan may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryRange {
    /// Lowest start address among the covered maps (inclusive)
    pub min_addr: u64,
    /// Highest end address among the covered maps (exclusive)
    pub max_addr: u64,
}

impl MemoryRange {
    pub fn new(min_addr: u64, max_addr: u64) -> Self {
        Self { min_addr, max_addr }
    }

    /// Size of the span in bytes.
    pub fn size(&self) -> u64 {
        self.max_addr - self.min_addr
    }

    /// Whether `addr` falls inside the span.
    pub fn contains(&self, addr: u64) -> bool {
        self.min_addr <= addr && addr < self.max_addr
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.min_addr, self.max_addr)
    }
}

//! Core data types for pymaps.
//!
//! This module contains the fundamental value types used throughout the
//! system: the VirtualMap record every acquisition and resolution step
//! operates on, and the MemoryRange span the resolver produces.

pub mod map;
pub mod memory_range;

pub use map::{MapPath, VirtualMap};
pub use memory_range::MemoryRange;

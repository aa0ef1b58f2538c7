//! Resource handlers — generate guarded shell for each resource kind.
//!
//! Each handler produces:
//! 1. A "check" script that reads current state
//! 2. An "apply" script that converges to desired state
//! 3. A "state_query" script whose output feeds the BLAKE3 live-state hash

pub mod archive;
pub mod docker;
pub mod file;
pub mod kernel;
pub mod kmod;
pub mod package;
pub mod staging;
pub mod swap;
pub mod tmpfs;

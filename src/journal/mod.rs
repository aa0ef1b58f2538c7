//! Journal — provenance tracing and BLAKE3 state hashing.

pub mod eventlog;
pub mod hasher;

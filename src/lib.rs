//! Proberig — test-environment provisioning for kernel instrumentation.
//!
//! Idempotent resource catalog. BLAKE3 state hashing. Provenance journal.
//! Stages eBPF assets, mutates host security settings, and wires up the
//! privileged testsuite container on platforms that need one.

pub mod cli;
pub mod core;
pub mod journal;
pub mod resources;
pub mod transport;
pub mod verify;

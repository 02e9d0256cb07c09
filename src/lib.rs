//! forkscan - Chain operations tooling for locating fork points
//!
//! This crate finds the first block height at which two chain nodes
//! disagree about the canonical block hash. The search itself is a pure
//! binary search over an injected pair of fingerprint oracles, so it can
//! be exercised with synthetic oracles in tests and with live JSON-RPC
//! endpoints from the CLI.

/// Pure divergence search over a pair of fingerprint oracles
pub mod locator;

/// Oracle boundary: fingerprints, failures, RPC-backed and retrying oracles
pub mod oracle;

/// JSON-RPC client for block queries
pub mod rpc;

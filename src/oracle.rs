//! Fingerprint oracles
//!
//! An oracle answers "what is the fingerprint at this height?" for one
//! chain source. The locator only ever compares fingerprints for
//! equality, so anything opaque and comparable works; the RPC-backed
//! oracle uses the canonical block hash.

use crate::rpc::EthRpcClient;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque, comparable fingerprint of a block at some height.
///
/// For live chains this is the `0x`-prefixed block hash; synthetic
/// oracles in tests use arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an oracle could not produce a fingerprint
#[derive(Debug, Clone, Error)]
pub enum OracleFailure {
    /// Network-level failure (connection, timeout, non-2xx status)
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a JSON-RPC error object
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The endpoint has no block at this height (null response)
    #[error("block {0} not found")]
    NotFound(u64),
    /// The response did not contain a usable block hash
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl OracleFailure {
    /// Transport hiccups are worth retrying; a null or malformed answer
    /// will not improve by asking again immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// A source of fingerprints for an ordered domain of block heights.
///
/// Implementations own their transport (and any retry policy); the
/// locator never retries and treats every failure as fatal to the
/// in-progress search.
pub trait Oracle {
    fn fingerprint(
        &self,
        index: u64,
    ) -> impl std::future::Future<Output = Result<Fingerprint, OracleFailure>>;
}

/// Oracle backed by a JSON-RPC endpoint, fingerprinting blocks by their
/// canonical hash.
pub struct BlockHashOracle {
    client: EthRpcClient,
}

impl BlockHashOracle {
    pub fn new(client: EthRpcClient) -> Self {
        Self { client }
    }

    pub fn url(&self) -> &str {
        self.client.url()
    }
}

impl Oracle for BlockHashOracle {
    async fn fingerprint(&self, index: u64) -> Result<Fingerprint, OracleFailure> {
        match self.client.block_hash_by_number(index).await? {
            Some(hash) => Ok(hash),
            None => Err(OracleFailure::NotFound(index)),
        }
    }
}

/// Wraps an oracle with bounded retries for transient failures.
///
/// Delay doubles per attempt starting from `base_delay`. Non-transient
/// failures (missing block, malformed or error response) surface
/// immediately.
pub struct RetryingOracle<O> {
    inner: O,
    max_retries: usize,
    base_delay: Duration,
}

impl<O> RetryingOracle<O> {
    pub fn new(inner: O, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Oracle> Oracle for RetryingOracle<O> {
    async fn fingerprint(&self, index: u64) -> Result<Fingerprint, OracleFailure> {
        let mut attempt = 0usize;
        loop {
            match self.inner.fingerprint(index).await {
                Ok(fp) => return Ok(fp),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.base_delay * (1u32 << attempt.min(10) as u32);
                    eprintln!(
                        "  ⚠️ transient failure at height {} (attempt {}/{}): {} - retrying in {:?}",
                        index,
                        attempt + 1,
                        self.max_retries,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

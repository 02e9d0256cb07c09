//! Divergence locator
//!
//! Binary search for the first height at which two fingerprint oracles
//! disagree. The search assumes monotonic divergence: once the two
//! sources disagree at some height, they disagree at every height above
//! it (a forked chain does not re-converge to identical hashes). That
//! assumption is what makes bisection valid and it is not verified here;
//! if it does not hold, the reported height is merely the boundary the
//! bisection happened to find.
//!
//! The locator is pure glue over the injected oracles: no retries, no
//! printing, no state across calls. Callers that want probe-by-probe
//! output pass an observer to [`locate_with_observer`].

use crate::oracle::{Fingerprint, Oracle, OracleFailure};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which of the two oracles a failure came from.
///
/// Side A is always queried first at any given height, so a double
/// failure reports side A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// Why a search could not produce a conclusive result
#[derive(Debug, Error)]
pub enum LocateError {
    /// The range was rejected before any oracle was queried
    #[error("invalid range: start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },
    /// An oracle failed to produce a fingerprint; the search is aborted
    /// rather than guessing, which would corrupt the bisection.
    #[error("oracle {side} failed at height {index}: {source}")]
    OracleUnavailable {
        index: u64,
        side: Side,
        #[source]
        source: OracleFailure,
    },
}

/// The highest probed height at which both oracles agreed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agreement {
    pub index: u64,
    pub fingerprint: Fingerprint,
}

/// Conclusive outcome of a divergence search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchResult {
    /// Both oracles agreed at every probed height in the range
    NoDivergence,
    /// First height, scanning left to right, at which the oracles differ
    DivergesAt {
        index: u64,
        /// Oracle A's fingerprint at `index`
        a: Fingerprint,
        /// Oracle B's fingerprint at `index`
        b: Fingerprint,
        /// Last probed agreement below `index`, if any was probed
        last_agreement: Option<Agreement>,
    },
}

/// One successful pair query, reported to the observer as it happens
#[derive(Debug, Clone)]
pub struct Probe {
    pub index: u64,
    pub a: Fingerprint,
    pub b: Fingerprint,
    pub matched: bool,
}

/// Find the first height in `[start, end]` where the two oracles
/// disagree. See the module docs for the monotonicity precondition.
pub async fn locate<A: Oracle, B: Oracle>(
    oracle_a: &A,
    oracle_b: &B,
    start: u64,
    end: u64,
) -> Result<SearchResult, LocateError> {
    locate_with_observer(oracle_a, oracle_b, start, end, |_| {}).await
}

/// Like [`locate`], invoking `observe` after every successful pair query
/// (boundaries included), in probe order. Failed queries abort the
/// search before the observer sees them.
pub async fn locate_with_observer<A, B, F>(
    oracle_a: &A,
    oracle_b: &B,
    start: u64,
    end: u64,
    mut observe: F,
) -> Result<SearchResult, LocateError>
where
    A: Oracle,
    B: Oracle,
    F: FnMut(&Probe),
{
    if start > end {
        return Err(LocateError::InvalidRange { start, end });
    }

    // Left boundary: disagreement here means the whole range is diverged.
    let first = probe_pair(oracle_a, oracle_b, start, &mut observe).await?;
    if !first.matched {
        return Ok(SearchResult::DivergesAt {
            index: start,
            a: first.a,
            b: first.b,
            last_agreement: None,
        });
    }

    // Right boundary, probed even when start == end: agreement means
    // nothing in the range differs.
    let last = probe_pair(oracle_a, oracle_b, end, &mut observe).await?;
    if last.matched {
        return Ok(SearchResult::NoDivergence);
    }

    // Bisect between the known-agreeing left boundary and the
    // known-differing right boundary.
    let mut left = start;
    let mut right = end;
    let mut last_agreement = Agreement {
        index: start,
        fingerprint: first.a,
    };
    // Fingerprints recorded at the current `right` (smallest known-differing).
    let (mut diverged_a, mut diverged_b) = (last.a, last.b);

    while left < right {
        // Avoids overflow by not summing the endpoints directly.
        let mid = left + (right - left) / 2;
        let probe = probe_pair(oracle_a, oracle_b, mid, &mut observe).await?;
        if probe.matched {
            if mid >= last_agreement.index {
                last_agreement = Agreement {
                    index: mid,
                    fingerprint: probe.a,
                };
            }
            left = mid + 1;
        } else {
            right = mid;
            diverged_a = probe.a;
            diverged_b = probe.b;
        }
    }

    Ok(SearchResult::DivergesAt {
        index: left,
        a: diverged_a,
        b: diverged_b,
        last_agreement: Some(last_agreement),
    })
}

async fn probe_pair<A, B, F>(
    oracle_a: &A,
    oracle_b: &B,
    index: u64,
    observe: &mut F,
) -> Result<Probe, LocateError>
where
    A: Oracle,
    B: Oracle,
    F: FnMut(&Probe),
{
    let a = oracle_a
        .fingerprint(index)
        .await
        .map_err(|source| LocateError::OracleUnavailable {
            index,
            side: Side::A,
            source,
        })?;
    let b = oracle_b
        .fingerprint(index)
        .await
        .map_err(|source| LocateError::OracleUnavailable {
            index,
            side: Side::B,
            source,
        })?;
    let probe = Probe {
        index,
        matched: a == b,
        a,
        b,
    };
    observe(&probe);
    Ok(probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstOracle(&'static str);

    impl Oracle for ConstOracle {
        async fn fingerprint(&self, index: u64) -> Result<Fingerprint, OracleFailure> {
            Ok(Fingerprint::from(format!("{}:{}", self.0, index)))
        }
    }

    /// Diverges from `ConstOracle("x")` at heights >= fork
    struct ForkedOracle {
        fork_at: u64,
    }

    impl Oracle for ForkedOracle {
        async fn fingerprint(&self, index: u64) -> Result<Fingerprint, OracleFailure> {
            if index < self.fork_at {
                Ok(Fingerprint::from(format!("x:{}", index)))
            } else {
                Ok(Fingerprint::from(format!("y:{}", index)))
            }
        }
    }

    #[tokio::test]
    async fn midpoint_math_does_not_overflow_near_domain_max() {
        let a = ConstOracle("x");
        let b = ForkedOracle {
            fork_at: u64::MAX - 3,
        };
        let result = locate(&a, &b, u64::MAX - 1000, u64::MAX - 1)
            .await
            .unwrap();
        match result {
            SearchResult::DivergesAt { index, .. } => assert_eq!(index, u64::MAX - 3),
            other => panic!("expected divergence, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reports_fingerprints_from_both_sides() {
        let a = ConstOracle("x");
        let b = ForkedOracle { fork_at: 5 };
        match locate(&a, &b, 0, 9).await.unwrap() {
            SearchResult::DivergesAt {
                index,
                a,
                b,
                last_agreement,
            } => {
                assert_eq!(index, 5);
                assert_eq!(a, Fingerprint::from("x:5"));
                assert_eq!(b, Fingerprint::from("y:5"));
                let agreement = last_agreement.expect("bisection probes below the fork");
                assert_eq!(agreement.index, 4);
                assert_eq!(agreement.fingerprint, Fingerprint::from("x:4"));
            }
            other => panic!("expected divergence, got {:?}", other),
        }
    }
}

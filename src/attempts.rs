//! Bounded best-effort acquisition over a list of candidates.
//!
//! [`BoundedAttempts`] knows nothing about feeds. Given candidates, an
//! attempt cap and an async attempt function, it:
//!
//! 1. orders the candidates (uniform shuffle, or catalog order)
//! 2. keeps at most `max_attempts` of them
//! 3. tries each in turn until one succeeds
//!
//! Failures are logged and collected, never raised. Retry happens by
//! substitution (the next candidate), never by repeating the same one.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use tracing::{info, warn};

/// How candidates are ordered before the attempt cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrder {
    /// Uniformly random permutation.
    Shuffled,
    /// Catalog order.
    AsListed,
}

/// A candidate that was tried and failed.
#[derive(Debug)]
pub struct AttemptFailure<'a, C, E> {
    pub candidate: &'a C,
    pub error: E,
}

/// What came out of [`BoundedAttempts::first_success`].
#[derive(Debug)]
pub enum Outcome<'a, C, T, E> {
    Found {
        candidate: &'a C,
        value: T,
        /// Candidates tried before `candidate`, in attempt order.
        failures: Vec<AttemptFailure<'a, C, E>>,
    },
    Exhausted {
        failures: Vec<AttemptFailure<'a, C, E>>,
    },
}

impl<C, T, E> Outcome<'_, C, T, E> {
    /// Number of candidates attempted, successful one included.
    pub fn attempts(&self) -> usize {
        match self {
            Outcome::Found { failures, .. } => failures.len() + 1,
            Outcome::Exhausted { failures } => failures.len(),
        }
    }
}

/// Retry-by-substitution policy: at most `max_attempts` distinct candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedAttempts {
    max_attempts: usize,
    order: CandidateOrder,
}

impl BoundedAttempts {
    pub fn new(max_attempts: usize, order: CandidateOrder) -> Self {
        Self {
            max_attempts,
            order,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn order(&self) -> CandidateOrder {
        self.order
    }

    /// The candidates that will be tried, in the order they will be tried.
    ///
    /// Never longer than `max_attempts` and never repeats an element of
    /// `candidates`.
    pub fn plan<'a, C, R>(&self, candidates: &'a [C], rng: &mut R) -> Vec<&'a C>
    where
        R: Rng + ?Sized,
    {
        let mut ordered: Vec<&'a C> = candidates.iter().collect();
        if self.order == CandidateOrder::Shuffled {
            ordered.shuffle(rng);
        }
        ordered.truncate(self.max_attempts);
        ordered
    }

    /// Try planned candidates one after another and return the first success.
    ///
    /// Stops at the first `Ok`; later candidates are not touched.
    pub async fn first_success<'a, C, T, E, R, F, Fut>(
        &self,
        candidates: &'a [C],
        rng: &mut R,
        mut attempt: F,
    ) -> Outcome<'a, C, T, E>
    where
        C: Display,
        E: Display,
        R: Rng + ?Sized,
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let plan = self.plan(candidates, rng);
        let planned = plan.len();
        let mut failures = Vec::new();

        for (i, candidate) in plan.into_iter().enumerate() {
            let n = i + 1;
            info!(attempt = n, of = planned, %candidate, "Trying candidate");
            match attempt(candidate).await {
                Ok(value) => {
                    return Outcome::Found {
                        candidate,
                        value,
                        failures,
                    };
                }
                Err(error) => {
                    warn!(
                        attempt = n,
                        of = planned,
                        %candidate,
                        %error,
                        "Candidate failed; trying next one"
                    );
                    failures.push(AttemptFailure { candidate, error });
                }
            }
        }

        warn!(attempts = failures.len(), "Every attempted candidate failed");
        Outcome::Exhausted { failures }
    }
}

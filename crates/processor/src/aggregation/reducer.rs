//! Incremental reducers used by the Gold strategies
//!
//! Reducers are fed facts one value at a time in fingerprint order and
//! finalized once per partition.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Core trait for partition reducers
pub trait Reducer: Send + Sync + Debug {
    /// The type of values this reducer accepts
    type Input;

    /// The type of the final result
    type Output;

    /// Feed one value
    fn update(&mut self, value: Self::Input);

    /// Final result; `None` when nothing was fed and no neutral value exists
    fn finalize(&self) -> Option<Self::Output>;

    /// Number of values fed so far
    fn count(&self) -> u64;
}

/// Arithmetic mean
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanReducer {
    sum: f64,
    count: u64,
}

impl MeanReducer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reducer for MeanReducer {
    type Input = f64;
    type Output = f64;

    fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn finalize(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    fn count(&self) -> u64 {
        self.count
    }
}

/// Sum; zero over no values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SumReducer {
    sum: f64,
    count: u64,
}

impl SumReducer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reducer for SumReducer {
    type Input = f64;
    type Output = f64;

    fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn finalize(&self) -> Option<f64> {
        Some(self.sum)
    }

    fn count(&self) -> u64 {
        self.count
    }
}

/// Keeps the value with the greatest ordering key
///
/// On equal keys the value seen first is kept, so the result depends only on
/// the key order and the feeding order.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestReducer<K, T> {
    latest: Option<(K, T)>,
    count: u64,
}

impl<K, T> Default for LatestReducer<K, T> {
    fn default() -> Self {
        Self {
            latest: None,
            count: 0,
        }
    }
}

impl<K, T> LatestReducer<K, T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, T> Reducer for LatestReducer<K, T>
where
    K: Ord + Clone + Send + Sync + Debug,
    T: Clone + Send + Sync + Debug,
{
    type Input = (K, T);
    type Output = T;

    fn update(&mut self, (key, value): (K, T)) {
        self.count += 1;
        match &self.latest {
            Some((current, _)) if *current >= key => {}
            _ => self.latest = Some((key, value)),
        }
    }

    fn finalize(&self) -> Option<T> {
        self.latest.as_ref().map(|(_, v)| v.clone())
    }

    fn count(&self) -> u64 {
        self.count
    }
}

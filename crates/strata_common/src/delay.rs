//! Per-switch propagation delays.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from switch/segment name to a propagation delay in seconds.
///
/// Produced once per architecture, either by characterization or by
/// inheriting the switch list of a previously exported architecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayRecord {
    delays: BTreeMap<String, f64>,
}

impl DelayRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay of a switch, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, seconds: f64) {
        self.delays.insert(name.into(), seconds);
    }

    /// Returns the delay of a switch.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.delays.get(name).copied()
    }

    /// Removes a switch, returning its delay.
    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.delays.remove(name)
    }

    /// Returns `true` if a delay is recorded for the switch.
    pub fn contains(&self, name: &str) -> bool {
        self.delays.contains_key(name)
    }

    /// Iterates over `(name, delay)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.delays.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns the number of recorded switches.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// Returns `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl Extend<(String, f64)> for DelayRecord {
    fn extend<T: IntoIterator<Item = (String, f64)>>(&mut self, iter: T) {
        self.delays.extend(iter);
    }
}

impl FromIterator<(String, f64)> for DelayRecord {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            delays: iter.into_iter().collect(),
        }
    }
}

//! Channel composition model and the `.wire` text format.
//!
//! The format has one directive per line, `H <length> <count>` or
//! `V <length> <count>`. Blank lines and `#` comments are ignored; lengths
//! that are not mentioned have count zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_common::{Axis, SynthResult, SynthesisError};
use strata_config::Cluster;

/// Wire counts of one channel direction, keyed by length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    axis: Axis,
    counts: BTreeMap<u32, u32>,
}

impl Channel {
    /// Creates an empty channel.
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            counts: BTreeMap::new(),
        }
    }

    /// Returns the channel axis.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Returns the per-slot count of wires of the given length.
    pub fn count(&self, length: u32) -> u32 {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// Returns `true` if the length has an entry, even a zero one.
    pub fn contains(&self, length: u32) -> bool {
        self.counts.contains_key(&length)
    }

    /// Sets the count of a length.
    pub fn set(&mut self, length: u32, count: u32) {
        self.counts.insert(length, count);
    }

    /// Adds to the count of a length, creating the entry if needed.
    pub fn add(&mut self, length: u32, count: u32) {
        *self.counts.entry(length).or_insert(0) += count;
    }

    /// Removes a length entirely.
    pub fn remove(&mut self, length: u32) -> Option<u32> {
        self.counts.remove(&length)
    }

    /// Iterates over `(length, count)` in increasing length.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.iter().map(|(l, c)| (*l, *c))
    }

    /// Iterates over `(length, count)` for lengths with a non-zero count.
    pub fn populated(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.iter().filter(|(_, c)| *c > 0)
    }

    /// Total wires per slot.
    pub fn wire_count(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Routing tracks per slot: `Σ 2·L·count` (both propagation sides).
    ///
    /// Saturates instead of wrapping; rescaled lengths can exceed what the
    /// parser admits.
    pub fn track_count(&self) -> u64 {
        self.iter().fold(0u64, |acc, (l, c)| {
            acc.saturating_add((2 * u64::from(l)).saturating_mul(u64::from(c)))
        })
    }

    /// Length of the longest populated wire.
    pub fn max_length(&self) -> Option<u32> {
        self.populated().map(|(l, _)| l).max()
    }

    /// Returns `true` if no wire is populated.
    pub fn is_empty(&self) -> bool {
        self.populated().next().is_none()
    }
}

/// Horizontal and vertical channel of one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    /// Horizontal wires.
    pub horizontal: Channel,
    /// Vertical wires.
    pub vertical: Channel,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self {
            horizontal: Channel::new(Axis::Horizontal),
            vertical: Channel::new(Axis::Vertical),
        }
    }

    /// Returns the channel of an axis.
    pub fn channel(&self, axis: Axis) -> &Channel {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    /// Returns the channel of an axis mutably.
    pub fn channel_mut(&mut self, axis: Axis) -> &mut Channel {
        match axis {
            Axis::Horizontal => &mut self.horizontal,
            Axis::Vertical => &mut self.vertical,
        }
    }

    /// Parses a `.wire` file.
    ///
    /// Unknown direction tags, malformed numbers, zero lengths and repeated
    /// declarations of one length are composition errors, as is a channel
    /// whose wire or track total does not fit in a `u32`. Zero counts are
    /// accepted and dropped.
    pub fn parse(text: &str) -> SynthResult<Self> {
        let mut composition = Self::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [tag, length, count] = fields.as_slice() else {
                return Err(SynthesisError::composition(format!(
                    "line {}: expected '<H|V> <length> <count>', got '{line}'",
                    lineno + 1
                )));
            };
            let axis = Axis::from_letter(tag).ok_or_else(|| {
                SynthesisError::composition(format!(
                    "line {}: unknown direction tag '{tag}'",
                    lineno + 1
                ))
            })?;
            let length = parse_number(length, lineno, "length")?;
            let count = parse_number(count, lineno, "count")?;
            if length == 0 {
                return Err(SynthesisError::composition(format!(
                    "line {}: wire length must be positive",
                    lineno + 1
                )));
            }
            let channel = composition.channel_mut(axis);
            if channel.contains(length) {
                return Err(SynthesisError::composition(format!(
                    "line {}: {}{length} declared twice",
                    lineno + 1,
                    axis.letter()
                )));
            }
            channel.set(length, count);
        }
        composition.horizontal.counts.retain(|_, c| *c > 0);
        composition.vertical.counts.retain(|_, c| *c > 0);
        for channel in [&composition.horizontal, &composition.vertical] {
            check_totals(channel)?;
        }
        Ok(composition)
    }

    /// Rescales vertical lengths from the reference cluster to `cluster`.
    ///
    /// Lengths that collapse onto the same scaled length are merged.
    pub fn scaled_to(&self, cluster: &Cluster) -> Self {
        let mut vertical = Channel::new(Axis::Vertical);
        for (length, count) in self.vertical.iter() {
            vertical.add(cluster.scale_vertical_length(length), count);
        }
        Self {
            horizontal: self.horizontal.clone(),
            vertical,
        }
    }

    /// Renders the `.wire` text, omitting unit-length and zero-count wires.
    pub fn to_wire_file(&self) -> String {
        let mut out = String::new();
        for channel in [&self.horizontal, &self.vertical] {
            for (length, count) in channel.populated().filter(|(l, _)| *l != 1) {
                out.push_str(&format!("{} {length} {count}\n", channel.axis.letter()));
            }
        }
        out
    }

    /// Renders every populated wire as `H4 2` style lines, unit lengths included.
    pub fn summary_lines(&self) -> Vec<String> {
        [&self.horizontal, &self.vertical]
            .into_iter()
            .flat_map(|ch| {
                ch.populated()
                    .map(move |(l, c)| format!("{}{l} {c}", ch.axis.letter()))
            })
            .collect()
    }
}

fn check_totals(channel: &Channel) -> SynthResult<()> {
    let wires: u64 = channel.iter().map(|(_, c)| u64::from(c)).sum();
    if wires > u64::from(u32::MAX) || channel.track_count() > u64::from(u32::MAX) {
        return Err(SynthesisError::composition(format!(
            "{} channel is too large: {wires} wires over {} tracks",
            channel.axis.letter(),
            channel.track_count()
        )));
    }
    Ok(())
}

fn parse_number(field: &str, lineno: usize, what: &str) -> SynthResult<u32> {
    field.parse().map_err(|_| {
        SynthesisError::composition(format!(
            "line {}: invalid {what} '{field}'",
            lineno + 1
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_config::SynthesisConfig;

    #[test]
    fn parse_basic_file() {
        let comp = Composition::parse("H 1 2\nH 2 1\nV 4 3\n").unwrap();
        assert_eq!(comp.horizontal.count(1), 2);
        assert_eq!(comp.horizontal.count(2), 1);
        assert_eq!(comp.horizontal.count(4), 0);
        assert_eq!(comp.vertical.count(4), 3);
        assert_eq!(comp.horizontal.track_count(), 2 * 2 + 2 * 2);
    }

    #[test]
    fn comments_and_blank_lines() {
        let comp = Composition::parse("# header\n\nH 4 2  # trailing\n").unwrap();
        assert_eq!(comp.horizontal.count(4), 2);
        assert!(comp.vertical.is_empty());
    }

    #[test]
    fn unknown_direction_tag_is_fatal() {
        let err = Composition::parse("X 4 2\n").unwrap_err();
        assert!(matches!(err, SynthesisError::Composition(_)));
        assert!(err.to_string().contains("unknown direction tag 'X'"));
    }

    #[test]
    fn malformed_lines_are_fatal() {
        assert!(Composition::parse("H 4\n").is_err());
        assert!(Composition::parse("H four 2\n").is_err());
        assert!(Composition::parse("H 0 2\n").is_err());
        assert!(Composition::parse("H 2 1\nH 2 3\n").is_err());
    }

    #[test]
    fn oversized_channels_are_rejected() {
        let err = Composition::parse("H 70000 40000\n").unwrap_err();
        assert!(matches!(err, SynthesisError::Composition(_)));
        assert!(err.to_string().contains("H channel is too large"));

        let err = Composition::parse("V 1 4294967295\nV 2 1\n").unwrap_err();
        assert!(matches!(err, SynthesisError::Composition(_)));

        let comp = Composition::parse("H 1 2147483647\n").unwrap();
        assert_eq!(comp.horizontal.track_count(), 4_294_967_294);
    }

    #[test]
    fn track_count_saturates() {
        let mut channel = Channel::new(Axis::Vertical);
        channel.set(u32::MAX, u32::MAX);
        channel.set(7, 3);
        assert_eq!(channel.track_count(), u64::MAX);
    }

    #[test]
    fn zero_counts_are_dropped() {
        let comp = Composition::parse("H 2 0\nV 4 1\n").unwrap();
        assert!(!comp.horizontal.contains(2));
        assert_eq!(comp.vertical.wire_count(), 1);
    }

    #[test]
    fn wire_file_skips_unit_length() {
        let comp = Composition::parse("H 1 2\nH 4 1\nV 1 3\nV 8 2\n").unwrap();
        assert_eq!(comp.to_wire_file(), "H 4 1\nV 8 2\n");
    }

    #[test]
    fn wire_file_reparses() {
        let comp = Composition::parse("H 2 4\nH 4 1\nV 4 2\n").unwrap();
        assert_eq!(Composition::parse(&comp.to_wire_file()).unwrap(), comp);
    }

    #[test]
    fn vertical_lengths_rescale() {
        let mut config = SynthesisConfig::default();
        config.architecture.n = 16;
        let cluster = Cluster::from_config(&config);
        let comp = Composition::parse("H 4 1\nV 4 2\nV 3 1\n").unwrap();
        let scaled = comp.scaled_to(&cluster);
        assert_eq!(scaled.horizontal.count(4), 1);
        // 4 -> 2 and 3 -> ceil(1.5) = 2 merge
        assert_eq!(scaled.vertical.count(2), 3);
    }

    #[test]
    fn summary_lines_include_unit_wires() {
        let comp = Composition::parse("H 1 3\nV 2 1\n").unwrap();
        assert_eq!(comp.summary_lines(), vec!["H1 3", "V2 1"]);
    }
}

//! Switch and segment tables shared by the rr-graph and the architecture file.

use std::collections::{BTreeMap, BTreeSet};
use strata_common::{DelayRecord, SwitchKind, SynthResult, SynthesisError, WireClass};
use strata_config::Cluster;
use strata_rrg::RoutingGraph;

/// One exported switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchEntry {
    /// Switch id, referenced by edges.
    pub id: u32,
    /// The switch this entry describes.
    pub kind: SwitchKind,
    /// Lumped delay in seconds.
    pub delay: f64,
}

impl SwitchEntry {
    /// Returns the exported name.
    pub fn name(&self) -> String {
        self.kind.name()
    }
}

/// Every switch a routing graph uses, with its delay.
///
/// The delayless switch is id 0 and the connection block id 1; wire
/// switches follow, horizontal before vertical, by length then tap.
#[derive(Debug, Clone)]
pub struct SwitchTable {
    entries: Vec<SwitchEntry>,
    ids: BTreeMap<SwitchKind, u32>,
}

impl SwitchTable {
    /// Collects the switches of `graph` and looks up their delays.
    ///
    /// Fails if any switch other than the delayless one has no delay.
    pub fn build(graph: &RoutingGraph, delays: &DelayRecord) -> SynthResult<Self> {
        let mut classes = BTreeSet::new();
        for edge in graph.edges() {
            if let SwitchKind::Wire(class) = edge.switch {
                classes.insert(class);
            }
        }
        for (_, wire) in graph.wires() {
            classes.insert(wire.at_tap(0).class());
        }

        let kinds = [SwitchKind::Delayless, SwitchKind::ConnectionBlock]
            .into_iter()
            .chain(classes.into_iter().map(SwitchKind::Wire));
        let mut entries = Vec::new();
        let mut ids = BTreeMap::new();
        for (id, kind) in (0u32..).zip(kinds) {
            let delay = match kind {
                SwitchKind::Delayless => 0.0,
                _ => delays.get(&kind.name()).ok_or_else(|| {
                    SynthesisError::export(format!("no delay recorded for switch {kind}"))
                })?,
            };
            ids.insert(kind, id);
            entries.push(SwitchEntry { id, kind, delay });
        }
        Ok(Self { entries, ids })
    }

    /// Returns the id of a switch.
    pub fn id(&self, kind: &SwitchKind) -> SynthResult<u32> {
        self.ids
            .get(kind)
            .copied()
            .ok_or_else(|| SynthesisError::export(format!("switch {kind} is not in the switch table")))
    }

    /// All entries in id order.
    pub fn entries(&self) -> &[SwitchEntry] {
        &self.entries
    }

    /// Number of switches.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every wire segment type of a routing graph.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    classes: Vec<WireClass>,
}

impl SegmentTable {
    /// Collects the segment types of the wires in `graph`.
    pub fn build(graph: &RoutingGraph) -> Self {
        let classes: BTreeSet<WireClass> = graph.wires().into_iter().map(|(_, w)| w.class()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Returns the id of a segment type.
    pub fn id(&self, class: &WireClass) -> SynthResult<u32> {
        self.classes
            .binary_search(class)
            .map(|i| i as u32)
            .map_err(|_| SynthesisError::export(format!("segment {class} is not in the segment table")))
    }

    /// Segment types in id order.
    pub fn classes(&self) -> &[WireClass] {
        &self.classes
    }
}

/// Number of tiles one node of a wire class spans.
///
/// With separate taps every tap of a vertical wire is its own node: the
/// first covers what the later taps leave of the wire.
pub fn segment_span(class: &WireClass, cluster: &Cluster, separate_taps: bool) -> u32 {
    match class.tap {
        Some(tap) if separate_taps => {
            if tap > 0 {
                cluster.tap_spacing
            } else {
                (class.length + 1)
                    .saturating_sub(cluster.tap_count * cluster.tap_spacing)
                    .max(1)
            }
        }
        _ => class.length,
    }
}

/// Formats a number the way C's `%g` does.
pub fn format_g(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 { "0".to_string() } else { value.to_string() };
    }
    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let decimals = (5 - exponent).max(0) as usize;
    trim_fraction(&format!("{value:.decimals$}")).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_channel::Composition;
    use strata_config::{PatternConfig, SynthesisConfig};
    use strata_rrg::GraphBuilder;

    fn cluster() -> Cluster {
        let mut config = SynthesisConfig::default();
        config.architecture.n = 2;
        Cluster::from_config(&config)
    }

    fn graph(pattern: &PatternConfig) -> RoutingGraph {
        let composition = Composition::parse("H 1 1\nH 2 1\nV 4 1\n").unwrap();
        GraphBuilder::new(&cluster(), pattern, &composition)
            .build()
            .unwrap()
    }

    fn delays() -> DelayRecord {
        [("cb", 5e-12), ("H1", 20e-12), ("H2", 30e-12), ("V4_tap_0", 40e-12)]
            .into_iter()
            .map(|(n, d)| (n.to_string(), d))
            .collect()
    }

    #[test]
    fn switch_order() {
        let table = SwitchTable::build(&graph(&PatternConfig::default()), &delays()).unwrap();
        let names: Vec<_> = table.entries().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            ["__vpr_delayless_switch__", "cb", "H1", "H2", "V4_tap_0"]
        );
        assert_eq!(table.id(&SwitchKind::ConnectionBlock).unwrap(), 1);
        assert_eq!(table.entries()[0].delay, 0.0);
        assert_eq!(table.entries()[3].delay, 30e-12);
    }

    #[test]
    fn missing_delay_is_an_export_error() {
        let mut record = delays();
        record.remove("H2");
        let err = SwitchTable::build(&graph(&PatternConfig::default()), &record).unwrap_err();
        assert_eq!(err.phase(), "export");
        assert!(err.to_string().contains("H2"));
    }

    #[test]
    fn unknown_switch_lookup_fails() {
        let table = SwitchTable::build(&graph(&PatternConfig::default()), &delays()).unwrap();
        assert!(table.id(&SwitchKind::Wire(WireClass::horizontal(8))).is_err());
    }

    #[test]
    fn segments_follow_wire_classes() {
        let table = SegmentTable::build(&graph(&PatternConfig::default()));
        assert_eq!(table.classes().len(), 3);
        assert_eq!(table.id(&WireClass::horizontal(1)).unwrap(), 0);
        assert_eq!(table.id(&WireClass::vertical(4, 0)).unwrap(), 2);
    }

    #[test]
    fn separate_tap_spans_cover_the_wire() {
        let cluster = cluster();
        let total: u32 = (0..cluster.tap_count)
            .map(|tap| segment_span(&WireClass::vertical(8, tap), &cluster, true))
            .sum();
        assert_eq!(total, 8);
        assert_eq!(segment_span(&WireClass::vertical(8, 2), &cluster, false), 8);
        assert_eq!(segment_span(&WireClass::horizontal(4), &cluster, true), 4);
    }

    #[test]
    fn percent_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.23e-11), "1.23e-11");
        assert_eq!(format_g(4e-5), "4e-05");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(2.5e-10), "2.5e-10");
    }
}

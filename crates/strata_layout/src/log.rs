//! The padding log: a human-readable record of a balancing run that a
//! later run can import to reproduce the same unit-wire counts.

use crate::mux::MuxSizes;
use crate::tile::Dimensions;
use std::path::Path;
use strata_channel::Composition;
use strata_common::{Axis, SynthResult, SynthesisError};

/// Renders the padding log of a balanced architecture.
pub struct PaddingLog;

impl PaddingLog {
    /// Renders the log text, without a trailing newline.
    pub fn render(
        composition: &Composition,
        tile: Dimensions,
        metal: Dimensions,
        sizes: &MuxSizes,
    ) -> String {
        let mut out = String::from("Channel composition after padding:\n\n");
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let channel = composition.channel(axis);
            for (length, count) in channel.iter() {
                out.push_str(&format!("{}{length} {count}\n", axis.letter()));
            }
        }
        out.push_str(&format!(
            "\nActive dimensions: {} X {} nm\n",
            tile.width as i64, tile.height as i64
        ));
        out.push_str(&format!(
            "Metal dimensions: {} X {} nm\n\n",
            metal.width as i64, metal.height as i64
        ));
        out.push_str("Multiplexer sizes:\n\n");
        for (size, labels) in sizes.by_size() {
            out.push_str(&format!("{size}: {}\n", labels.join(" ")));
        }
        out.pop();
        out
    }
}

/// Unit-wire counts read back from a padding log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddingImport {
    /// Unit-length horizontal wires to add.
    pub horizontal: u32,
    /// Minimal vertical wires to add.
    pub vertical: u32,
}

impl PaddingImport {
    /// Extracts the `H1 <n>` and `V1 <n>` lines; everything else is ignored.
    pub fn parse(text: &str) -> SynthResult<Self> {
        let mut import = Self::default();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(tag), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let slot = match tag {
                "H1" => &mut import.horizontal,
                "V1" => &mut import.vertical,
                _ => continue,
            };
            *slot += value.parse::<u32>().map_err(|_| {
                SynthesisError::composition(format!(
                    "padding log: invalid count '{value}' for {tag}"
                ))
            })?;
        }
        Ok(import)
    }

    /// Reads and parses a padding log file.
    pub fn from_file(path: &Path) -> SynthResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_rrg::NodeName;

    fn sample() -> String {
        let mut composition = Composition::parse("H 2 1\nH 1 4\nV 1 3\n").unwrap();
        composition.channel_mut(Axis::Vertical).set(4, 0);
        let mut sizes = MuxSizes::default();
        sizes
            .connection_block
            .insert(NodeName::ClusterInput { slot: 1, pin: 0 }, 6);
        sizes
            .connection_block
            .insert(NodeName::ClusterInput { slot: 1, pin: 1 }, 6);
        let tile = Dimensions {
            width: 5040.7,
            height: 17280.0,
        };
        let metal = Dimensions {
            width: 2400.0,
            height: 19200.0,
        };
        PaddingLog::render(&composition, tile, metal, &sizes)
    }

    #[test]
    fn render_layout() {
        let text = sample();
        let expected = "Channel composition after padding:\n\n\
                        H1 4\nH2 1\nV1 3\nV4 0\n\n\
                        Active dimensions: 5040 X 17280 nm\n\
                        Metal dimensions: 2400 X 19200 nm\n\n\
                        Multiplexer sizes:\n\n\
                        6: cb_out_0 cb_out_1";
        assert_eq!(text, expected);
    }

    #[test]
    fn import_reads_unit_lines_only() {
        let import = PaddingImport::parse(&sample()).unwrap();
        assert_eq!(
            import,
            PaddingImport {
                horizontal: 4,
                vertical: 3
            }
        );
    }

    #[test]
    fn import_ignores_longer_wires() {
        let import = PaddingImport::parse("H16 9\nH1 4\n").unwrap();
        assert_eq!(import.horizontal, 4);
        assert_eq!(import.vertical, 0);
    }

    #[test]
    fn import_rejects_bad_counts() {
        let err = PaddingImport::parse("H1 four\n").unwrap_err();
        assert!(err.to_string().contains("invalid count"));
    }

    #[test]
    fn import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k6n8_padding.log");
        std::fs::write(&path, sample()).unwrap();
        let import = PaddingImport::from_file(&path).unwrap();
        assert_eq!(import.horizontal, 4);
    }
}

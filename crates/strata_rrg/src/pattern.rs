//! Switch-pattern rules: which wire drives which target, and at what offset.
//!
//! Tile coordinates follow the router's convention: a cluster's channels
//! lie above and to the right of it, so turning into an increasing
//! direction lands one tile further than turning into a decreasing one.

use strata_common::Side;

/// Tile offset of a switch-block connection from a wire of `length`
/// propagating toward `source` into a wire propagating toward `target`.
///
/// Returns `None` for loop-backs (same axis, opposite direction), which are
/// never connected.
pub fn sb_offset(source: Side, target: Side, length: u32) -> Option<(i32, i32)> {
    use Side::{Down, Left, Right, Up};
    let l = length as i32;
    let offset = match (source, target) {
        (Up, Left) => (0, l - 1),
        (Up, Right) => (1, l - 1),
        (Down, Left) => (0, -l),
        (Down, Right) => (1, -l),
        (Right, Up) => (l - 1, 1),
        (Right, Down) => (l - 1, 0),
        (Left, Up) => (-l, 1),
        (Left, Down) => (-l, 0),
        (Up, Up) => (0, l),
        (Down, Down) => (0, -l),
        (Right, Right) => (l, 0),
        (Left, Left) => (-l, 0),
        _ => return None,
    };
    Some(offset)
}

/// Returns `true` for a pair of sides that would connect a wire back onto its own axis.
pub fn is_loopback(a: Side, b: Side) -> bool {
    a.axis() == b.axis() && a != b
}

/// Disjoint connection-block rule: does wire `index` of a type with
/// `type_count` instances drive pin `pin` of a group of `group_size` pins?
///
/// With fewer wires than pins each pin has exactly one driver; otherwise
/// each wire drives exactly one pin.
pub fn disjoint_cb(index: u32, type_count: u32, group_size: u32, pin: u32) -> bool {
    if type_count < group_size {
        pin % type_count == index % type_count
    } else {
        index % group_size == pin
    }
}

/// Disjoint switch-block rule between a source instance and a target instance.
///
/// The smaller type is walked with a shift of one so that a wire never
/// continues onto the instance with its own index.
pub fn disjoint_sb(source_index: u32, source_count: u32, target_index: u32, target_count: u32) -> bool {
    if source_count < target_count {
        let sought = (source_index + 1) % source_count;
        target_index % source_count == sought
    } else {
        let sought = (target_index + 1) % target_count;
        source_index % target_count == sought
    }
}

/// Disjoint twist rule: target `target_index` is fed by the source with the next index.
pub fn disjoint_twist(source_index: u32, target_index: u32, count: u32) -> bool {
    (target_index + 1) % count == source_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use Side::{Down, Left, Right, Up};

    #[test]
    fn offset_table() {
        assert_eq!(sb_offset(Up, Left, 4), Some((0, 3)));
        assert_eq!(sb_offset(Up, Right, 4), Some((1, 3)));
        assert_eq!(sb_offset(Down, Left, 4), Some((0, -4)));
        assert_eq!(sb_offset(Down, Right, 4), Some((1, -4)));
        assert_eq!(sb_offset(Right, Up, 2), Some((1, 1)));
        assert_eq!(sb_offset(Right, Down, 2), Some((1, 0)));
        assert_eq!(sb_offset(Left, Up, 2), Some((-2, 1)));
        assert_eq!(sb_offset(Left, Down, 2), Some((-2, 0)));
        assert_eq!(sb_offset(Up, Up, 8), Some((0, 8)));
        assert_eq!(sb_offset(Down, Down, 8), Some((0, -8)));
        assert_eq!(sb_offset(Right, Right, 1), Some((1, 0)));
        assert_eq!(sb_offset(Left, Left, 1), Some((-1, 0)));
    }

    #[test]
    fn loopbacks_have_no_offset() {
        for (a, b) in [(Left, Right), (Right, Left), (Up, Down), (Down, Up)] {
            assert!(is_loopback(a, b));
            assert_eq!(sb_offset(a, b, 4), None);
        }
        assert!(!is_loopback(Left, Left));
        assert!(!is_loopback(Left, Up));
    }

    #[test]
    fn disjoint_cb_few_wires_cover_every_pin_once() {
        let (count, group) = (3, 8);
        for pin in 0..group {
            let drivers = (0..count).filter(|&w| disjoint_cb(w, count, group, pin)).count();
            assert_eq!(drivers, 1, "pin {pin}");
        }
    }

    #[test]
    fn disjoint_cb_many_wires_drive_one_pin_each() {
        let (count, group) = (10, 4);
        for w in 0..count {
            let pins = (0..group).filter(|&p| disjoint_cb(w, count, group, p)).count();
            assert_eq!(pins, 1, "wire {w}");
        }
        for pin in 0..group {
            assert!((0..count).any(|w| disjoint_cb(w, count, group, pin)));
        }
    }

    #[test]
    fn disjoint_sb_gives_every_target_a_driver() {
        for (sc, tc) in [(2, 5), (5, 2), (3, 3), (1, 4), (4, 1)] {
            for t in 0..tc {
                assert!(
                    (0..sc).any(|s| disjoint_sb(s, sc, t, tc)),
                    "source {sc} target {tc} instance {t}"
                );
            }
        }
    }

    #[test]
    fn disjoint_sb_shifts_same_type() {
        // equal counts: target t is fed by source t+1
        assert!(disjoint_sb(1, 4, 0, 4));
        assert!(disjoint_sb(0, 4, 3, 4));
        assert!(!disjoint_sb(0, 4, 0, 4));
    }

    #[test]
    fn twist_partner() {
        assert!(disjoint_twist(1, 0, 2));
        assert!(disjoint_twist(0, 1, 2));
        assert!(!disjoint_twist(0, 0, 2));
        assert!(disjoint_twist(0, 0, 1));
    }
}

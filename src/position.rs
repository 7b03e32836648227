use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateMode {
    /// 1-based, inclusive
    Human,
    /// 0-based, inclusive
    Code,
}

/// A directional match inside a (possibly circular) sequence, stored in
/// 1-based coordinates. On the reverse strand `start > end`; on a circular
/// sequence a forward match may also have `start > end` when it spans the
/// origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionPair {
    pub start: usize,
    pub end: usize,
    pub reverse: bool,
}

impl PositionPair {
    pub fn new(start: usize, end: usize, reverse: bool) -> Self {
        Self {
            start,
            end,
            reverse,
        }
    }

    /// Builds a pair from a 0-based match offset of length `len` in a
    /// sequence of `seq_len` bases. Offsets beyond the end wrap once.
    pub fn from_match(offset: usize, len: usize, seq_len: usize, reverse: bool) -> Self {
        let first = offset % seq_len.max(1) + 1;
        let last = (offset + len.max(1) - 1) % seq_len.max(1) + 1;
        match reverse {
            true => Self::new(last, first, true),
            false => Self::new(first, last, false),
        }
    }

    pub fn coordinates(&self, mode: CoordinateMode, ignore_direction: bool) -> (usize, usize) {
        let (start, end) = if ignore_direction && self.start > self.end {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        };
        match mode {
            CoordinateMode::Human => (start, end),
            CoordinateMode::Code => (start.saturating_sub(1), end.saturating_sub(1)),
        }
    }

    pub fn human_friendly(&self, ignore_direction: bool) -> (usize, usize) {
        self.coordinates(CoordinateMode::Human, ignore_direction)
    }

    pub fn code_friendly(&self, ignore_direction: bool) -> (usize, usize) {
        self.coordinates(CoordinateMode::Code, ignore_direction)
    }

    /// 0-based offset of the leftmost base on the top strand. Unlike the
    /// directionless coordinates this respects origin-spanning matches.
    pub fn leftmost(&self) -> usize {
        match self.reverse {
            true => self.end.saturating_sub(1),
            false => self.start.saturating_sub(1),
        }
    }

    /// Same physical location regardless of which strand reported it.
    pub fn same_location(&self, other: &Self) -> bool {
        self.human_friendly(true) == other.human_friendly(true)
    }
}

/// Orders by directionless start, then end. A forward match spanning the
/// origin, such as `(10, 3)`, sorts by 3 rather than by its leftmost base;
/// use `leftmost()` for top-strand order.
impl Ord for PositionPair {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a_start, a_end) = self.human_friendly(true);
        let (b_start, b_end) = other.human_friendly(true);
        a_start
            .cmp(&b_start)
            .then(a_end.cmp(&b_end))
            .then(self.reverse.cmp(&other.reverse))
    }
}

impl PartialOrd for PositionPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_forward() {
        let pair = PositionPair::new(3, 9, false);
        assert_eq!(pair.human_friendly(false), (3, 9));
        assert_eq!(pair.code_friendly(false), (2, 8));
        assert_eq!(pair.code_friendly(true), (2, 8));
    }

    #[test]
    fn test_coordinates_reverse() {
        let pair = PositionPair::new(9, 3, true);
        assert_eq!(pair.human_friendly(false), (9, 3));
        assert_eq!(pair.human_friendly(true), (3, 9));
        assert_eq!(pair.code_friendly(true), (2, 8));
        assert_eq!(pair.leftmost(), 2);
    }

    #[test]
    fn test_from_match_wraps_origin() {
        let pair = PositionPair::from_match(8, 4, 10, false);
        assert_eq!((pair.start, pair.end), (9, 2));
        assert_eq!(pair.leftmost(), 8);
        let rev = PositionPair::from_match(8, 4, 10, true);
        assert_eq!((rev.start, rev.end), (2, 9));
        assert_eq!(rev.leftmost(), 8);
    }

    #[test]
    fn test_sort_by_directionless_start() {
        let mut pairs = vec![
            PositionPair::new(20, 14, true),
            PositionPair::new(1, 7, false),
            PositionPair::new(14, 18, false),
        ];
        pairs.sort();
        assert_eq!(pairs[0], PositionPair::new(1, 7, false));
        assert_eq!(pairs[1], PositionPair::new(14, 18, false));
        assert_eq!(pairs[2], PositionPair::new(20, 14, true));
    }

    #[test]
    fn test_origin_spanning_sorts_by_lower_coordinate() {
        let spanning = PositionPair::new(10, 3, false);
        let inner = PositionPair::new(5, 8, false);
        assert!(spanning < inner);
        assert!(spanning.leftmost() > inner.leftmost());
    }

    #[test]
    fn test_same_location_across_strands() {
        let fwd = PositionPair::new(4, 9, false);
        let rev = PositionPair::new(9, 4, true);
        assert!(fwd.same_location(&rev));
        assert!(!fwd.same_location(&PositionPair::new(5, 10, false)));
    }
}

//! Inclusive minute interval.

use std::fmt;

/// Minutes `start..=end` of one day. Always `start <= end`: outside this
/// crate a span can only come from [`MinuteSpan::new`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct MinuteSpan {
    pub(crate) start: u32,
    pub(crate) end:   u32,
}

impl MinuteSpan {
    /// Build a span; reversed bounds are swapped.
    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    #[inline]
    pub fn start(self) -> u32 {
        self.start
    }

    #[inline]
    pub fn end(self) -> u32 {
        self.end
    }

    /// Number of minutes covered (both ends inclusive).
    #[inline]
    pub fn duration(self) -> u32 {
        self.end - self.start + 1
    }

    /// Midpoint, rounded down.
    #[inline]
    pub fn middle(self) -> u32 {
        self.start + (self.end - self.start) / 2
    }

    #[inline]
    pub fn contains(self, minute: u32) -> bool {
        (self.start..=self.end).contains(&minute)
    }

    #[inline]
    pub fn overlaps(self, other: MinuteSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Minutes shared with `start..=end`, or 0.
    #[inline]
    pub(crate) fn overlap_len(self, start: u32, end: u32) -> u32 {
        let s = self.start.max(start);
        let e = self.end.min(end);
        if s <= e { e - s + 1 } else { 0 }
    }
}

impl fmt::Display for MinuteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

//! Day-activity patterns: how many tours and intermediate stops a person
//! makes for each tour purpose.
//!
//! Pattern-choice models care only about *which* purposes appear, not how
//! often.  [`DayPattern::flags`] is the explicit normalization step that
//! collapses any count ≥ 1 to "present"; the resulting [`PatternFlags`] is
//! the key used for comparison and hashing.

use tdm_core::Purpose;

/// Number of purposes that can own a tour or a stop.
pub const TOUR_PURPOSE_COUNT: usize = Purpose::TOUR_PURPOSES.len();

const MAX_TOUR_PURPOSES: u32 = 3;
const MAX_STOP_PURPOSES: u32 = 4;
const MAX_TOTAL_PURPOSES: u32 = 5;

/// Raw tour and stop counts for one person-day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DayPattern {
    tours: [u32; TOUR_PURPOSE_COUNT],
    stops: [u32; TOUR_PURPOSE_COUNT],
}

/// Presence of each purpose as a tour and as a stop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternFlags {
    pub tours: [bool; TOUR_PURPOSE_COUNT],
    pub stops: [bool; TOUR_PURPOSE_COUNT],
}

impl DayPattern {
    /// Counts indexed by [`Purpose::TOUR_PURPOSES`] order.
    pub fn new(tours: [u32; TOUR_PURPOSE_COUNT], stops: [u32; TOUR_PURPOSE_COUNT]) -> Self {
        Self { tours, stops }
    }

    /// Tours for `purpose`; always 0 for `NoneOrHome`.
    pub fn tours(&self, purpose: Purpose) -> u32 {
        purpose.tour_index().map_or(0, |i| self.tours[i])
    }

    /// Intermediate stops for `purpose`; always 0 for `NoneOrHome`.
    pub fn stops(&self, purpose: Purpose) -> u32 {
        purpose.tour_index().map_or(0, |i| self.stops[i])
    }

    /// Set the tour count for `purpose`.  Ignored for `NoneOrHome`.
    pub fn set_tours(&mut self, purpose: Purpose, count: u32) {
        if let Some(i) = purpose.tour_index() {
            self.tours[i] = count;
        }
    }

    /// Set the stop count for `purpose`.  Ignored for `NoneOrHome`.
    pub fn set_stops(&mut self, purpose: Purpose, count: u32) {
        if let Some(i) = purpose.tour_index() {
            self.stops[i] = count;
        }
    }

    pub fn total_tours(&self) -> u32 {
        self.tours.iter().sum()
    }

    pub fn total_stops(&self) -> u32 {
        self.stops.iter().sum()
    }

    /// Collapse counts to presence flags.
    pub fn flags(&self) -> PatternFlags {
        PatternFlags {
            tours: self.tours.map(|n| n > 0),
            stops: self.stops.map(|n| n > 0),
        }
    }

    /// `true` when both patterns make the same set of purposes.
    pub fn same_purposes(&self, other: &DayPattern) -> bool {
        self.flags() == other.flags()
    }
}

impl From<PatternFlags> for DayPattern {
    fn from(flags: PatternFlags) -> Self {
        Self {
            tours: flags.tours.map(u32::from),
            stops: flags.stops.map(u32::from),
        }
    }
}

impl PatternFlags {
    pub fn tour_purposes(&self) -> u32 {
        self.tours.iter().filter(|&&b| b).count() as u32
    }

    pub fn stop_purposes(&self) -> u32 {
        self.stops.iter().filter(|&&b| b).count() as u32
    }

    pub fn has_tour(&self, purpose: Purpose) -> bool {
        purpose.tour_index().is_some_and(|i| self.tours[i])
    }

    pub fn has_stop(&self, purpose: Purpose) -> bool {
        purpose.tour_index().is_some_and(|i| self.stops[i])
    }

    /// Whether a pattern-choice model may offer this combination.
    ///
    /// - at most 3 tour purposes, 4 stop purposes and 5 in total;
    /// - stops require at least one tour;
    /// - work or school stops require a work or school tour, and at most one
    ///   of the two appears as a stop.
    pub fn is_feasible(&self) -> bool {
        let tours = self.tour_purposes();
        let stops = self.stop_purposes();
        if tours > MAX_TOUR_PURPOSES || stops > MAX_STOP_PURPOSES || tours + stops > MAX_TOTAL_PURPOSES {
            return false;
        }
        if stops.min(1) > tours {
            return false;
        }

        let mandatory_tours = u32::from(self.has_tour(Purpose::Work)) + u32::from(self.has_tour(Purpose::School));
        let mandatory_stops = u32::from(self.has_stop(Purpose::Work)) + u32::from(self.has_stop(Purpose::School));
        mandatory_stops.min(1) <= mandatory_tours && mandatory_stops <= 1
    }

    /// Every feasible combination, in ascending bit order (tours in the low
    /// bits).  The empty stay-home pattern comes first.
    pub fn feasible_patterns() -> Vec<PatternFlags> {
        let bits = 2 * TOUR_PURPOSE_COUNT;
        (0u32..1 << bits)
            .map(Self::from_bits)
            .filter(Self::is_feasible)
            .collect()
    }

    fn from_bits(bits: u32) -> Self {
        let mut flags = Self::default();
        for i in 0..TOUR_PURPOSE_COUNT {
            flags.tours[i] = bits & (1 << i) != 0;
            flags.stops[i] = bits & (1 << (i + TOUR_PURPOSE_COUNT)) != 0;
        }
        flags
    }
}

//! Per person-day minute-resolution availability tracker.
//!
//! A `TimeWindow` keeps two sorted lists:
//!
//! - `busy`: committed spans, kept disjoint and non-adjacent by merging on
//!   every reservation;
//! - `available`: the complement of `busy` over `[1, minutes_in_day]`,
//!   recomputed after every mutation so queries never rescan minutes.
//!
//! Both lists stay short (a handful of tours per day) so linear scans beat
//! anything cleverer.

use tdm_core::RandomStream;

use crate::{MinuteSpan, ScheduleError, ScheduleResult};

/// Minutes in a standard simulated day.
pub const DEFAULT_MINUTES_IN_DAY: u32 = 1440;

/// Which side of an anchor minute [`TimeWindow::available_window`] looks at.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Before,
    After,
    Both,
}

/// Skew applied by [`TimeWindow::get_available_minute`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Bias {
    /// Uniform over the span.
    #[default]
    Neutral,
    /// Density falls off toward the end of the span.
    Low,
    /// Density falls off toward the start of the span.
    High,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    minutes_in_day: u32,
    busy:           Vec<MinuteSpan>,
    available:      Vec<MinuteSpan>,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MINUTES_IN_DAY)
    }
}

impl TimeWindow {
    /// An entirely free day of `minutes_in_day` minutes.
    pub fn new(minutes_in_day: u32) -> Self {
        let mut window = Self {
            minutes_in_day,
            busy:      Vec::new(),
            available: Vec::new(),
        };
        window.refresh_available();
        window
    }

    #[inline]
    pub fn minutes_in_day(&self) -> u32 {
        self.minutes_in_day
    }

    /// Committed spans, sorted by start.
    #[inline]
    pub fn busy_spans(&self) -> &[MinuteSpan] {
        &self.busy
    }

    /// Free spans, sorted by start.
    #[inline]
    pub fn available_spans(&self) -> &[MinuteSpan] {
        &self.available
    }

    // ── Mutators ──────────────────────────────────────────────────────────

    /// Commit minutes `inclusive_start..exclusive_end`.
    ///
    /// Reversed bounds cover the same number of minutes ending just before
    /// `inclusive_start`.  A zero-length span is a no-op.  Spans reaching
    /// outside `[1, minutes_in_day]` are rejected and leave the window
    /// untouched.
    pub fn reserve(&mut self, inclusive_start: u32, exclusive_end: u32) -> ScheduleResult<()> {
        let duration = inclusive_start.abs_diff(exclusive_end);
        if duration == 0 {
            return Ok(());
        }
        let start = inclusive_start.min(exclusive_end);
        self.reserve_span(MinuteSpan { start, end: start + duration - 1 })
    }

    /// Commit an inclusive span.
    pub fn reserve_span(&mut self, span: MinuteSpan) -> ScheduleResult<()> {
        if span.start < 1 || span.end > self.minutes_in_day {
            return Err(ScheduleError::SpanOutOfRange {
                start:          span.start,
                end:            span.end,
                minutes_in_day: self.minutes_in_day,
            });
        }
        self.merge_busy(span);
        self.refresh_available();
        Ok(())
    }

    /// Mark every minute busy in `other` as busy here too (e.g. fold a
    /// sub-tour's window back into its parent's).  Spans past this window's
    /// horizon are clipped.
    pub fn incorporate(&mut self, other: &TimeWindow) {
        for span in &other.busy {
            let end = span.end.min(self.minutes_in_day);
            if end < span.end {
                log::debug!("incorporate: clipping {span} to {} minutes", self.minutes_in_day);
            }
            if span.start <= end {
                self.merge_busy(MinuteSpan { start: span.start, end });
            }
        }
        self.refresh_available();
    }

    /// Free the whole day (start of a new simulation day).
    pub fn reset(&mut self) {
        self.busy.clear();
        self.refresh_available();
    }

    fn merge_busy(&mut self, span: MinuteSpan) {
        let mut merged = span;
        let mut inserted = false;
        let mut out = Vec::with_capacity(self.busy.len() + 1);

        for &busy in &self.busy {
            if busy.end + 1 < merged.start {
                out.push(busy);
            } else if merged.end + 1 < busy.start {
                if !inserted {
                    out.push(merged);
                    inserted = true;
                }
                out.push(busy);
            } else {
                // Overlapping or adjacent: absorb.
                merged = MinuteSpan {
                    start: merged.start.min(busy.start),
                    end:   merged.end.max(busy.end),
                };
            }
        }
        if !inserted {
            out.push(merged);
        }
        self.busy = out;
    }

    fn refresh_available(&mut self) {
        self.available.clear();
        let mut next = 1;
        for busy in &self.busy {
            if busy.start > next {
                self.available.push(MinuteSpan { start: next, end: busy.start - 1 });
            }
            next = busy.end + 1;
        }
        if next <= self.minutes_in_day {
            self.available.push(MinuteSpan { start: next, end: self.minutes_in_day });
        }
        debug_assert!(self.is_consistent());
    }

    /// Busy spans are sorted, disjoint and non-adjacent, and no available
    /// span touches a busy one.
    pub(crate) fn is_consistent(&self) -> bool {
        let sorted = self.busy.windows(2).all(|w| w[0].end + 1 < w[1].start);
        let disjoint = self
            .busy
            .iter()
            .all(|b| self.available.iter().all(|a| !a.overlaps(*b)));
        sorted && disjoint
    }

    // ── Range queries ─────────────────────────────────────────────────────

    #[inline]
    fn in_range(&self, minute: u32) -> bool {
        (1..=self.minutes_in_day).contains(&minute)
    }

    fn containing(&self, minute: u32) -> Option<MinuteSpan> {
        self.available.iter().copied().find(|a| a.contains(minute))
    }

    /// Free minutes within `inclusive_start..=inclusive_end` (bounds in
    /// either order).  Zero when either bound is outside the day.
    pub fn total_available_minutes(&self, inclusive_start: u32, inclusive_end: u32) -> u32 {
        if !self.in_range(inclusive_start) || !self.in_range(inclusive_end) {
            return 0;
        }
        let (s, e) = ordered(inclusive_start, inclusive_end);
        self.available.iter().map(|a| a.overlap_len(s, e)).sum()
    }

    /// `true` when every minute of the span is free.
    pub fn entire_span_is_available(&self, inclusive_start: u32, inclusive_end: u32) -> bool {
        if !self.in_range(inclusive_start) || !self.in_range(inclusive_end) {
            return false;
        }
        let (s, e) = ordered(inclusive_start, inclusive_end);
        self.total_available_minutes(s, e) == e - s + 1
    }

    /// `true` when `minute` falls in a committed span.
    pub fn is_busy(&self, minute: u32) -> bool {
        self.busy.iter().any(|b| b.contains(minute))
    }

    // ── Anchor queries ────────────────────────────────────────────────────

    /// Contiguous free minutes ending at `minute - 1`.
    pub fn adjacent_available_minutes_before(&self, minute: u32) -> u32 {
        let Some(previous) = minute.checked_sub(1) else {
            return 0;
        };
        self.containing(previous).map_or(0, |a| previous - a.start + 1)
    }

    /// Contiguous free minutes starting at `minute + 1`.
    pub fn adjacent_available_minutes_after(&self, minute: u32) -> u32 {
        let next = minute.saturating_add(1);
        self.containing(next).map_or(0, |a| a.end - next + 1)
    }

    /// The free span containing `minute`, cut to end at `minute`.
    pub fn adjacent_available_window_before(&self, minute: u32) -> Option<MinuteSpan> {
        self.containing(minute).map(|a| MinuteSpan { start: a.start, end: minute })
    }

    /// The free span containing `minute`, cut to start at `minute`.
    pub fn adjacent_available_window_after(&self, minute: u32) -> Option<MinuteSpan> {
        self.containing(minute).map(|a| MinuteSpan { start: minute, end: a.end })
    }

    /// Contiguous free minutes reachable from `minute` going `direction`.
    /// `Both` adds the two sides; `minute` itself is never counted.
    pub fn available_window(&self, minute: u32, direction: Direction) -> u32 {
        match direction {
            Direction::Before => self.adjacent_available_minutes_before(minute),
            Direction::After  => self.adjacent_available_minutes_after(minute),
            Direction::Both   => {
                self.adjacent_available_minutes_before(minute)
                    + self.adjacent_available_minutes_after(minute)
            }
        }
    }

    /// Free spans (clipped) lying strictly before `minute`.
    fn spans_before(&self, minute: u32) -> impl Iterator<Item = MinuteSpan> + '_ {
        let previous = minute.checked_sub(1);
        self.available.iter().filter_map(move |&a| {
            let previous = previous?;
            if a.contains(previous) {
                Some(MinuteSpan { start: a.start, end: previous })
            } else if a.end <= previous {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Free spans (clipped) lying strictly after `minute`.
    fn spans_after(&self, minute: u32) -> impl Iterator<Item = MinuteSpan> + '_ {
        let next = minute.saturating_add(1);
        self.available.iter().filter_map(move |&a| {
            if a.contains(next) {
                Some(MinuteSpan { start: next, end: a.end })
            } else if a.start >= next {
                Some(a)
            } else {
                None
            }
        })
    }

    pub fn total_available_minutes_before(&self, minute: u32) -> u32 {
        self.spans_before(minute).map(MinuteSpan::duration).sum()
    }

    pub fn total_available_minutes_after(&self, minute: u32) -> u32 {
        self.spans_after(minute).map(MinuteSpan::duration).sum()
    }

    /// Longest single free stretch before `minute`.
    pub fn max_available_minutes_before(&self, minute: u32) -> u32 {
        self.spans_before(minute).map(MinuteSpan::duration).max().unwrap_or(0)
    }

    /// Longest single free stretch after `minute`.
    pub fn max_available_minutes_after(&self, minute: u32) -> u32 {
        self.spans_after(minute).map(MinuteSpan::duration).max().unwrap_or(0)
    }

    /// Longest free span that starts at least `time_to` before
    /// `arrival_period_end`, ends at least `time_from` after
    /// `departure_period_start`, and is long enough to hold
    /// `time_to + min_activity_duration + time_from`.
    pub fn longest_available_feasible_window(
        &self,
        arrival_period_end:     u32,
        departure_period_start: u32,
        time_to:                f64,
        time_from:              f64,
        min_activity_duration:  u32,
    ) -> Option<MinuteSpan> {
        let needed = time_to + min_activity_duration as f64 + time_from;
        let mut best = None;
        let mut longest = 0;

        for &a in &self.available {
            let (s, e) = (a.start as f64, a.end as f64);
            let feasible = s + time_to <= arrival_period_end as f64
                && e - time_from >= departure_period_start as f64
                && e - s >= needed;
            if feasible && a.end - a.start > longest {
                longest = a.end - a.start;
                best = Some(a);
            }
        }
        best
    }

    // ── Random draws ──────────────────────────────────────────────────────

    /// Draw a free minute from the first free span overlapping
    /// `inclusive_start..=end` (bounds in either order), skewed by `bias`.
    ///
    /// `None` when a bound is outside the day or nothing in range is free.
    pub fn get_available_minute(
        &self,
        stream:          &mut RandomStream,
        inclusive_start: u32,
        end:             u32,
        bias:            Bias,
    ) -> Option<u32> {
        if !self.in_range(inclusive_start) || !self.in_range(end) {
            return None;
        }
        let (lo, hi) = ordered(inclusive_start, end);
        let a = self.available.iter().find(|a| lo <= a.end && hi >= a.start)?;

        let s = lo.max(a.start) as f64;
        let e = hi.min(a.end) as f64;
        let random = stream.uniform01();
        let range = random * (e - s);

        let minute = match bias {
            Bias::Neutral => s + range,
            Bias::Low     => s + random * range,
            Bias::High    => e - random * range,
        };
        Some(minute.round() as u32)
    }

    /// Draw a `(start, end)` pair with `start` in period 1 and `end` in
    /// period 2.  When the two periods coincide the start is skewed early
    /// and the end is drawn after it, skewed late.
    pub fn get_minute_span(
        &self,
        stream:   &mut RandomStream,
        p1_start: u32,
        p1_end:   u32,
        p2_start: u32,
        p2_end:   u32,
    ) -> Option<MinuteSpan> {
        let same_period = p1_start == p2_start && p1_end == p2_end;

        let start = if same_period {
            self.get_available_minute(stream, p1_start, p1_end, Bias::Low)?
        } else {
            self.get_available_minute(stream, p1_start, p1_end, Bias::Neutral)?
        };
        if !between(start, p1_start, p1_end) {
            return None;
        }

        let end = if same_period {
            self.get_available_minute(stream, start, p2_end, Bias::High)?
        } else {
            self.get_available_minute(stream, p2_start, p2_end, Bias::Neutral)?
        };
        if !between(end, p2_start, p2_end) || end < start {
            return None;
        }
        Some(MinuteSpan { start, end })
    }
}

#[inline]
fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

#[inline]
fn between(value: u32, a: u32, b: u32) -> bool {
    let (lo, hi) = ordered(a, b);
    (lo..=hi).contains(&value)
}

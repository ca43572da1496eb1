//! `tdm-schedule` — person-day time windows and day-activity patterns.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | [`span`]    | `MinuteSpan` (inclusive minute interval)                   |
//! | [`window`]  | `TimeWindow`, `Direction`, `Bias`                          |
//! | [`pattern`] | `DayPattern`, `PatternFlags`                               |
//! | [`error`]   | `ScheduleError`, `ScheduleResult<T>`                       |
//!
//! # Time model (summary)
//!
//! Minutes are numbered `1..=minutes_in_day`.  A `TimeWindow` is owned by one
//! person-day (or one parent tour) and only ever written by the thread
//! processing that household:
//!
//! ```text
//! busy       = sorted, disjoint, non-adjacent inclusive spans
//! available  = complement of busy over [1, minutes_in_day]
//! reserve(s, e) merges [s, e) into busy and recomputes available
//! ```
//!
//! Every query is read-only; `reserve`, `incorporate` and `reset` are the
//! only mutators.

pub mod error;
pub mod pattern;
pub mod span;
pub mod window;


pub use error::{ScheduleError, ScheduleResult};
pub use pattern::{DayPattern, PatternFlags};
pub use span::MinuteSpan;
pub use window::{Bias, Direction, TimeWindow};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("span [{start}, {end}] lies outside minutes 1..={minutes_in_day}")]
    SpanOutOfRange { start: u32, end: u32, minutes_in_day: u32 },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

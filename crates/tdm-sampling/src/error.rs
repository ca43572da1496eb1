use thiserror::Error;

use tdm_core::{ParcelId, SegmentId, ZoneId};

#[derive(Debug, Error, PartialEq)]
pub enum SamplingError {
    /// Every attempt for one draw came back empty.  The anchor's segment
    /// totals are carried for diagnosis.
    #[error("sampling exhausted from anchor {anchor}: total weight {total_weight}, total size {total_size}")]
    SamplingExhausted { anchor: ParcelId, total_weight: f64, total_size: f64 },

    #[error("{0} is not part of the sampling universe")]
    UnknownParcel(ParcelId),

    #[error("{0} is not part of the sampling universe")]
    UnknownZone(ZoneId),

    /// A parcel was located twice while building the universe.
    #[error("{0} is added to the sampling universe more than once")]
    DuplicateParcel(ParcelId),

    #[error("{0} was never built")]
    UnknownSegment(SegmentId),

    /// A tour sampler has no origin, or a stop sampler lacks one of its
    /// two anchors.
    #[error("sampler has no {0} parcel")]
    MissingAnchor(&'static str),

    #[error("estimation-mode sampling needs the chosen parcel")]
    ChosenParcelMissing,

    /// The observed destination is the parcel the draws are anchored at.
    #[error("chosen parcel {0} is the origin")]
    ChosenIsOrigin(ParcelId),

    #[error("segment {segment}: weight factor {weight_factor} must be positive")]
    InvalidWeightFactor { segment: SegmentId, weight_factor: f64 },
}

pub type SamplingResult<T> = Result<T, SamplingError>;

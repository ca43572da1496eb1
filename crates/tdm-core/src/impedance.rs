//! Read-only skim/impedance lookup consumed by the sampler and by models.

use crate::{Mode, ParcelId, PathType};

/// Result of one impedance lookup.
///
/// `variable` is the requested measure (time, cost, …); `blend_variable` is
/// the companion measure some skims carry alongside it (usually distance).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SkimValue {
    pub variable:       f64,
    pub blend_variable: f64,
}

/// Zone/parcel skim lookup.
///
/// Implementations are in-memory and immutable during a simulation pass, so
/// the trait requires `Send + Sync` and takes `&self`.
pub trait ImpedanceLookup: Send + Sync {
    /// Look up `variable` (e.g. `"ivtime"`, `"distance"`) for travel by `mode`
    /// over `path_type` departing at minute `time` from `origin` to
    /// `destination`.
    fn value(
        &self,
        variable:    &str,
        mode:        Mode,
        path_type:   PathType,
        time:        u32,
        origin:      ParcelId,
        destination: ParcelId,
    ) -> SkimValue;
}

//! Kernel configuration.
//!
//! Loaded from JSON by the application and passed down by reference inside
//! the simulation context.  Every field has a default so a config file only
//! needs to name what it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DestinationScale, KernelError, KernelResult};

/// Estimation-tooling toggles for the "oddball" (stay-at-home / no-location)
/// alternative of location choice models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddballConfig {
    /// Nest the oddball alternative with the sampled locations.
    pub nested: bool,
    /// In estimation mode, force the oddball unavailable and drop its nesting
    /// so a conditional MNL over locations can be estimated.
    pub unavailable_in_estimation: bool,
}

impl Default for OddballConfig {
    fn default() -> Self {
        Self { nested: true, unavailable_in_estimation: true }
    }
}

/// Tolerances for the between-pass shadow-price update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowPriceConfig {
    pub enabled:            bool,
    /// Parcels with a target below this are priced at the zone level.
    pub parcel_threshold:   f64,
    pub percent_tolerance:  f64,
    pub absolute_tolerance: f64,
}

impl Default for ShadowPriceConfig {
    fn default() -> Self {
        Self {
            enabled:            false,
            parcel_threshold:   0.0,
            percent_tolerance:  0.0,
            absolute_tolerance: 0.0,
        }
    }
}

/// Top-level kernel configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Master seed.  The same seed always produces identical results.
    pub seed: u64,

    /// Worker slots (one calculator set each).  `None` uses all logical cores.
    pub num_threads: Option<usize>,

    /// Households handed to a worker at a time.
    pub households_per_batch: usize,

    /// Time-window horizon in minutes.
    pub minutes_in_day: u32,

    /// Engines record observations for external estimation.
    pub is_in_estimation_mode: bool,

    /// Tally observed-vs-predicted outcomes while simulating.
    pub test_estimation_in_application_mode: bool,

    pub destination_scale: DestinationScale,

    /// Parcels smaller than this are never drawn and never count toward a
    /// zone's total size.
    pub min_parcel_size: f64,

    /// Retries per draw before the sampler reports exhaustion.
    pub max_sampling_attempts: u32,

    /// Magnitude at which [`clamp_utility`][Self::clamp_utility] caps
    /// generalized-time style terms.
    pub utility_bound: f64,

    pub oddball: OddballConfig,

    pub shadow_pricing: ShadowPriceConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            seed:                                1,
            num_threads:                         None,
            households_per_batch:                256,
            minutes_in_day:                      1440,
            is_in_estimation_mode:               false,
            test_estimation_in_application_mode: false,
            destination_scale:                   DestinationScale::Parcel,
            min_parcel_size:                     0.0,
            max_sampling_attempts:               1000,
            utility_bound:                       80.0,
            oddball:                             OddballConfig::default(),
            shadow_pricing:                      ShadowPriceConfig::default(),
        }
    }
}

impl KernelConfig {
    pub fn from_json_str(json: &str) -> KernelResult<Self> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: &Path) -> KernelResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> KernelResult<()> {
        if self.minutes_in_day == 0 {
            return Err(KernelError::Config("minutes_in_day must be positive".into()));
        }
        if self.households_per_batch == 0 {
            return Err(KernelError::Config("households_per_batch must be positive".into()));
        }
        if self.max_sampling_attempts == 0 {
            return Err(KernelError::Config("max_sampling_attempts must be positive".into()));
        }
        if self.num_threads == Some(0) {
            return Err(KernelError::Config("num_threads must be positive when set".into()));
        }
        if self.utility_bound.is_nan() || self.utility_bound <= 0.0 {
            return Err(KernelError::Config("utility_bound must be positive".into()));
        }
        Ok(())
    }

    /// Worker slot count after resolving `None` to the available parallelism.
    pub fn worker_count(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        })
    }

    /// Cap a utility term to `±utility_bound`.
    ///
    /// Models apply this to generalized-time terms before adding them; the
    /// engine itself never clamps (it evaluates with log-sum-exp).
    #[inline]
    pub fn clamp_utility(&self, value: f64) -> f64 {
        value.clamp(-self.utility_bound, self.utility_bound)
    }
}

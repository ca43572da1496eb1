//! Closed enums for travel modes, network path types, activity purposes and
//! destination sampling granularity.
//!
//! These replace integer codes at every boundary.  Each enum has a stable
//! lowercase label (`as_str`) used in CSV output and JSON configuration.

use serde::{Deserialize, Serialize};

/// Means of travel for a tour or trip.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Walk,
    Bike,
    /// Single-occupant vehicle.
    Sov,
    /// Shared ride, two occupants.
    Hov2,
    /// Shared ride, three or more occupants.
    Hov3,
    Transit,
    ParkAndRide,
    SchoolBus,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Walk,
        Mode::Bike,
        Mode::Sov,
        Mode::Hov2,
        Mode::Hov3,
        Mode::Transit,
        Mode::ParkAndRide,
        Mode::SchoolBus,
    ];

    /// `true` for modes that use the auto network.
    #[inline]
    pub fn is_auto(self) -> bool {
        matches!(self, Mode::Sov | Mode::Hov2 | Mode::Hov3)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Walk        => "walk",
            Mode::Bike        => "bike",
            Mode::Sov         => "sov",
            Mode::Hov2        => "hov2",
            Mode::Hov3        => "hov3",
            Mode::Transit     => "transit",
            Mode::ParkAndRide => "park_and_ride",
            Mode::SchoolBus   => "school_bus",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network path type used for an impedance lookup.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    #[default]
    FullNetwork,
    NoTolls,
    LocalBus,
    LightRail,
    PremiumBus,
    CommuterRail,
    Ferry,
}

impl PathType {
    pub fn as_str(self) -> &'static str {
        match self {
            PathType::FullNetwork  => "full_network",
            PathType::NoTolls      => "no_tolls",
            PathType::LocalBus     => "local_bus",
            PathType::LightRail    => "light_rail",
            PathType::PremiumBus   => "premium_bus",
            PathType::CommuterRail => "commuter_rail",
            PathType::Ferry        => "ferry",
        }
    }
}

impl std::fmt::Display for PathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity purpose at a tour or trip destination.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    NoneOrHome,
    Work,
    School,
    Escort,
    PersonalBusiness,
    Shopping,
    Meal,
    Social,
}

impl Purpose {
    /// Purposes that can head a tour or appear as an intermediate stop, in
    /// day-pattern order.
    pub const TOUR_PURPOSES: [Purpose; 7] = [
        Purpose::Work,
        Purpose::School,
        Purpose::Escort,
        Purpose::PersonalBusiness,
        Purpose::Shopping,
        Purpose::Meal,
        Purpose::Social,
    ];

    /// Position in [`TOUR_PURPOSES`][Self::TOUR_PURPOSES]; `None` for
    /// `NoneOrHome`.
    pub fn tour_index(self) -> Option<usize> {
        Self::TOUR_PURPOSES.iter().position(|&p| p == self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::NoneOrHome       => "none_or_home",
            Purpose::Work             => "work",
            Purpose::School           => "school",
            Purpose::Escort           => "escort",
            Purpose::PersonalBusiness => "personal_business",
            Purpose::Shopping         => "shopping",
            Purpose::Meal             => "meal",
            Purpose::Social           => "social",
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial unit that destination choice alternatives represent.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationScale {
    /// Individual parcels, drawn zone-then-parcel.
    #[default]
    Parcel,
    /// Micro-zones stored as parcels; the origin parcel is never excluded.
    MicroZone,
    /// Whole zones, each represented by its key parcel.
    Zone,
}

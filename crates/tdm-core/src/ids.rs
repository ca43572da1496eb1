//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  Coefficient ids in particular are an
//! opaque key: they are never mixed with `Mode`/`Purpose` values and support
//! no arithmetic.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID".
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline(always)]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// A household, person, person-day, tour or trip: whatever owns a decision.
    pub struct EntityId(u32);
}

typed_id! {
    /// Key into a model's [`CoefficientTable`][crate::CoefficientTable].
    pub struct CoefficientId(u16);
}

typed_id! {
    /// Label of a nest in a nested-logit tree.
    pub struct NestId(u16);
}

typed_id! {
    /// Index of a shared utility (or size) component within one calculator.
    pub struct ComponentId(u16);
}

typed_id! {
    /// Index of a parcel in the land-use universe.
    pub struct ParcelId(u32);
}

typed_id! {
    /// Index of a zone (TAZ or micro-zone) in the land-use universe.
    pub struct ZoneId(u32);
}

typed_id! {
    /// Sampling segment (purpose × priority × mode × person-type bucket).
    pub struct SegmentId(u16);
}

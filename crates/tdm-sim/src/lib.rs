//! `tdm-sim` — household batch runner for the travel-demand choice kernel.
//!
//! # Pass structure
//!
//! ```text
//! for round in batches.chunks(slot_count):
//!   ① Simulate — batch i of the round runs on worker slot i
//!                (parallel with the `parallel` feature).
//!                Each household: HouseholdModel::simulate_household
//!                with the read-only SimulationContext and the slot's
//!                calculators.  An Err abandons that household only.
//!   ② Report   — outcomes go to the RunObserver in input order.
//! end of pass: estimation summaries (estimation mode), PassStats.
//! ```
//!
//! Between passes the caller may update [`ShadowPrices`] from a
//! [`PredictionCounter`] and install them with
//! [`Sim::set_shadow_prices`].
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the batches of a round on Rayon's thread pool.    |
//! | `fx-hash`  | FxHashMap for parcel-keyed maps.                       |

pub mod builder;
pub mod context;
pub mod error;
pub mod model;
pub mod observer;
pub mod pool;
pub mod shadow;
pub mod sim;


pub use builder::SimBuilder;
pub use context::SimulationContext;
pub use error::{SimError, SimResult};
pub use model::{ChoiceRecord, HouseholdModel, HouseholdOutcome, InvalidDayReason, PersonDay};
pub use observer::{NoopObserver, PassStats, RunObserver};
pub use pool::{ModelHandle, ParallelCalculatorPool, WorkerSlot};
pub use shadow::{PredictionCounter, ShadowPriceChange, ShadowPriceInput, ShadowPrices};
pub use sim::Sim;

//! Read-only state shared by every household in a pass.

use std::sync::Arc;

use tdm_choice::{NoAdjustments, RegionAdjustments};
use tdm_core::{EntityId, ImpedanceLookup, KernelConfig, RandomStream};
use tdm_sampling::SamplingUniverse;

use crate::ShadowPrices;

/// Configuration and reference tables for one simulation pass.
///
/// Built once per run and passed by reference to every
/// [`HouseholdModel`][crate::HouseholdModel] call.  Nothing in here changes
/// while a pass is running; shadow prices are swapped between passes with
/// [`Sim::set_shadow_prices`][crate::Sim::set_shadow_prices].
pub struct SimulationContext {
    config:        KernelConfig,
    impedance:     Arc<dyn ImpedanceLookup>,
    universe:      Option<Arc<SamplingUniverse>>,
    adjustments:   Arc<dyn RegionAdjustments>,
    shadow_prices: ShadowPrices,
}

impl SimulationContext {
    pub fn new(config: KernelConfig, impedance: Arc<dyn ImpedanceLookup>) -> Self {
        Self {
            config,
            impedance,
            universe:      None,
            adjustments:   Arc::new(NoAdjustments),
            shadow_prices: ShadowPrices::default(),
        }
    }

    pub fn with_universe(mut self, universe: Arc<SamplingUniverse>) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn with_adjustments(mut self, adjustments: Arc<dyn RegionAdjustments>) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_shadow_prices(mut self, prices: ShadowPrices) -> Self {
        self.shadow_prices = prices;
        self
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn impedance(&self) -> &dyn ImpedanceLookup {
        self.impedance.as_ref()
    }

    /// `None` when the run has no sampled location models.
    #[inline]
    pub fn universe(&self) -> Option<&SamplingUniverse> {
        self.universe.as_deref()
    }

    #[inline]
    pub fn adjustments(&self) -> &dyn RegionAdjustments {
        self.adjustments.as_ref()
    }

    #[inline]
    pub fn shadow_prices(&self) -> &ShadowPrices {
        &self.shadow_prices
    }

    pub(crate) fn set_shadow_prices(&mut self, prices: ShadowPrices) {
        self.shadow_prices = prices;
    }

    /// The stream for `entity` at decision point `offset`.  Independent of
    /// the worker and batch that asks for it.
    #[inline]
    pub fn stream(&self, entity: EntityId, offset: u32) -> RandomStream {
        RandomStream::new(self.config.seed, entity, offset)
    }
}

//! Fluent builder for constructing a [`Sim`].

use crate::{HouseholdModel, ParallelCalculatorPool, Sim, SimError, SimResult, SimulationContext};

/// Fluent builder for [`Sim<M>`].
///
/// # Required inputs
///
/// - [`SimulationContext`] — configuration and reference tables
/// - [`ParallelCalculatorPool`] — with every model the household model uses
///   already registered
/// - `M: HouseholdModel`
///
/// # Optional inputs
///
/// | Method            | Default            |
/// |-------------------|--------------------|
/// | `.households(v)`  | no households      |
///
/// ```rust,ignore
/// let mut pool = ParallelCalculatorPool::new(ctx.config());
/// let destination = pool.register("destination", coefficients);
/// let mut sim = SimBuilder::new(ctx, pool, ToyModel { destination })
///     .households(households)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<M: HouseholdModel> {
    context:    SimulationContext,
    pool:       ParallelCalculatorPool,
    model:      M,
    households: Vec<M::Household>,
}

impl<M: HouseholdModel> SimBuilder<M> {
    pub fn new(context: SimulationContext, pool: ParallelCalculatorPool, model: M) -> Self {
        Self { context, pool, model, households: Vec::new() }
    }

    pub fn households(mut self, households: Vec<M::Household>) -> Self {
        self.households = households;
        self
    }

    /// Validate the configuration and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim<M>> {
        self.context.config().validate()?;
        if self.pool.model_count() == 0 {
            return Err(SimError::Config("no models registered with the calculator pool".into()));
        }

        let mut ids: Vec<_> = self.households.iter().map(|h| self.model.household_id(h)).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(SimError::InvalidInput(format!("household {} appears more than once", pair[0])));
        }

        Ok(Sim {
            context:    self.context,
            pool:       self.pool,
            model:      self.model,
            households: self.households,
            pass:       0,
        })
    }
}

//! Per-worker calculator sets.
//!
//! Every worker slot owns one primary and one nested
//! [`ChoiceProbabilityCalculator`] per registered model, so no calculator is
//! ever shared between threads.  The nested set serves calculators invoked
//! while another model is being built (a mode-choice logsum feeding a
//! destination utility, say) without disturbing the outer one.
//!
//! ```text
//! pool
//!  ├── slot 0 ── primary[model] ── nested[model]
//!  ├── slot 1 ── primary[model] ── nested[model]
//!  └── …
//! ```
//!
//! Batches are assigned round-robin: batch `b` runs on slot
//! `b % slot_count`.

use std::fmt;
use std::sync::Arc;

use tdm_choice::{ChoiceProbabilityCalculator, EstimationSummary, ObservedTally};
use tdm_core::{CoefficientTable, EntityId, KernelConfig};

use crate::{SimError, SimResult};

/// Opaque key of a model registered with the pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(usize);

impl ModelHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelHandle({})", self.0)
    }
}

// ── WorkerSlot ────────────────────────────────────────────────────────────────

pub struct WorkerSlot {
    index:   usize,
    primary: Vec<ChoiceProbabilityCalculator>,
    nested:  Vec<ChoiceProbabilityCalculator>,
}

impl WorkerSlot {
    fn new(index: usize) -> Self {
        Self { index, primary: Vec::new(), nested: Vec::new() }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The model's calculator, reset and keyed to `entity`.
    pub fn get_calculator_for_entity(
        &mut self,
        model:  ModelHandle,
        entity: EntityId,
    ) -> SimResult<&mut ChoiceProbabilityCalculator> {
        let calculator = self.primary.get_mut(model.0).ok_or(SimError::UnknownModel(model.0))?;
        prepare(calculator, entity);
        Ok(calculator)
    }

    /// The model's nested calculator, reset and keyed to `entity`.
    pub fn get_nested_calculator_for_entity(
        &mut self,
        model:  ModelHandle,
        entity: EntityId,
    ) -> SimResult<&mut ChoiceProbabilityCalculator> {
        let calculator = self.nested.get_mut(model.0).ok_or(SimError::UnknownModel(model.0))?;
        prepare(calculator, entity);
        Ok(calculator)
    }

    /// Both at once: `outer`'s primary calculator and `inner`'s nested one,
    /// each reset for `entity`.  `outer` and `inner` may be the same model.
    pub fn calculators_for_entity(
        &mut self,
        outer:  ModelHandle,
        inner:  ModelHandle,
        entity: EntityId,
    ) -> SimResult<(&mut ChoiceProbabilityCalculator, &mut ChoiceProbabilityCalculator)> {
        let primary = self.primary.get_mut(outer.0).ok_or(SimError::UnknownModel(outer.0))?;
        let nested = self.nested.get_mut(inner.0).ok_or(SimError::UnknownModel(inner.0))?;
        prepare(primary, entity);
        prepare(nested, entity);
        Ok((primary, nested))
    }

    /// Primary calculators in registration order.
    pub fn calculators(&self) -> impl Iterator<Item = &ChoiceProbabilityCalculator> {
        self.primary.iter()
    }
}

fn prepare(calculator: &mut ChoiceProbabilityCalculator, entity: EntityId) {
    calculator.reset();
    calculator.start_observation(u64::from(entity.0));
}

// ── Pool ──────────────────────────────────────────────────────────────────────

struct ModelSpec {
    title:        String,
    coefficients: Arc<CoefficientTable>,
}

pub struct ParallelCalculatorPool {
    config: KernelConfig,
    models: Vec<ModelSpec>,
    slots:  Vec<WorkerSlot>,
}

impl ParallelCalculatorPool {
    /// One slot per worker from `config.worker_count()`.
    pub fn new(config: &KernelConfig) -> Self {
        Self::with_slots(config, config.worker_count())
    }

    /// Exactly `slots` worker slots (at least one).
    pub fn with_slots(config: &KernelConfig, slots: usize) -> Self {
        Self {
            config: config.clone(),
            models: Vec::new(),
            slots:  (0..slots.max(1)).map(WorkerSlot::new).collect(),
        }
    }

    /// Add a model; every slot gets its calculators.
    pub fn register(&mut self, title: impl Into<String>, coefficients: Arc<CoefficientTable>) -> ModelHandle {
        let title = title.into();
        for slot in &mut self.slots {
            slot.primary.push(ChoiceProbabilityCalculator::new(title.clone(), Arc::clone(&coefficients), &self.config));
            slot.nested.push(ChoiceProbabilityCalculator::new(title.clone(), Arc::clone(&coefficients), &self.config));
        }
        self.models.push(ModelSpec { title, coefficients });
        ModelHandle(self.models.len() - 1)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model_title(&self, model: ModelHandle) -> Option<&str> {
        self.models.get(model.0).map(|m| m.title.as_str())
    }

    pub fn coefficients(&self, model: ModelHandle) -> Option<&Arc<CoefficientTable>> {
        self.models.get(model.0).map(|m| &m.coefficients)
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot_for_batch(&self, batch: usize) -> usize {
        batch % self.slots.len()
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut WorkerSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots_mut(&mut self) -> &mut [WorkerSlot] {
        &mut self.slots
    }

    /// One estimation summary per model, merged across slots.
    pub fn estimation_summaries(&self) -> Vec<EstimationSummary> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let mut merged = EstimationSummary::new(spec.title.clone());
                for slot in &self.slots {
                    merged.merge(slot.primary[i].summary());
                }
                merged
            })
            .collect()
    }

    /// Observed-vs-predicted tallies per model, merged across slots.
    pub fn observed_tallies(&self) -> Vec<(String, ObservedTally)> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let mut merged = ObservedTally::default();
                for slot in &self.slots {
                    merged.merge(slot.primary[i].tally());
                }
                (spec.title.clone(), merged)
            })
            .collect()
    }
}

//! Nests: groups of correlated alternatives sharing a dissimilarity θ.

use tdm_core::{CoefficientId, NestId};

#[derive(Clone, Debug, Default)]
pub struct Nest {
    pub(crate) id:                NestId,
    pub(crate) present:           bool,
    pub(crate) theta_coefficient: Option<CoefficientId>,
    pub(crate) parent:            Option<NestId>,
    pub(crate) theta:             f64,
    pub(crate) depth:             usize,
    /// `ln Σ exp(θ·U_child)` over available children; `None` when empty.
    pub(crate) scaled_logsum:     Option<f64>,
    pub(crate) probability:       f64,
}

impl Nest {
    #[inline]
    pub fn id(&self) -> NestId {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> Option<NestId> {
        self.parent
    }

    /// Resolved θ from the last evaluation.
    #[inline]
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// `(1/θ)·ln Σ exp(θ·U_child)`; `None` when no child was available.
    pub fn logsum(&self) -> Option<f64> {
        self.scaled_logsum.map(|s| s / self.theta)
    }

    /// Marginal probability of entering this nest.
    #[inline]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    fn reset(&mut self, id: NestId) {
        *self = Nest { id, present: true, theta: 1.0, ..Nest::default() };
    }
}

/// Make sure `id` has a live slot; update its θ coefficient when given.
/// Returns `false` for the invalid sentinel.
pub(crate) fn declare(nests: &mut Vec<Nest>, id: NestId, theta: Option<CoefficientId>) -> bool {
    if !id.is_valid() {
        log::warn!("ignoring nest declaration with the invalid nest id");
        return false;
    }
    if nests.len() <= id.index() {
        nests.resize_with(id.index() + 1, Nest::default);
    }
    let nest = &mut nests[id.index()];
    if !nest.present {
        nest.reset(id);
    }
    if theta.is_some() {
        nest.theta_coefficient = theta;
    }
    true
}

/// Builder handle for declaring a nest inside a parent nest.
pub struct NestMut<'a> {
    pub(crate) nests: &'a mut Vec<Nest>,
    pub(crate) id:    NestId,
}

impl NestMut<'_> {
    #[inline]
    pub fn id(&self) -> NestId {
        self.id
    }

    /// Place this nest inside `parent`, whose dissimilarity is `theta`.
    pub fn add_nested_alternative(&mut self, parent: NestId, theta: CoefficientId) {
        if declare(self.nests, parent, Some(theta)) {
            self.nests[self.id.index()].parent = Some(parent);
        }
    }

    /// Set this nest's own θ coefficient.
    pub fn set_theta(&mut self, theta: CoefficientId) {
        self.nests[self.id.index()].theta_coefficient = Some(theta);
    }
}

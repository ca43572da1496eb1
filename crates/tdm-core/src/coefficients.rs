//! Estimated model coefficients.
//!
//! A [`CoefficientTable`] is built once per model (from memory or JSON) and
//! shared read-only by every calculator through an `Arc`.  Lookups are by
//! [`CoefficientId`]; ids are sparse so the table stores a dense
//! `Vec<Option<Coefficient>>` indexed by id.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CoefficientId, KernelError, KernelResult};

/// How a coefficient participates in utility evaluation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientKind {
    /// Ordinary linear utility term: `utility += value * coefficient`.
    #[default]
    Utility,
    /// Size term scaled by the coefficient: `size += value * exp(coefficient)`.
    SizeVariable,
    /// Base size term: `size += value`.
    BaseSizeVariable,
    /// Multiplier on `ln(size)`; never contributes a term directly.
    SizeFunctionMultiplier,
    /// Nest dissimilarity parameter θ.
    Nest,
}

impl CoefficientKind {
    #[inline]
    pub fn is_size(self) -> bool {
        matches!(self, CoefficientKind::SizeVariable | CoefficientKind::BaseSizeVariable)
    }
}

/// One estimated parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub id:    CoefficientId,
    #[serde(default)]
    pub label: String,
    pub value: f64,
    #[serde(default)]
    pub kind:  CoefficientKind,
    /// Held fixed during estimation.
    #[serde(default)]
    pub fixed: bool,
}

impl Coefficient {
    pub fn new(id: CoefficientId, value: f64) -> Self {
        Self { id, label: String::new(), value, kind: CoefficientKind::Utility, fixed: false }
    }

    pub fn with_kind(mut self, kind: CoefficientKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Label for output; falls back to `par_<id>` when none was given.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("par_{}", self.id.0)
        } else {
            self.label.clone()
        }
    }
}

#[derive(Deserialize)]
struct CoefficientFile {
    title:        String,
    coefficients: Vec<Coefficient>,
}

/// All coefficients for one choice model.
#[derive(Clone, Debug, Default)]
pub struct CoefficientTable {
    title:                    String,
    slots:                    Vec<Option<Coefficient>>,
    size_function_multiplier: Option<CoefficientId>,
}

impl CoefficientTable {
    /// Build a table from a list of coefficients.
    ///
    /// Fails on duplicate ids.  The last coefficient of kind
    /// `SizeFunctionMultiplier` becomes the table's `ln(size)` multiplier.
    pub fn new(title: impl Into<String>, coefficients: Vec<Coefficient>) -> KernelResult<Self> {
        let max_id = coefficients.iter().map(|c| c.id.index()).max();
        let mut slots: Vec<Option<Coefficient>> = vec![None; max_id.map_or(0, |m| m + 1)];
        let mut size_function_multiplier = None;

        for coefficient in coefficients {
            if !coefficient.id.is_valid() {
                return Err(KernelError::Config(format!(
                    "coefficient id {} is reserved",
                    coefficient.id
                )));
            }
            let slot = &mut slots[coefficient.id.index()];
            if slot.is_some() {
                return Err(KernelError::DuplicateCoefficient(coefficient.id));
            }
            if coefficient.kind == CoefficientKind::SizeFunctionMultiplier {
                size_function_multiplier = Some(coefficient.id);
            }
            *slot = Some(coefficient);
        }

        Ok(Self { title: title.into(), slots, size_function_multiplier })
    }

    /// Parse `{"title": ..., "coefficients": [...]}`.
    pub fn from_json_str(json: &str) -> KernelResult<Self> {
        let file: CoefficientFile = serde_json::from_str(json)?;
        Self::new(file.title, file.coefficients)
    }

    pub fn from_json_path(path: &Path) -> KernelResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// `None` for ids never defined.  Callers treat this as "skip the term".
    #[inline]
    pub fn get(&self, id: CoefficientId) -> Option<&Coefficient> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Value lookup that fails loudly; for configuration-time resolution.
    pub fn value(&self, id: CoefficientId) -> KernelResult<f64> {
        self.get(id)
            .map(|c| c.value)
            .ok_or(KernelError::CoefficientNotFound(id))
    }

    /// Multiplier applied to `ln(size)`; `1.0` when the table has none.
    pub fn size_function_multiplier(&self) -> f64 {
        self.size_function_multiplier
            .and_then(|id| self.get(id))
            .map_or(1.0, |c| c.value)
    }

    /// One past the largest defined id; the width of an estimation term vector.
    #[inline]
    pub fn id_span(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coefficient> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

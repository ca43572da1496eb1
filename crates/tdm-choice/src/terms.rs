//! Weighted utility-term accumulation shared by alternatives and components.

use serde::Serialize;

use tdm_core::{CoefficientId, CoefficientKind, CoefficientTable, EPSILON};

/// One `(coefficient, value)` pair as recorded for estimation output.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct UtilityTerm {
    pub coefficient: CoefficientId,
    pub value:       f64,
    /// The coefficient is a size (or base size) variable.
    pub is_size:     bool,
}

/// Running sums for one alternative or component.
#[derive(Clone, Debug, Default)]
pub(crate) struct TermSums {
    pub utility:    f64,
    pub size:       f64,
    /// Terms kept verbatim (estimation mode only).
    pub recorded:   Vec<UtilityTerm>,
    /// First non-finite value seen; reported when the choice set is evaluated.
    pub non_finite: Option<(CoefficientId, f64)>,
}

impl TermSums {
    pub fn clear(&mut self) {
        self.utility = 0.0;
        self.size = 0.0;
        self.recorded.clear();
        self.non_finite = None;
    }

    /// `coefficient * value` into the right running sum.
    ///
    /// Unknown coefficients are skipped; a zero value changes nothing but is
    /// still recorded so estimation output sees every candidate term.
    pub fn add(&mut self, table: &CoefficientTable, id: CoefficientId, value: f64, record: bool) {
        if !value.is_finite() {
            self.non_finite.get_or_insert((id, value));
            return;
        }
        let Some(coefficient) = table.get(id) else {
            return;
        };
        if record {
            self.recorded.push(UtilityTerm { coefficient: id, value, is_size: coefficient.kind.is_size() });
        }
        if value == 0.0 {
            return;
        }
        match coefficient.kind {
            CoefficientKind::BaseSizeVariable       => self.size += value,
            CoefficientKind::SizeVariable           => self.size += value * coefficient.value.exp(),
            CoefficientKind::SizeFunctionMultiplier => {}
            CoefficientKind::Utility | CoefficientKind::Nest => {
                self.utility += value * coefficient.value;
            }
        }
    }

    pub fn has_size_terms(&self) -> bool {
        self.recorded.iter().any(|t| t.is_size)
    }

    pub fn has_non_zero_size_term(&self) -> bool {
        self.recorded.iter().any(|t| t.is_size && t.value.abs() >= EPSILON)
    }
}

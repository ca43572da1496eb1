//! Shared sub-expressions referenced by many alternatives.

use tdm_core::{CoefficientId, CoefficientTable, ComponentId};

use crate::terms::{TermSums, UtilityTerm};

#[derive(Clone, Debug, Default)]
pub struct Component {
    pub(crate) id:      ComponentId,
    pub(crate) present: bool,
    pub(crate) sums:    TermSums,
}

impl Component {
    pub(crate) fn reset(&mut self, id: ComponentId) {
        self.id = id;
        self.present = true;
        self.sums.clear();
    }

    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn utility(&self) -> f64 {
        self.sums.utility
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.sums.size
    }

    pub fn terms(&self) -> &[UtilityTerm] {
        &self.sums.recorded
    }
}

/// Builder handle for one component.
pub struct ComponentMut<'a> {
    pub(crate) component: &'a mut Component,
    pub(crate) table:     &'a CoefficientTable,
    pub(crate) record:    bool,
}

impl ComponentMut<'_> {
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.component.id
    }

    pub fn add_utility_term(&mut self, coefficient: CoefficientId, value: f64) {
        self.component.sums.add(self.table, coefficient, value, self.record);
    }

    #[inline]
    pub fn utility(&self) -> f64 {
        self.component.sums.utility
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.component.sums.size
    }
}

/// Live component `id`, if created since the last reset.
pub(crate) fn lookup(components: &[Component], id: ComponentId) -> Option<&Component> {
    components.get(id.index()).filter(|c| c.present)
}

/// Create or reset slot `id`.
pub(crate) fn create(components: &mut Vec<Component>, id: ComponentId) -> &mut Component {
    if components.len() <= id.index() {
        components.resize_with(id.index() + 1, Component::default);
    }
    let component = &mut components[id.index()];
    component.reset(id);
    component
}

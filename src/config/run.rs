use std::{collections::BTreeMap, sync::Arc};

use log::debug;

use crate::domain::{propagator::BathPropagator, DomainKey, DomainOperator};
use crate::error::Result;
use crate::geometry::projection::Projector;

use super::setup::parameters::{
    constants::ProblemConstants,
    simulation::{ContactParams, SimulationParams},
};

pub struct RunParams {
    pub domain: DomainKey,
    pub simulation: SimulationParams,
    pub contact: ContactParams,
    // Accepted steps between progress reports.
    pub dstep_view: usize,
}

/// Per-run operators that depend on the setup but not on the state.
pub struct RunContext {
    pub operator: Arc<DomainOperator>,
    pub projector: Projector,
    // One factorised bath step per refinement level in use.
    propagators: BTreeMap<u32, BathPropagator>,
}

impl RunContext {
    pub fn new(operator: Arc<DomainOperator>, constants: &ProblemConstants) -> Self {
        RunContext {
            operator,
            projector: Projector::new(constants.mode_count),
            propagators: BTreeMap::new(),
        }
    }

    /// Factorises the bath step for `level` unless already cached.
    pub fn prepare_level(
        &mut self,
        level: u32,
        constants: &ProblemConstants,
        params: &SimulationParams,
    ) -> Result<()> {
        if !self.propagators.contains_key(&level) {
            let dt = params.step_at_level(level);
            debug!("Building bath propagator for level {level} (dt={dt:.3e})");
            let propagator = BathPropagator::new(&self.operator, constants, dt)?;
            self.propagators.insert(level, propagator);
        }
        Ok(())
    }

    /// Panics if `level` was never prepared.
    pub fn propagator(&self, level: u32) -> &BathPropagator {
        &self.propagators[&level]
    }
}

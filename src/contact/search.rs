use std::collections::BTreeMap;

use log::debug;

use super::{ContactProblem, ContactSolution, PatchTrial};
use crate::error::{Result, SimError};

// Trial patches solved so far, keyed by node count.
struct PatchSearch<'p, 'a> {
    problem: &'p ContactProblem<'a>,
    trials: BTreeMap<usize, PatchTrial>,
}

impl<'p, 'a> PatchSearch<'p, 'a> {
    fn penetration_free(&mut self, q: usize) -> Result<bool> {
        if !self.trials.contains_key(&q) {
            if self.trials.len() >= self.problem.max_iterations() {
                let residual = self
                    .trials
                    .values()
                    .map(|t| t.max_gap)
                    .fold(f64::INFINITY, f64::min);
                return Err(SimError::ContactConvergence {
                    iterations: self.trials.len(),
                    residual,
                    reason: "trial budget exhausted before the patch was bracketed".to_string(),
                });
            }
            let trial = self.problem.solve_patch(q)?;
            self.trials.insert(q, trial);
        }
        Ok(self.trials[&q].max_gap <= self.problem.tolerance())
    }
}

/// Finds the smallest patch on which the bath stays below the drop.
///
/// Larger patches push the bath down further, so penetration-freedom is
/// monotone in the node count. Patch nodes that would need suction are
/// unloaded and checked for penetration like the nodes outside. Starting from `previous`, the search brackets
/// the boundary by doubling steps and closes it by bisection. The accepted
/// patch must carry no significantly negative pressure.
pub fn solve_contact(problem: &ContactProblem, previous: usize) -> Result<ContactSolution> {
    let mut search = PatchSearch {
        problem,
        trials: BTreeMap::new(),
    };
    // Every node under the drop in contact leaves nothing to penetrate.
    let largest = problem.covered_nodes();
    let start = previous.min(largest);

    // Largest known penetrating and smallest known penetration-free counts.
    let mut below: Option<usize> = None;
    let mut above;
    let mut step = 1;
    if search.penetration_free(start)? {
        above = start;
        while above > 0 {
            let q = above.saturating_sub(step);
            if search.penetration_free(q)? {
                above = q;
                step *= 2;
            } else {
                below = Some(q);
                break;
            }
        }
    } else {
        let mut lo = start;
        loop {
            let q = (lo + step).min(largest);
            if search.penetration_free(q)? {
                above = q;
                break;
            }
            if q == largest {
                let residual = search.trials[&q].max_gap;
                return Err(SimError::ContactConvergence {
                    iterations: search.trials.len(),
                    residual,
                    reason: format!("bath penetrates the drop even with all {largest} nodes in the patch"),
                });
            }
            lo = q;
            step *= 2;
        }
        below = Some(lo);
    }
    if let Some(mut lo) = below {
        while above - lo > 1 {
            let mid = lo + (above - lo) / 2;
            if search.penetration_free(mid)? {
                above = mid;
            } else {
                lo = mid;
            }
        }
    }

    let iterations = search.trials.len();
    let trial = search.trials.remove(&above).ok_or_else(|| SimError::ContactConvergence {
        iterations,
        residual: f64::INFINITY,
        reason: format!("accepted patch of {above} nodes was never solved"),
    })?;
    let mut solution = trial.solution;
    solution.iterations = iterations;
    debug!(
        "contact: q={} (from {previous}) after {iterations} solves, force={:.4e}",
        solution.contact_points, solution.force
    );

    if solution.edge_pressure > problem.tolerance() {
        return Err(SimError::ContactConvergence {
            iterations,
            residual: solution.edge_pressure,
            reason: format!(
                "negative pressure on the minimal penetration-free patch of {above} nodes"
            ),
        });
    }
    solution.converged = true;
    Ok(solution)
}

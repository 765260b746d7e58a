//! Solver driver: builds the model, runs the CP search, decodes the
//! solution, and injects reinforcement agents when the roster cannot cover.
//!
//! Feasibility is driven outside the model: each failed round appends one
//! synthetic agent and re-solves, up to `max_extra_agents`. The ×120 price
//! on reinforcement assignments keeps the solver from staffing them when the
//! base roster suffices.

use std::collections::HashMap;
use std::time::Duration;

use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::DomainId;
use pumpkin_solver::Solver;
use tracing::{debug, info};

use crate::calendar::Horizon;
use crate::catalogue::ShiftCatalogue;
use crate::constraints::{ModelContext, ScheduleModel};
use crate::domain::{
    Agent, PlanningMode, PlanningParams, ScheduleRequest, ScheduleStatus, SchedulerResult,
    ShiftAssignment, JOUR_12H, REGIME_12H_JOUR, REGIME_MATIN_ONLY, REGIME_MIXTE,
    REGIME_POLYVALENT,
};
use crate::error::ScheduleError;
use crate::objective;

/// Wall-clock budget of one solve round.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(10);

/// Scheduling entry point with a configurable per-round time budget.
#[derive(Debug, Clone)]
pub struct Scheduler {
    time_budget: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_budget(time_budget: Duration) -> Self {
        Self { time_budget }
    }

    /// Solves one scheduling request.
    ///
    /// Never fails: every validation or solver failure is translated into an
    /// `infeasible` result carrying its explanation.
    pub fn build_solution(
        &self,
        request: &ScheduleRequest,
        baseline_minutes: Option<&HashMap<String, i64>>,
    ) -> SchedulerResult {
        let params = &request.params;

        let horizon = match Horizon::expand(params.start_date, params.end_date) {
            Ok(horizon) => horizon,
            Err(err) => return infeasible_result(err, Vec::new()),
        };
        let catalogue = match ShiftCatalogue::build(params) {
            Ok(catalogue) => catalogue,
            Err(err) => return infeasible_result(err, Vec::new()),
        };

        let empty = HashMap::new();
        let baseline = baseline_minutes.unwrap_or(&empty);

        let reinforce = params.auto_add_agents_if_needed;
        let max_extra = if reinforce {
            params.max_extra_agents as usize
        } else {
            0
        };

        let mut added_agents: Vec<Agent> = Vec::new();
        let mut last_error = ScheduleError::Infeasible;
        for round in 0..=max_extra {
            let roster: Vec<Agent> = request
                .agents
                .iter()
                .chain(added_agents.iter())
                .cloned()
                .collect();
            info!(
                round,
                roster_size = roster.len(),
                days = horizon.len(),
                "solving scheduling round"
            );
            match self.solve_round(request, &horizon, &catalogue, &roster, baseline) {
                Ok((assignments, score)) => {
                    info!(score, assignments = assignments.len(), "schedule found");
                    return SchedulerResult {
                        status: ScheduleStatus::Ok,
                        assignments,
                        score: Some(score),
                        explanation: None,
                        added_agents,
                    };
                }
                Err(err) => last_error = err,
            }
            if reinforce && round < max_extra {
                let extra = make_extra_agent(round + 1, params);
                info!(agent_id = %extra.id, regime = %extra.regime, "adding reinforcement agent");
                added_agents.push(extra);
            }
        }
        infeasible_result(last_error, added_agents)
    }

    fn solve_round(
        &self,
        request: &ScheduleRequest,
        horizon: &Horizon,
        catalogue: &ShiftCatalogue,
        roster: &[Agent],
        baseline: &HashMap<String, i64>,
    ) -> Result<(Vec<ShiftAssignment>, i64), ScheduleError> {
        let ctx = ModelContext::new(
            &request.params,
            horizon,
            catalogue,
            roster,
            &request.locked_assignments,
            request.agents.len(),
        );
        let mut model = ScheduleModel::build(&ctx);
        let objective_var = objective::add_objective(&mut model, baseline);
        if model.root_conflict {
            debug!("model infeasible at the root");
            return Err(ScheduleError::Infeasible);
        }
        debug!(
            variables = roster.len() * horizon.len() * catalogue.len(),
            "model built"
        );

        let ScheduleModel { mut solver, x, .. } = model;
        let mut brancher = solver.default_brancher();
        let mut termination = TimeBudget::starting_now(self.time_budget);
        let result = solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Minimise, objective_var, noop_callback),
        );

        match result {
            OptimisationResult::Optimal(solution) => {
                Ok(decode_solution(&ctx, &x, objective_var, &solution))
            }
            OptimisationResult::Satisfiable(solution) => {
                debug!("time budget hit before proving optimality");
                Ok(decode_solution(&ctx, &x, objective_var, &solution))
            }
            OptimisationResult::Unsatisfiable | OptimisationResult::Unknown => {
                Err(ScheduleError::Infeasible)
            }
        }
    }
}

/// Solves with the default 10 s budget.
pub fn build_solution(
    request: &ScheduleRequest,
    baseline_minutes: Option<&HashMap<String, i64>>,
) -> SchedulerResult {
    Scheduler::default().build_solution(request, baseline_minutes)
}

fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}

fn decode_solution<S: ProblemSolution>(
    ctx: &ModelContext<'_>,
    x: &[Vec<Vec<DomainId>>],
    objective_var: DomainId,
    solution: &S,
) -> (Vec<ShiftAssignment>, i64) {
    let mut assignments = Vec::new();
    for (a_idx, agent) in ctx.agents.iter().enumerate() {
        for (d_idx, &date) in ctx.horizon.days().iter().enumerate() {
            for (s_idx, info) in ctx.catalogue.shifts().iter().enumerate() {
                if solution.get_integer_value(x[a_idx][d_idx][s_idx]) == 1 {
                    assignments.push(ShiftAssignment::new(&agent.id, date, &info.code));
                }
            }
        }
    }
    let score = i64::from(solution.get_integer_value(objective_var));
    (assignments, score)
}

fn infeasible_result(err: ScheduleError, added_agents: Vec<Agent>) -> SchedulerResult {
    SchedulerResult {
        status: ScheduleStatus::Infeasible,
        assignments: Vec::new(),
        score: None,
        explanation: Some(err.to_string()),
        added_agents,
    }
}

/// Synthesises the next reinforcement agent.
///
/// The regime follows the coverage shape: a 12h-capable regime when 12h
/// coverage is demanded, otherwise the most flexible regime the request
/// declares.
fn make_extra_agent(index: usize, params: &PlanningParams) -> Agent {
    let needs_12h = params
        .coverage_requirements
        .get(JOUR_12H)
        .copied()
        .unwrap_or(0)
        > 0;
    let regime = if params.mode == PlanningMode::Jour12h {
        REGIME_12H_JOUR
    } else if needs_12h && params.agent_regimes.contains_key(REGIME_POLYVALENT) {
        REGIME_POLYVALENT
    } else if needs_12h && params.agent_regimes.contains_key(REGIME_12H_JOUR) {
        REGIME_12H_JOUR
    } else if params.agent_regimes.contains_key(REGIME_MIXTE) {
        REGIME_MIXTE
    } else if params.agent_regimes.contains_key(REGIME_MATIN_ONLY) {
        REGIME_MATIN_ONLY
    } else {
        params
            .agent_regimes
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or(REGIME_MIXTE)
    };
    Agent::new(format!("R{index}"), index.to_string(), "Renfort", regime)
}

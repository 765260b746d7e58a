//! Decision variables and hard constraints of the scheduling model.
//!
//! The model is a pure 0/1 integer program over `x[agent, day, shift]`
//! variables. Every rule here is lossless: a violation makes the instance
//! infeasible. Boolean conjunctions (rest blocks) are linearised with the
//! standard inequality trio, so only linear constraints are ever posted.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use pumpkin_solver::constraints;
use pumpkin_solver::variables::{AffineView, DomainId, TransformableVariable};
use pumpkin_solver::Solver;

use crate::calendar::{week_monday, Horizon};
use crate::catalogue::{ShiftCatalogue, DAY_MINUTES};
use crate::domain::{Agent, LockedAssignment, PlanningParams, JOUR_12H, MATIN, REGIME_MIXTE, SOIR};
use crate::regimes::{is_12h_exception_blocked, ShiftAccess};

/// Everything a solve round needs to know about its instance.
///
/// Borrowed by the model builder and the objective builder; the driver owns
/// it for the duration of one round.
pub(crate) struct ModelContext<'a> {
    pub params: &'a PlanningParams,
    pub horizon: &'a Horizon,
    pub catalogue: &'a ShiftCatalogue,
    pub agents: &'a [Agent],
    pub locked: &'a [LockedAssignment],
    pub access: ShiftAccess,
    /// Effective minimum daily rest after the 11h-agreement relaxation.
    pub min_daily_rest: i64,
    /// Forbidden `(from, to)` transitions as catalogue indices.
    pub forbidden_transitions: HashSet<(usize, usize)>,
    /// Roster index at which reinforcement agents start.
    pub synthetic_from: usize,
}

impl<'a> ModelContext<'a> {
    pub fn new(
        params: &'a PlanningParams,
        horizon: &'a Horizon,
        catalogue: &'a ShiftCatalogue,
        agents: &'a [Agent],
        locked: &'a [LockedAssignment],
        synthetic_from: usize,
    ) -> Self {
        let access = ShiftAccess::resolve(agents, params, catalogue);

        let defaults = &params.ruleset_defaults;
        let min_daily_rest = if params.agreement_11h_enabled {
            defaults
                .daily_rest_min_minutes
                .min(defaults.daily_rest_min_minutes_with_agreement)
        } else {
            defaults.daily_rest_min_minutes
        };

        // Transitions naming shifts outside the catalogue cannot occur and
        // are dropped here.
        let forbidden_transitions = params
            .hard_forbidden_transitions
            .iter()
            .filter_map(|rule| {
                Some((
                    catalogue.index_of(&rule.from_shift)?,
                    catalogue.index_of(&rule.to_shift)?,
                ))
            })
            .collect();

        Self {
            params,
            horizon,
            catalogue,
            agents,
            locked,
            access,
            min_daily_rest,
            forbidden_transitions,
            synthetic_from,
        }
    }

    pub fn is_synthetic(&self, agent_idx: usize) -> bool {
        agent_idx >= self.synthetic_from
    }

    /// Whether `(s1 today, s2 tomorrow)` is a banned succession, either by an
    /// explicit rule or because the implied overnight rest is too short.
    pub fn transition_is_banned(&self, s1: usize, s2: usize) -> bool {
        if self.forbidden_transitions.contains(&(s1, s2)) {
            return true;
        }
        let end1 = self.catalogue.info(s1).end_min;
        let start2 = self.catalogue.info(s2).start_min;
        (DAY_MINUTES - end1) + start2 < self.min_daily_rest
    }
}

/// The CP model of one solve round: solver, decision variables, and a flag
/// recording whether any constraint already failed at the root.
pub(crate) struct ScheduleModel<'a> {
    pub ctx: &'a ModelContext<'a>,
    pub solver: Solver,
    /// `x[agent][day][shift] = 1` iff the agent works that shift that day.
    pub x: Vec<Vec<Vec<DomainId>>>,
    pub root_conflict: bool,
    /// Placeholder variable reused once `root_conflict` is set, since the
    /// underlying solver refuses to create further variables once its
    /// internal state is inconsistent.
    dummy: DomainId,
}

impl<'a> ScheduleModel<'a> {
    /// Builds the full hard-constraint model for the context's roster.
    pub fn build(ctx: &'a ModelContext<'a>) -> Self {
        let mut solver = Solver::default();
        let dummy = solver.new_bounded_integer(0, 1);
        let mut model = Self {
            ctx,
            solver,
            x: Vec::new(),
            root_conflict: false,
            dummy,
        };

        model.create_variables();
        model.post_day_basics();
        model.post_locked_assignments();
        model.post_coverage();
        model.post_transitions_and_daily_rest();
        model.post_consecutive_12h_cap();
        model.post_12h_exception_cap();
        model.post_pattern_ban();
        model.post_rolling_7d_cap();
        model.post_weekly_rest_blocks();
        model.post_cycle_week_cap();
        model
    }

    // =========================================================================
    // Variables
    // =========================================================================
    // Statically impossible assignments (regime, mode, exception dates) get a
    // {0} domain instead of a posted equality, which propagates immediately.

    fn create_variables(&mut self) {
        let ctx = self.ctx;
        let days = ctx.horizon.days();
        let n_shifts = ctx.catalogue.len();

        let mut x = Vec::with_capacity(ctx.agents.len());
        for (a_idx, agent) in ctx.agents.iter().enumerate() {
            let mut per_day = Vec::with_capacity(days.len());
            for &date in days {
                let mut per_shift = Vec::with_capacity(n_shifts);
                for s_idx in 0..n_shifts {
                    let ub = if variable_is_static_zero(ctx, a_idx, agent, date, s_idx) {
                        0
                    } else {
                        1
                    };
                    per_shift.push(self.solver.new_bounded_integer(0, ub));
                }
                per_day.push(per_shift);
            }
            x.push(per_day);
        }
        self.x = x;
    }

    // =========================================================================
    // HARD: one shift per day, unavailability
    // =========================================================================

    fn post_day_basics(&mut self) {
        let ctx = self.ctx;
        for (a_idx, agent) in ctx.agents.iter().enumerate() {
            for (d_idx, date) in ctx.horizon.days().iter().enumerate() {
                let day_vars: Vec<AffineView<DomainId>> = self.x[a_idx][d_idx]
                    .iter()
                    .map(|&v| v.scaled(1))
                    .collect();
                let cap = if agent.unavailability_dates.contains(date) {
                    0
                } else {
                    1
                };
                self.le(day_vars, cap);
            }
        }
    }

    // =========================================================================
    // HARD: locked assignments
    // =========================================================================
    // A lock pins its variable to 1 and the siblings of the same day to 0.
    // Locks on unknown agents or dates outside the horizon are skipped.

    fn post_locked_assignments(&mut self) {
        let ctx = self.ctx;
        for lock in ctx.locked {
            let Some(a_idx) = ctx.agents.iter().position(|a| a.id == lock.agent_id) else {
                continue;
            };
            let Some(d_idx) = ctx.horizon.index_of(lock.date) else {
                continue;
            };
            for s_idx in 0..ctx.catalogue.len() {
                let var = self.x[a_idx][d_idx][s_idx];
                if ctx.catalogue.info(s_idx).code == lock.shift {
                    self.ge(vec![var.scaled(1)], 1);
                } else {
                    self.le(vec![var.scaled(1)], 0);
                }
            }
        }
    }

    // =========================================================================
    // HARD: coverage equality
    // =========================================================================
    // Exactly the requested headcount per (day, allowed shift) — equality
    // keeps the solver from parking idle agents on a free shift.

    fn post_coverage(&mut self) {
        let ctx = self.ctx;
        let allowed: Vec<usize> = ctx.catalogue.global_allowed_indices().collect();
        for d_idx in 0..ctx.horizon.len() {
            for &s_idx in &allowed {
                let required = clamp_i32(ctx.catalogue.required(s_idx) as i64);
                let vars: Vec<AffineView<DomainId>> = (0..ctx.agents.len())
                    .map(|a_idx| self.x[a_idx][d_idx][s_idx].scaled(1))
                    .collect();
                if vars.is_empty() {
                    // An empty roster can only satisfy a zero requirement.
                    if required > 0 {
                        self.root_conflict = true;
                    }
                    continue;
                }
                self.le(vars.clone(), required);
                self.ge(vars, required);
            }
        }
    }

    // =========================================================================
    // HARD: forbidden transitions and minimum daily rest
    // =========================================================================

    fn post_transitions_and_daily_rest(&mut self) {
        let ctx = self.ctx;
        let n_days = ctx.horizon.len();
        let n_shifts = ctx.catalogue.len();
        for a_idx in 0..ctx.agents.len() {
            for d_idx in 0..n_days.saturating_sub(1) {
                for s1 in 0..n_shifts {
                    for s2 in 0..n_shifts {
                        if !ctx.transition_is_banned(s1, s2) {
                            continue;
                        }
                        let pair = vec![
                            self.x[a_idx][d_idx][s1].scaled(1),
                            self.x[a_idx][d_idx + 1][s2].scaled(1),
                        ];
                        self.le(pair, 1);
                    }
                }
            }
        }
    }

    // =========================================================================
    // HARD: consecutive 12h cap (per regime)
    // =========================================================================

    fn post_consecutive_12h_cap(&mut self) {
        let ctx = self.ctx;
        let Some(jour_idx) = ctx.catalogue.index_of(JOUR_12H) else {
            return;
        };
        let n_days = ctx.horizon.len();
        for (a_idx, agent) in ctx.agents.iter().enumerate() {
            let max_consec = ctx
                .params
                .agent_regimes
                .get(&agent.regime)
                .and_then(|r| r.max_consecutive_12h_days)
                .unwrap_or(0) as usize;
            if max_consec == 0 {
                continue;
            }
            for d_idx in 0..n_days.saturating_sub(max_consec) {
                let window: Vec<AffineView<DomainId>> = (0..=max_consec)
                    .map(|k| self.x[a_idx][d_idx + k][jour_idx].scaled(1))
                    .collect();
                self.le(window, clamp_i32(max_consec as i64));
            }
        }
    }

    // =========================================================================
    // HARD: 12h exception cap for mixte agents
    // =========================================================================

    fn post_12h_exception_cap(&mut self) {
        let ctx = self.ctx;
        if !ctx.params.allow_single_12h_exception || ctx.params.max_12h_exceptions_per_agent == 0 {
            return;
        }
        let Some(jour_idx) = ctx.catalogue.index_of(JOUR_12H) else {
            return;
        };
        let cap = clamp_i32(ctx.params.max_12h_exceptions_per_agent as i64);
        for (a_idx, agent) in ctx.agents.iter().enumerate() {
            if agent.regime != REGIME_MIXTE {
                continue;
            }
            let total: Vec<AffineView<DomainId>> = (0..ctx.horizon.len())
                .map(|d_idx| self.x[a_idx][d_idx][jour_idx].scaled(1))
                .collect();
            self.le(total, cap);
        }
    }

    // =========================================================================
    // HARD: MATIN → SOIR → MATIN pattern ban
    // =========================================================================

    fn post_pattern_ban(&mut self) {
        let ctx = self.ctx;
        if !ctx.params.forbid_matin_soir_matin {
            return;
        }
        let (Some(matin_idx), Some(soir_idx)) =
            (ctx.catalogue.index_of(MATIN), ctx.catalogue.index_of(SOIR))
        else {
            return;
        };
        let n_days = ctx.horizon.len();
        for a_idx in 0..ctx.agents.len() {
            for d_idx in 0..n_days.saturating_sub(2) {
                let triple = vec![
                    self.x[a_idx][d_idx][matin_idx].scaled(1),
                    self.x[a_idx][d_idx + 1][soir_idx].scaled(1),
                    self.x[a_idx][d_idx + 2][matin_idx].scaled(1),
                ];
                self.le(triple, 2);
            }
        }
    }

    // =========================================================================
    // HARD: rolling 7-day minutes cap
    // =========================================================================
    // Windows are truncated at the horizon end; the tail windows are subsumed
    // by earlier ones but posted all the same, matching the ruleset reading.

    fn post_rolling_7d_cap(&mut self) {
        let ctx = self.ctx;
        let cap = clamp_i32(ctx.params.ruleset_defaults.max_minutes_rolling_7d);
        let n_days = ctx.horizon.len();
        for a_idx in 0..ctx.agents.len() {
            for d_idx in 0..n_days {
                let mut window: Vec<AffineView<DomainId>> = Vec::new();
                for k in 0..7 {
                    if d_idx + k >= n_days {
                        break;
                    }
                    for s_idx in 0..ctx.catalogue.len() {
                        let duration = clamp_i32(ctx.catalogue.info(s_idx).duration);
                        window.push(self.x[a_idx][d_idx + k][s_idx].scaled(duration));
                    }
                }
                if !window.is_empty() {
                    self.le(window, cap);
                }
            }
        }
    }

    // =========================================================================
    // HARD: weekly rest blocks
    // =========================================================================
    // Every fully-contained 7-day window must hold at least one rest block:
    // either two consecutive off days, or a single off day bridged by shifts
    // whose implied rest reaches the weekly minimum.

    fn post_weekly_rest_blocks(&mut self) {
        let ctx = self.ctx;
        let n_days = ctx.horizon.len();
        let n_shifts = ctx.catalogue.len();
        let weekly_rest_min = ctx.params.ruleset_defaults.weekly_rest_min_minutes;

        for a_idx in 0..ctx.agents.len() {
            let mut off: Vec<DomainId> = Vec::with_capacity(n_days);
            for d_idx in 0..n_days {
                let off_var = self.new_bool();
                let mut day: Vec<AffineView<DomainId>> = self.x[a_idx][d_idx]
                    .iter()
                    .map(|&v| v.scaled(1))
                    .collect();
                day.push(off_var.scaled(1));
                self.le(day.clone(), 1);
                self.ge(day, 1);
                off.push(off_var);
            }

            // Double-off blocks.
            let mut double_blocks: Vec<(usize, usize, DomainId)> = Vec::new();
            for d_idx in 0..n_days.saturating_sub(1) {
                let rb = self.and2(off[d_idx], off[d_idx + 1]);
                double_blocks.push((d_idx, d_idx + 1, rb));
            }

            // Bridge-off blocks: shift, off day, shift, with enough implied rest.
            let mut bridge_blocks: Vec<(usize, usize, DomainId)> = Vec::new();
            for d_idx in 0..n_days.saturating_sub(2) {
                for s1 in 0..n_shifts {
                    for s2 in 0..n_shifts {
                        let rest = (DAY_MINUTES - ctx.catalogue.info(s1).end_min)
                            + DAY_MINUTES
                            + ctx.catalogue.info(s2).start_min;
                        if rest < weekly_rest_min {
                            continue;
                        }
                        let before = self.x[a_idx][d_idx][s1];
                        let after = self.x[a_idx][d_idx + 2][s2];
                        let rb = self.and3(before, off[d_idx + 1], after);
                        bridge_blocks.push((d_idx, d_idx + 2, rb));
                    }
                }
            }

            // At least one block inside every full 7-day window.
            if n_days >= 7 {
                for w in 0..=(n_days - 7) {
                    let candidates: Vec<AffineView<DomainId>> = double_blocks
                        .iter()
                        .chain(bridge_blocks.iter())
                        .filter(|(start, end, _)| *start >= w && *end <= w + 6)
                        .map(|&(_, _, rb)| rb.scaled(1))
                        .collect();
                    if !candidates.is_empty() {
                        self.ge(candidates, 1);
                    }
                }
            }
        }
    }

    // =========================================================================
    // HARD: cycle-week minutes cap
    // =========================================================================
    // Weeks are grouped by their Monday, so a horizon starting mid-week gets
    // a short leading group.

    fn post_cycle_week_cap(&mut self) {
        let ctx = self.ctx;
        if !ctx.params.ruleset_defaults.cycle_mode_enabled {
            return;
        }
        let cap = clamp_i32(
            ctx.params
                .ruleset_defaults
                .max_minutes_per_week_excluding_overtime,
        );

        let mut weeks: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (d_idx, &date) in ctx.horizon.days().iter().enumerate() {
            weeks.entry(week_monday(date)).or_default().push(d_idx);
        }

        for a_idx in 0..ctx.agents.len() {
            for day_indices in weeks.values() {
                let mut week_vars: Vec<AffineView<DomainId>> = Vec::new();
                for &d_idx in day_indices {
                    for s_idx in 0..ctx.catalogue.len() {
                        let duration = clamp_i32(ctx.catalogue.info(s_idx).duration);
                        week_vars.push(self.x[a_idx][d_idx][s_idx].scaled(duration));
                    }
                }
                if !week_vars.is_empty() {
                    self.le(week_vars, cap);
                }
            }
        }
    }

    // =========================================================================
    // Linear building blocks
    // =========================================================================

    /// Fresh 0/1 auxiliary variable.
    pub fn new_bool(&mut self) -> DomainId {
        if self.root_conflict {
            return self.dummy;
        }
        self.solver.new_bounded_integer(0, 1)
    }

    /// Fresh bounded integer auxiliary variable.
    pub fn new_int(&mut self, lb: i64, ub: i64) -> DomainId {
        if self.root_conflict {
            return self.dummy;
        }
        self.solver
            .new_bounded_integer(clamp_i32(lb), clamp_i32(ub))
    }

    /// Posts `Σ terms ≤ rhs`, recording a root conflict on failure.
    pub fn le(&mut self, terms: Vec<AffineView<DomainId>>, rhs: i32) {
        if self.root_conflict {
            return;
        }
        let tag = self.solver.new_constraint_tag();
        if self
            .solver
            .add_constraint(constraints::less_than_or_equals(terms, rhs, tag))
            .post()
            .is_err()
        {
            self.root_conflict = true;
        }
    }

    /// Posts `Σ terms ≥ rhs`, recording a root conflict on failure.
    pub fn ge(&mut self, terms: Vec<AffineView<DomainId>>, rhs: i32) {
        if self.root_conflict {
            return;
        }
        let tag = self.solver.new_constraint_tag();
        if self
            .solver
            .add_constraint(constraints::greater_than_or_equals(terms, rhs, tag))
            .post()
            .is_err()
        {
            self.root_conflict = true;
        }
    }

    /// `z = a ∧ b` via the inequality trio.
    pub fn and2(&mut self, a: DomainId, b: DomainId) -> DomainId {
        let z = self.new_bool();
        self.le(vec![z.scaled(1), a.scaled(-1)], 0);
        self.le(vec![z.scaled(1), b.scaled(-1)], 0);
        self.ge(vec![z.scaled(1), a.scaled(-1), b.scaled(-1)], -1);
        z
    }

    /// `z = a ∧ b ∧ c`: one bound per operand plus `z ≥ Σ − 2`.
    pub fn and3(&mut self, a: DomainId, b: DomainId, c: DomainId) -> DomainId {
        let z = self.new_bool();
        self.le(vec![z.scaled(1), a.scaled(-1)], 0);
        self.le(vec![z.scaled(1), b.scaled(-1)], 0);
        self.le(vec![z.scaled(1), c.scaled(-1)], 0);
        self.ge(
            vec![z.scaled(1), a.scaled(-1), b.scaled(-1), c.scaled(-1)],
            -2,
        );
        z
    }
}

fn variable_is_static_zero(
    ctx: &ModelContext<'_>,
    a_idx: usize,
    agent: &Agent,
    date: NaiveDate,
    s_idx: usize,
) -> bool {
    if !ctx.access.is_allowed(a_idx, s_idx) {
        return true;
    }
    let info = ctx.catalogue.info(s_idx);
    info.code == JOUR_12H && is_12h_exception_blocked(agent, ctx.params, date)
}

/// Saturating conversion for constraint coefficients and bounds.
#[inline]
pub(crate) fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{self, DemoData};

    struct Fixture {
        params: PlanningParams,
        agents: Vec<Agent>,
        locked: Vec<LockedAssignment>,
    }

    impl Fixture {
        fn new() -> Self {
            let request = demo_data::generate(DemoData::Small);
            Self {
                params: request.params,
                agents: request.agents,
                locked: request.locked_assignments,
            }
        }

        fn context<'a>(
            &'a self,
            horizon: &'a Horizon,
            catalogue: &'a ShiftCatalogue,
        ) -> ModelContext<'a> {
            ModelContext::new(
                &self.params,
                horizon,
                catalogue,
                &self.agents,
                &self.locked,
                self.agents.len(),
            )
        }
    }

    #[test]
    fn test_effective_daily_rest_with_agreement() {
        let mut fixture = Fixture::new();
        let horizon =
            Horizon::expand(fixture.params.start_date, fixture.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&fixture.params).unwrap();
        assert_eq!(fixture.context(&horizon, &catalogue).min_daily_rest, 720);

        fixture.params.agreement_11h_enabled = true;
        let catalogue = ShiftCatalogue::build(&fixture.params).unwrap();
        assert_eq!(fixture.context(&horizon, &catalogue).min_daily_rest, 660);
    }

    #[test]
    fn test_forbidden_transitions_resolved_to_indices() {
        let fixture = Fixture::new();
        let horizon =
            Horizon::expand(fixture.params.start_date, fixture.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&fixture.params).unwrap();
        let ctx = fixture.context(&horizon, &catalogue);

        let soir = catalogue.index_of(SOIR).unwrap();
        let matin = catalogue.index_of(MATIN).unwrap();
        let jour = catalogue.index_of(JOUR_12H).unwrap();
        assert!(ctx.forbidden_transitions.contains(&(soir, matin)));
        assert!(ctx.forbidden_transitions.contains(&(soir, jour)));
        assert!(!ctx.forbidden_transitions.contains(&(matin, soir)));
    }

    #[test]
    fn test_implied_rest_bans_soir_to_matin() {
        let fixture = Fixture::new();
        let horizon =
            Horizon::expand(fixture.params.start_date, fixture.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&fixture.params).unwrap();
        let ctx = fixture.context(&horizon, &catalogue);

        let soir = catalogue.index_of(SOIR).unwrap();
        let matin = catalogue.index_of(MATIN).unwrap();
        // SOIR ends 21:00, MATIN starts 07:00: 10h overnight < the 12h floor.
        assert!(ctx.transition_is_banned(soir, matin));
        // MATIN ends 14:00, SOIR starts 14:00 the next day: 24h rest.
        assert!(!ctx.transition_is_banned(matin, soir));
    }

    #[test]
    fn test_model_builds_without_root_conflict() {
        let fixture = Fixture::new();
        let horizon =
            Horizon::expand(fixture.params.start_date, fixture.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&fixture.params).unwrap();
        let ctx = fixture.context(&horizon, &catalogue);

        let model = ScheduleModel::build(&ctx);
        assert!(!model.root_conflict);
        assert_eq!(model.x.len(), fixture.agents.len());
        assert_eq!(model.x[0].len(), horizon.len());
        assert_eq!(model.x[0][0].len(), catalogue.len());
    }
}

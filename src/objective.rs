//! Soft penalties and the linear objective.
//!
//! Each term adds weighted contributions to one penalty sum; an objective
//! variable is then lower-bounded by that sum and minimised. The weights
//! order the compromises the solver may make and are part of the contract.

use std::collections::{BTreeMap, HashMap};

use pumpkin_solver::variables::{AffineView, DomainId, TransformableVariable};

use crate::calendar::{is_weekend, iso_week_key};
use crate::constraints::{clamp_i32, ModelContext, ScheduleModel};
use crate::domain::{Agent, PreferenceKind, SOIR};

/// Spread of SOIR counts across agents.
pub const WEIGHT_SOIR_FAIRNESS: i64 = 5;
/// Spread of worked weekend blocks across agents.
pub const WEIGHT_WEEKEND_FAIRNESS: i64 = 12;
/// Same agent working two adjacent weekend blocks.
pub const WEIGHT_CONSECUTIVE_WEEKENDS: i64 = 24;
/// Each assignment handed to a reinforcement agent.
pub const WEIGHT_REINFORCEMENT: i64 = 120;
/// Different shift codes on consecutive worked days.
pub const WEIGHT_SHIFT_SWITCH: i64 = 4;
/// A worked day sandwiched between two off days.
pub const WEIGHT_ISOLATED_DAY: i64 = 6;
/// Deviation from the quotity-proportional period share.
pub const WEIGHT_PERIOD_TARGET: i64 = 2;
/// Deviation from the annual target, baseline included.
pub const WEIGHT_ANNUAL_TARGET: i64 = 1;

/// Running linear penalty expression `Σ coeff·var + constant`.
struct PenaltySum {
    terms: Vec<(DomainId, i64)>,
    constant: i64,
    upper: i64,
}

impl PenaltySum {
    fn new() -> Self {
        Self {
            terms: Vec::new(),
            constant: 0,
            upper: 0,
        }
    }

    fn add(&mut self, var: DomainId, coeff: i64, var_upper: i64) {
        self.terms.push((var, coeff));
        if coeff > 0 {
            self.upper += coeff * var_upper;
        }
    }

    fn add_constant(&mut self, value: i64) {
        self.constant += value;
        self.upper += value;
    }
}

/// Adds every soft term to the model and returns the objective variable to
/// minimise.
pub(crate) fn add_objective(
    model: &mut ScheduleModel<'_>,
    baseline_minutes: &HashMap<String, i64>,
) -> DomainId {
    let mut penalties = PenaltySum::new();

    add_preference_penalties(model, &mut penalties);
    add_soir_fairness(model, &mut penalties);
    add_weekend_block_terms(model, &mut penalties);
    add_reinforcement_usage(model, &mut penalties);
    add_shift_switches(model, &mut penalties);
    add_isolated_workdays(model, &mut penalties);
    add_period_target_deviation(model, &mut penalties);
    add_annual_target_deviation(model, baseline_minutes, &mut penalties);

    // objective ≥ Σ coeff·var + constant; exact at the optimum since every
    // penalty expression is non-negative and the objective is minimised.
    let objective = model.new_int(0, penalties.upper.max(0));
    let mut terms: Vec<AffineView<DomainId>> = vec![objective.scaled(1)];
    for &(var, coeff) in &penalties.terms {
        terms.push(var.scaled(clamp_i32(-coeff)));
    }
    model.ge(terms, clamp_i32(penalties.constant));
    objective
}

// =========================================================================
// SOFT: declared preferences
// =========================================================================
// A `prefer` costs its weight when not honoured; an `avoid` costs its weight
// when assigned anyway. Preferences outside the horizon or naming unknown
// shifts are ignored.

fn add_preference_penalties(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    for (a_idx, agent) in ctx.agents.iter().enumerate() {
        let mut pref_map: HashMap<(usize, usize), (PreferenceKind, i64)> = HashMap::new();
        for pref in &agent.preferences {
            let Some(d_idx) = ctx.horizon.index_of(pref.date) else {
                continue;
            };
            let Some(s_idx) = ctx.catalogue.index_of(&pref.shift) else {
                continue;
            };
            pref_map.insert((d_idx, s_idx), (pref.kind, pref.weight));
        }
        for (&(d_idx, s_idx), &(kind, weight)) in &pref_map {
            let var = model.x[a_idx][d_idx][s_idx];
            match kind {
                // weight·(1 − x)
                PreferenceKind::Prefer => {
                    penalties.add(var, -weight, 1);
                    penalties.add_constant(weight);
                }
                PreferenceKind::Avoid => penalties.add(var, weight, 1),
            }
        }
    }
}

// =========================================================================
// SOFT: SOIR fairness
// =========================================================================

fn add_soir_fairness(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    let Some(soir_idx) = ctx.catalogue.index_of(SOIR) else {
        return;
    };
    if ctx.agents.is_empty() {
        return;
    }
    let n_days = ctx.horizon.len() as i64;

    let mut counts = Vec::with_capacity(ctx.agents.len());
    for a_idx in 0..ctx.agents.len() {
        let count = model.new_int(0, n_days);
        let mut terms: Vec<AffineView<DomainId>> = vec![count.scaled(1)];
        for d_idx in 0..ctx.horizon.len() {
            terms.push(model.x[a_idx][d_idx][soir_idx].scaled(-1));
        }
        model.le(terms.clone(), 0);
        model.ge(terms, 0);
        counts.push(count);
    }
    add_spread_penalty(model, penalties, &counts, n_days, WEIGHT_SOIR_FAIRNESS);
}

// =========================================================================
// SOFT: weekend rotation
// =========================================================================
// Weekend days are grouped into blocks by ISO week; the spread of worked
// blocks is balanced and adjacent worked blocks are penalised hard.

fn add_weekend_block_terms(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    let mut grouped: BTreeMap<(i32, u32), Vec<usize>> = BTreeMap::new();
    for (d_idx, &date) in ctx.horizon.days().iter().enumerate() {
        if is_weekend(date) {
            grouped.entry(iso_week_key(date)).or_default().push(d_idx);
        }
    }
    let weekend_groups: Vec<Vec<usize>> = grouped.into_values().collect();
    if weekend_groups.is_empty() || ctx.agents.is_empty() {
        return;
    }
    let n_groups = weekend_groups.len() as i64;

    let mut block_counts = Vec::with_capacity(ctx.agents.len());
    for a_idx in 0..ctx.agents.len() {
        let mut worked_blocks = Vec::with_capacity(weekend_groups.len());
        for group in &weekend_groups {
            let worked = model.new_bool();
            // Any assignment in the block forces `worked`; `worked` needs at
            // least one assignment to hold.
            let mut sum_terms: Vec<AffineView<DomainId>> = vec![worked.scaled(-1)];
            for &d_idx in group {
                for s_idx in 0..ctx.catalogue.len() {
                    let var = model.x[a_idx][d_idx][s_idx];
                    model.le(vec![var.scaled(1), worked.scaled(-1)], 0);
                    sum_terms.push(var.scaled(1));
                }
            }
            model.ge(sum_terms, 0);
            worked_blocks.push(worked);
        }

        let count = model.new_int(0, n_groups);
        let mut terms: Vec<AffineView<DomainId>> = vec![count.scaled(1)];
        for &worked in &worked_blocks {
            terms.push(worked.scaled(-1));
        }
        model.le(terms.clone(), 0);
        model.ge(terms, 0);
        block_counts.push(count);

        for w in 0..worked_blocks.len().saturating_sub(1) {
            let consecutive = model.and2(worked_blocks[w], worked_blocks[w + 1]);
            penalties.add(consecutive, WEIGHT_CONSECUTIVE_WEEKENDS, 1);
        }
    }
    add_spread_penalty(
        model,
        penalties,
        &block_counts,
        n_groups,
        WEIGHT_WEEKEND_FAIRNESS,
    );
}

// =========================================================================
// SOFT: reinforcement usage
// =========================================================================
// Priced so high that the solver only staffs a reinforcement agent when the
// base roster alone cannot cover.

fn add_reinforcement_usage(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    for a_idx in 0..ctx.agents.len() {
        if !ctx.is_synthetic(a_idx) {
            continue;
        }
        for d_idx in 0..ctx.horizon.len() {
            for s_idx in 0..ctx.catalogue.len() {
                let var = model.x[a_idx][d_idx][s_idx];
                penalties.add(var, WEIGHT_REINFORCEMENT, 1);
            }
        }
    }
}

// =========================================================================
// SOFT: roster stability
// =========================================================================

fn add_shift_switches(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    let n_days = ctx.horizon.len();
    let n_shifts = ctx.catalogue.len();
    for a_idx in 0..ctx.agents.len() {
        for d_idx in 0..n_days.saturating_sub(1) {
            for s1 in 0..n_shifts {
                for s2 in 0..n_shifts {
                    if s1 == s2 {
                        continue;
                    }
                    // Pairs the regime already rules out cannot switch.
                    if !ctx.access.is_allowed(a_idx, s1) || !ctx.access.is_allowed(a_idx, s2) {
                        continue;
                    }
                    let today = model.x[a_idx][d_idx][s1];
                    let tomorrow = model.x[a_idx][d_idx + 1][s2];
                    let switch = model.and2(today, tomorrow);
                    penalties.add(switch, WEIGHT_SHIFT_SWITCH, 1);
                }
            }
        }
    }
}

fn add_isolated_workdays(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    let n_days = ctx.horizon.len();
    for a_idx in 0..ctx.agents.len() {
        let mut work = Vec::with_capacity(n_days);
        for d_idx in 0..n_days {
            let worked = model.new_bool();
            let mut terms: Vec<AffineView<DomainId>> = vec![worked.scaled(1)];
            for s_idx in 0..ctx.catalogue.len() {
                terms.push(model.x[a_idx][d_idx][s_idx].scaled(-1));
            }
            model.le(terms.clone(), 0);
            model.ge(terms, 0);
            work.push(worked);
        }
        // Horizon endpoints are excluded: their neighbours are unknown.
        for d_idx in 1..n_days.saturating_sub(1) {
            let single = model.new_bool();
            model.le(vec![single.scaled(1), work[d_idx].scaled(-1)], 0);
            model.le(vec![single.scaled(1), work[d_idx - 1].scaled(1)], 1);
            model.le(vec![single.scaled(1), work[d_idx + 1].scaled(1)], 1);
            model.ge(
                vec![
                    single.scaled(1),
                    work[d_idx].scaled(-1),
                    work[d_idx - 1].scaled(1),
                    work[d_idx + 1].scaled(1),
                ],
                0,
            );
            penalties.add(single, WEIGHT_ISOLATED_DAY, 1);
        }
    }
}

// =========================================================================
// SOFT: workload targets
// =========================================================================

/// Quotity-proportional desired minutes per agent over the period.
///
/// Each staffed shift's total minutes are split over its eligible agents,
/// weighted by quotity, rounded half away from zero.
pub(crate) fn desired_period_minutes(ctx: &ModelContext<'_>) -> Vec<i64> {
    let n_days = ctx.horizon.len() as i64;
    let mut desired = vec![0i64; ctx.agents.len()];
    for s_idx in ctx.catalogue.global_allowed_indices() {
        let required = ctx.catalogue.required(s_idx) as i64;
        if required == 0 {
            continue;
        }
        let total_minutes = required * n_days * ctx.catalogue.info(s_idx).duration;
        let eligible = ctx.access.eligible_agents(s_idx);
        if eligible.is_empty() {
            continue;
        }
        let total_weight: i64 = eligible
            .iter()
            .map(|&a_idx| quotity_weight(&ctx.agents[a_idx]))
            .sum();
        for &a_idx in &eligible {
            let weight = quotity_weight(&ctx.agents[a_idx]);
            let share =
                total_minutes as f64 * weight as f64 / total_weight as f64;
            desired[a_idx] += share.round() as i64;
        }
    }
    desired
}

#[inline]
fn quotity_weight(agent: &Agent) -> i64 {
    (agent.quotity as i64).max(1)
}

fn add_period_target_deviation(model: &mut ScheduleModel<'_>, penalties: &mut PenaltySum) {
    let ctx = model.ctx;
    let desired = desired_period_minutes(ctx);
    let workload_cap = ctx.horizon.len() as i64 * ctx.catalogue.max_shift_duration();

    for a_idx in 0..ctx.agents.len() {
        let target = desired[a_idx];
        let deviation_cap = workload_cap + target;
        let deviation = model.new_int(0, deviation_cap);
        add_abs_deviation(model, a_idx, deviation, target);
        penalties.add(deviation, WEIGHT_PERIOD_TARGET, deviation_cap);
    }
}

fn add_annual_target_deviation(
    model: &mut ScheduleModel<'_>,
    baseline_minutes: &HashMap<String, i64>,
    penalties: &mut PenaltySum,
) {
    let ctx = model.ctx;
    let workload_cap = ctx.horizon.len() as i64 * ctx.catalogue.max_shift_duration();
    let max_baseline = ctx
        .agents
        .iter()
        .map(|a| baseline_of(baseline_minutes, a))
        .max()
        .unwrap_or(0);
    let max_target = ctx
        .agents
        .iter()
        .filter_map(|a| a.annual_target_hours)
        .map(target_minutes_of)
        .max()
        .unwrap_or(0);
    let deviation_cap = max_baseline.max(max_target) + workload_cap;

    for (a_idx, agent) in ctx.agents.iter().enumerate() {
        let Some(hours) = agent.annual_target_hours else {
            continue;
        };
        let target = target_minutes_of(hours) - baseline_of(baseline_minutes, agent);
        let deviation = model.new_int(0, deviation_cap);
        add_abs_deviation(model, a_idx, deviation, target);
        penalties.add(deviation, WEIGHT_ANNUAL_TARGET, deviation_cap);
    }
}

/// Posts `deviation ≥ |planned_minutes(agent) − target|`.
fn add_abs_deviation(model: &mut ScheduleModel<'_>, a_idx: usize, deviation: DomainId, target: i64) {
    let ctx = model.ctx;
    let mut above: Vec<AffineView<DomainId>> = vec![deviation.scaled(1)];
    let mut below: Vec<AffineView<DomainId>> = vec![deviation.scaled(1)];
    for d_idx in 0..ctx.horizon.len() {
        for s_idx in 0..ctx.catalogue.len() {
            let duration = clamp_i32(ctx.catalogue.info(s_idx).duration);
            let var = model.x[a_idx][d_idx][s_idx];
            // deviation − planned ≥ −target
            above.push(var.scaled(-duration));
            // deviation + planned ≥ target
            below.push(var.scaled(duration));
        }
    }
    model.ge(above, clamp_i32(-target));
    model.ge(below, clamp_i32(target));
}

#[inline]
fn baseline_of(baseline_minutes: &HashMap<String, i64>, agent: &Agent) -> i64 {
    baseline_minutes.get(&agent.id).copied().unwrap_or(0).max(0)
}

#[inline]
fn target_minutes_of(hours: f64) -> i64 {
    (hours * 60.0).round() as i64
}

// =========================================================================
// Helpers
// =========================================================================

/// Penalises `weight · (max − min)` of the given count variables.
///
/// `max` is bounded below by every count and `min` above, so both are exact
/// at the optimum under a positive weight.
fn add_spread_penalty(
    model: &mut ScheduleModel<'_>,
    penalties: &mut PenaltySum,
    counts: &[DomainId],
    count_upper: i64,
    weight: i64,
) {
    if counts.is_empty() {
        return;
    }
    let max_count = model.new_int(0, count_upper);
    let min_count = model.new_int(0, count_upper);
    for &count in counts {
        model.ge(vec![max_count.scaled(1), count.scaled(-1)], 0);
        model.le(vec![min_count.scaled(1), count.scaled(-1)], 0);
    }
    penalties.add(max_count, weight, count_upper);
    penalties.add(min_count, -weight, count_upper);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Horizon;
    use crate::catalogue::ShiftCatalogue;
    use crate::demo_data::{self, DemoData};
    use crate::domain::{REGIME_MATIN_ONLY, REGIME_SOIR_ONLY};

    #[test]
    fn test_desired_shares_follow_quotity() {
        let mut request = demo_data::generate(DemoData::Small);
        request.agents = vec![
            Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY),
            Agent::new("A2", "Lea", "Martin", REGIME_MATIN_ONLY).with_quotity(50),
            Agent::new("A3", "Samir", "Khelifi", REGIME_SOIR_ONLY),
        ];
        let horizon = Horizon::expand(request.params.start_date, request.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&request.params).unwrap();
        let ctx = ModelContext::new(
            &request.params,
            &horizon,
            &catalogue,
            &request.agents,
            &request.locked_assignments,
            request.agents.len(),
        );

        let desired = desired_period_minutes(&ctx);
        // MATIN: 1 × 4 days × 420 min = 1680, split 100:50 over A1/A2.
        assert_eq!(desired[0], 1120);
        assert_eq!(desired[1], 560);
        // SOIR: 1680 entirely on A3.
        assert_eq!(desired[2], 1680);
    }

    #[test]
    fn test_desired_shares_round_half_away_from_zero() {
        let mut request = demo_data::generate(DemoData::Small);
        // 2 equally weighted agents over an odd minute total: 3 days × 1 × 421
        // minutes = 1263; half shares of 631.5 round up to 632 each.
        request.params.end_date = "2026-02-11".parse().unwrap();
        request
            .params
            .shifts
            .get_mut(crate::domain::MATIN)
            .unwrap()
            .duration_minutes = 421;
        request.agents = vec![
            Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY),
            Agent::new("A2", "Lea", "Martin", REGIME_MATIN_ONLY),
        ];
        let horizon = Horizon::expand(request.params.start_date, request.params.end_date).unwrap();
        let catalogue = ShiftCatalogue::build(&request.params).unwrap();
        let ctx = ModelContext::new(
            &request.params,
            &horizon,
            &catalogue,
            &request.agents,
            &request.locked_assignments,
            request.agents.len(),
        );

        let desired = desired_period_minutes(&ctx);
        assert_eq!(desired[0], 632);
        assert_eq!(desired[1], 632);
    }

    #[test]
    fn test_quotity_weight_floors_at_one() {
        let zero = Agent::new("A1", "X", "Y", REGIME_MATIN_ONLY).with_quotity(0);
        assert_eq!(quotity_weight(&zero), 1);
        let full = Agent::new("A2", "X", "Y", REGIME_MATIN_ONLY);
        assert_eq!(quotity_weight(&full), 100);
    }
}

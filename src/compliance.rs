//! Post-solve compliance report.
//!
//! Re-checks a decoded schedule against the coverage and regime rules and
//! derives fairness warnings. Hard violations should stay empty for any
//! schedule the solver produced; the report exists so callers can audit a
//! plan that was edited by hand or loaded from elsewhere.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::calendar::{is_weekend, week_monday, Horizon};
use crate::domain::{
    Agent, PlanningParams, ShiftAssignment, JOUR_12H, MATIN, REGIME_MIXTE, SOIR,
};

/// Diagnostic view of a schedule: rule violations, fairness warnings, and
/// the ruleset snapshot they were judged against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub hard_violations: Vec<String>,
    pub warnings: Vec<String>,
    pub ruleset_used: Map<String, Value>,
}

/// Builds the compliance report for a schedule.
pub fn build_report(
    params: &PlanningParams,
    assignments: &[ShiftAssignment],
    agents: &[Agent],
) -> ComplianceReport {
    let mut hard_violations = Vec::new();
    let mut warnings = Vec::new();

    check_coverage(params, assignments, &mut hard_violations);
    check_regime_compatibility(params, assignments, agents, &mut hard_violations);
    check_fairness(assignments, agents, &mut warnings);

    ComplianceReport {
        hard_violations,
        warnings,
        ruleset_used: ruleset_snapshot(params),
    }
}

fn ruleset_snapshot(params: &PlanningParams) -> Map<String, Value> {
    let defaults = &params.ruleset_defaults;
    let mut snapshot = Map::new();
    snapshot.insert(
        "daily_rest_min_minutes".into(),
        json!(defaults.daily_rest_min_minutes),
    );
    snapshot.insert(
        "daily_rest_min_minutes_with_agreement".into(),
        json!(defaults.daily_rest_min_minutes_with_agreement),
    );
    snapshot.insert(
        "weekly_rest_min_minutes".into(),
        json!(defaults.weekly_rest_min_minutes),
    );
    snapshot.insert(
        "max_minutes_rolling_7d".into(),
        json!(defaults.max_minutes_rolling_7d),
    );
    snapshot.insert("cycle_mode_enabled".into(), json!(defaults.cycle_mode_enabled));
    snapshot.insert("cycle_weeks".into(), json!(defaults.cycle_weeks));
    snapshot.insert(
        "max_minutes_per_week_excluding_overtime".into(),
        json!(defaults.max_minutes_per_week_excluding_overtime),
    );
    snapshot.insert(
        "transmissions_minutes".into(),
        json!(params.admin_params.transmissions_minutes),
    );
    snapshot.insert(
        "pause_min_minutes".into(),
        json!(params.admin_params.pause_min_minutes),
    );
    snapshot.insert(
        "agreement_11h_enabled".into(),
        json!(params.agreement_11h_enabled),
    );
    snapshot.insert("legal_profile".into(), json!(params.legal_profile));
    snapshot.insert(
        "allow_single_12h_exception".into(),
        json!(params.allow_single_12h_exception),
    );
    snapshot.insert(
        "max_12h_exceptions_per_agent".into(),
        json!(params.max_12h_exceptions_per_agent),
    );
    snapshot.insert(
        "allowed_12h_exception_dates".into(),
        json!(params.allowed_12h_exception_dates),
    );
    snapshot.insert(
        "forbid_matin_soir_matin".into(),
        json!(params.forbid_matin_soir_matin),
    );
    snapshot
}

fn check_coverage(
    params: &PlanningParams,
    assignments: &[ShiftAssignment],
    hard_violations: &mut Vec<String>,
) {
    let Ok(horizon) = Horizon::expand(params.start_date, params.end_date) else {
        return;
    };
    for &date in horizon.days() {
        for (shift, &required) in &params.coverage_requirements {
            let count = assignments
                .iter()
                .filter(|a| a.date == date && &a.shift == shift)
                .count() as u32;
            if count < required {
                hard_violations.push(format!(
                    "Couverture insuffisante {shift} le {date}: {count}/{required}"
                ));
            }
        }
    }
}

fn check_regime_compatibility(
    params: &PlanningParams,
    assignments: &[ShiftAssignment],
    agents: &[Agent],
    hard_violations: &mut Vec<String>,
) {
    let regime_map: HashMap<&str, &str> = agents
        .iter()
        .map(|a| (a.id.as_str(), a.regime.as_str()))
        .collect();

    for assignment in assignments {
        let Some(&regime) = regime_map.get(assignment.agent_id.as_str()) else {
            continue;
        };
        let allowed: Vec<&str> = if regime == REGIME_MIXTE {
            let mut shifts = vec![MATIN, SOIR];
            if params.allow_single_12h_exception {
                shifts.push(JOUR_12H);
            }
            shifts
        } else {
            params
                .agent_regimes
                .get(regime)
                .map(|r| r.allowed_shifts.iter().map(String::as_str).collect())
                .unwrap_or_default()
        };
        if !allowed.contains(&assignment.shift.as_str()) {
            hard_violations.push(format!(
                "Incompatibilite regime/shift pour {} le {}: {}",
                assignment.agent_id, assignment.date, assignment.shift
            ));
        }
        if regime == REGIME_MIXTE
            && assignment.shift == JOUR_12H
            && params.allow_single_12h_exception
            && !params.allowed_12h_exception_dates.is_empty()
            && !params.allowed_12h_exception_dates.contains(&assignment.date)
        {
            hard_violations.push(format!(
                "12h non autorise hors dates d'exception pour {} le {}",
                assignment.agent_id, assignment.date
            ));
        }
    }
}

fn check_fairness(assignments: &[ShiftAssignment], agents: &[Agent], warnings: &mut Vec<String>) {
    let mut soir_counts: BTreeMap<&str, u32> = BTreeMap::new();
    let mut weekend_counts: BTreeMap<&str, u32> = BTreeMap::new();
    let mut weekend_blocks: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
    for agent in agents {
        soir_counts.insert(&agent.id, 0);
        weekend_counts.insert(&agent.id, 0);
        weekend_blocks.insert(&agent.id, BTreeSet::new());
    }

    for assignment in assignments {
        let id = assignment.agent_id.as_str();
        if !soir_counts.contains_key(id) {
            continue;
        }
        if assignment.shift == SOIR {
            *soir_counts.get_mut(id).unwrap() += 1;
        }
        if is_weekend(assignment.date) {
            *weekend_counts.get_mut(id).unwrap() += 1;
            // Weekend blocks are keyed by their ISO week's Monday.
            weekend_blocks
                .get_mut(id)
                .unwrap()
                .insert(week_monday(assignment.date));
        }
    }

    if spread(&soir_counts) >= 2 {
        warnings.push("Equite: ecart important de nombre de soirs entre agents".to_string());
    }
    if spread(&weekend_counts) >= 2 {
        warnings.push("Equite: ecart important de week-ends entre agents".to_string());
    }

    let mut consecutive: Vec<&str> = Vec::new();
    for (&id, mondays) in &weekend_blocks {
        let sorted: Vec<NaiveDate> = mondays.iter().copied().collect();
        if sorted
            .windows(2)
            .any(|pair| (pair[1] - pair[0]).num_days() == 7)
        {
            consecutive.push(id);
        }
    }
    if !consecutive.is_empty() {
        consecutive.sort_unstable();
        warnings.push(format!(
            "Rotation week-end: certains agents ont des week-ends consecutifs ({})",
            consecutive.join(", ")
        ));
    }
}

fn spread(counts: &BTreeMap<&str, u32>) -> u32 {
    let max = counts.values().max().copied().unwrap_or(0);
    let min = counts.values().min().copied().unwrap_or(0);
    max - min
}

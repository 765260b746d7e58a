//! End-to-end scheduling scenarios.
//!
//! Solutions are asserted on contracts (coverage, rule compliance, status,
//! objective value), never on which of several equal-cost optima the solver
//! happened to pick.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use shift_planning::demo_data::{self, DemoData};
use shift_planning::domain::{JOUR_12H, MATIN, REGIME_12H_JOUR, REGIME_MATIN_ONLY, REGIME_MIXTE, REGIME_SOIR_ONLY, SOIR};
use shift_planning::{
    build_report, build_solution, Agent, LockedAssignment, PlanningMode, Preference,
    PreferenceKind, ScheduleRequest, ScheduleStatus, SchedulerResult, ShiftAssignment,
};

fn small() -> ScheduleRequest {
    demo_data::generate(DemoData::Small)
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn solve(request: &ScheduleRequest) -> SchedulerResult {
    build_solution(request, None)
}

/// Per-agent date → shift view of an assignment list.
fn by_agent(assignments: &[ShiftAssignment]) -> HashMap<String, BTreeMap<NaiveDate, String>> {
    let mut map: HashMap<String, BTreeMap<NaiveDate, String>> = HashMap::new();
    for a in assignments {
        let previous = map
            .entry(a.agent_id.clone())
            .or_default()
            .insert(a.date, a.shift.clone());
        assert!(
            previous.is_none(),
            "agent {} has two shifts on {}",
            a.agent_id,
            a.date
        );
    }
    map
}

fn assert_coverage_equality(request: &ScheduleRequest, assignments: &[ShiftAssignment]) {
    let mut date = request.params.start_date;
    while date <= request.params.end_date {
        for (shift, &required) in &request.params.coverage_requirements {
            let count = assignments
                .iter()
                .filter(|a| a.date == date && &a.shift == shift)
                .count() as u32;
            assert_eq!(
                count, required,
                "coverage of {shift} on {date}: got {count}, wanted {required}"
            );
        }
        date = date.succ_opt().unwrap();
    }
}

#[test]
fn test_feasible_basic() {
    let request = small();
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert!(!result.assignments.is_empty());
    assert!(result.score.is_some());
    assert!(result.explanation.is_none());
    assert!(result.added_agents.is_empty());
    // 4 days × (1 MATIN + 1 SOIR), exactly.
    assert_eq!(result.assignments.len(), 8);
    assert_coverage_equality(&request, &result.assignments);
    by_agent(&result.assignments); // at most one shift per agent per day
}

#[test]
fn test_regime_compatibility() {
    let request = small();
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    for a in &result.assignments {
        assert!(a.shift == MATIN || a.shift == SOIR, "unexpected {}", a.shift);
        if a.shift == SOIR {
            assert_eq!(a.agent_id, "A2", "only A2 may work SOIR");
        }
    }
}

#[test]
fn test_coverage_enforced() {
    let mut request = small();
    request.params.coverage_requirements.insert(SOIR.into(), 2);
    request.agents = vec![Agent::new("A1", "Anna", "Dupont", REGIME_SOIR_ONLY)];
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
    assert!(result.assignments.is_empty());
    assert_eq!(
        result.explanation.as_deref(),
        Some("Aucune solution faisable sous contraintes")
    );
}

#[test]
fn test_forbidden_transition_soir_to_matin() {
    let mut request = small();
    request.agents = vec![
        Agent::new("A1", "A", "A", REGIME_SOIR_ONLY),
        Agent::new("A2", "B", "B", REGIME_MATIN_ONLY),
    ];
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);

    for (_, days) in by_agent(&result.assignments) {
        let dates: Vec<&NaiveDate> = days.keys().collect();
        for pair in dates.windows(2) {
            if (*pair[1] - *pair[0]).num_days() == 1 {
                assert!(
                    !(days[pair[0]] == SOIR && days[pair[1]] == MATIN),
                    "SOIR followed by MATIN"
                );
            }
        }
    }
}

#[test]
fn test_max_consecutive_12h() {
    let mut request = small();
    request.params.mode = PlanningMode::Jour12h;
    request.params.coverage_requirements =
        [(MATIN.to_string(), 0), (SOIR.to_string(), 0), (JOUR_12H.to_string(), 1)]
            .into_iter()
            .collect();
    request.agents = vec![Agent::new("A1", "A", "A", REGIME_12H_JOUR)];
    // Four days of 12h coverage against a three-consecutive-days regime cap.
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
}

#[test]
fn test_locked_assignment() {
    let mut request = small();
    request.locked_assignments = vec![LockedAssignment {
        agent_id: "A1".into(),
        date: d("2026-02-10"),
        shift: MATIN.into(),
    }];
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert!(result
        .assignments
        .iter()
        .any(|a| a.agent_id == "A1" && a.date == d("2026-02-10") && a.shift == MATIN));
}

#[test]
fn test_unavailability_enforced() {
    let mut request = small();
    request.agents[0] = request.agents[0]
        .clone()
        .with_unavailable_date(d("2026-02-10"));
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert!(result
        .assignments
        .iter()
        .all(|a| !(a.agent_id == "A1" && a.date == d("2026-02-10"))));
}

#[test]
fn test_mode_coverage_mismatch() {
    let mut request = small();
    request.params.mode = PlanningMode::MatinSoir;
    request.params.coverage_requirements.insert(JOUR_12H.into(), 1);
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
    assert_eq!(
        result.explanation.as_deref(),
        Some("Couverture demandee pour JOUR_12H incompatible avec le mode matin_soir")
    );
}

#[test]
fn test_invalid_horizon() {
    let mut request = small();
    request.params.start_date = d("2026-02-12");
    request.params.end_date = d("2026-02-09");
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
    assert_eq!(result.explanation.as_deref(), Some("Période invalide"));
}

#[test]
fn test_cycle_mode_weekly_max() {
    let mut request = small();
    request.params.ruleset_defaults.cycle_mode_enabled = true;
    request
        .params
        .ruleset_defaults
        .max_minutes_per_week_excluding_overtime = 420;
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
}

#[test]
fn test_rolling_7d_max() {
    let mut request = small();
    request.params.ruleset_defaults.max_minutes_rolling_7d = 420;
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
}

#[test]
fn test_reinforcement_loop_adds_renfort() {
    let mut request = small();
    request.params.coverage_requirements =
        [(MATIN.to_string(), 0), (SOIR.to_string(), 2), (JOUR_12H.to_string(), 0)]
            .into_iter()
            .collect();
    request.agents = vec![Agent::new("A1", "Anna", "Dupont", REGIME_SOIR_ONLY)];
    request.params.auto_add_agents_if_needed = true;
    request.params.max_extra_agents = 2;

    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert_eq!(result.added_agents.len(), 1);

    let renfort = &result.added_agents[0];
    assert_eq!(renfort.id, "R1");
    assert_eq!(renfort.last_name, "Renfort");
    assert_eq!(renfort.regime, REGIME_MIXTE);

    // Reinforcements in `added_agents` are actually staffed.
    assert!(result.assignments.iter().any(|a| a.agent_id == "R1"));
    assert_coverage_equality(&request, &result.assignments);
}

#[test]
fn test_reinforcement_loop_deepens_until_coverage_holds() {
    // MATIN 1 + SOIR 2 needs three bodies per day; one agent is supplied.
    let mut request = small();
    request.params.coverage_requirements.insert(SOIR.into(), 2);
    request.agents = vec![Agent::new("A1", "Anna", "Dupont", REGIME_SOIR_ONLY)];
    request.params.auto_add_agents_if_needed = true;
    request.params.max_extra_agents = 3;

    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    let ids: Vec<&str> = result.added_agents.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["R1", "R2"]);
    for id in ids {
        assert!(
            result.assignments.iter().any(|a| a.agent_id == id),
            "{id} was added but never staffed"
        );
    }
    assert_coverage_equality(&request, &result.assignments);
}

#[test]
fn test_reinforcement_respects_cap() {
    let mut request = small();
    request.params.coverage_requirements.insert(SOIR.into(), 2);
    request.agents = vec![Agent::new("A1", "Anna", "Dupont", REGIME_SOIR_ONLY)];
    request.params.auto_add_agents_if_needed = true;
    request.params.max_extra_agents = 0;

    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);
    assert!(result.added_agents.is_empty());
}

#[test]
fn test_same_input_same_objective() {
    let request = small();
    let first = solve(&request);
    let second = solve(&request);
    assert_eq!(first.status, ScheduleStatus::Ok);
    assert_eq!(first.score, second.score);
}

#[test]
fn test_increasing_preference_weight_increases_cost() {
    // A2 is the only SOIR-capable agent, so an avoid-SOIR wish is always
    // violated and its weight lands in the objective untouched.
    let scored = |weight: i64| {
        let mut request = small();
        request.agents[1] = request.agents[1].clone().with_preference(Preference {
            date: d("2026-02-10"),
            shift: SOIR.into(),
            kind: PreferenceKind::Avoid,
            weight,
        });
        let result = solve(&request);
        assert_eq!(result.status, ScheduleStatus::Ok);
        result.score.unwrap()
    };
    let light = scored(1);
    let heavy = scored(3);
    assert_eq!(heavy - light, 2);
}

#[test]
fn test_preference_outside_horizon_is_ignored() {
    let baseline_score = solve(&small()).score;

    let mut request = small();
    request.agents[0] = request.agents[0].clone().with_preference(Preference {
        date: d("2026-03-01"),
        shift: MATIN.into(),
        kind: PreferenceKind::Prefer,
        weight: 5,
    });
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert_eq!(result.score, baseline_score);
}

fn mixte_12h_request(max_exceptions: u32) -> ScheduleRequest {
    let mut request = small();
    request.params.end_date = d("2026-02-10");
    request.params.coverage_requirements =
        [(MATIN.to_string(), 0), (SOIR.to_string(), 0), (JOUR_12H.to_string(), 1)]
            .into_iter()
            .collect();
    request.params.allow_single_12h_exception = true;
    request.params.max_12h_exceptions_per_agent = max_exceptions;
    request.agents = vec![Agent::new("A1", "Lea", "Martin", REGIME_MIXTE)];
    request
}

#[test]
fn test_12h_exception_cap_bites() {
    // Two days of 12h coverage against a single allowed exception.
    let result = solve(&mixte_12h_request(1));
    assert_eq!(result.status, ScheduleStatus::Infeasible);

    let result = solve(&mixte_12h_request(2));
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert_eq!(
        result
            .assignments
            .iter()
            .filter(|a| a.shift == JOUR_12H)
            .count(),
        2
    );
}

#[test]
fn test_12h_exception_date_whitelist() {
    let mut request = mixte_12h_request(2);
    request.params.allowed_12h_exception_dates = vec![d("2026-02-09")];
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Infeasible);

    let mut request = mixte_12h_request(2);
    request.params.allowed_12h_exception_dates = vec![d("2026-02-09"), d("2026-02-10")];
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);
}

fn pattern_ban_request(forbid: bool) -> ScheduleRequest {
    let mut request = small();
    request.params.end_date = d("2026-02-11");
    request.params.forbid_matin_soir_matin = forbid;
    // Loosen the rest rules so only the pattern ban separates the two cases.
    request.params.hard_forbidden_transitions.clear();
    request.params.ruleset_defaults.daily_rest_min_minutes = 600;
    request.agents = vec![
        Agent::new("A1", "Lea", "Martin", REGIME_MIXTE),
        Agent::new("A2", "Hugo", "Bernard", REGIME_MIXTE),
    ];
    request.locked_assignments = vec![
        LockedAssignment {
            agent_id: "A1".into(),
            date: d("2026-02-09"),
            shift: MATIN.into(),
        },
        LockedAssignment {
            agent_id: "A1".into(),
            date: d("2026-02-10"),
            shift: SOIR.into(),
        },
        LockedAssignment {
            agent_id: "A1".into(),
            date: d("2026-02-11"),
            shift: MATIN.into(),
        },
    ];
    request
}

#[test]
fn test_matin_soir_matin_pattern_ban() {
    let result = solve(&pattern_ban_request(true));
    assert_eq!(result.status, ScheduleStatus::Infeasible);

    let result = solve(&pattern_ban_request(false));
    assert_eq!(result.status, ScheduleStatus::Ok);
    let schedule = by_agent(&result.assignments);
    assert_eq!(schedule["A1"][&d("2026-02-09")], MATIN);
    assert_eq!(schedule["A1"][&d("2026-02-10")], SOIR);
    assert_eq!(schedule["A1"][&d("2026-02-11")], MATIN);
}

fn weekly_rest_request(agents: Vec<Agent>) -> ScheduleRequest {
    let mut request = small();
    request.params.end_date = d("2026-02-15"); // seven days
    request.params.coverage_requirements =
        [(MATIN.to_string(), 1), (SOIR.to_string(), 0), (JOUR_12H.to_string(), 0)]
            .into_iter()
            .collect();
    // Keep the rolling cap out of the way so only the weekly rest rule acts.
    request.params.ruleset_defaults.max_minutes_rolling_7d = 4000;
    request.agents = agents;
    request
}

#[test]
fn test_weekly_rest_block_required() {
    // A lone agent would have to work all seven days with no rest block.
    let result = solve(&weekly_rest_request(vec![Agent::new(
        "A1",
        "Anna",
        "Dupont",
        REGIME_MATIN_ONLY,
    )]));
    assert_eq!(result.status, ScheduleStatus::Infeasible);

    let result = solve(&weekly_rest_request(vec![
        Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY),
        Agent::new("A2", "Lea", "Martin", REGIME_MATIN_ONLY),
    ]));
    assert_eq!(result.status, ScheduleStatus::Ok);

    // Each agent keeps a qualifying rest block: two consecutive off days or
    // a worked-off-worked bridge (MATIN to MATIN spans 41h ≥ 36h).
    let schedule = by_agent(&result.assignments);
    for agent_id in ["A1", "A2"] {
        let worked: Vec<bool> = (0..7)
            .map(|k| {
                let date = d("2026-02-09") + chrono::Duration::days(k);
                schedule
                    .get(agent_id)
                    .map(|m| m.contains_key(&date))
                    .unwrap_or(false)
            })
            .collect();
        let double_off = worked.windows(2).any(|w| !w[0] && !w[1]);
        let bridge = worked.windows(3).any(|w| w[0] && !w[1] && w[2]);
        assert!(
            double_off || bridge,
            "{agent_id} has no weekly rest block: {worked:?}"
        );
    }
}

#[test]
fn test_annual_target_consumes_baseline_minutes() {
    let mut request = small();
    request.params.end_date = d("2026-02-10");
    request.params.coverage_requirements =
        [(MATIN.to_string(), 1), (SOIR.to_string(), 0), (JOUR_12H.to_string(), 0)]
            .into_iter()
            .collect();
    request.agents = vec![
        Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY).with_annual_target_hours(14.0)
    ];

    // Planned minutes exactly meet the 14h target: zero deviation.
    let result = build_solution(&request, None);
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert_eq!(result.score, Some(0));

    // A 100-minute baseline overshoots the target by exactly that much.
    let baseline: HashMap<String, i64> = [("A1".to_string(), 100)].into_iter().collect();
    let result = build_solution(&request, Some(&baseline));
    assert_eq!(result.status, ScheduleStatus::Ok);
    assert_eq!(result.score, Some(100));
}

#[test]
fn test_compliance_report_on_solver_output() {
    let request = small();
    let result = solve(&request);
    assert_eq!(result.status, ScheduleStatus::Ok);

    let report = build_report(&request.params, &result.assignments, &request.agents);
    assert!(
        report.hard_violations.is_empty(),
        "solver output violates rules: {:?}",
        report.hard_violations
    );
    assert_eq!(
        report.ruleset_used.get("forbid_matin_soir_matin"),
        Some(&serde_json::json!(true))
    );
}

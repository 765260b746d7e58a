//! Demo request generators for the scheduling core.
//!
//! `Small` is the canonical four-day USLD fixture used across the test
//! suite; `Large` is a seeded four-week unit with a fuller roster,
//! availabilities and preferences sprinkled pseudo-randomly.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::{
    Agent, PlanningMode, PlanningParams, Preference, PreferenceKind, RegimeDef, ScheduleRequest,
    ShiftDef, TransitionRule, JOUR_12H, MATIN, REGIME_12H_JOUR, REGIME_MATIN_ONLY, REGIME_MIXTE,
    REGIME_POLYVALENT, REGIME_SOIR_ONLY, SOIR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Generates a demo scheduling request.
pub fn generate(demo: DemoData) -> ScheduleRequest {
    match demo {
        DemoData::Small => generate_small(),
        DemoData::Large => generate_large(),
    }
}

fn standard_shifts() -> BTreeMap<String, ShiftDef> {
    let mut shifts = BTreeMap::new();
    shifts.insert(MATIN.to_string(), ShiftDef::new("07:00", "14:00", 420));
    shifts.insert(SOIR.to_string(), ShiftDef::new("14:00", "21:00", 420));
    shifts.insert(JOUR_12H.to_string(), ShiftDef::new("07:00", "19:00", 720));
    shifts
}

fn standard_regimes(with_polyvalent: bool) -> BTreeMap<String, RegimeDef> {
    let mut regimes = BTreeMap::new();
    regimes.insert(
        REGIME_12H_JOUR.to_string(),
        RegimeDef::new([JOUR_12H]).with_max_consecutive_12h_days(3),
    );
    regimes.insert(REGIME_MATIN_ONLY.to_string(), RegimeDef::new([MATIN]));
    regimes.insert(REGIME_SOIR_ONLY.to_string(), RegimeDef::new([SOIR]));
    regimes.insert(REGIME_MIXTE.to_string(), RegimeDef::new([MATIN, SOIR]));
    if with_polyvalent {
        regimes.insert(
            REGIME_POLYVALENT.to_string(),
            RegimeDef::new([MATIN, SOIR, JOUR_12H]),
        );
    }
    regimes
}

fn rest_transitions() -> Vec<TransitionRule> {
    vec![
        TransitionRule {
            from_shift: SOIR.to_string(),
            to_shift: MATIN.to_string(),
            reason: "daily_rest < 11h (10h)".to_string(),
        },
        TransitionRule {
            from_shift: SOIR.to_string(),
            to_shift: JOUR_12H.to_string(),
            reason: "daily_rest < 11h (10h)".to_string(),
        },
    ]
}

fn base_params(
    service_unit: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    coverage: &[(&str, u32)],
    with_polyvalent: bool,
) -> PlanningParams {
    PlanningParams {
        service_unit: service_unit.to_string(),
        start_date,
        end_date,
        mode: PlanningMode::Mixte,
        coverage_requirements: coverage
            .iter()
            .map(|&(code, count)| (code.to_string(), count))
            .collect(),
        planning_scope: Default::default(),
        shifts: standard_shifts(),
        assumptions: Default::default(),
        admin_params: Default::default(),
        ruleset_defaults: Default::default(),
        agent_regimes: standard_regimes(with_polyvalent),
        hard_forbidden_transitions: rest_transitions(),
        legal_profile: Default::default(),
        agreement_11h_enabled: false,
        allow_single_12h_exception: false,
        max_12h_exceptions_per_agent: 1,
        allowed_12h_exception_dates: Vec::new(),
        forbid_matin_soir_matin: true,
        use_tracker: false,
        tracker_year: 2026,
        auto_add_agents_if_needed: false,
        max_extra_agents: 0,
        record_tracker_on_generate: false,
    }
}

/// Four days, one MATIN and one SOIR per day, three agents.
fn generate_small() -> ScheduleRequest {
    let params = base_params(
        "USLD",
        NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
        NaiveDate::from_ymd_opt(2026, 2, 12).unwrap(),
        &[(MATIN, 1), (SOIR, 1), (JOUR_12H, 0)],
        false,
    );
    let agents = vec![
        Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY),
        Agent::new("A2", "Samir", "Khelifi", REGIME_SOIR_ONLY),
        Agent::new("A3", "Lea", "Martin", REGIME_MATIN_ONLY),
    ];
    ScheduleRequest {
        params,
        agents,
        locked_assignments: Vec::new(),
    }
}

const FIRST_NAMES: &[&str] = &[
    "Anna", "Samir", "Lea", "Hugo", "Ines", "Marc", "Nadia", "Paul", "Sofia", "Yanis", "Claire",
    "Karim",
];
const LAST_NAMES: &[&str] = &[
    "Dupont", "Khelifi", "Martin", "Bernard", "Petit", "Moreau", "Garcia", "Roux", "Fontaine",
    "Lambert", "Girard", "Benali",
];

/// Four weeks, a twelve-agent roster, seeded availability and preferences.
fn generate_large() -> ScheduleRequest {
    let mut rng = StdRng::seed_from_u64(0);

    let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let end = start + Duration::days(27);
    let mut params = base_params(
        "SSR",
        start,
        end,
        &[(MATIN, 2), (SOIR, 2), (JOUR_12H, 1)],
        true,
    );
    params.auto_add_agents_if_needed = true;
    params.max_extra_agents = 10;

    let regimes = [
        REGIME_12H_JOUR,
        REGIME_12H_JOUR,
        REGIME_12H_JOUR,
        REGIME_MATIN_ONLY,
        REGIME_MATIN_ONLY,
        REGIME_MATIN_ONLY,
        REGIME_SOIR_ONLY,
        REGIME_SOIR_ONLY,
        REGIME_MIXTE,
        REGIME_MIXTE,
        REGIME_MIXTE,
        REGIME_POLYVALENT,
    ];
    let shift_codes = [MATIN, SOIR, JOUR_12H];

    let mut agents = Vec::with_capacity(regimes.len());
    for (i, &regime) in regimes.iter().enumerate() {
        let mut agent = Agent::new(
            format!("A{}", i + 1),
            FIRST_NAMES[i % FIRST_NAMES.len()],
            LAST_NAMES[i % LAST_NAMES.len()],
            regime,
        );

        agent.quotity = *[100, 100, 100, 80, 50].choose(&mut rng).unwrap();

        for _ in 0..rng.gen_range(0..=3) {
            let day = start + Duration::days(rng.gen_range(0..28));
            if !agent.unavailability_dates.contains(&day) {
                agent.unavailability_dates.push(day);
            }
        }

        for _ in 0..rng.gen_range(0..=2) {
            agent.preferences.push(Preference {
                date: start + Duration::days(rng.gen_range(0..28)),
                shift: shift_codes.choose(&mut rng).unwrap().to_string(),
                kind: if rng.gen_bool(0.5) {
                    PreferenceKind::Prefer
                } else {
                    PreferenceKind::Avoid
                },
                weight: 1,
            });
        }

        if rng.gen_bool(0.25) {
            agent.annual_target_hours = Some(1607.0);
        }

        agents.push(agent);
    }

    ScheduleRequest {
        params,
        agents,
        locked_assignments: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_small_is_the_canonical_fixture() {
        let request = generate(DemoData::Small);
        assert_eq!(request.params.service_unit, "USLD");
        assert_eq!(request.params.mode, PlanningMode::Mixte);
        assert_eq!(request.agents.len(), 3);
        assert_eq!(request.params.shifts.len(), 3);
        assert_eq!(request.params.agent_regimes.len(), 4);
        assert_eq!(
            request.params.coverage_requirements.get(MATIN).copied(),
            Some(1)
        );
        assert_eq!(
            request.params.coverage_requirements.get(JOUR_12H).copied(),
            Some(0)
        );
    }

    #[test]
    fn test_generate_small_is_deterministic() {
        let a = serde_json::to_string(&generate(DemoData::Small)).unwrap();
        let b = serde_json::to_string(&generate(DemoData::Small)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_large_roster_shape() {
        let request = generate(DemoData::Large);
        assert_eq!(request.agents.len(), 12);
        assert!(request.params.auto_add_agents_if_needed);
        assert!(request
            .params
            .agent_regimes
            .contains_key(REGIME_POLYVALENT));
        // Seeded generation is reproducible.
        let again = generate(DemoData::Large);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }

    #[test]
    fn test_demo_data_from_str() {
        assert_eq!("SMALL".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("small".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("LARGE".parse::<DemoData>(), Ok(DemoData::Large));
        assert!("invalid".parse::<DemoData>().is_err());
    }

    #[test]
    fn test_preferences_stay_inside_horizon() {
        let request = generate(DemoData::Large);
        for agent in &request.agents {
            for pref in &agent.preferences {
                assert!(pref.date >= request.params.start_date);
                assert!(pref.date <= request.params.end_date);
            }
        }
    }
}

//! Domain model for the shift scheduling core.
//!
//! These types form the wire contract of a scheduling request: the planning
//! parameters, the staff roster, locked assignments, and the solver result.
//! Shift codes and regime codes are open string tags so a service unit can
//! declare its own catalogue; the built-in codes are exposed as constants.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Morning shift code (7h).
pub const MATIN: &str = "MATIN";
/// Evening shift code (7h).
pub const SOIR: &str = "SOIR";
/// Full-day 12h shift code.
pub const JOUR_12H: &str = "JOUR_12H";

/// Regime restricted to the 12h day shift.
pub const REGIME_12H_JOUR: &str = "REGIME_12H_JOUR";
/// Regime restricted to morning shifts.
pub const REGIME_MATIN_ONLY: &str = "REGIME_MATIN_ONLY";
/// Regime restricted to evening shifts.
pub const REGIME_SOIR_ONLY: &str = "REGIME_SOIR_ONLY";
/// Morning/evening regime, optionally granted a 12h exception.
pub const REGIME_MIXTE: &str = "REGIME_MIXTE";
/// Regime allowed on every shift of the catalogue.
pub const REGIME_POLYVALENT: &str = "REGIME_POLYVALENT";

/// Planning mode gating which shift codes may be staffed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningMode {
    /// Only the 12h day shift.
    #[serde(rename = "12h_jour")]
    Jour12h,
    /// Morning and evening shifts only.
    #[serde(rename = "matin_soir")]
    MatinSoir,
    /// Every shift declared in the catalogue.
    #[serde(rename = "mixte")]
    Mixte,
}

impl PlanningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningMode::Jour12h => "12h_jour",
            PlanningMode::MatinSoir => "matin_soir",
            PlanningMode::Mixte => "mixte",
        }
    }
}

/// Legal profile of the service unit, echoed in the compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalProfile {
    #[serde(rename = "FPH")]
    Fph,
    #[serde(rename = "contractuel")]
    Contractuel,
    #[serde(rename = "mixte")]
    Mixte,
}

impl Default for LegalProfile {
    fn default() -> Self {
        LegalProfile::Fph
    }
}

/// A named shift: clock times as `"HH:MM"` plus its paid duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDef {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
}

impl ShiftDef {
    pub fn new(start: impl Into<String>, end: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            duration_minutes,
        }
    }
}

/// Contractual regime: which shifts an agent may work, and an optional cap
/// on consecutive 12h days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeDef {
    pub allowed_shifts: Vec<String>,
    #[serde(default)]
    pub max_consecutive_12h_days: Option<u32>,
}

impl RegimeDef {
    pub fn new(allowed_shifts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_shifts: allowed_shifts.into_iter().map(Into::into).collect(),
            max_consecutive_12h_days: None,
        }
    }

    pub fn with_max_consecutive_12h_days(mut self, days: u32) -> Self {
        self.max_consecutive_12h_days = Some(days);
        self
    }
}

/// Forbidden day-to-day transition between two shift codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    #[serde(rename = "from")]
    pub from_shift: String,
    #[serde(rename = "to")]
    pub to_shift: String,
    pub reason: String,
}

/// Rest and workload ceilings, in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesetDefaults {
    pub daily_rest_min_minutes: i64,
    pub daily_rest_min_minutes_with_agreement: i64,
    pub weekly_rest_min_minutes: i64,
    pub max_minutes_rolling_7d: i64,
    pub cycle_mode_enabled: bool,
    pub cycle_weeks: u32,
    pub max_minutes_per_week_excluding_overtime: i64,
}

impl Default for RulesetDefaults {
    fn default() -> Self {
        Self {
            daily_rest_min_minutes: 720,
            daily_rest_min_minutes_with_agreement: 660,
            weekly_rest_min_minutes: 2160,
            max_minutes_rolling_7d: 2880,
            cycle_mode_enabled: false,
            cycle_weeks: 4,
            max_minutes_per_week_excluding_overtime: 2640,
        }
    }
}

/// Day-only scope of the unit and its service window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningScope {
    pub day_only: bool,
    pub service_window: BTreeMap<String, String>,
}

impl Default for PlanningScope {
    fn default() -> Self {
        let mut service_window = BTreeMap::new();
        service_window.insert("start".to_string(), "07:00".to_string());
        service_window.insert("end".to_string(), "21:00".to_string());
        Self {
            day_only: true,
            service_window,
        }
    }
}

/// Modelling assumptions echoed in the compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub transmissions_included: bool,
    pub pause_included_in_shift: bool,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            transmissions_included: true,
            pause_included_in_shift: true,
        }
    }
}

/// Administrative durations echoed in the compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminParams {
    pub transmissions_minutes: i64,
    pub pause_min_minutes: i64,
}

impl Default for AdminParams {
    fn default() -> Self {
        Self {
            transmissions_minutes: 15,
            pause_min_minutes: 20,
        }
    }
}

/// All parameters of one scheduling request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningParams {
    pub service_unit: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mode: PlanningMode,
    pub coverage_requirements: BTreeMap<String, u32>,
    #[serde(default)]
    pub planning_scope: PlanningScope,
    pub shifts: BTreeMap<String, ShiftDef>,
    #[serde(default)]
    pub assumptions: Assumptions,
    #[serde(default)]
    pub admin_params: AdminParams,
    #[serde(default)]
    pub ruleset_defaults: RulesetDefaults,
    pub agent_regimes: BTreeMap<String, RegimeDef>,
    #[serde(default)]
    pub hard_forbidden_transitions: Vec<TransitionRule>,
    #[serde(default)]
    pub legal_profile: LegalProfile,
    #[serde(default)]
    pub agreement_11h_enabled: bool,
    #[serde(default)]
    pub allow_single_12h_exception: bool,
    #[serde(default = "default_max_12h_exceptions")]
    pub max_12h_exceptions_per_agent: u32,
    #[serde(default)]
    pub allowed_12h_exception_dates: Vec<NaiveDate>,
    #[serde(default = "default_true")]
    pub forbid_matin_soir_matin: bool,
    #[serde(default = "default_true")]
    pub use_tracker: bool,
    #[serde(default = "default_tracker_year")]
    pub tracker_year: i32,
    #[serde(default = "default_true")]
    pub auto_add_agents_if_needed: bool,
    #[serde(default = "default_max_extra_agents")]
    pub max_extra_agents: u32,
    #[serde(default)]
    pub record_tracker_on_generate: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_12h_exceptions() -> u32 {
    1
}

fn default_tracker_year() -> i32 {
    2026
}

fn default_max_extra_agents() -> u32 {
    10
}

/// Whether a dated preference asks for or against a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Prefer,
    Avoid,
}

/// An agent's wish for (or against) a specific `(date, shift)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub date: NaiveDate,
    pub shift: String,
    #[serde(rename = "type", default = "default_preference_kind")]
    pub kind: PreferenceKind,
    #[serde(default = "default_preference_weight")]
    pub weight: i64,
}

fn default_preference_kind() -> PreferenceKind {
    PreferenceKind::Prefer
}

fn default_preference_weight() -> i64 {
    1
}

/// A staff member of the unit.
///
/// Reinforcement agents synthesised by the driver use ids `R1…Rk` and the
/// last name "Renfort"; everything else about them is a plain `Agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub regime: String,
    #[serde(default = "default_quotity")]
    pub quotity: u32,
    #[serde(default)]
    pub unavailability_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub preferences: Vec<Preference>,
    #[serde(default)]
    pub annual_target_hours: Option<f64>,
}

fn default_quotity() -> u32 {
    100
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        regime: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            regime: regime.into(),
            quotity: 100,
            unavailability_dates: Vec::new(),
            preferences: Vec::new(),
            annual_target_hours: None,
        }
    }

    pub fn with_quotity(mut self, quotity: u32) -> Self {
        self.quotity = quotity;
        self
    }

    pub fn with_unavailable_date(mut self, date: NaiveDate) -> Self {
        self.unavailability_dates.push(date);
        self
    }

    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preferences.push(preference);
        self
    }

    pub fn with_annual_target_hours(mut self, hours: f64) -> Self {
        self.annual_target_hours = Some(hours);
        self
    }

    /// Display name used by exports and the tracker store.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }
}

/// Pins one agent to one shift on one date before solving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedAssignment {
    pub agent_id: String,
    pub date: NaiveDate,
    pub shift: String,
}

/// One scheduling request, exclusively owned by the driver while solving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub params: PlanningParams,
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub locked_assignments: Vec<LockedAssignment>,
}

/// One decoded solver decision: an agent works a shift on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub agent_id: String,
    pub date: NaiveDate,
    pub shift: String,
}

impl ShiftAssignment {
    pub fn new(agent_id: impl Into<String>, date: NaiveDate, shift: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            date,
            shift: shift.into(),
        }
    }
}

/// Outcome of a scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Ok,
    Infeasible,
}

/// Result of [`build_solution`](crate::solver::build_solution).
///
/// `score` is the objective value of the returned solution; `explanation`
/// carries the human-readable reason when `status` is infeasible;
/// `added_agents` lists the reinforcement agents injected to reach
/// feasibility, in injection order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerResult {
    pub status: ScheduleStatus,
    pub assignments: Vec<ShiftAssignment>,
    pub score: Option<i64>,
    pub explanation: Option<String>,
    pub added_agents: Vec<Agent>,
}

impl SchedulerResult {
    /// True when the solver produced a usable assignment list.
    pub fn is_ok(&self) -> bool {
        self.status == ScheduleStatus::Ok
    }
}

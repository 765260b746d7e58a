//! Shift scheduling core for small healthcare service units.
//!
//! Given a horizon of consecutive days, a roster with contractual regimes
//! and availabilities, daily coverage requirements per shift code, and a
//! ruleset mixing labor-law constraints with organisational preferences,
//! [`build_solution`] assigns at most one shift per agent per day, satisfies
//! every hard rule, and minimises a weighted sum of soft penalties. When the
//! roster cannot cover, synthetic reinforcement agents are injected one per
//! round until feasibility is reached or the cap is hit.
//!
//! The model is solved with a CP-SAT solver under a bounded time budget;
//! validation and solver failures are translated into an `infeasible` result
//! with a human-readable explanation, never a panic.

pub mod audit;
pub mod calendar;
pub mod catalogue;
pub mod compliance;
mod constraints;
pub mod demo_data;
pub mod domain;
pub mod error;
pub mod logging;
mod objective;
pub mod regimes;
pub mod solver;
pub mod tracker;

pub use compliance::{build_report, ComplianceReport};
pub use domain::{
    Agent, LockedAssignment, PlanningMode, PlanningParams, Preference, PreferenceKind, RegimeDef,
    RulesetDefaults, ScheduleRequest, ScheduleStatus, SchedulerResult, ShiftAssignment, ShiftDef,
    TransitionRule,
};
pub use error::{ScheduleError, StoreError};
pub use solver::{build_solution, Scheduler, DEFAULT_TIME_BUDGET};

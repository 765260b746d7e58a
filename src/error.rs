//! Error taxonomy of the scheduling core.
//!
//! `ScheduleError` kinds are translated by the driver into an `infeasible`
//! result whose explanation is the error's display string; the core never
//! propagates them past [`build_solution`](crate::solver::build_solution).
//! `StoreError` covers the file sidecars (hours tracker, audit log).

use thiserror::Error;

/// Why a scheduling request cannot produce an assignment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The horizon is empty or reversed.
    #[error("Période invalide")]
    InvalidHorizon,

    /// Coverage demanded on a shift the planning mode excludes.
    #[error("Couverture demandee pour {shift} incompatible avec le mode {mode}")]
    ModeCoverageMismatch { shift: String, mode: String },

    /// A shift clock time is not `HH:MM`.
    #[error("Horaire invalide pour {shift}: {value}")]
    InvalidShiftTime { shift: String, value: String },

    /// The solver found no feasible assignment within its budget.
    #[error("Aucune solution faisable sous contraintes")]
    Infeasible,
}

/// Result alias for model-validation steps inside the core.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Failures of the file-backed collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for the tracker and audit stores.
pub type StoreResult<T> = Result<T, StoreError>;

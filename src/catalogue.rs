//! Shift catalogue: parsed clock times and the mode gate.
//!
//! The catalogue resolves each declared shift to minute-of-day bounds and
//! derives the *global allowed set* from the planning mode. A non-zero
//! coverage requirement on a shift the mode excludes fails fast, before any
//! model is built.

use std::collections::HashMap;

use crate::domain::{PlanningMode, PlanningParams, JOUR_12H, MATIN, SOIR};
use crate::error::{ScheduleError, ScheduleResult};

/// Minutes in a day.
pub const DAY_MINUTES: i64 = 24 * 60;

/// One shift resolved to minute-of-day bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftInfo {
    pub code: String,
    pub start_min: i64,
    pub end_min: i64,
    pub duration: i64,
}

/// The resolved shift catalogue of a request.
///
/// Shift order is the declaration order of the request's shift map and is
/// stable for the lifetime of the request; all model indices refer to it.
#[derive(Debug, Clone)]
pub struct ShiftCatalogue {
    shifts: Vec<ShiftInfo>,
    index: HashMap<String, usize>,
    global_allowed: Vec<bool>,
    required: Vec<u32>,
}

impl ShiftCatalogue {
    /// Parses the request's shift map and applies the mode gate.
    pub fn build(params: &PlanningParams) -> ScheduleResult<Self> {
        let mut shifts = Vec::with_capacity(params.shifts.len());
        let mut index = HashMap::with_capacity(params.shifts.len());
        for (code, def) in &params.shifts {
            let start_min = parse_time_to_min(code, &def.start)?;
            let end_min = parse_time_to_min(code, &def.end)?;
            index.insert(code.clone(), shifts.len());
            shifts.push(ShiftInfo {
                code: code.clone(),
                start_min,
                end_min,
                duration: def.duration_minutes,
            });
        }

        let global_allowed: Vec<bool> = shifts
            .iter()
            .map(|s| match params.mode {
                PlanningMode::Jour12h => s.code == JOUR_12H,
                PlanningMode::MatinSoir => s.code == MATIN || s.code == SOIR,
                PlanningMode::Mixte => true,
            })
            .collect();

        for (code, &count) in &params.coverage_requirements {
            let allowed = index
                .get(code)
                .map(|&i| global_allowed[i])
                .unwrap_or(false);
            if count > 0 && !allowed {
                return Err(ScheduleError::ModeCoverageMismatch {
                    shift: code.clone(),
                    mode: params.mode.as_str().to_string(),
                });
            }
        }

        let required = shifts
            .iter()
            .map(|s| params.coverage_requirements.get(&s.code).copied().unwrap_or(0))
            .collect();

        Ok(Self {
            shifts,
            index,
            global_allowed,
            required,
        })
    }

    pub fn shifts(&self) -> &[ShiftInfo] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    pub fn info(&self, idx: usize) -> &ShiftInfo {
        &self.shifts[idx]
    }

    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    /// Whether the planning mode lets this shift be staffed at all.
    pub fn is_global_allowed(&self, idx: usize) -> bool {
        self.global_allowed[idx]
    }

    /// Indices of the shifts inside the global allowed set.
    pub fn global_allowed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.shifts.len()).filter(|&i| self.global_allowed[i])
    }

    /// Daily headcount demanded for this shift.
    pub fn required(&self, idx: usize) -> u32 {
        self.required[idx]
    }

    /// Longest shift duration, used to bound workload variables.
    pub fn max_shift_duration(&self) -> i64 {
        self.shifts.iter().map(|s| s.duration).max().unwrap_or(0)
    }
}

/// Parses `"HH:MM"` into a minute-of-day.
fn parse_time_to_min(shift: &str, value: &str) -> ScheduleResult<i64> {
    let invalid = || ScheduleError::InvalidShiftTime {
        shift: shift.to_string(),
        value: value.to_string(),
    };
    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    let hours: i64 = h.parse().map_err(|_| invalid())?;
    let minutes: i64 = m.parse().map_err(|_| invalid())?;
    if !(0..=24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

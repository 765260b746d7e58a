//! Hours-accumulator store.
//!
//! A JSON file mapping `year → agent_id → {minutes, name}`. The scheduling
//! core consumes its yearly snapshot as the baseline-minutes map; recording
//! freshly planned minutes back is done by the surrounding collaborator.
//! A missing or malformed file reads as empty.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Agent, ShiftAssignment, ShiftDef};
use crate::error::StoreResult;

/// Accumulated minutes of one agent in one tracker year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEntry {
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub name: String,
}

/// Full tracker content: year → agent id → entry.
pub type TrackerData = BTreeMap<String, BTreeMap<String, TrackerEntry>>;

/// Handle on the tracker file.
#[derive(Debug, Clone)]
pub struct HoursTracker {
    path: PathBuf,
}

impl HoursTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the tracker file; missing or undecodable content reads as empty.
    pub fn load(&self) -> TrackerData {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return TrackerData::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn save(&self, data: &TrackerData) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }

    /// Baseline minutes of every tracked agent for `year`.
    pub fn baseline_minutes(&self, year: i32) -> HashMap<String, i64> {
        snapshot_minutes(&self.load(), year)
    }

    /// Accumulates the planned minutes of a schedule into `year` and saves.
    pub fn record(
        &self,
        year: i32,
        assignments: &[ShiftAssignment],
        agents: &[Agent],
        shifts: &BTreeMap<String, ShiftDef>,
    ) -> StoreResult<()> {
        let mut data = self.load();
        let names: HashMap<&str, String> = agents
            .iter()
            .map(|a| (a.id.as_str(), a.display_name()))
            .collect();
        for assignment in assignments {
            let minutes = shifts
                .get(&assignment.shift)
                .map(|s| s.duration_minutes)
                .unwrap_or(0);
            add_minutes(
                &mut data,
                year,
                &assignment.agent_id,
                minutes,
                names.get(assignment.agent_id.as_str()).map(String::as_str),
            );
        }
        self.save(&data)
    }
}

/// Adds minutes for one agent in one year, creating entries as needed.
pub fn add_minutes(
    data: &mut TrackerData,
    year: i32,
    agent_id: &str,
    minutes: i64,
    name: Option<&str>,
) {
    let entry = data
        .entry(year.to_string())
        .or_default()
        .entry(agent_id.to_string())
        .or_insert_with(|| TrackerEntry {
            minutes: 0,
            name: name.unwrap_or(agent_id).to_string(),
        });
    entry.minutes += minutes;
    if let Some(name) = name {
        entry.name = name.to_string();
    }
}

/// Minutes per agent id for `year`.
pub fn snapshot_minutes(data: &TrackerData, year: i32) -> HashMap<String, i64> {
    data.get(&year.to_string())
        .map(|year_data| {
            year_data
                .iter()
                .map(|(id, entry)| (id.clone(), entry.minutes))
                .collect()
        })
        .unwrap_or_default()
}

/// Display names per agent id for `year`.
pub fn snapshot_names(data: &TrackerData, year: i32) -> HashMap<String, String> {
    data.get(&year.to_string())
        .map(|year_data| {
            year_data
                .iter()
                .map(|(id, entry)| (id.clone(), entry.name.clone()))
                .collect()
        })
        .unwrap_or_default()
}

//! Regime resolver: which shifts each agent may work.
//!
//! The resolved set is `regime.allowed_shifts ∩ global_allowed`, with the
//! `REGIME_MIXTE` override: morning/evening only, plus `JOUR_12H` when the
//! single-12h exception is enabled and the mode allows it. A non-empty
//! exception-date whitelist further restricts *when* a mixte agent may take
//! the 12h shift; that date-level gate is applied per decision variable.

use chrono::NaiveDate;

use crate::catalogue::ShiftCatalogue;
use crate::domain::{Agent, PlanningParams, JOUR_12H, MATIN, REGIME_MIXTE, SOIR};

/// Per-agent allowed-shift matrix, indexed by catalogue shift index.
#[derive(Debug, Clone)]
pub struct ShiftAccess {
    allowed: Vec<Vec<bool>>,
}

impl ShiftAccess {
    /// Resolves the allowed-shift set of every agent in roster order.
    ///
    /// An agent whose regime tag is not declared in `agent_regimes` gets an
    /// empty set: they can never be assigned, and coverage that needed them
    /// surfaces as an infeasible result rather than a crash.
    pub fn resolve(agents: &[Agent], params: &PlanningParams, catalogue: &ShiftCatalogue) -> Self {
        let allowed = agents
            .iter()
            .map(|agent| resolve_agent(agent, params, catalogue))
            .collect();
        Self { allowed }
    }

    pub fn is_allowed(&self, agent_idx: usize, shift_idx: usize) -> bool {
        self.allowed[agent_idx][shift_idx]
    }

    /// Agents eligible for a shift, in roster order.
    pub fn eligible_agents(&self, shift_idx: usize) -> Vec<usize> {
        (0..self.allowed.len())
            .filter(|&a| self.allowed[a][shift_idx])
            .collect()
    }
}

fn resolve_agent(agent: &Agent, params: &PlanningParams, catalogue: &ShiftCatalogue) -> Vec<bool> {
    let mut allowed = vec![false; catalogue.len()];

    if agent.regime == REGIME_MIXTE {
        for (idx, info) in catalogue.shifts().iter().enumerate() {
            if !catalogue.is_global_allowed(idx) {
                continue;
            }
            if info.code == MATIN || info.code == SOIR {
                allowed[idx] = true;
            }
            if info.code == JOUR_12H && params.allow_single_12h_exception {
                allowed[idx] = true;
            }
        }
        return allowed;
    }

    if let Some(regime) = params.agent_regimes.get(&agent.regime) {
        for code in &regime.allowed_shifts {
            if let Some(idx) = catalogue.index_of(code) {
                if catalogue.is_global_allowed(idx) {
                    allowed[idx] = true;
                }
            }
        }
    }
    allowed
}

/// Whether the exception-date whitelist pins `x[agent, date, JOUR_12H]` to 0.
pub fn is_12h_exception_blocked(agent: &Agent, params: &PlanningParams, date: NaiveDate) -> bool {
    agent.regime == REGIME_MIXTE
        && params.allow_single_12h_exception
        && !params.allowed_12h_exception_dates.is_empty()
        && !params.allowed_12h_exception_dates.contains(&date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{self, DemoData};
    use crate::domain::{PlanningMode, REGIME_12H_JOUR, REGIME_MATIN_ONLY};

    fn fixture() -> (PlanningParams, ShiftCatalogue) {
        let params = demo_data::generate(DemoData::Small).params;
        let catalogue = ShiftCatalogue::build(&params).unwrap();
        (params, catalogue)
    }

    fn codes(access: &ShiftAccess, catalogue: &ShiftCatalogue, agent_idx: usize) -> Vec<String> {
        (0..catalogue.len())
            .filter(|&s| access.is_allowed(agent_idx, s))
            .map(|s| catalogue.info(s).code.clone())
            .collect()
    }

    #[test]
    fn test_regime_intersected_with_mode() {
        let (params, catalogue) = fixture();
        let agents = vec![Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY)];
        let access = ShiftAccess::resolve(&agents, &params, &catalogue);
        assert_eq!(codes(&access, &catalogue, 0), vec![MATIN.to_string()]);
    }

    #[test]
    fn test_mode_gate_shrinks_regime() {
        let (mut params, _) = fixture();
        params.mode = PlanningMode::Jour12h;
        params.coverage_requirements =
            [(JOUR_12H.to_string(), 1)].into_iter().collect();
        let catalogue = ShiftCatalogue::build(&params).unwrap();
        let agents = vec![
            Agent::new("A1", "Anna", "Dupont", REGIME_MATIN_ONLY),
            Agent::new("A2", "Samir", "Khelifi", REGIME_12H_JOUR),
        ];
        let access = ShiftAccess::resolve(&agents, &params, &catalogue);
        assert!(codes(&access, &catalogue, 0).is_empty());
        assert_eq!(codes(&access, &catalogue, 1), vec![JOUR_12H.to_string()]);
    }

    #[test]
    fn test_mixte_override_without_exception() {
        let (params, catalogue) = fixture();
        let agents = vec![Agent::new("A1", "Lea", "Martin", REGIME_MIXTE)];
        let access = ShiftAccess::resolve(&agents, &params, &catalogue);
        assert_eq!(
            codes(&access, &catalogue, 0),
            vec![MATIN.to_string(), SOIR.to_string()]
        );
    }

    #[test]
    fn test_mixte_gains_12h_with_exception() {
        let (mut params, _) = fixture();
        params.allow_single_12h_exception = true;
        let catalogue = ShiftCatalogue::build(&params).unwrap();
        let agents = vec![Agent::new("A1", "Lea", "Martin", REGIME_MIXTE)];
        let access = ShiftAccess::resolve(&agents, &params, &catalogue);
        assert_eq!(
            codes(&access, &catalogue, 0),
            vec![JOUR_12H.to_string(), MATIN.to_string(), SOIR.to_string()]
        );
    }

    #[test]
    fn test_unknown_regime_gets_empty_set() {
        let (params, catalogue) = fixture();
        let agents = vec![Agent::new("A1", "X", "Y", "REGIME_NUIT")];
        let access = ShiftAccess::resolve(&agents, &params, &catalogue);
        assert!(codes(&access, &catalogue, 0).is_empty());
        assert!(access.eligible_agents(0).is_empty());
    }

    #[test]
    fn test_exception_date_whitelist_gate() {
        let (mut params, _) = fixture();
        params.allow_single_12h_exception = true;
        params.allowed_12h_exception_dates = vec!["2026-02-10".parse().unwrap()];
        let mixte = Agent::new("A1", "Lea", "Martin", REGIME_MIXTE);
        let other = Agent::new("A2", "Anna", "Dupont", REGIME_MATIN_ONLY);

        assert!(!is_12h_exception_blocked(
            &mixte,
            &params,
            "2026-02-10".parse().unwrap()
        ));
        assert!(is_12h_exception_blocked(
            &mixte,
            &params,
            "2026-02-11".parse().unwrap()
        ));
        // Whitelist only constrains mixte agents.
        assert!(!is_12h_exception_blocked(
            &other,
            &params,
            "2026-02-11".parse().unwrap()
        ));
    }
}

//! Self-improvement workflow and scripted simulation endpoints

use shared_types::{
    AnalyzeResponse, ImprovementStats, Mutation, MutationActionResponse, MutationsResponse,
    SimulationScenario, SimulationScenariosResponse, SimulationSession, StartSimulationRequest,
    Suggestion, SuggestionsResponse,
};
use std::fmt;

use super::BackendClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Approve,
    Reject,
    Deactivate,
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationAction::Approve => "approve",
            MutationAction::Reject => "reject",
            MutationAction::Deactivate => "deactivate",
        })
    }
}

impl BackendClient {
    pub async fn improvement_stats(&self) -> Result<ImprovementStats, ApiError> {
        self.get_json(&["api", "improvement-stats"], &[]).await
    }

    pub async fn suggestions(&self) -> Result<Vec<Suggestion>, ApiError> {
        let response: SuggestionsResponse = self.get_json(&["api", "suggestions"], &[]).await?;
        Ok(response.suggestions)
    }

    pub async fn mutations(&self) -> Result<Vec<Mutation>, ApiError> {
        let response: MutationsResponse = self.get_json(&["api", "mutations"], &[]).await?;
        Ok(response.mutations)
    }

    /// Asks the backend to analyze recent conversations and produce suggestions
    pub async fn analyze(&self) -> Result<AnalyzeResponse, ApiError> {
        self.post_json(&["api", "analyze"], &serde_json::json!({}))
            .await
    }

    pub async fn mutation_action(
        &self,
        mutation_id: i64,
        action: MutationAction,
    ) -> Result<MutationActionResponse, ApiError> {
        let id = mutation_id.to_string();
        let action = action.to_string();
        self.post_json(&["api", "mutations", &id, &action], &serde_json::json!({}))
            .await
    }

    pub async fn simulation_scenarios(&self) -> Result<Vec<SimulationScenario>, ApiError> {
        let response: SimulationScenariosResponse =
            self.get_json(&["api", "simulation", "scenarios"], &[]).await?;
        Ok(response.scenarios)
    }

    pub async fn start_simulation(
        &self,
        request: &StartSimulationRequest,
    ) -> Result<SimulationSession, ApiError> {
        self.post_json(&["api", "simulation", "start"], request)
            .await
    }

    pub async fn simulation_status(&self, session_id: &str) -> Result<SimulationSession, ApiError> {
        self.get_json(&["api", "simulation", "status", session_id], &[])
            .await
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationScenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationScenariosResponse {
    pub scenarios: Vec<SimulationScenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSimulationRequest {
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationTurn {
    pub role: String,
    pub message: String,
}

/// A scripted conversation run against the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSession {
    pub id: String,
    #[serde(default)]
    pub scenario: Option<String>,
    pub status: SimulationStatus,
    #[serde(default)]
    pub transcript: Vec<SimulationTurn>,
    #[serde(default)]
    pub result: Option<String>,
}

use shared_types::{SimulationScenario, SimulationSession, SimulationStatus, SimulationTurn, StartSimulationRequest};
use std::fmt::Write as _;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{or_dash, pad, truncate, AppContext};
use crate::error::ApiError;
use crate::jobs::Poller;

const FOLLOW_POLL: &str = "simulation.follow";
const FOLLOW_INTERVAL: Duration = Duration::from_secs(2);

pub async fn scenarios(ctx: &AppContext) -> anyhow::Result<()> {
    let scenarios = ctx.backend.simulation_scenarios().await?;
    ctx.output(&scenarios, |s| render_scenarios(s))
}

pub async fn run(
    ctx: &AppContext,
    scenario: &str,
    phone: Option<String>,
    follow_run: bool,
) -> anyhow::Result<()> {
    let request = StartSimulationRequest {
        scenario: scenario.to_string(),
        phone,
    };
    let session = ctx.backend.start_simulation(&request).await?;

    if !follow_run {
        return ctx.output(&session, render_session);
    }

    if !ctx.json {
        println!("Started simulation {} ({})", session.id, scenario);
    }
    follow(ctx, &session.id).await
}

pub async fn status(ctx: &AppContext, session_id: &str) -> anyhow::Result<()> {
    let session = ctx.backend.simulation_status(session_id).await?;
    ctx.output(&session, render_session)
}

/// Polls the run every two seconds, printing transcript turns as they
/// appear, until it completes, fails or Ctrl+C is pressed.
pub async fn follow(ctx: &AppContext, session_id: &str) -> anyhow::Result<()> {
    let poller = Poller::new();
    let (tx, mut rx) = mpsc::channel::<Result<SimulationSession, ApiError>>(4);
    let backend = ctx.backend.clone();
    let id = session_id.to_string();

    poller
        .start(FOLLOW_POLL, FOLLOW_INTERVAL, move |_tick| {
            let backend = backend.clone();
            let tx = tx.clone();
            let id = id.clone();
            async move {
                let _ = tx.send(backend.simulation_status(&id).await).await;
            }
        })
        .await;

    let mut printed = 0usize;
    let result: anyhow::Result<()> = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            received = rx.recv() => match received {
                Some(Ok(session)) => {
                    if !ctx.json {
                        print!("{}", render_turns(unseen_turns(&session, printed)));
                    }
                    printed = session.transcript.len();

                    if session.status.is_terminal() {
                        if ctx.json {
                            println!("{}", serde_json::to_string_pretty(&session)?);
                        } else {
                            print!("{}", render_outcome(&session));
                        }
                        break match session.status {
                            SimulationStatus::Failed => Err(anyhow::anyhow!("Simulation {} failed", session.id)),
                            _ => Ok(()),
                        };
                    }
                }
                Some(Err(e)) if e.is_unauthorized() => break Err(e.into()),
                Some(Err(e)) => eprintln!("[error] Checking simulation status failed: {}", e),
                None => break Ok(()),
            }
        }
    };

    poller.shutdown().await;
    result
}

/// Turns added since `already_printed`. A shorter transcript (backend
/// restarted the run) prints nothing.
fn unseen_turns(session: &SimulationSession, already_printed: usize) -> &[SimulationTurn] {
    session
        .transcript
        .get(already_printed..)
        .unwrap_or_default()
}

fn render_turns(turns: &[SimulationTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let _ = writeln!(out, "{}: {}", pad(&turn.role, 10), turn.message);
    }
    out
}

fn status_label(status: &SimulationStatus) -> &'static str {
    match status {
        SimulationStatus::Pending => "pending",
        SimulationStatus::Running => "running",
        SimulationStatus::Completed => "completed",
        SimulationStatus::Failed => "failed",
        SimulationStatus::Unknown => "unknown",
    }
}

fn render_outcome(session: &SimulationSession) -> String {
    let mut out = format!("Simulation {} {}\n", session.id, status_label(&session.status));
    if let Some(result) = session.result.as_deref().filter(|r| !r.is_empty()) {
        let _ = writeln!(out, "{}", result);
    }
    out
}

pub fn render_session(session: &SimulationSession) -> String {
    let mut out = format!(
        "Simulation {} [{}] scenario {}\n",
        session.id,
        status_label(&session.status),
        or_dash(session.scenario.as_deref())
    );
    out.push_str(&render_turns(&session.transcript));
    if session.status.is_terminal() {
        if let Some(result) = session.result.as_deref().filter(|r| !r.is_empty()) {
            let _ = writeln!(out, "Result: {}", result);
        }
    }
    out
}

fn render_scenarios(scenarios: &[SimulationScenario]) -> String {
    if scenarios.is_empty() {
        return "No scenarios available\n".to_string();
    }

    let mut out = String::new();
    for scenario in scenarios {
        let _ = writeln!(
            out,
            "{} {} {}",
            pad(&scenario.id, 20),
            pad(&scenario.name, 28),
            truncate(or_dash(scenario.description.as_deref()), 60)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(status: SimulationStatus, turns: usize) -> SimulationSession {
        SimulationSession {
            id: "sim-1".to_string(),
            scenario: Some("carrito_abandonado".to_string()),
            status,
            transcript: (0..turns)
                .map(|i| SimulationTurn {
                    role: if i % 2 == 0 { "cliente" } else { "bot" }.to_string(),
                    message: format!("turno {i}"),
                })
                .collect(),
            result: Some("Pedido confirmado".to_string()),
        }
    }

    #[test]
    fn test_unseen_turns() {
        let running = session(SimulationStatus::Running, 3);
        assert_eq!(unseen_turns(&running, 0).len(), 3);
        assert_eq!(unseen_turns(&running, 2).len(), 1);
        assert_eq!(unseen_turns(&running, 2)[0].message, "turno 2");
        assert!(unseen_turns(&running, 3).is_empty());
        assert!(unseen_turns(&running, 7).is_empty());
    }

    #[test]
    fn test_render_session_shows_result_only_when_finished() {
        let running = render_session(&session(SimulationStatus::Running, 1));
        assert!(running.starts_with("Simulation sim-1 [running] scenario carrito_abandonado\n"));
        assert!(!running.contains("Result:"));

        let done = render_session(&session(SimulationStatus::Completed, 2));
        assert!(done.contains("cliente   : turno 0"));
        assert!(done.ends_with("Result: Pedido confirmado\n"));
    }
}

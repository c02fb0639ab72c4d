use std::time::Duration;

use relic_core::config::AutonomousConfig;

use crate::error::{io_err, RuntimeError};
use crate::report::RunReport;
use crate::sequencer::Sequencer;
use crate::signals::{match_signals, MatchControl};
use crate::sim::{Scenario, SimRobot};
use crate::telemetry::TracingTelemetry;

/// When the simulated host starts and ends the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTiming {
    pub start_after: Duration,
    /// Stop is requested this long after the start.
    pub match_length: Duration,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            start_after: Duration::ZERO,
            match_length: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Run the routine on simulated hardware, blocking the current thread.
pub fn start_blocking(
    config: AutonomousConfig,
    scenario: Scenario,
    timing: MatchTiming,
    log_format: LogFormat,
) -> Result<RunReport, RuntimeError> {
    init_tracing(log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_simulated(config, scenario, timing))
}

/// Run the routine on simulated hardware with a simulated host driving the
/// match clock. Ctrl-C stops the match.
pub async fn run_simulated(
    config: AutonomousConfig,
    scenario: Scenario,
    timing: MatchTiming,
) -> Result<RunReport, RuntimeError> {
    let sequencer = Sequencer::new(config)?;
    let robot = SimRobot::new(scenario, sequencer.config());
    let mut devices = robot.device_map();
    let mut navigator = robot.navigator();
    let (control, signals) = match_signals();

    let host = tokio::spawn(host_task(control, timing));
    let mut sink = TracingTelemetry;
    let report = sequencer
        .run(&mut devices, &mut navigator, signals, &mut sink)
        .await;

    host.abort();
    match host.await {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => {}
        Err(err) => return Err(RuntimeError::Host(format!("host task join failure: {err}"))),
    }
    Ok(report)
}

async fn host_task(control: MatchControl, timing: MatchTiming) {
    let clock = async {
        tokio::time::sleep(timing.start_after).await;
        tracing::info!("match started");
        control.start();
        tokio::time::sleep(timing.match_length).await;
        tracing::info!("match time elapsed");
    };
    tokio::select! {
        _ = clock => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => tracing::info!("received ctrl-c, stopping match"),
            Err(err) => tracing::error!(error = %err, "ctrl-c handler failed; stopping match"),
        },
    }
    control.stop();
}

pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

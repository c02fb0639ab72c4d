//! Autonomous runtime: hardware acquisition, match signals, the phase
//! sequencer, run reports and simulated hardware.

mod error;
pub mod hardware;
pub mod report;
mod runtime;
pub mod sequencer;
pub mod signals;
pub mod sim;
pub mod telemetry;

pub use error::{DeviceKind, HardwareError, PhaseError, RuntimeError};
pub use hardware::HardwareFacade;
pub use report::{PhaseRecord, RunReport, RunStatus};
pub use runtime::{init_tracing, run_simulated, start_blocking, LogFormat, MatchTiming};
pub use sequencer::Sequencer;
pub use signals::{match_signals, Cancelled, MatchControl, MatchSignals, MatchState};
pub use sim::{load_scenario, Scenario, SimEvent, SimLog, SimRobot};
pub use telemetry::{MemoryTelemetry, TelemetrySink, TracingTelemetry};

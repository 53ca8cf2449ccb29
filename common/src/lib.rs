pub mod config;
pub mod evaluator;
pub mod protocol;
pub mod state;

pub use config::{ControllerConfig, SettingsUpdate, UserSettings, DEFAULT_HOUSE_PORT};
pub use evaluator::{evaluate, in_night_window, Evaluation, EvaluationError};
pub use protocol::ProtocolError;
pub use state::{DeviceState, HvacMode, MergedState, PartialState};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Per-house user preferences. These survive across poll cycles and are
/// merged into every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub alarm_delay_secs: u64,
    pub alarm_passcode: String,
    pub night_start: NaiveTime,
    pub night_end: NaiveTime,
    pub target_temp: i32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            alarm_delay_secs: 5,
            alarm_passcode: "passcode".to_string(),
            night_start: NaiveTime::from_hms_opt(21, 30, 0).expect("valid time"),
            night_end: NaiveTime::from_hms_opt(8, 30, 0).expect("valid time"),
            target_temp: 70,
        }
    }
}

impl UserSettings {
    pub fn sanitize(&mut self) {
        self.alarm_delay_secs = self.alarm_delay_secs.clamp(1, 3600);
        if self.alarm_passcode.is_empty() {
            self.alarm_passcode = "passcode".to_string();
        }
    }

    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(delay) = update.alarm_delay_secs {
            self.alarm_delay_secs = delay;
        }
        if let Some(passcode) = &update.alarm_passcode {
            self.alarm_passcode = passcode.clone();
        }
        if let Some(start) = update.night_start {
            self.night_start = start;
        }
        if let Some(end) = update.night_end {
            self.night_end = end;
        }
        if let Some(target) = update.target_temp {
            self.target_temp = target;
        }
        self.sanitize();
    }
}

/// A sparse settings change, merged field-wise into [`UserSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub alarm_delay_secs: Option<u64>,
    pub alarm_passcode: Option<String>,
    pub night_start: Option<NaiveTime>,
    pub night_end: Option<NaiveTime>,
    pub target_temp: Option<i32>,
}

/// Control-manager tunables. Defaults match the observed deployment: a five
/// second poll tick, a revert once more than six consecutive misses pile up,
/// and a login lockout past three failed attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub poll_interval_secs: u64,
    pub missed_update_threshold: u32,
    pub link_timeout_secs: u64,
    pub max_login_failures: u32,
    pub timezone: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            missed_update_threshold: 6,
            link_timeout_secs: 10,
            max_login_failures: 3,
            timezone: "Canada/Mountain".to_string(),
        }
    }
}

/// Default TCP port a house listens on.
pub const DEFAULT_HOUSE_PORT: u16 = 5050;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::config::UserSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HvacMode {
    Heater,
    Chiller,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heater => "Heater",
            Self::Chiller => "Chiller",
        }
    }

    /// Wire encoding: `1` selects the heater, anything else the chiller.
    pub fn from_wire(value: &str) -> Self {
        if value == "1" {
            Self::Heater
        } else {
            Self::Chiller
        }
    }

    pub fn to_wire(self) -> &'static str {
        match self {
            Self::Heater => "1",
            Self::Chiller => "0",
        }
    }
}

/// A complete, consistent house snapshot as produced by the evaluator.
///
/// Instances are transient: each evaluation builds a fresh one and the
/// control manager replaces its last-known-good copy wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub temperature: i32,
    pub humidity: i32,
    pub target_temp: i32,
    pub door_open: bool,
    pub light_on: bool,
    pub occupied: bool,
    pub alarm_armed: bool,
    pub alarm_active: bool,
    pub humidifier_on: bool,
    pub heater_on: bool,
    pub chiller_on: bool,
    pub lock_engaged: bool,
    pub night_mode: bool,
    pub intruder_detected: bool,
    pub away_timer_fired: bool,
    pub hvac_mode: HvacMode,
    pub alarm_passcode: String,
    pub given_passcode: String,
}

/// A sparse set of house fields: the decoded form of an `SU` frame, the
/// payload of an `SS` frame, and the shape of a user-requested update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialState {
    pub temperature: Option<i32>,
    pub humidity: Option<i32>,
    pub target_temp: Option<i32>,
    pub door_open: Option<bool>,
    pub light_on: Option<bool>,
    pub occupied: Option<bool>,
    pub alarm_armed: Option<bool>,
    pub alarm_active: Option<bool>,
    pub humidifier_on: Option<bool>,
    pub heater_on: Option<bool>,
    pub chiller_on: Option<bool>,
    pub lock_engaged: Option<bool>,
    pub intruder_detected: Option<bool>,
    pub hvac_mode: Option<HvacMode>,
    pub given_passcode: Option<String>,
}

impl PartialState {
    /// Overlay `other` on top of `self`; fields present in `other` win.
    pub fn apply(&mut self, other: &PartialState) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(temperature);
        take!(humidity);
        take!(target_temp);
        take!(door_open);
        take!(light_on);
        take!(occupied);
        take!(alarm_armed);
        take!(alarm_active);
        take!(humidifier_on);
        take!(heater_on);
        take!(chiller_on);
        take!(lock_engaged);
        take!(intruder_detected);
        take!(hvac_mode);
        take!(given_passcode);
    }

    pub fn is_empty(&self) -> bool {
        *self == PartialState::default()
    }
}

impl From<&DeviceState> for PartialState {
    fn from(state: &DeviceState) -> Self {
        PartialState {
            temperature: Some(state.temperature),
            humidity: Some(state.humidity),
            target_temp: Some(state.target_temp),
            door_open: Some(state.door_open),
            light_on: Some(state.light_on),
            occupied: Some(state.occupied),
            alarm_armed: Some(state.alarm_armed),
            alarm_active: Some(state.alarm_active),
            humidifier_on: Some(state.humidifier_on),
            heater_on: Some(state.heater_on),
            chiller_on: Some(state.chiller_on),
            lock_engaged: Some(state.lock_engaged),
            intruder_detected: Some(state.intruder_detected),
            hvac_mode: Some(state.hvac_mode),
            given_passcode: Some(state.given_passcode.clone()),
        }
    }
}

/// The evaluator's sole input: device readings overlaid with user settings
/// and the away-timer flag, plus the clock values night mode is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedState {
    pub now: NaiveTime,
    pub night_start: NaiveTime,
    pub night_end: NaiveTime,
    pub temperature: Option<i32>,
    pub humidity: Option<i32>,
    pub target_temp: Option<i32>,
    pub door_open: Option<bool>,
    pub light_on: Option<bool>,
    pub occupied: Option<bool>,
    pub alarm_armed: Option<bool>,
    pub alarm_active: Option<bool>,
    pub humidifier_on: Option<bool>,
    pub heater_on: Option<bool>,
    pub chiller_on: Option<bool>,
    pub lock_engaged: bool,
    pub intruder_detected: Option<bool>,
    pub away_timer_fired: bool,
    pub hvac_mode: Option<HvacMode>,
    pub alarm_passcode: String,
    pub given_passcode: String,
}

impl MergedState {
    /// Merge a partial reading with stored settings. Settings supply the
    /// night window, passcode, and target temperature baseline; a target in
    /// `partial` (e.g. from a user update) takes precedence.
    pub fn build(
        partial: &PartialState,
        settings: &UserSettings,
        away_timer_fired: bool,
        now: NaiveTime,
    ) -> Self {
        MergedState {
            now,
            night_start: settings.night_start,
            night_end: settings.night_end,
            temperature: partial.temperature,
            humidity: partial.humidity,
            target_temp: partial.target_temp.or(Some(settings.target_temp)),
            door_open: partial.door_open,
            light_on: partial.light_on,
            occupied: partial.occupied,
            alarm_armed: partial.alarm_armed,
            alarm_active: partial.alarm_active,
            humidifier_on: partial.humidifier_on,
            heater_on: partial.heater_on,
            chiller_on: partial.chiller_on,
            lock_engaged: partial.lock_engaged.unwrap_or(false),
            intruder_detected: partial.intruder_detected,
            away_timer_fired,
            hvac_mode: partial.hvac_mode,
            alarm_passcode: settings.alarm_passcode.clone(),
            given_passcode: partial.given_passcode.clone().unwrap_or_default(),
        }
    }
}

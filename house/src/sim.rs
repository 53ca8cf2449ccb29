use serde::Deserialize;

use smarthome_common::state::{HvacMode, PartialState};

/// Simulated house hardware: sensor readings plus actuator positions.
/// Serde defaults let an initial-state file set only the fields it cares
/// about.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HouseState {
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
    pub intruder_detected: bool,
    pub hvac_mode: HvacMode,
    pub given_passcode: String,
}

impl Default for HouseState {
    fn default() -> Self {
        Self {
            temperature: 65,
            humidity: 90,
            target_temp: 70,
            door_open: true,
            light_on: true,
            occupied: true,
            alarm_armed: false,
            alarm_active: false,
            humidifier_on: false,
            heater_on: false,
            chiller_on: false,
            lock_engaged: false,
            intruder_detected: false,
            hvac_mode: HvacMode::Heater,
            given_passcode: String::new(),
        }
    }
}

impl HouseState {
    /// Advance the toy physics one step: running HVAC moves the temperature
    /// a degree, the humidifier dries the air a point per step and it creeps
    /// back up otherwise.
    pub fn tick(&mut self) {
        if self.heater_on {
            self.temperature += 1;
        }
        if self.chiller_on {
            self.temperature -= 1;
        }
        if self.humidifier_on {
            self.humidity = (self.humidity - 1).max(0);
        } else {
            self.humidity = (self.humidity + 1).min(100);
        }
    }

    /// Overlay a decoded `SS` payload onto the hardware.
    pub fn apply(&mut self, update: &PartialState) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(value) = update.$field.clone() {
                    self.$field = value;
                }
            };
        }
        set!(temperature);
        set!(humidity);
        set!(target_temp);
        set!(door_open);
        set!(light_on);
        set!(occupied);
        set!(alarm_armed);
        set!(alarm_active);
        set!(humidifier_on);
        set!(heater_on);
        set!(chiller_on);
        set!(lock_engaged);
        set!(intruder_detected);
        set!(hvac_mode);
        set!(given_passcode);
    }

    pub fn to_partial(&self) -> PartialState {
        PartialState {
            temperature: Some(self.temperature),
            humidity: Some(self.humidity),
            target_temp: Some(self.target_temp),
            door_open: Some(self.door_open),
            light_on: Some(self.light_on),
            occupied: Some(self.occupied),
            alarm_armed: Some(self.alarm_armed),
            alarm_active: Some(self.alarm_active),
            humidifier_on: Some(self.humidifier_on),
            heater_on: Some(self.heater_on),
            chiller_on: Some(self.chiller_on),
            lock_engaged: Some(self.lock_engaged),
            intruder_detected: Some(self.intruder_detected),
            hvac_mode: Some(self.hvac_mode),
            given_passcode: Some(self.given_passcode.clone()),
        }
    }
}

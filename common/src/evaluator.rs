//! The house state evaluator.
//!
//! A pure function from a merged state to the next consistent state plus a
//! human-readable decision log. Rules run in a fixed order and later rules
//! may override earlier ones, e.g. the night-mode lock override undoes an
//! occupancy-driven unlock.

use chrono::NaiveTime;
use thiserror::Error;

use crate::state::{DeviceState, HvacMode, MergedState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// The result of one evaluation: the next state and the log batch that
/// explains every decision taken while producing it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: DeviceState,
    pub log: Vec<String>,
}

/// True when `now` falls in the half-open window `[start, end)`, wrapping
/// past midnight when `start > end` (21:30-08:30 means after 21:30 or
/// before 08:30).
pub fn in_night_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

struct DecisionLog {
    stamp: String,
    lines: Vec<String>,
}

impl DecisionLog {
    fn new(now: NaiveTime) -> Self {
        Self {
            stamp: now.format("%H:%M").to_string(),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, entry: impl AsRef<str>) {
        self.lines.push(format!("[{}]: {}", self.stamp, entry.as_ref()));
    }
}

pub fn evaluate(input: &MergedState) -> Result<Evaluation, EvaluationError> {
    let temperature = require(input.temperature, "temperature-reading")?;
    let humidity = require(input.humidity, "humidity-reading")?;
    let target_temp = require(input.target_temp, "target-temperature")?;
    let mut door_open = require(input.door_open, "door-state")?;
    let mut light_on = require(input.light_on, "light-state")?;
    let occupied = require(input.occupied, "proximity-state")?;
    let mut alarm_armed = require(input.alarm_armed, "alarm-state")?;
    let mut hvac_mode = require(input.hvac_mode, "hvac-mode")?;

    let mut alarm_active = input.alarm_active.unwrap_or(false);
    let mut humidifier_on = input.humidifier_on.unwrap_or(false);
    let mut heater_on = input.heater_on.unwrap_or(false);
    // Unknown chiller state is left unknown: the turn-on rule below only
    // fires on a chiller known to be off.
    let mut chiller_on = input.chiller_on;
    let mut lock_engaged = input.lock_engaged;
    let intruder_detected = input.intruder_detected.unwrap_or(false);
    let mut away_timer_fired = input.away_timer_fired;

    let mut log = DecisionLog::new(input.now);

    let night_mode = in_night_window(input.now, input.night_start, input.night_end);

    // Lights only run while someone is home.
    if light_on {
        if !occupied {
            log.push("Cannot turn on light because user not home");
            light_on = false;
        } else {
            log.push("Light on");
        }
    } else {
        log.push("Light off");
    }

    // Occupancy drives the lock; the final value is settled by the
    // night-mode and intruder overrides further down.
    if occupied {
        lock_engaged = false;
        log.push("Door is unlocked");
    } else {
        log.push("Door is locked");
    }

    if door_open {
        if !occupied && alarm_armed {
            log.push("Break in detected: Activating alarm");
            alarm_active = true;
        } else if !occupied {
            door_open = false;
            log.push("Closed door because house vacant");
        } else {
            log.push("Door open");
        }
    } else if alarm_armed && occupied {
        // Closed door, armed alarm, and the house is suddenly occupied.
        log.push("Break in detected: Activating alarm");
        alarm_active = true;
    } else {
        log.push("Closed door");
    }

    // One-shot away lockdown.
    if away_timer_fired {
        light_on = false;
        door_open = false;
        alarm_armed = true;
        away_timer_fired = false;
    }

    if occupied {
        log.push("House is occupied");
        if !light_on && !alarm_armed {
            light_on = true;
            log.push("Turning on light");
        }
    }

    if alarm_armed {
        log.push("Alarm enabled");
    } else {
        // A disarm was requested.
        if !occupied {
            alarm_armed = true;
            log.push("Cannot disable the alarm, house is empty");
        }
        if alarm_active {
            if !input.given_passcode.is_empty() && input.given_passcode >= input.alarm_passcode {
                log.push("Correct passcode entered, disabled alarm");
                alarm_active = false;
            } else {
                log.push("Cannot disable alarm, invalid passcode given");
                alarm_armed = true;
            }
        }
    }

    if !alarm_armed {
        log.push("Alarm disabled");
        alarm_active = false;
    }

    // Second pass: the alarm sounds when the door is opened in an empty
    // house, or when the house is suddenly occupied behind a closed door.
    if (alarm_armed && !door_open && occupied) || (alarm_armed && door_open && !occupied) {
        log.push("Activating alarm");
        alarm_active = true;
    }

    if temperature < target_temp {
        log.push(format!(
            "Turning on heater, target temperature = {target_temp}F, current temperature = {temperature}F"
        ));
        heater_on = true;
    } else {
        heater_on = false;
    }

    if temperature > target_temp {
        // Only flip the chiller on if it is known to be off.
        if chiller_on == Some(false) {
            log.push(format!(
                "Turning on air conditioner target temperature = {target_temp}F, current temperature = {temperature}F"
            ));
            chiller_on = Some(true);
        }
    } else {
        chiller_on = Some(false);
    }

    if chiller_on == Some(true) {
        hvac_mode = HvacMode::Chiller;
    } else if heater_on {
        hvac_mode = HvacMode::Heater;
    }

    if hvac_mode == HvacMode::Heater {
        if chiller_on == Some(true) {
            log.push("Turning off air conditioner");
        }
        chiller_on = Some(false);
        humidifier_on = false;
    }

    if hvac_mode == HvacMode::Chiller {
        if heater_on {
            log.push("Turning off heater");
        }
        heater_on = false;
    }

    if humidifier_on && hvac_mode == HvacMode::Chiller {
        log.push("Enabled Dehumidifier");
    } else {
        log.push("Automatically disabled dehumidifier when running heater");
        humidifier_on = false;
    }

    if night_mode {
        log.push("Night mode is on");
        if !lock_engaged {
            log.push("Door cannot be unlocked at night, relocking door");
            lock_engaged = true;
        }
    } else {
        log.push("Night mode is off");
    }

    if intruder_detected {
        lock_engaged = true;
        log.push("Possible intruder detected");
    } else {
        // A previously engaged lock stays engaged.
        log.push("All clear");
    }

    if lock_engaged {
        log.push("Door is locked");
    } else {
        log.push("Door is unlocked");
    }

    Ok(Evaluation {
        state: DeviceState {
            temperature,
            humidity,
            target_temp,
            door_open,
            light_on,
            occupied,
            alarm_armed,
            alarm_active,
            humidifier_on,
            heater_on,
            chiller_on: chiller_on.unwrap_or(false),
            lock_engaged,
            night_mode,
            intruder_detected,
            away_timer_fired,
            hvac_mode,
            alarm_passcode: input.alarm_passcode.clone(),
            given_passcode: input.given_passcode.clone(),
        },
        log: log.lines,
    })
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, EvaluationError> {
    value.ok_or(EvaluationError::MissingField(field))
}

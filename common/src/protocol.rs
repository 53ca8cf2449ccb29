//! Line-oriented wire codec for talking to a house.
//!
//! Frames look like `<CMD>:<body>.` where the body is `key=value` pairs
//! joined by `;`. Booleans travel as `1`/`0`. A state-set request is
//! acknowledged with the literal `OK.`.

use thiserror::Error;

use crate::state::{HvacMode, PartialState};

pub const CMD_GET_STATE: &str = "GS";
pub const CMD_SET_STATE: &str = "SS";
pub const CMD_STATE_UPDATE: &str = "SU";

pub const MSG_DELIM: char = ':';
pub const PARAM_DELIM: char = ';';
pub const PARAM_EQ: char = '=';
pub const MSG_END: char = '.';
pub const ACK: &str = "OK.";

pub const FIELD_TEMP_READING: &str = "TR";
pub const FIELD_HUMIDITY_READING: &str = "HR";
pub const FIELD_DOOR_STATE: &str = "DS";
pub const FIELD_LIGHT_STATE: &str = "LS";
pub const FIELD_PROXIMITY_STATE: &str = "PS";
pub const FIELD_ALARM_STATE: &str = "AS";
pub const FIELD_ALARM_ACTIVE: &str = "AA";
pub const FIELD_HUMIDIFIER_STATE: &str = "HUS";
pub const FIELD_HEATER_STATE: &str = "HES";
pub const FIELD_CHILLER_STATE: &str = "CHS";
pub const FIELD_HVAC_MODE: &str = "HM";
pub const FIELD_LOCK_STATE: &str = "LKS";
pub const FIELD_INTRUDER_DETECT: &str = "ID";
pub const FIELD_TARGET_TEMP: &str = "TT";
pub const FIELD_GIVEN_PASSCODE: &str = "PC";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unexpected command: {0}")]
    UnexpectedCommand(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

pub fn encode_get_state() -> String {
    format!("{CMD_GET_STATE}{MSG_END}")
}

/// Serialize the fields present in `state` into an `SS` frame. Emission
/// order is fixed so frames are reproducible.
pub fn encode_set_state(state: &PartialState) -> String {
    fn push_bool(pairs: &mut Vec<String>, field: &str, value: Option<bool>) {
        if let Some(value) = value {
            pairs.push(format!(
                "{field}{PARAM_EQ}{}",
                if value { "1" } else { "0" }
            ));
        }
    }

    let mut pairs: Vec<String> = Vec::new();
    push_bool(&mut pairs, FIELD_DOOR_STATE, state.door_open);
    push_bool(&mut pairs, FIELD_LIGHT_STATE, state.light_on);
    push_bool(&mut pairs, FIELD_PROXIMITY_STATE, state.occupied);
    push_bool(&mut pairs, FIELD_ALARM_STATE, state.alarm_armed);
    push_bool(&mut pairs, FIELD_ALARM_ACTIVE, state.alarm_active);
    push_bool(&mut pairs, FIELD_HUMIDIFIER_STATE, state.humidifier_on);
    push_bool(&mut pairs, FIELD_HEATER_STATE, state.heater_on);
    push_bool(&mut pairs, FIELD_CHILLER_STATE, state.chiller_on);
    if let Some(mode) = state.hvac_mode {
        pairs.push(format!("{FIELD_HVAC_MODE}{PARAM_EQ}{}", mode.to_wire()));
    }
    push_bool(&mut pairs, FIELD_LOCK_STATE, state.lock_engaged);
    push_bool(&mut pairs, FIELD_INTRUDER_DETECT, state.intruder_detected);
    if let Some(target) = state.target_temp {
        pairs.push(format!("{FIELD_TARGET_TEMP}{PARAM_EQ}{target}"));
    }
    if let Some(passcode) = &state.given_passcode {
        pairs.push(format!("{FIELD_GIVEN_PASSCODE}{PARAM_EQ}{passcode}"));
    }

    let mut frame = String::from(CMD_SET_STATE);
    frame.push(MSG_DELIM);
    frame.push_str(&pairs.join(&PARAM_DELIM.to_string()));
    frame.push(MSG_END);
    frame
}

/// Serialize a full reading into the `SU` frame a house answers `GS` with.
pub fn encode_state_update(state: &PartialState) -> String {
    let body = encode_set_state(state);
    let mut frame = String::from(CMD_STATE_UPDATE);
    let mut readings = String::new();
    if let Some(temp) = state.temperature {
        readings.push_str(&format!("{FIELD_TEMP_READING}{PARAM_EQ}{temp}"));
    }
    if let Some(humidity) = state.humidity {
        if !readings.is_empty() {
            readings.push(PARAM_DELIM);
        }
        readings.push_str(&format!("{FIELD_HUMIDITY_READING}{PARAM_EQ}{humidity}"));
    }
    frame.push(MSG_DELIM);
    frame.push_str(&readings);
    // Splice the actuator pairs in behind the sensor readings.
    let actuators = body
        .trim_start_matches(CMD_SET_STATE)
        .trim_start_matches(MSG_DELIM)
        .trim_end_matches(MSG_END);
    if !readings.is_empty() && !actuators.is_empty() {
        frame.push(PARAM_DELIM);
    }
    frame.push_str(actuators);
    frame.push(MSG_END);
    frame
}

/// Decode a `SU` response line into a typed partial state.
pub fn decode_state_update(line: &str) -> Result<PartialState, ProtocolError> {
    let (command, body) = split_frame(line)?;
    if command != CMD_STATE_UPDATE {
        return Err(ProtocolError::UnexpectedCommand(command.to_string()));
    }
    decode_pairs(body)
}

/// Decode an incoming `SS` request line (the house simulator's side).
pub fn decode_set_state(line: &str) -> Result<PartialState, ProtocolError> {
    let (command, body) = split_frame(line)?;
    if command != CMD_SET_STATE {
        return Err(ProtocolError::UnexpectedCommand(command.to_string()));
    }
    decode_pairs(body)
}

pub fn is_ack(line: &str) -> bool {
    line.trim() == ACK
}

fn split_frame(line: &str) -> Result<(&str, &str), ProtocolError> {
    let trimmed = line.trim();
    let (command, body) = trimmed
        .split_once(MSG_DELIM)
        .ok_or_else(|| ProtocolError::Malformed(trimmed.to_string()))?;
    // Exactly one command delimiter per frame.
    if body.contains(MSG_DELIM) {
        return Err(ProtocolError::Malformed(trimmed.to_string()));
    }
    Ok((command, body.trim_end_matches(MSG_END)))
}

fn decode_pairs(body: &str) -> Result<PartialState, ProtocolError> {
    let mut state = PartialState::default();

    for pair in body.split(PARAM_DELIM) {
        if pair.is_empty() {
            continue;
        }
        let mut tokens = pair.split(PARAM_EQ);
        let (Some(key), Some(value), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(ProtocolError::Malformed(pair.to_string()));
        };

        match key {
            FIELD_TEMP_READING => {
                state.temperature = Some(parse_int(FIELD_TEMP_READING, value)?);
            }
            FIELD_HUMIDITY_READING => {
                state.humidity = Some(parse_int(FIELD_HUMIDITY_READING, value)?);
            }
            FIELD_TARGET_TEMP => {
                state.target_temp = Some(parse_int(FIELD_TARGET_TEMP, value)?);
            }
            FIELD_DOOR_STATE => state.door_open = Some(value == "1"),
            FIELD_LIGHT_STATE => state.light_on = Some(value == "1"),
            FIELD_PROXIMITY_STATE => state.occupied = Some(value == "1"),
            FIELD_ALARM_STATE => state.alarm_armed = Some(value == "1"),
            FIELD_ALARM_ACTIVE => state.alarm_active = Some(value == "1"),
            FIELD_HUMIDIFIER_STATE => state.humidifier_on = Some(value == "1"),
            FIELD_HEATER_STATE => state.heater_on = Some(value == "1"),
            FIELD_CHILLER_STATE => state.chiller_on = Some(value == "1"),
            FIELD_HVAC_MODE => state.hvac_mode = Some(HvacMode::from_wire(value)),
            FIELD_LOCK_STATE => state.lock_engaged = Some(value == "1"),
            FIELD_INTRUDER_DETECT => state.intruder_detected = Some(value == "1"),
            FIELD_GIVEN_PASSCODE => state.given_passcode = Some(value.to_string()),
            // Devices may report codes this controller does not track.
            _ => {}
        }
    }

    Ok(state)
}

fn parse_int(field: &'static str, value: &str) -> Result<i32, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{DeviceSnapshot, Schedule, TemperatureUnit};
use crate::{Error, Result};

pub const STATUS_PATH: &str = "/api/";
pub const SCHEDULE_PATH: &str = "/api/schedule";
pub const SCHEDULES_PATH: &str = "/api/schedules/";

pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

pub fn command_query(mode: &str, temp: f64) -> String {
    format!("?mode={}&temp={temp}", urlencoding::encode(mode))
}

pub fn schedules_query(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.is_empty() => format!("?name={}", urlencoding::encode(n)),
        _ => String::new(),
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Vec<StatusEntry>,
}

#[derive(Deserialize)]
struct StatusEntry {
    #[serde(default)]
    fan: bool,
    #[serde(deserialize_with = "number")]
    temp: f64,
    #[serde(rename = "targetTemp", deserialize_with = "number")]
    target_temp: f64,
    runmode: String,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    heat: Option<bool>,
    #[serde(default)]
    cool: Option<bool>,
}

#[derive(Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    schedule: Vec<ScheduleEntry>,
}

#[derive(Deserialize)]
struct ScheduleEntry {
    name: String,
    #[serde(default)]
    active: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// Some firmware revisions quote numeric fields.
fn number<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    match NumberOrText::deserialize(de)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse an `/api/` body into a snapshot candidate.
///
/// The returned snapshot has no schedule and an empty name; the client fills both
/// in before committing.
pub fn parse_status_response(body: &str) -> Result<DeviceSnapshot> {
    let parsed: StatusResponse = serde_json::from_str(body)?;
    let entry = parsed
        .status
        .into_iter()
        .next()
        .ok_or_else(|| Error::Protocol("status array is missing or empty".to_string()))?;

    Ok(DeviceSnapshot {
        fan: entry.fan,
        temp: entry.temp,
        target_temp: entry.target_temp,
        runmode: entry.runmode,
        units: TemperatureUnit::from_thermopi_str(entry.units.as_deref()),
        heat: entry.heat,
        cool: entry.cool,
        schedule: None,
        name: String::new(),
    })
}

/// Parse an `/api/schedule` body. An empty or missing list means no schedule.
pub fn parse_schedule_response(body: &str) -> Result<Option<Schedule>> {
    let parsed: ScheduleResponse = serde_json::from_str(body)?;
    Ok(parsed.schedule.into_iter().next().map(|entry| {
        let active = entry.active.as_str().unwrap_or_default();
        Schedule::from_wire(entry.name, active)
    }))
}

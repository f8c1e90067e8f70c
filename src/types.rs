use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Anything other than `"C"` (including a missing field) is Fahrenheit.
    pub fn from_thermopi_str(s: Option<&str>) -> Self {
        match s {
            Some("C") => TemperatureUnit::Celsius,
            _ => TemperatureUnit::Fahrenheit,
        }
    }

    pub fn as_thermopi_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "\u{00b0}C"),
            TemperatureUnit::Fahrenheit => write!(f, "\u{00b0}F"),
        }
    }
}

/// A named program on the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub name: String,
    pub active: bool,
}

impl Schedule {
    /// The device reports `active` as the string `"True"`; everything else is off.
    pub fn from_wire(name: impl Into<String>, active: &str) -> Self {
        Self {
            name: name.into(),
            active: active == "True",
        }
    }
}

/// Last known device state, merged from `/api/` and `/api/schedule`.
///
/// Snapshots are never edited after commit; the client swaps in a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub fan: bool,
    pub temp: f64,
    pub target_temp: f64,
    pub runmode: String,
    pub units: TemperatureUnit,
    pub heat: Option<bool>,
    pub cool: Option<bool>,
    pub schedule: Option<Schedule>,
    pub name: String,
}

impl DeviceSnapshot {
    /// `runmode`, suffixed with `(name[on|off])` when a schedule is attached.
    pub fn current_operation(&self) -> String {
        match &self.schedule {
            Some(schedule) => {
                let active = if schedule.active { "on" } else { "off" };
                format!("{}({}[{}])", self.runmode, schedule.name, active)
            }
            None => self.runmode.clone(),
        }
    }
}

/// Emitted after a commit for every field that differs from the previous snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TemperatureChanged { temp: f64 },
    TargetTemperatureChanged { target: f64 },
    RunmodeChanged { runmode: String },
    FanChanged { running: bool },
    UnitsChanged { unit: TemperatureUnit },
    ScheduleChanged { schedule: Option<Schedule> },
    AwayModeChanged { away: bool },
}

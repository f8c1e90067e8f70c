use serde_json::Value;

use crate::types::*;

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Events for every field of `current` that differs from `previous`.
/// With no previous snapshot every field counts as changed.
pub(crate) fn diff_snapshots(previous: Option<&DeviceSnapshot>, current: &DeviceSnapshot) -> Vec<Event> {
    let mut events = Vec::new();

    if previous.is_none_or(|p| p.temp != current.temp) {
        events.push(Event::TemperatureChanged { temp: current.temp });
    }
    if previous.is_none_or(|p| p.target_temp != current.target_temp) {
        events.push(Event::TargetTemperatureChanged {
            target: current.target_temp,
        });
    }
    if previous.is_none_or(|p| p.runmode != current.runmode) {
        events.push(Event::RunmodeChanged {
            runmode: current.runmode.clone(),
        });
    }
    if previous.is_none_or(|p| p.fan != current.fan) {
        events.push(Event::FanChanged { running: current.fan });
    }
    if previous.is_none_or(|p| p.units != current.units) {
        events.push(Event::UnitsChanged { unit: current.units });
    }
    if previous.is_none_or(|p| p.schedule != current.schedule) {
        events.push(Event::ScheduleChanged {
            schedule: current.schedule.clone(),
        });
    }

    events
}

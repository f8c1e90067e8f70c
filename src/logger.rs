use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::diff::diff_json;

pub enum MessageLogMode {
    Full,
    /// First response per endpoint in full, then only changed paths.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": "GET",
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, query: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "query": query,
        });
        self.write_line(&entry);
    }

    pub fn log_error(&mut self, path: &str, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "err",
            "path": path,
            "error": error,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "status": status,
                    "body": body,
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                let entry = match self.previous.get(path) {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "path": path,
                        "status": status,
                        "full": true,
                        "body": body,
                    }),
                    Some(prev) => {
                        let mut changes = Vec::new();
                        diff_json(prev, body, "", &mut changes);

                        let change_entries: Vec<Value> = changes
                            .iter()
                            .map(|(path, old, new)| {
                                json!({ "path": path, "old": old, "new": new })
                            })
                            .collect();

                        json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "resp",
                            "path": path,
                            "status": status,
                            "changes": change_entries,
                        })
                    }
                };
                self.write_line(&entry);
                self.previous.insert(path.to_string(), body.clone());
            }
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("/api/");

        let lines = read_lines(path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert_eq!(lines[0]["path"], "/api/");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_tracks_each_path_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("/api/", 200, &json!({"status": [{"temp": 70}]}));
        logger.log_response("/api/schedule", 200, &json!({"schedule": []}));
        logger.log_response("/api/", 200, &json!({"status": [{"temp": 71}]}));
        logger.log_response("/api/schedule", 200, &json!({"schedule": []}));

        let lines = read_lines(path);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["full"], true);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 1);
        assert_eq!(lines[3]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn log_command_and_error() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_command("set_target_temperature", "?mode=heat&temp=72");
        logger.log_error("/api/", "request timed out");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["query"], "?mode=heat&temp=72");
        assert_eq!(lines[1]["dir"], "err");
        assert_eq!(lines[1]["error"], "request timed out");
    }
}

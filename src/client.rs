use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::ThermoPiConfig;
use crate::diff::diff_snapshots;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    base_url, command_query, parse_schedule_response, parse_status_response, schedules_query,
    COMMAND_TIMEOUT, READ_TIMEOUT, SCHEDULES_PATH, SCHEDULE_PATH, STATUS_PATH,
};
use crate::types::*;
use crate::{Error, Result};

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&DeviceSnapshot) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&Error) + Send + Sync>;

pub struct ThermoPiClientBuilder {
    config: ThermoPiConfig,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    error_callbacks: Vec<ErrorCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
    read_timeout: Duration,
    command_timeout: Duration,
}

impl ThermoPiClientBuilder {
    pub fn new(config: ThermoPiConfig) -> Self {
        Self {
            config,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            error_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
            read_timeout: READ_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&DeviceSnapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    /// Called for every device communication failure (connectivity or
    /// protocol), in addition to the `Err` returned from the failing call.
    /// Rejected caller input (`Uninitialized`, `InvalidMode`,
    /// `InvalidTemperature`) is only returned.
    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.error_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Override the per-request timeouts for reads (status, schedule) and
    /// commands (setpoint, mode).
    pub fn timeouts(mut self, read: Duration, command: Duration) -> Self {
        self.read_timeout = read;
        self.command_timeout = command;
        self
    }

    /// Build without contacting the device. The snapshot starts empty.
    pub fn build(self) -> Result<ThermoPiClient> {
        self.config.validate()?;

        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        if self.config.username.is_some() || self.config.password.is_some() {
            debug!("credentials configured; the device API has no auth so they are not sent");
        }

        Ok(ThermoPiClient {
            http,
            base_url: base_url(&self.config.host, self.config.port),
            config: self.config,
            read_timeout: self.read_timeout,
            command_timeout: self.command_timeout,
            issued: AtomicU64::new(0),
            current: RwLock::new(Current::default()),
            away: AtomicBool::new(false),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
            error_callbacks: self.error_callbacks,
            logger,
        })
    }

    /// Build and run the initial refresh. An unreachable device is not an
    /// error here; the client comes back with an empty snapshot.
    pub async fn connect(self) -> Result<ThermoPiClient> {
        let client = self.build()?;
        if let Err(e) = client.refresh().await {
            debug!(error = %e, "initial refresh failed, starting without device state");
        }
        Ok(client)
    }
}

/// Committed snapshot and the ticket of the request that produced it.
#[derive(Default)]
struct Current {
    ticket: u64,
    snapshot: Option<Arc<DeviceSnapshot>>,
}

pub struct ThermoPiClient {
    http: reqwest::Client,
    base_url: String,
    config: ThermoPiConfig,
    read_timeout: Duration,
    command_timeout: Duration,
    issued: AtomicU64,
    current: RwLock<Current>,
    away: AtomicBool,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    error_callbacks: Vec<ErrorCallback>,
    logger: Option<Mutex<MessageLogger>>,
}

impl ThermoPiClient {
    pub fn builder(config: ThermoPiConfig) -> ThermoPiClientBuilder {
        ThermoPiClientBuilder::new(config)
    }

    pub async fn connect(config: ThermoPiConfig) -> Result<Self> {
        ThermoPiClientBuilder::new(config).connect().await
    }

    /// Fetch status and schedule and commit a new snapshot.
    ///
    /// A failed status fetch leaves the current snapshot untouched. A failed
    /// schedule fetch still commits, with no schedule attached. A response
    /// that arrives after a newer request has committed is discarded.
    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.next_ticket();
        let result = self
            .get(STATUS_PATH, "", self.read_timeout)
            .await
            .and_then(|body| parse_status_response(&body));

        match result {
            Ok(candidate) => {
                self.commit_with_schedule(ticket, candidate).await;
                Ok(())
            }
            Err(e) => {
                self.report("refresh", &e);
                Err(e)
            }
        }
    }

    /// Currently active schedule, or `None` if there is none or it could not
    /// be fetched. Failures are reported but not returned.
    pub async fn fetch_schedule(&self) -> Option<Schedule> {
        match self.try_fetch_schedule().await {
            Ok(schedule) => schedule,
            Err(e) => {
                self.report("fetch_schedule", &e);
                None
            }
        }
    }

    pub async fn try_fetch_schedule(&self) -> Result<Option<Schedule>> {
        let body = self.get(SCHEDULE_PATH, "", self.read_timeout).await?;
        parse_schedule_response(&body)
    }

    /// Raw listing of all schedules, or only the named one.
    pub async fn list_schedules(&self, name: Option<&str>) -> Result<Value> {
        let query = schedules_query(name);
        let result = self
            .get(SCHEDULES_PATH, &query, self.read_timeout)
            .await
            .and_then(|body| Ok(serde_json::from_str::<Value>(&body)?));
        if let Err(ref e) = result {
            self.report("list_schedules", e);
        }
        result
    }

    // -- Command methods --

    /// Set the target temperature in the current runmode. `None` is a no-op.
    pub async fn set_target_temperature(&self, value: Option<f64>) -> Result<()> {
        let Some(temp) = value else {
            return Ok(());
        };
        if !temp.is_finite() {
            return Err(rejected("set_target_temperature", Error::InvalidTemperature(temp)));
        }
        let runmode = match self.snapshot() {
            Some(s) => s.runmode.clone(),
            None => return Err(rejected("set_target_temperature", Error::Uninitialized)),
        };
        self.send_command("set_target_temperature", &runmode, temp)
            .await
    }

    /// Switch runmode, keeping the current target temperature.
    pub async fn set_operation_mode(&self, mode: &str) -> Result<()> {
        if mode.trim().is_empty() {
            return Err(rejected("set_operation_mode", Error::InvalidMode(mode.to_string())));
        }
        let target = match self.snapshot() {
            Some(s) => s.target_temp,
            None => return Err(rejected("set_operation_mode", Error::Uninitialized)),
        };
        self.send_command("set_operation_mode", mode, target).await
    }

    // -- Away mode (local only) --

    pub fn is_away_mode_on(&self) -> bool {
        self.away.load(Ordering::SeqCst)
    }

    pub fn turn_away_mode_on(&self) {
        self.set_away_mode(true);
    }

    pub fn turn_away_mode_off(&self) {
        self.set_away_mode(false);
    }

    pub fn set_away_mode(&self, away: bool) {
        let previous = self.away.swap(away, Ordering::SeqCst);
        if previous != away {
            debug!(away, "away mode changed");
            self.emit(&Event::AwayModeChanged { away });
        }
    }

    // -- Accessors --

    pub fn snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.current.read().snapshot.clone()
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.snapshot().map(|s| s.temp)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.snapshot().map(|s| s.target_temp)
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.snapshot().map(|s| s.units).unwrap_or_default()
    }

    pub fn current_operation(&self) -> Option<String> {
        self.snapshot().map(|s| s.current_operation())
    }

    pub fn is_fan_on(&self) -> bool {
        self.snapshot().is_some_and(|s| s.fan)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ThermoPiConfig {
        &self.config
    }

    // -- Helpers --

    async fn get(&self, path: &str, query: &str, timeout: Duration) -> Result<String> {
        let url = format!("{}{}{}", self.base_url, path, query);
        trace!(url = %url, "GET");
        self.with_logger(|l| l.log_request(&format!("{path}{query}")));

        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        self.with_logger(|l| {
            let body_json = serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.clone()));
            l.log_response(path, status, &body_json);
        });

        Ok(body)
    }

    async fn send_command(&self, action: &str, mode: &str, temp: f64) -> Result<()> {
        let ticket = self.next_ticket();
        let query = command_query(mode, temp);
        debug!(action, query = %query, "sending command");
        self.with_logger(|l| l.log_command(action, &query));

        let result = self
            .get(STATUS_PATH, &query, self.command_timeout)
            .await
            .and_then(|body| parse_status_response(&body));

        match result {
            Ok(candidate) => {
                self.commit_with_schedule(ticket, candidate).await;
                Ok(())
            }
            Err(e) => {
                self.report(action, &e);
                Err(e)
            }
        }
    }

    fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn commit_with_schedule(&self, ticket: u64, mut candidate: DeviceSnapshot) {
        candidate.schedule = self.fetch_schedule().await;
        candidate.name = self.config.name.clone();
        self.commit(ticket, candidate);
    }

    /// Replace the snapshot unless a request issued later has already committed.
    fn commit(&self, ticket: u64, snapshot: DeviceSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        let previous = {
            let mut current = self.current.write();
            if ticket < current.ticket {
                debug!(ticket, committed = current.ticket, "discarding stale device state");
                return false;
            }
            current.ticket = ticket;
            current.snapshot.replace(Arc::clone(&snapshot))
        };

        let events = diff_snapshots(previous.as_deref(), &snapshot);
        if !events.is_empty() {
            debug!(count = events.len(), "snapshot changed");
        }
        for event in &events {
            self.emit(event);
        }
        for cb in &self.snapshot_callbacks {
            cb(&snapshot);
        }
        true
    }

    fn emit(&self, event: &Event) {
        for cb in &self.event_callbacks {
            cb(event);
        }
    }

    fn report(&self, action: &str, error: &Error) {
        warn!(action, host = %self.config.host, error = %error, "device request failed");
        self.with_logger(|l| l.log_error(action, &error.to_string()));
        for cb in &self.error_callbacks {
            cb(error);
        }
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(ref logger) = self.logger {
            f(&mut logger.lock());
        }
    }
}

fn rejected(action: &str, error: Error) -> Error {
    debug!(action, error = %error, "command rejected before sending");
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> ThermoPiClient {
        ThermoPiClient::builder(ThermoPiConfig::new("127.0.0.1").port(9))
            .build()
            .unwrap()
    }

    #[test]
    fn build_rejects_invalid_config() {
        let err = ThermoPiClient::builder(ThermoPiConfig::new("")).build().err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn empty_client_accessors() {
        let client = offline_client();
        assert!(client.snapshot().is_none());
        assert_eq!(client.current_temperature(), None);
        assert_eq!(client.target_temperature(), None);
        assert_eq!(client.current_operation(), None);
        assert_eq!(client.temperature_unit(), TemperatureUnit::Fahrenheit);
        assert!(!client.is_fan_on());
        assert_eq!(client.name(), "ThermoPi");
    }

    #[test]
    fn away_mode_is_local_and_emits_on_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let client = ThermoPiClient::builder(ThermoPiConfig::new("127.0.0.1"))
            .on_event(move |e| seen_clone.lock().push(e.clone()))
            .build()
            .unwrap();

        assert!(!client.is_away_mode_on());
        client.turn_away_mode_on();
        client.turn_away_mode_on();
        assert!(client.is_away_mode_on());
        client.turn_away_mode_off();
        assert!(!client.is_away_mode_on());

        assert_eq!(
            *seen.lock(),
            vec![
                Event::AwayModeChanged { away: true },
                Event::AwayModeChanged { away: false },
            ]
        );
    }

    fn snapshot(target_temp: f64) -> DeviceSnapshot {
        DeviceSnapshot {
            fan: true,
            temp: 77.0,
            target_temp,
            runmode: "heat".to_string(),
            units: TemperatureUnit::Celsius,
            heat: None,
            cool: None,
            schedule: None,
            name: "ThermoPi".to_string(),
        }
    }

    #[test]
    fn commit_swaps_snapshot_and_emits_changes() {
        let count = Arc::new(Mutex::new(0usize));
        let count_clone = count.clone();
        let client = ThermoPiClient::builder(ThermoPiConfig::new("127.0.0.1"))
            .on_event(move |_| *count_clone.lock() += 1)
            .build()
            .unwrap();

        assert!(client.commit(client.next_ticket(), snapshot(80.0)));
        let first = client.snapshot().unwrap();
        assert!(client.commit(client.next_ticket(), snapshot(80.0)));
        let second = client.snapshot().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(client.temperature_unit(), TemperatureUnit::Celsius);
        assert_eq!(*count.lock(), 6);
    }

    #[test]
    fn older_ticket_does_not_overwrite_newer_commit() {
        let snapshots = Arc::new(Mutex::new(0usize));
        let snapshots_clone = snapshots.clone();
        let client = ThermoPiClient::builder(ThermoPiConfig::new("127.0.0.1"))
            .on_snapshot(move |_| *snapshots_clone.lock() += 1)
            .build()
            .unwrap();

        let slow = client.next_ticket();
        let fast = client.next_ticket();
        assert!(client.commit(fast, snapshot(72.0)));
        assert!(!client.commit(slow, snapshot(80.0)));

        assert_eq!(client.target_temperature(), Some(72.0));
        assert_eq!(*snapshots.lock(), 1);
    }
}

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::{Error, Result};

pub const DEFAULT_NAME: &str = "ThermoPi";
pub const DEFAULT_PORT: u16 = 88;
pub const DEFAULT_DEVICE: &str = "0";

/// Connection settings for one thermostat.
///
/// `username` and `password` are accepted for compatibility with existing
/// configurations but the device API has no authentication, so they are never
/// sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThermoPiConfig {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

fn port<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<u16, D::Error> {
    match PortValue::deserialize(de)? {
        PortValue::Number(p) => Ok(p),
        PortValue::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl ThermoPiConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            username: None,
            password: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host is required".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".to_string()));
        }
        if self.device != DEFAULT_DEVICE {
            warn!(device = %self.device, "only device 0 is supported, ignoring device index");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let config = ThermoPiConfig::from_json(r#"{"host": "192.168.1.79"}"#).unwrap();
        assert_eq!(config.host, "192.168.1.79");
        assert_eq!(config.port, 88);
        assert_eq!(config.name, "ThermoPi");
        assert_eq!(config.device, "0");
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn port_as_string_or_number() {
        let a = ThermoPiConfig::from_json(r#"{"host": "h", "port": "8088"}"#).unwrap();
        let b = ThermoPiConfig::from_json(r#"{"host": "h", "port": 8088}"#).unwrap();
        assert_eq!(a.port, 8088);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_host_rejected() {
        let err = ThermoPiConfig::from_json(r#"{"name": "Hall"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn empty_host_and_zero_port_rejected() {
        assert!(ThermoPiConfig::new("  ").validate().is_err());
        assert!(ThermoPiConfig::new("h").port(0).validate().is_err());
        assert!(ThermoPiConfig::from_json(r#"{"host": "h", "port": "eighty"}"#).is_err());
    }

    #[test]
    fn builder_style_setters() {
        let config = ThermoPiConfig::new("h")
            .port(9000)
            .name("Hallway")
            .credentials("pi", "secret");
        assert_eq!(config.port, 9000);
        assert_eq!(config.name, "Hallway");
        assert_eq!(config.username.as_deref(), Some("pi"));
        assert!(config.validate().is_ok());
    }
}

use std::time::Duration;

use tracing::trace;

use super::CommandTransport;
use crate::control::CommandKind;
use crate::error::{ConfigError, DispatchError};

/// Vehicle control endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Address of the vehicle, without scheme or port
    pub host: String,
    /// Bound on each command request
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".to_string(),
            timeout: Duration::from_secs(1),
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() || self.host.contains('/') || self.host.contains(char::is_whitespace) {
            return Err(ConfigError::Url(self.host.clone()));
        }
        Ok(())
    }
}

/// Device URL for one command.
pub fn command_url(host: &str, kind: CommandKind, value: u8) -> String {
    match kind {
        CommandKind::MoveCar => format!("http://{host}/move_car?move={value}"),
        CommandKind::Speed => format!("http://{host}/control?var=speed&val={value}"),
        CommandKind::Light => format!("http://{host}/control?var=led_intensity&val={value}"),
        CommandKind::ServoX => format!("http://{host}/control?var=servo_x&val={value}"),
        CommandKind::ServoY => format!("http://{host}/control?var=servo_y&val={value}"),
    }
}

/// Plain HTTP GET per command.
pub struct HttpTransport {
    agent: ureq::Agent,
    host: String,
}

impl HttpTransport {
    pub fn new(config: &DeviceConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            agent,
            host: config.host.clone(),
        }
    }
}

impl CommandTransport for HttpTransport {
    fn send(&self, kind: CommandKind, value: u8) -> Result<(), DispatchError> {
        let url = command_url(&self.host, kind, value);
        trace!(%url, "GET");
        self.agent
            .get(&url)
            .call()
            .map(drop)
            .map_err(|source| DispatchError::Request {
                url,
                source: Box::new(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_urls() {
        let host = "192.168.1.1";
        assert_eq!(
            command_url(host, CommandKind::MoveCar, 4),
            "http://192.168.1.1/move_car?move=4"
        );
        assert_eq!(
            command_url(host, CommandKind::Speed, 200),
            "http://192.168.1.1/control?var=speed&val=200"
        );
        assert_eq!(
            command_url(host, CommandKind::Light, 0),
            "http://192.168.1.1/control?var=led_intensity&val=0"
        );
        assert_eq!(
            command_url(host, CommandKind::ServoX, 90),
            "http://192.168.1.1/control?var=servo_x&val=90"
        );
        assert_eq!(
            command_url(host, CommandKind::ServoY, 45),
            "http://192.168.1.1/control?var=servo_y&val=45"
        );
    }

    #[test]
    fn test_validate_host() {
        assert!(DeviceConfig::default().validate().is_ok());
        let config = DeviceConfig {
            host: "http://car/".into(),
            ..DeviceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

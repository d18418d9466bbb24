use std::{
    net::IpAddr,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use reach_receiver::ReceiverConfig;

use crate::{ObserveError, ObserveResult, Operation};

/// Стартовое время плана: немедленно, абсолютное unix-время или
/// задержка от момента запуска.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StartTime {
    Now,
    Unix(u64),
    Delay(u64),
}

impl StartTime {
    /// Абсолютный момент старта.
    pub fn resolve(&self) -> SystemTime {
        match self {
            StartTime::Now => SystemTime::now(),
            StartTime::Unix(secs) => UNIX_EPOCH + Duration::from_secs(*secs),
            StartTime::Delay(secs) => SystemTime::now() + Duration::from_secs(*secs),
        }
    }
}

impl Default for StartTime {
    fn default() -> Self {
        StartTime::Now
    }
}

impl TryFrom<String> for StartTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim();

        if s.eq_ignore_ascii_case("now") {
            return Ok(StartTime::Now);
        }

        if let Some(delay) = s.strip_prefix('+') {
            return delay
                .parse::<u64>()
                .map(StartTime::Delay)
                .map_err(|e| format!("Invalid start delay '{s}': {e}"));
        }

        s.parse::<u64>()
            .map(StartTime::Unix)
            .map_err(|e| format!("Invalid start time '{s}': use now, +N or unix seconds ({e})"))
    }
}

impl From<StartTime> for String {
    fn from(t: StartTime) -> Self {
        match t {
            StartTime::Now => "now".to_string(),
            StartTime::Unix(secs) => secs.to_string(),
            StartTime::Delay(secs) => format!("+{secs}"),
        }
    }
}

/// Секция приёмника в YAML-плане.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverSettings {
    #[serde(default = "default_ip")]
    pub ip: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_signals")]
    pub nof_signals: usize,
    #[serde(default = "default_channels")]
    pub nof_channels: usize,
    #[serde(default)]
    pub floating_point: bool,
}

fn default_ip() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    4660
}

fn default_signals() -> usize {
    2
}

fn default_channels() -> usize {
    16_384
}

impl ReceiverSettings {
    pub fn to_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            ip: self.ip,
            port: self.port,
            nof_signals: self.nof_signals,
            nof_channels: self.nof_channels,
            floating_point: self.floating_point,
            ..Default::default()
        }
    }
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            nof_signals: default_signals(),
            nof_channels: default_channels(),
            floating_point: false,
        }
    }
}

/// План наблюдения целиком.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Имя наблюдения (идёт в имена выходных файлов)
    pub name: String,
    /// Когда стартовать: now, +N или unix-секунды
    #[serde(default)]
    pub start_time: StartTime,
    /// Параметры приёмника
    #[serde(default)]
    pub receiver: ReceiverSettings,
    /// Последовательность операций
    pub operations: Vec<Operation>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ObservationConfig {
    /// Разбирает план из YAML-строки и валидирует его.
    pub fn from_yaml(yaml: &str) -> ObserveResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Читает план из файла.
    pub fn from_file(path: &Path) -> ObserveResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> ObserveResult<()> {
        if self.name.is_empty() {
            return Err(ObserveError::Config(
                "observation name must not be empty".to_string(),
            ));
        }

        if self.operations.is_empty() {
            return Err(ObserveError::Config(
                "observation plan has no operations".to_string(),
            ));
        }

        // Геометрия проверяется теми же правилами, что и у приёмника
        self.receiver.to_config().layout()?;

        Ok(())
    }

    /// Сколько спектров соберёт весь план.
    pub fn total_spectra(&self) -> usize {
        self.operations.iter().map(Operation::total_spectra).sum()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
name: calibration_run
start_time: "+30"
receiver:
  port: 4660
  nof_signals: 2
  nof_channels: 16384
operations:
  - operation: measure_spectrum
    name: cold_load
    nof_spectra: 3
  - operation: wait
    seconds: 2.0
  - operation: repeat
    repetitions: 2
    operations:
      - operation: measure_spectrum
        name: antenna
        nof_spectra: 4
"#;

    #[test]
    fn test_plan_from_yaml() {
        let config = ObservationConfig::from_yaml(PLAN).unwrap();

        assert_eq!(config.name, "calibration_run");
        assert_eq!(config.start_time, StartTime::Delay(30));
        assert_eq!(config.operations.len(), 3);
        assert_eq!(config.total_spectra(), 3 + 2 * 4);
    }

    #[test]
    fn test_start_time_parsing() {
        assert_eq!(
            StartTime::try_from("now".to_string()).unwrap(),
            StartTime::Now
        );
        assert_eq!(
            StartTime::try_from("+15".to_string()).unwrap(),
            StartTime::Delay(15)
        );
        assert_eq!(
            StartTime::try_from("1700000000".to_string()).unwrap(),
            StartTime::Unix(1_700_000_000)
        );
        assert!(StartTime::try_from("yesterday".to_string()).is_err());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let yaml = "name: empty\noperations: []\n";
        assert!(ObservationConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let yaml = r#"
name: bad
receiver:
  nof_signals: 3
operations:
  - operation: wait
    seconds: 1.0
"#;
        assert!(ObservationConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
name: minimal
operations:
  - operation: measure_spectrum
    name: antenna
"#;
        let config = ObservationConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.start_time, StartTime::Now);
        assert_eq!(config.receiver.port, 4660);
        assert_eq!(config.receiver.nof_channels, 16_384);
        assert!(!config.receiver.floating_point);
    }
}

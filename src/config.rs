use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use dialoguer::theme::ColorfulTheme;
use thiserror::Error;

/// Port the device listens on for raw payload bytes.
pub const DEFAULT_DEVICE_PORT: u16 = 50000;
/// Port the local log sink binds by default.
pub const DEFAULT_LOG_PORT: u16 = 8080;

/// Where the device is reachable on the local network.
///
/// Persisted as a two-line text file (`IP:` / `PORT:`), same format the
/// device-side scripts expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("no IP line in config")]
    MissingIp,
    #[error("invalid ip address: {0}")]
    Ip(#[from] std::net::AddrParseError),
    #[error("invalid port: {0}")]
    Port(#[from] ParseIntError),
}

impl FromStr for DeviceConfig {
    type Err = ConfigParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ip = None;
        let mut port = DEFAULT_DEVICE_PORT;
        for line in s.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("IP:") {
                ip = Some(rest.trim().parse()?);
            } else if let Some(rest) = line.strip_prefix("PORT:") {
                port = rest.trim().parse()?;
            }
        }
        Ok(DeviceConfig {
            ip: ip.ok_or(ConfigParseError::MissingIp)?,
            port,
        })
    }
}

impl Display for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "IP:{}", self.ip)?;
        writeln!(f, "PORT:{}", self.port)
    }
}

impl DeviceConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// `Ok(None)` when the file doesn't exist or has no `IP:` line yet.
    pub async fn load(path: &std::path::Path) -> anyhow::Result<Option<DeviceConfig>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("read device config"),
        };
        match content.parse::<DeviceConfig>() {
            Ok(config) => Ok(Some(config)),
            Err(ConfigParseError::MissingIp) => Ok(None),
            Err(err) => Err(err).context("parse device config"),
        }
    }

    pub async fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("create config directory")?;
        }
        tokio::fs::write(path, self.to_string())
            .await
            .context("write device config")
    }

    pub async fn prompt() -> anyhow::Result<DeviceConfig> {
        tokio::task::spawn_blocking(|| {
            let theme = ColorfulTheme::default();
            let ip: IpAddr = dialoguer::Input::with_theme(&theme)
                .with_prompt("Device IP address")
                .interact_text()
                .context("prompt for ip address")?;
            let port: u16 = dialoguer::Input::with_theme(&theme)
                .with_prompt("Device port")
                .default(DEFAULT_DEVICE_PORT)
                .interact_text()
                .context("prompt for port")?;
            Ok(DeviceConfig { ip, port })
        })
        .await
        .context("prompt task panicked")?
    }
}

/// Filesystem layout and environment overrides for a toolset run.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Holds the saved device config and the captured log file.
    pub config_dir: PathBuf,
    /// Root of the payload artifacts shipped alongside the tool.
    pub payload_dir: PathBuf,
    /// Optional per-exploit metadata records.
    pub info_dir: PathBuf,
    /// Port the log sink listens on.
    pub log_port: u16,
}

impl Paths {
    pub fn from_env() -> anyhow::Result<Paths> {
        let base = std::env::current_dir().context("get working directory")?;

        let payload_dir = std::env::var("PS5_PAYLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base.join("payloads"));

        let log_port = match std::env::var("PS5_LOG_PORT") {
            Ok(port) => port.parse::<u16>().context("couldn't parse PS5_LOG_PORT")?,
            Err(_) => DEFAULT_LOG_PORT,
        };

        Ok(Paths {
            config_dir: base.join(".config"),
            info_dir: base.join("info"),
            payload_dir,
            log_port,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("ps5_config.txt")
    }
    pub fn log_file(&self) -> PathBuf {
        self.config_dir.join("log_server.log")
    }
    pub fn payload(&self, rel: &str) -> PathBuf {
        self.payload_dir.join(rel)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    use super::{ConfigParseError, DeviceConfig, DEFAULT_DEVICE_PORT};

    #[test]
    fn round_trip() {
        let config = DeviceConfig {
            ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)),
            port: 50001,
        };
        let parsed = DeviceConfig::from_str(&config.to_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_port_falls_back() {
        let config = DeviceConfig::from_str("IP:10.0.0.7\n").unwrap();
        assert_eq!(config.ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(config.port, DEFAULT_DEVICE_PORT);
    }

    #[test]
    fn unknown_lines_ignored() {
        let config = DeviceConfig::from_str("# comment\nIP:10.0.0.7\nPORT:50000\nEXTRA:1\n").unwrap();
        assert_eq!(config.port, 50000);
    }

    #[test]
    fn missing_ip_is_an_error() {
        let err = DeviceConfig::from_str("PORT:50000\n").unwrap_err();
        assert!(matches!(err, ConfigParseError::MissingIp));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config").join("ps5_config.txt");

        let config = DeviceConfig {
            ip: IpAddr::V4(Ipv4Addr::new(192, 168, 178, 20)),
            port: DEFAULT_DEVICE_PORT,
        };
        config.save(&path).await.unwrap();

        let loaded = DeviceConfig::load(&path).await.unwrap();
        assert_eq!(loaded, Some(config));
    }

    #[tokio::test]
    async fn load_file_without_ip_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ps5_config.txt");
        tokio::fs::write(&path, "PORT:50000\n").await.unwrap();

        // A config without an address counts as not configured.
        let loaded = DeviceConfig::load(&path).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = DeviceConfig::load(&dir.path().join("nope.txt")).await.unwrap();
        assert_eq!(loaded, None);
    }
}

//! Link configuration and the config file parser.
//!
//! Config files use the ConfigObj dialect: `[sections]`, nested
//! `[[subsections]]` for each interface, booleans `Yes`/`No`/`True`/`False`,
//! `#` comments and unquoted values.
//!
//! ```text
//! [slip]
//!   poll_interval = 1000000    # microseconds
//! [logging]
//!   loglevel = 4
//! [interfaces]
//!   [[ttyS1]]
//!     port = /dev/ttyS1
//!     speed = 115200
//!     mtu = 296
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;

use slip_core::constants::{DEFAULT_MTU, DEFAULT_POLL_INTERVAL_US, MIN_MTU};

use crate::error::Error;
use crate::link::LinkId;
use crate::serial::{Parity, SerialConfig};

/// Everything needed to bring up one link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Used in log messages and thread names.
    pub name: String,
    /// Serial device path, e.g. `/dev/ttyS1`.
    pub port: String,
    pub speed: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: bool,
    /// Largest packet the link carries. Buffers hold `mtu + 2` bytes.
    pub mtu: usize,
    /// How long the transmit thread waits between polls when nobody asks
    /// for one sooner.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let serial = SerialConfig::default();
        LinkConfig {
            name: "slip0".into(),
            port: String::new(),
            speed: serial.baud,
            data_bits: serial.data_bits,
            parity: serial.parity,
            stop_bits: serial.stop_bits,
            flow_control: serial.flow_control,
            mtu: DEFAULT_MTU,
            poll_interval: Duration::from_micros(DEFAULT_POLL_INTERVAL_US),
        }
    }
}

impl LinkConfig {
    /// Reject settings the link cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.mtu < MIN_MTU {
            return Err(Error::InvalidConfig {
                key: "mtu".into(),
                value: self.mtu.to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig {
                key: "poll_interval".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            path: self.port.clone(),
            baud: self.speed,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
        }
    }
}

/// Parsed config file.
#[derive(Debug, Clone, Default)]
pub struct SlipConfig {
    pub slip: SlipSection,
    pub logging: LoggingSection,
    pub interfaces: Vec<ParsedInterface>,
}

/// The `[slip]` section: defaults shared by every interface.
#[derive(Debug, Clone)]
pub struct SlipSection {
    pub poll_interval_us: u64,
}

impl Default for SlipSection {
    fn default() -> Self {
        SlipSection {
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone)]
pub struct LoggingSection {
    pub loglevel: u8,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection { loglevel: 4 }
    }
}

/// One `[[subsection]]` of `[interfaces]`.
#[derive(Debug, Clone)]
pub struct ParsedInterface {
    pub name: String,
    pub enabled: bool,
    pub params: HashMap<String, String>,
}

/// Configuration parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue { key: String, value: String },
    Missing { interface: String, key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for '{}': '{}'", key, value)
            }
            ConfigError::Missing { interface, key } => {
                write!(f, "Interface '{}' has no '{}'", interface, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

/// Parse a config string.
pub fn parse(input: &str) -> Result<SlipConfig, ConfigError> {
    let mut section: Option<String> = None;
    let mut slip_kvs: HashMap<String, String> = HashMap::new();
    let mut logging_kvs: HashMap<String, String> = HashMap::new();
    let mut interfaces: Vec<ParsedInterface> = Vec::new();
    let mut current: Option<(String, HashMap<String, String>)> = None;

    for (lineno, line) in input.lines().enumerate() {
        let trimmed = strip_comment(line).trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("[[") && trimmed.ends_with("]]") {
            if section.as_deref() != Some("interfaces") {
                return Err(ConfigError::Parse(format!(
                    "line {}: subsection outside [interfaces]",
                    lineno + 1
                )));
            }
            if let Some((name, kvs)) = current.take() {
                interfaces.push(build_parsed_interface(name, kvs));
            }
            let name = trimmed[2..trimmed.len() - 2].trim().to_string();
            current = Some((name, HashMap::new()));
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some((name, kvs)) = current.take() {
                interfaces.push(build_parsed_interface(name, kvs));
            }
            section = Some(trimmed[1..trimmed.len() - 1].trim().to_lowercase());
            continue;
        }

        let Some(eq_pos) = trimmed.find('=') else {
            return Err(ConfigError::Parse(format!(
                "line {}: expected 'key = value'",
                lineno + 1
            )));
        };
        let key = trimmed[..eq_pos].trim().to_string();
        let value = unquote(trimmed[eq_pos + 1..].trim()).to_string();

        if let Some((_, ref mut kvs)) = current {
            kvs.insert(key, value);
            continue;
        }
        match section.as_deref() {
            Some("slip") => {
                slip_kvs.insert(key, value);
            }
            Some("logging") => {
                logging_kvs.insert(key, value);
            }
            _ => {} // ignore unknown sections
        }
    }

    if let Some((name, kvs)) = current.take() {
        interfaces.push(build_parsed_interface(name, kvs));
    }

    Ok(SlipConfig {
        slip: build_slip_section(&slip_kvs)?,
        logging: build_logging_section(&logging_kvs)?,
        interfaces,
    })
}

/// Parse a config file from disk.
pub fn parse_file(path: &Path) -> Result<SlipConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

impl SlipConfig {
    /// Link settings for every enabled interface, keyed by its position in
    /// the file so ids stay stable when an interface is disabled.
    pub fn link_configs(&self) -> Result<Vec<(LinkId, LinkConfig)>, ConfigError> {
        let mut links = Vec::new();
        for (index, iface) in self.interfaces.iter().enumerate() {
            if !iface.enabled {
                log::debug!("interface '{}' disabled, skipping", iface.name);
                continue;
            }
            links.push((LinkId(index as u32), self.link_config(iface)?));
        }
        Ok(links)
    }

    fn link_config(&self, iface: &ParsedInterface) -> Result<LinkConfig, ConfigError> {
        let defaults = LinkConfig::default();
        let port = iface
            .params
            .get("port")
            .cloned()
            .ok_or_else(|| ConfigError::Missing {
                interface: iface.name.clone(),
                key: "port".into(),
            })?;

        let poll_us = parse_param(iface, "poll_interval")?.unwrap_or(self.slip.poll_interval_us);
        let parity = match iface.params.get("parity") {
            Some(v) => Parity::parse(v).ok_or_else(|| invalid("parity", v))?,
            None => defaults.parity,
        };
        let flow_control = match iface.params.get("flow_control") {
            Some(v) => parse_bool(v).ok_or_else(|| invalid("flow_control", v))?,
            None => defaults.flow_control,
        };

        let config = LinkConfig {
            name: iface.name.clone(),
            port,
            speed: parse_param(iface, "speed")?.unwrap_or(defaults.speed),
            data_bits: parse_param(iface, "databits")?.unwrap_or(defaults.data_bits),
            parity,
            stop_bits: parse_param(iface, "stopbits")?.unwrap_or(defaults.stop_bits),
            flow_control,
            mtu: parse_param(iface, "mtu")?.unwrap_or(defaults.mtu),
            poll_interval: Duration::from_micros(poll_us),
        };
        config.validate().map_err(|e| match e {
            Error::InvalidConfig { key, value } => ConfigError::InvalidValue { key, value },
            other => ConfigError::Parse(other.to_string()),
        })?;
        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

fn parse_param<T: std::str::FromStr>(
    iface: &ParsedInterface,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match iface.params.get(key) {
        Some(v) => v.parse::<T>().map(Some).map_err(|_| invalid(key, v)),
        None => Ok(None),
    }
}

/// Strip `#` comments from a line (simple: not inside quotes).
fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    let mut quote_char = '"';
    for (i, ch) in line.char_indices() {
        if !in_quote && (ch == '"' || ch == '\'') {
            in_quote = true;
            quote_char = ch;
        } else if in_quote && ch == quote_char {
            in_quote = false;
        } else if !in_quote && ch == '#' {
            return &line[..i];
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse a string as a boolean (ConfigObj style).
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn build_parsed_interface(name: String, mut kvs: HashMap<String, String>) -> ParsedInterface {
    let enabled = kvs
        .remove("enabled")
        .or_else(|| kvs.remove("interface_enabled"))
        .and_then(|v| parse_bool(&v))
        .unwrap_or(true);
    ParsedInterface {
        name,
        enabled,
        params: kvs,
    }
}

fn build_slip_section(kvs: &HashMap<String, String>) -> Result<SlipSection, ConfigError> {
    let mut section = SlipSection::default();
    if let Some(v) = kvs.get("poll_interval") {
        section.poll_interval_us = v.parse::<u64>().map_err(|_| invalid("poll_interval", v))?;
    }
    Ok(section)
}

fn build_logging_section(kvs: &HashMap<String, String>) -> Result<LoggingSection, ConfigError> {
    let mut section = LoggingSection::default();
    if let Some(v) = kvs.get("loglevel") {
        section.loglevel = v.parse::<u8>().map_err(|_| invalid("loglevel", v))?;
    }
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty() {
        let config = parse("").unwrap();
        assert_eq!(config.slip.poll_interval_us, 1_000_000);
        assert_eq!(config.logging.loglevel, 4);
        assert!(config.interfaces.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
[slip]
poll_interval = 250000

[logging]
loglevel = 6

[interfaces]

  [[Radio Modem]]
    port = /dev/ttyUSB0
    speed = 57600
    parity = even
    flow_control = Yes
    mtu = 576

  [[Console]]
    enabled = No
    port = /dev/ttyS0
"#;
        let config = parse(input).unwrap();
        assert_eq!(config.slip.poll_interval_us, 250_000);
        assert_eq!(config.logging.loglevel, 6);
        assert_eq!(config.interfaces.len(), 2);
        assert_eq!(config.interfaces[0].name, "Radio Modem");
        assert!(config.interfaces[0].enabled);
        assert!(!config.interfaces[1].enabled);

        let links = config.link_configs().unwrap();
        assert_eq!(links.len(), 1);
        let (id, link) = &links[0];
        assert_eq!(*id, LinkId(0));
        assert_eq!(link.port, "/dev/ttyUSB0");
        assert_eq!(link.speed, 57600);
        assert_eq!(link.parity, Parity::Even);
        assert!(link.flow_control);
        assert_eq!(link.mtu, 576);
        assert_eq!(link.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn disabled_interfaces_keep_ids_stable() {
        let input = r#"
[interfaces]
  [[a]]
    enabled = no
    port = /dev/ttyS0
  [[b]]
    port = /dev/ttyS1
"#;
        let links = parse(input).unwrap().link_configs().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, LinkId(1));
        assert_eq!(links[0].1.name, "b");
    }

    #[test]
    fn link_defaults() {
        let input = "[interfaces]\n[[s]]\nport = /dev/ttyS1\n";
        let links = parse(input).unwrap().link_configs().unwrap();
        let link = &links[0].1;
        assert_eq!(link.speed, 115_200);
        assert_eq!(link.mtu, 296);
        assert_eq!(link.poll_interval, Duration::from_secs(1));
        assert_eq!(link.parity, Parity::None);
        assert!(!link.flow_control);
    }

    #[test]
    fn per_interface_poll_interval_overrides_section() {
        let input = "[slip]\npoll_interval = 500000\n[interfaces]\n[[s]]\n\
                     port = /dev/ttyS1\npoll_interval = 20000\n";
        let links = parse(input).unwrap().link_configs().unwrap();
        assert_eq!(links[0].1.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn small_mtu_rejected() {
        let input = "[interfaces]\n[[s]]\nport = /dev/ttyS1\nmtu = 128\n";
        let err = parse(input).unwrap().link_configs().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "mtu".into(),
                value: "128".into()
            }
        );
    }

    #[test]
    fn missing_port_rejected() {
        let input = "[interfaces]\n[[s]]\nspeed = 9600\n";
        let err = parse(input).unwrap().link_configs().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                interface: "s".into(),
                key: "port".into()
            }
        );
    }

    #[test]
    fn bad_number_rejected() {
        let input = "[interfaces]\n[[s]]\nport = /dev/ttyS1\nspeed = fast\n";
        assert!(matches!(
            parse(input).unwrap().link_configs(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(parse("[logging]\nloglevel = loud\n").is_err());
    }

    #[test]
    fn comments_and_quotes() {
        let input = r#"
# leading comment
[interfaces]
  [[s]]
    port = "/dev/tty#1"   # trailing comment
"#;
        let config = parse(input).unwrap();
        assert_eq!(config.interfaces[0].params.get("port").unwrap(), "/dev/tty#1");
    }

    #[test]
    fn subsection_outside_interfaces_rejected() {
        assert!(matches!(parse("[[s]]\nport = x\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn line_without_equals_rejected() {
        assert!(matches!(parse("[slip]\njunk\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn parse_booleans() {
        for (input, expected) in &[
            ("Yes", true),
            ("No", false),
            ("True", true),
            ("False", false),
            ("1", true),
            ("0", false),
            ("on", true),
            ("off", false),
        ] {
            assert_eq!(parse_bool(input), Some(*expected), "parse_bool({}) failed", input);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = LinkConfig {
            poll_interval: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { ref key, .. }) if key == "poll_interval"
        ));
    }

    #[test]
    fn serial_config_mirrors_link() {
        let config = LinkConfig {
            port: "/dev/ttyS3".into(),
            speed: 9600,
            stop_bits: 2,
            ..LinkConfig::default()
        };
        let serial = config.serial_config();
        assert_eq!(serial.path, "/dev/ttyS3");
        assert_eq!(serial.baud, 9600);
        assert_eq!(serial.stop_bits, 2);
    }
}

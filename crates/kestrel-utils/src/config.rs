//! # Configuration
//!
//! Display settings read from the environment.
//!
//! Each field has an environment variable and a default. The CLI applies its
//! own flags on top of what [`KestrelConfig::from_env`] returns.
//!
//! | Variable                   | Field                | Default |
//! |----------------------------|----------------------|---------|
//! | `KESTREL_LINE_NUMBERS`     | `print_line_numbers` | `true`  |
//! | `KESTREL_DUMP_DEPTH`       | `dump_depth`         | `2`     |
//! | `KESTREL_STACK_THRESHOLD`  | `stack_threshold`    | `0`     |
//! | `KESTREL_MEMORY_THRESHOLD` | `memory_threshold`   | `0`     |
//!
//! ## Errors
//!
//! A variable that is set but cannot be parsed is a [`ConfigError`]; it is
//! never silently replaced by the default.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_utils::KestrelConfig;
//!
//! let config = KestrelConfig::from_lookup(|name| match name {
//!     "KESTREL_DUMP_DEPTH" => Some("4".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//! assert_eq!(config.dump_depth, 4);
//! assert!(config.print_line_numbers);
//! ```

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::debug;

pub const LINE_NUMBERS_VAR: &str = "KESTREL_LINE_NUMBERS";
pub const DUMP_DEPTH_VAR: &str = "KESTREL_DUMP_DEPTH";
pub const STACK_THRESHOLD_VAR: &str = "KESTREL_STACK_THRESHOLD";
pub const MEMORY_THRESHOLD_VAR: &str = "KESTREL_MEMORY_THRESHOLD";

/// Display configuration shared by the CLI and the REPL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KestrelConfig
{
    /// Append source file and line to symbolized addresses
    pub print_line_numbers: bool,
    /// Nesting levels expanded when dumping structures
    pub dump_depth: u32,
    /// Call-tree percentage below which nodes are hidden (0 to 100)
    pub stack_threshold: u32,
    /// Minimum change in active size for a memory row to be shown
    pub memory_threshold: i32,
}

impl Default for KestrelConfig
{
    fn default() -> Self
    {
        Self {
            print_line_numbers: true,
            dump_depth: 2,
            stack_threshold: 0,
            memory_threshold: 0,
        }
    }
}

impl KestrelConfig
{
    /// Read the configuration from the process environment.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to something unparsable.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError`] if a value cannot be parsed or a threshold is
    /// out of range.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError>
    {
        let defaults = Self::default();
        let config = Self {
            print_line_numbers: match lookup(LINE_NUMBERS_VAR) {
                Some(value) => parse_flag(LINE_NUMBERS_VAR, &value)?,
                None => defaults.print_line_numbers,
            },
            dump_depth: parse_or(&lookup, DUMP_DEPTH_VAR, defaults.dump_depth)?,
            stack_threshold: parse_or(&lookup, STACK_THRESHOLD_VAR, defaults.stack_threshold)?,
            memory_threshold: parse_or(&lookup, MEMORY_THRESHOLD_VAR, defaults.memory_threshold)?,
        };

        if config.stack_threshold > 100 {
            return Err(ConfigError::OutOfRange {
                name: STACK_THRESHOLD_VAR,
                value: config.stack_threshold.to_string(),
            });
        }

        debug!(?config, "Loaded configuration");
        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError>
{
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError
{
    /// A variable could not be parsed
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue
    {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A variable parsed but is outside its allowed range
    #[error("Value '{value}' for {name} is out of range")]
    OutOfRange
    {
        name: &'static str,
        value: String,
    },
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String>
    {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset()
    {
        assert_eq!(KestrelConfig::from_lookup(lookup(&[])).unwrap(), KestrelConfig::default());
    }

    #[test]
    fn test_reads_every_variable()
    {
        let config = KestrelConfig::from_lookup(lookup(&[
            (LINE_NUMBERS_VAR, "off"),
            (DUMP_DEPTH_VAR, "5"),
            (STACK_THRESHOLD_VAR, " 10 "),
            (MEMORY_THRESHOLD_VAR, "-64"),
        ]))
        .unwrap();

        assert_eq!(
            config,
            KestrelConfig {
                print_line_numbers: false,
                dump_depth: 5,
                stack_threshold: 10,
                memory_threshold: -64,
            }
        );
    }

    #[test]
    fn test_invalid_values_are_errors()
    {
        let error = KestrelConfig::from_lookup(lookup(&[(DUMP_DEPTH_VAR, "deep")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { name: DUMP_DEPTH_VAR, .. }));

        let error = KestrelConfig::from_lookup(lookup(&[(LINE_NUMBERS_VAR, "maybe")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { name: LINE_NUMBERS_VAR, .. }));
    }

    #[test]
    fn test_stack_threshold_range()
    {
        assert!(KestrelConfig::from_lookup(lookup(&[(STACK_THRESHOLD_VAR, "100")])).is_ok());
        assert_eq!(
            KestrelConfig::from_lookup(lookup(&[(STACK_THRESHOLD_VAR, "101")])).unwrap_err(),
            ConfigError::OutOfRange {
                name: STACK_THRESHOLD_VAR,
                value: "101".to_string(),
            }
        );
    }
}

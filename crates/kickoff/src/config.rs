//! Server configuration.

use std::time::Duration;

use kickoff_transport::framing::MAX_FRAME_SIZE;

use crate::KickoffError;

/// Well-known port game clients connect to.
pub const DEFAULT_PORT: u16 = 3022;

/// Tunables for a [`KickoffServer`](crate::KickoffServer).
///
/// Usually set through [`KickoffServerBuilder`](crate::KickoffServerBuilder);
/// the binary fills it from the environment with [`ServerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind: String,

    /// How long a new connection may take to send its registration.
    /// `None` waits forever.
    pub registration_timeout: Option<Duration>,

    /// How long a registered connection may stay silent before it is
    /// dropped. `None` disables the check.
    pub idle_timeout: Option<Duration>,

    /// Close the remaining player's connection when their opponent
    /// disconnects, so they are not left in a dead match.
    pub close_opponent_on_disconnect: bool,

    /// Largest frame accepted or sent on TCP connections.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            registration_timeout: Some(Duration::from_secs(10)),
            idle_timeout: None,
            close_opponent_on_disconnect: true,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Reads overrides from `KICKOFF_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `KICKOFF_BIND` | listen address |
    /// | `KICKOFF_REGISTRATION_TIMEOUT_SECS` | seconds, `0` disables |
    /// | `KICKOFF_IDLE_TIMEOUT_SECS` | seconds, `0` disables |
    /// | `KICKOFF_CLOSE_OPPONENT` | `true` / `false` |
    /// | `KICKOFF_MAX_FRAME_SIZE` | bytes |
    pub fn from_env() -> Result<Self, KickoffError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KickoffError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("KICKOFF_BIND") {
            config.bind = bind;
        }
        if let Some(raw) = lookup("KICKOFF_REGISTRATION_TIMEOUT_SECS") {
            config.registration_timeout = parse_timeout("KICKOFF_REGISTRATION_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("KICKOFF_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = parse_timeout("KICKOFF_IDLE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("KICKOFF_CLOSE_OPPONENT") {
            config.close_opponent_on_disconnect = parse_bool("KICKOFF_CLOSE_OPPONENT", &raw)?;
        }
        if let Some(raw) = lookup("KICKOFF_MAX_FRAME_SIZE") {
            config.max_frame_size = raw.trim().parse().map_err(|_| {
                KickoffError::Config(format!("KICKOFF_MAX_FRAME_SIZE: not a byte count: {raw:?}"))
            })?;
        }

        Ok(config)
    }
}

fn parse_timeout(key: &str, raw: &str) -> Result<Option<Duration>, KickoffError> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| KickoffError::Config(format!("{key}: not a number of seconds: {raw:?}")))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, KickoffError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(KickoffError::Config(format!("{key}: expected true or false, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_listens_on_well_known_port() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0:3022");
        assert_eq!(config.registration_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.idle_timeout, None);
        assert!(config.close_opponent_on_disconnect);
    }

    #[test]
    fn test_from_lookup_empty_environment_is_default() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_every_override() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KICKOFF_BIND", "127.0.0.1:4000"),
            ("KICKOFF_REGISTRATION_TIMEOUT_SECS", "0"),
            ("KICKOFF_IDLE_TIMEOUT_SECS", "30"),
            ("KICKOFF_CLOSE_OPPONENT", "false"),
            ("KICKOFF_MAX_FRAME_SIZE", "4096"),
        ]))
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.registration_timeout, None);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert!(!config.close_opponent_on_disconnect);
        assert_eq!(config.max_frame_size, 4096);
    }

    #[test]
    fn test_from_lookup_bad_number_is_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[("KICKOFF_IDLE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, KickoffError::Config(msg) if msg.contains("KICKOFF_IDLE_TIMEOUT_SECS")));
    }

    #[test]
    fn test_from_lookup_bad_bool_is_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[("KICKOFF_CLOSE_OPPONENT", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, KickoffError::Config(_)));
    }
}

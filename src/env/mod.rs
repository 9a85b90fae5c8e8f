use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tokio::time::Duration;

const DISCORD_TOKEN_VARIABLE: &str = "DISCORD_TOKEN";
const COMMAND_PREFIX_VARIABLE: &str = "COMMAND_PREFIX";
const RESOLVE_TIMEOUT_VARIABLE: &str = "RESOLVE_TIMEOUT_SECONDS";
const DOWNLOAD_DIRECTORY_VARIABLE: &str = "DOWNLOAD_DIRECTORY";

const DEFAULT_COMMAND_PREFIX: &str = "!";
const DEFAULT_RESOLVE_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_DOWNLOAD_DIRECTORY: &str = "downloads";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the {0} environment variable is not set")]
    Missing(&'static str),
    #[error("the {variable} environment variable has an invalid value {value:?}")]
    Invalid { variable: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub discord_token: String,
    pub command_prefix: String,
    pub resolve_timeout: Duration,
    pub download_directory: PathBuf,
}

impl Config {
    /// Reads the configuration from the environment, after loading a `.env` file if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|variable| env::var(variable).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |variable: &str| lookup(variable).filter(|value| !value.trim().is_empty());

        let discord_token =
            non_empty(DISCORD_TOKEN_VARIABLE).ok_or(ConfigError::Missing(DISCORD_TOKEN_VARIABLE))?;

        let resolve_timeout = match non_empty(RESOLVE_TIMEOUT_VARIABLE) {
            None => Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECONDS),
            Some(value) => match value.trim().parse() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    return Err(ConfigError::Invalid {
                        variable: RESOLVE_TIMEOUT_VARIABLE,
                        value,
                    })
                }
            },
        };

        Ok(Self {
            discord_token: discord_token.trim().to_owned(),
            command_prefix: non_empty(COMMAND_PREFIX_VARIABLE)
                .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_owned()),
            resolve_timeout,
            download_directory: non_empty(DOWNLOAD_DIRECTORY_VARIABLE)
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIRECTORY.to_owned())
                .into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(variables: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let variables: HashMap<_, _> = variables
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|variable| variables.get(variable).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_token_is_set() {
        assert_eq!(
            config(&[("DISCORD_TOKEN", "token")]),
            Ok(Config {
                discord_token: "token".to_owned(),
                command_prefix: "!".to_owned(),
                resolve_timeout: Duration::from_secs(30),
                download_directory: PathBuf::from("downloads"),
            })
        );
    }

    #[test]
    fn token_is_required() {
        assert_eq!(config(&[]), Err(ConfigError::Missing("DISCORD_TOKEN")));
        assert_eq!(
            config(&[("DISCORD_TOKEN", "  ")]),
            Err(ConfigError::Missing("DISCORD_TOKEN"))
        );
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("DISCORD_TOKEN", "token"),
            ("COMMAND_PREFIX", "r!"),
            ("RESOLVE_TIMEOUT_SECONDS", "5"),
            ("DOWNLOAD_DIRECTORY", "/tmp/music"),
        ])
        .unwrap();

        assert_eq!(config.command_prefix, "r!");
        assert_eq!(config.resolve_timeout, Duration::from_secs(5));
        assert_eq!(config.download_directory, PathBuf::from("/tmp/music"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        for value in ["soon", "0", "-3"] {
            assert_eq!(
                config(&[("DISCORD_TOKEN", "token"), ("RESOLVE_TIMEOUT_SECONDS", value)]),
                Err(ConfigError::Invalid {
                    variable: "RESOLVE_TIMEOUT_SECONDS",
                    value: value.to_owned(),
                })
            );
        }
    }
}

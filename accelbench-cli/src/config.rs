//! Configuration for the benchmark runner.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `AB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `AB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `AB__ORIGIN__ENDPOINT=https://s3.us-east-1.amazonaws.com` sets the origin endpoint
//! - `AB__ACCELERATOR__PATH_STYLE=true` enables path-style addressing for the accelerator
//! - `AB__LOGGING__LEVEL=debug` raises the log level
//!
//! # YAML Configuration File
//!
//! ```yaml
//! origin:
//!   endpoint: https://s3.us-east-1.amazonaws.com
//!   region: us-east-1
//!
//! accelerator:
//!   endpoint: http://localhost:9000
//!   region: us-east-1
//!   path_style: true
//!   request_timeout: 30s
//! ```

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "AB__";

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Connection settings of one S3-compatible endpoint.
///
/// Credentials fall back to the standard AWS environment (`AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`) and profile files when not set here.
///
/// Used in: [`Config::origin`], [`Config::accelerator`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Endpoint {
    /// Endpoint URL, including the scheme.
    ///
    /// # Environment Variables
    ///
    /// - `AB__ORIGIN__ENDPOINT`
    /// - `AB__ACCELERATOR__ENDPOINT`
    pub endpoint: String,

    /// Region used for request signing.
    pub region: String,

    /// Address buckets as a path segment instead of a subdomain.
    ///
    /// Most self-hosted stores and proxies need this.
    #[serde(default)]
    pub path_style: bool,

    /// Access key ID.
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret access key, redacted from logs.
    #[serde(default)]
    pub secret_key: Option<SecretBox<ConfigSecret>>,

    /// Timeout applied by the transport to every request.
    ///
    /// # Default
    ///
    /// `None` (no timeout)
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

impl Endpoint {
    pub(crate) fn new(endpoint: &str, region: &str, path_style: bool) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            region: region.to_owned(),
            path_style,
            access_key: None,
            secret_key: None,
            request_timeout: None,
        }
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so that stdout only carries the response.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and provides more granular control
    /// per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `AB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// [Sentry](https://sentry.io/) error reporting configuration.
///
/// Sentry is disabled by default and only enabled when a DSN is provided.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN.
    ///
    /// # Environment Variable
    ///
    /// `AB__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name attached to all events.
    pub environment: Option<Cow<'static, str>>,

    /// Error event sampling rate.
    ///
    /// # Default
    ///
    /// `1.0` (send all errors)
    pub sample_rate: f32,

    /// Performance trace sampling rate.
    ///
    /// # Default
    ///
    /// `0.0` (no traces)
    pub traces_sample_rate: f32,

    /// Enable Sentry SDK debug output on stderr.
    pub debug: bool,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
            debug: false,
        }
    }
}

/// Main configuration struct for the benchmark runner.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The authoritative object store.
    ///
    /// # Default
    ///
    /// `https://s3.us-east-1.amazonaws.com` in `us-east-1`
    pub origin: Endpoint,

    /// The caching accelerator in front of the origin.
    ///
    /// # Default
    ///
    /// `http://localhost:9000` in `us-east-1` with path-style addressing
    pub accelerator: Endpoint,

    /// Logging configuration.
    #[serde(default)]
    pub logging: Logging,

    /// Sentry error reporting configuration.
    #[serde(default)]
    pub sentry: Sentry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: Endpoint::new("https://s3.us-east-1.amazonaws.com", "us-east-1", false),
            accelerator: Endpoint::new("http://localhost:9000", "us-east-1", true),
            logging: Logging::default(),
            sentry: Sentry::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// Later sources override earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if environment variables
    /// contain invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_without_sources() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.origin.endpoint, "https://s3.us-east-1.amazonaws.com");
            assert!(!config.origin.path_style);
            assert!(config.accelerator.path_style);
            assert_eq!(config.accelerator.request_timeout, None);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert!(!config.sentry.is_enabled());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("AB__ACCELERATOR__ENDPOINT", "http://bolt.internal:9000");
            jail.set_env("AB__ACCELERATOR__ACCESS_KEY", "AKIDEXAMPLE");
            jail.set_env("AB__ACCELERATOR__SECRET_KEY", "hunter2");
            jail.set_env("AB__ACCELERATOR__REQUEST_TIMEOUT", "30s");
            jail.set_env("AB__LOGGING__LEVEL", "debug");
            jail.set_env("AB__SENTRY__DSN", "abcde");
            jail.set_env("AB__SENTRY__SAMPLE_RATE", "0.5");

            let config = Config::load(None).unwrap();

            let accelerator = &config.accelerator;
            assert_eq!(accelerator.endpoint, "http://bolt.internal:9000");
            assert_eq!(accelerator.access_key.as_deref(), Some("AKIDEXAMPLE"));
            let secret_key = accelerator.secret_key.as_ref().unwrap();
            assert_eq!(secret_key.expose_secret().as_str(), "hunter2");
            assert_eq!(accelerator.request_timeout, Some(Duration::from_secs(30)));

            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.sentry.dsn.unwrap().expose_secret().as_str(), "abcde");
            assert_eq!(config.sentry.sample_rate, 0.5);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            origin:
                endpoint: http://localhost:8888
                region: eu-west-1
                path_style: true
            accelerator:
                endpoint: http://localhost:9000
                region: eu-west-1
                request_timeout: 2m
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.origin.endpoint, "http://localhost:8888");
            assert_eq!(config.origin.region, "eu-west-1");
            assert!(config.origin.path_style);
            // Omitted fields keep their defaults.
            assert!(config.accelerator.path_style);
            assert_eq!(
                config.accelerator.request_timeout,
                Some(Duration::from_secs(120))
            );

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            origin:
                endpoint: http://localhost:8888
                region: us-east-1
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("AB__ORIGIN__ENDPOINT", "http://localhost:9001");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.origin.endpoint, "http://localhost:9001");

            Ok(())
        });
    }

    #[test]
    fn secrets_are_redacted() {
        let mut endpoint = Endpoint::new("http://localhost:9000", "us-east-1", true);
        endpoint.secret_key = Some(SecretBox::new(Box::new("hunter2".into())));

        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("hunter2"));
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

pub const ENV_BROKER_URL: &str = "KAFKA_DEFAULT_BROKER_URL";
pub const ENV_CLIENT_ID: &str = "KAFKA_DEFAULT_CLIENT_ID";
pub const ENV_GROUP_ID: &str = "KAFKA_DEFAULT_GROUP_ID";
pub const ENV_AUTO_CREATE_TOPIC: &str = "KAFKA_DEFAULT_AUTO_CREATE_TOPIC";
pub const ENV_CONNECTION_TIMEOUT: &str = "KAFKA_DEFAULT_CONNECTION_TIMEOUT";
pub const ENV_REQUEST_TIMEOUT: &str = "KAFKA_DEFAULT_REQUEST_TIMEOUT";
pub const ENV_CONCURRENTLY: &str = "KAFKA_DEFAULT_CONCURRENTLY";
pub const ENV_SSL: &str = "KAFKA_DEFAULT_SSL";
pub const ENV_MECHANISM: &str = "KAFKA_DEFAULT_MECHANISM";
pub const ENV_USERNAME: &str = "KAFKA_DEFAULT_USERNAME";
pub const ENV_PASSWORD: &str = "KAFKA_DEFAULT_PASSWORD";
pub const ENV_KAFKA_ENV: &str = "KAFKA_ENV";

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_CLIENT_ID: &str = "kafka-test-client";
pub const DEFAULT_GROUP_ID: &str = "test-group";
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Suffix appended to the configured group so the probe never joins a production consumer group
pub const PROBE_GROUP_SUFFIX: &str = "-test";

/// Shown in place of secrets
pub const MASK: &str = "********";
const NOT_SET: &str = "not set";

/// Every key echoed before a run, in display order
pub const ECHOED_KEYS: [&str; 11] = [
    ENV_BROKER_URL,
    ENV_CLIENT_ID,
    ENV_GROUP_ID,
    ENV_AUTO_CREATE_TOPIC,
    ENV_REQUEST_TIMEOUT,
    ENV_CONCURRENTLY,
    ENV_SSL,
    ENV_MECHANISM,
    ENV_USERNAME,
    ENV_PASSWORD,
    ENV_KAFKA_ENV,
];

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while validating probe configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("No brokers configured")]
    NoBrokers,

    #[error("Unsupported SASL mechanism '{0}' (expected PLAIN, SCRAM-SHA-256 or SCRAM-SHA-512)")]
    UnsupportedMechanism(String),

    #[error("SASL mechanism {mechanism} is configured but {field} is missing")]
    MissingCredential {
        mechanism: SaslMechanism,
        field: &'static str,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaslMechanism {
    #[serde(rename = "PLAIN")]
    Plain,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    /// Parse a mechanism name. Returns `None` for `NONE`, which disables authentication.
    pub fn parse(value: &str) -> ConfigResult<Option<Self>> {
        match value.trim().to_uppercase().as_str() {
            "NONE" => Ok(None),
            "PLAIN" => Ok(Some(Self::Plain)),
            "SCRAM-SHA-256" => Ok(Some(Self::ScramSha256)),
            "SCRAM-SHA-512" => Ok(Some(Self::ScramSha512)),
            _ => Err(ConfigError::UnsupportedMechanism(value.to_string())),
        }
    }

    /// Name as librdkafka expects it in `sasl.mechanism`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SASL credentials. Only exists when all three parts were configured.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredentials {
    mechanism: SaslMechanism,
    username: String,
    password: String,
}

impl AuthCredentials {
    pub fn new(
        mechanism: SaslMechanism,
        username: Option<String>,
        password: Option<String>,
    ) -> ConfigResult<Self> {
        let username = username.ok_or(ConfigError::MissingCredential {
            mechanism,
            field: "username",
        })?;
        let password = password.ok_or(ConfigError::MissingCredential {
            mechanism,
            field: "password",
        })?;

        Ok(Self {
            mechanism,
            username,
            password,
        })
    }

    pub fn mechanism(&self) -> SaslMechanism {
        self.mechanism
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &MASK)
            .finish()
    }
}

/// Unvalidated configuration values as read from the environment and CLI.
///
/// Empty strings are treated the same as missing values.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub brokers: Option<String>,
    pub client_id: Option<String>,
    pub group_id: Option<String>,
    pub auto_create_topic: Option<String>,
    pub ssl: Option<String>,
    pub mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connection_timeout_ms: Option<String>,
    pub request_timeout_ms: Option<String>,
}

impl RawConfig {
    /// Read the probe configuration from the process environment, loading `.env` first
    pub fn from_env() -> Self {
        Self::from_env_internal(true)
    }

    fn from_env_internal(load_dotenv: bool) -> Self {
        if load_dotenv {
            let _ = dotenv::dotenv();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            brokers: get(ENV_BROKER_URL),
            client_id: get(ENV_CLIENT_ID),
            group_id: get(ENV_GROUP_ID),
            auto_create_topic: get(ENV_AUTO_CREATE_TOPIC),
            ssl: get(ENV_SSL),
            mechanism: get(ENV_MECHANISM),
            username: get(ENV_USERNAME),
            password: get(ENV_PASSWORD),
            connection_timeout_ms: get(ENV_CONNECTION_TIMEOUT),
            request_timeout_ms: get(ENV_REQUEST_TIMEOUT),
        }
    }
}

/// Validated, immutable connection settings for a probe run
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    brokers: Vec<String>,
    client_id: String,
    group_id: String,
    allow_auto_topic_creation: bool,
    ssl: bool,
    auth: Option<AuthCredentials>,
    connection_timeout: Duration,
    request_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_string()],
            client_id: DEFAULT_CLIENT_ID.to_string(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            allow_auto_topic_creation: false,
            ssl: false,
            auth: None,
            connection_timeout: Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl TryFrom<RawConfig> for BrokerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> ConfigResult<Self> {
        let brokers = match raw.brokers {
            Some(list) => parse_brokers(&list)?,
            None => vec![DEFAULT_BROKER.to_string()],
        };

        let auth = match raw.mechanism.as_deref().map(SaslMechanism::parse).transpose()? {
            Some(Some(mechanism)) => Some(AuthCredentials::new(
                mechanism,
                raw.username,
                raw.password,
            )?),
            _ => None,
        };

        let connection_timeout = parse_timeout(
            ENV_CONNECTION_TIMEOUT,
            raw.connection_timeout_ms,
            DEFAULT_CONNECTION_TIMEOUT_MS,
        )?;
        let request_timeout = parse_timeout(
            ENV_REQUEST_TIMEOUT,
            raw.request_timeout_ms,
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?;

        Ok(Self {
            brokers,
            client_id: raw.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            group_id: raw.group_id.unwrap_or_else(|| DEFAULT_GROUP_ID.to_string()),
            allow_auto_topic_creation: is_true(raw.auto_create_topic.as_deref()),
            ssl: is_true(raw.ssl.as_deref()),
            auth,
            connection_timeout,
            request_timeout,
        })
    }
}

impl BrokerConfig {
    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Group used by the probe consumer
    pub fn probe_group_id(&self) -> String {
        format!("{}{}", self.group_id, PROBE_GROUP_SUFFIX)
    }

    pub fn allow_auto_topic_creation(&self) -> bool {
        self.allow_auto_topic_creation
    }

    pub fn ssl(&self) -> bool {
        self.ssl
    }

    pub fn auth(&self) -> Option<&AuthCredentials> {
        self.auth.as_ref()
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// librdkafka `security.protocol` for this combination of SSL and SASL
    pub fn security_protocol(&self) -> &'static str {
        match (self.ssl, self.auth.is_some()) {
            (false, false) => "plaintext",
            (true, false) => "ssl",
            (false, true) => "sasl_plaintext",
            (true, true) => "sasl_ssl",
        }
    }
}

fn parse_brokers(list: &str) -> ConfigResult<Vec<String>> {
    let brokers: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect();

    if brokers.is_empty() {
        return Err(ConfigError::NoBrokers);
    }
    Ok(brokers)
}

fn parse_timeout(key: &'static str, value: Option<String>, default_ms: u64) -> ConfigResult<Duration> {
    let Some(value) = value else {
        return Ok(Duration::from_millis(default_ms));
    };

    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "timeout must be greater than 0".to_string(),
        }),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(e) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

fn is_true(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Mask a secret for display, keeping only whether it is set
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => MASK.to_string(),
        _ => NOT_SET.to_string(),
    }
}

/// Echo of the raw environment keys, password masked
pub fn describe_environment<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    ECHOED_KEYS
        .iter()
        .map(|&key| {
            let value = lookup(key).filter(|v| !v.is_empty());
            let shown = if key == ENV_PASSWORD {
                mask_secret(value.as_deref())
            } else {
                value.unwrap_or_else(|| NOT_SET.to_string())
            };
            (key, shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn raw(pairs: &[(&str, &str)]) -> RawConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::try_from(RawConfig::default()).unwrap();

        assert_eq!(config.brokers(), &["localhost:9092".to_string()]);
        assert_eq!(config.client_id(), "kafka-test-client");
        assert_eq!(config.group_id(), "test-group");
        assert_eq!(config.probe_group_id(), "test-group-test");
        assert!(!config.allow_auto_topic_creation());
        assert!(!config.ssl());
        assert!(config.auth().is_none());
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.security_protocol(), "plaintext");
    }

    #[test]
    fn test_broker_list_is_split_and_trimmed() {
        let config = BrokerConfig::try_from(raw(&[(
            ENV_BROKER_URL,
            "b1:9092, b2:9092 ,,b3:9093",
        )]))
        .unwrap();

        assert_eq!(config.brokers(), &["b1:9092", "b2:9092", "b3:9093"]);
    }

    #[test]
    fn test_blank_broker_list_is_rejected() {
        let err = BrokerConfig::try_from(raw(&[(ENV_BROKER_URL, " , ")])).unwrap_err();
        assert_eq!(err, ConfigError::NoBrokers);
    }

    #[test]
    fn test_flags_only_accept_literal_true() {
        let config = BrokerConfig::try_from(raw(&[
            (ENV_SSL, "true"),
            (ENV_AUTO_CREATE_TOPIC, "yes"),
        ]))
        .unwrap();
        assert!(config.ssl());
        assert!(!config.allow_auto_topic_creation());

        let config = BrokerConfig::try_from(raw(&[(ENV_SSL, "TRUE")])).unwrap();
        assert!(!config.ssl());
    }

    #[test]
    fn test_mechanism_none_or_absent_builds_no_credentials() {
        let config = BrokerConfig::try_from(raw(&[
            (ENV_MECHANISM, "NONE"),
            (ENV_USERNAME, "alice"),
            (ENV_PASSWORD, "secret"),
        ]))
        .unwrap();
        assert!(config.auth().is_none());

        let config = BrokerConfig::try_from(raw(&[(ENV_USERNAME, "alice")])).unwrap();
        assert!(config.auth().is_none());
        assert_eq!(config.security_protocol(), "plaintext");
    }

    #[test]
    fn test_full_credentials() {
        let config = BrokerConfig::try_from(raw(&[
            (ENV_MECHANISM, "scram-sha-512"),
            (ENV_USERNAME, "alice"),
            (ENV_PASSWORD, "secret"),
            (ENV_SSL, "true"),
        ]))
        .unwrap();

        let auth = config.auth().unwrap();
        assert_eq!(auth.mechanism(), SaslMechanism::ScramSha512);
        assert_eq!(auth.username(), "alice");
        assert_eq!(auth.password(), "secret");
        assert_eq!(config.security_protocol(), "sasl_ssl");
    }

    #[test]
    fn test_plain_with_empty_password_is_rejected() {
        let err = BrokerConfig::try_from(raw(&[
            (ENV_MECHANISM, "PLAIN"),
            (ENV_USERNAME, "alice"),
            (ENV_PASSWORD, ""),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::MissingCredential {
                mechanism: SaslMechanism::Plain,
                field: "password",
            }
        );
    }

    #[test]
    fn test_missing_username_is_rejected() {
        let err = BrokerConfig::try_from(raw(&[
            (ENV_MECHANISM, "SCRAM-SHA-256"),
            (ENV_PASSWORD, "secret"),
        ]))
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::MissingCredential { field: "username", .. }
        ));
    }

    #[test]
    fn test_unknown_mechanism_is_rejected() {
        let err = BrokerConfig::try_from(raw(&[(ENV_MECHANISM, "GSSAPI")])).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedMechanism("GSSAPI".to_string()));
    }

    #[test]
    fn test_timeouts() {
        let config = BrokerConfig::try_from(raw(&[
            (ENV_CONNECTION_TIMEOUT, "2500"),
            (ENV_REQUEST_TIMEOUT, "5000"),
        ]))
        .unwrap();
        assert_eq!(config.connection_timeout(), Duration::from_millis(2500));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        let err = BrokerConfig::try_from(raw(&[(ENV_REQUEST_TIMEOUT, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_REQUEST_TIMEOUT, .. }));

        let err = BrokerConfig::try_from(raw(&[(ENV_CONNECTION_TIMEOUT, "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_CONNECTION_TIMEOUT, .. }));
    }

    #[test]
    fn test_credentials_debug_masks_password() {
        let auth = AuthCredentials::new(
            SaslMechanism::Plain,
            Some("alice".to_string()),
            Some("hunter2".to_string()),
        )
        .unwrap();

        let debug = format!("{:?}", auth);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_describe_environment_masks_password() {
        let echo = describe_environment(|key| match key {
            ENV_BROKER_URL => Some("kafka:9092".to_string()),
            ENV_PASSWORD => Some("hunter2".to_string()),
            _ => None,
        });

        assert_eq!(echo.len(), ECHOED_KEYS.len());
        assert!(echo.contains(&(ENV_BROKER_URL, "kafka:9092".to_string())));
        assert!(echo.contains(&(ENV_PASSWORD, MASK.to_string())));
        assert!(echo.contains(&(ENV_CLIENT_ID, "not set".to_string())));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var(ENV_BROKER_URL, "env-broker:9092");
        env::set_var(ENV_CLIENT_ID, "");
        env::remove_var(ENV_MECHANISM);

        let raw = RawConfig::from_env_internal(false);
        let config = BrokerConfig::try_from(raw).unwrap();

        assert_eq!(config.brokers(), &["env-broker:9092".to_string()]);
        assert_eq!(config.client_id(), DEFAULT_CLIENT_ID);

        env::remove_var(ENV_BROKER_URL);
        env::remove_var(ENV_CLIENT_ID);
    }
}

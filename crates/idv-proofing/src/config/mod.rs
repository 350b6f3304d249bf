use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::fingerprint::{FingerprintKey, Fingerprinter};
use crate::proofing::AdjudicationRule;

const DEVELOPMENT_FINGERPRINT_KEY: &str = "development-fingerprint-key-do-not-use-in-prod";
const DEVELOPMENT_ARGS_KEY: [u8; 32] = [7u8; 32];

const DEFAULT_AAMVA_JURISDICTIONS: &[&str] = &[
    "AL", "AR", "AZ", "CO", "CT", "DC", "DE", "FL", "GA", "IA", "ID", "IL", "IN", "KS", "KY",
    "MA", "MD", "ME", "MI", "MO", "MS", "MT", "NC", "ND", "NE", "NJ", "NM", "NV", "OH", "OR",
    "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA", "WI", "WV", "WY",
];

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub proofing: ProofingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            proofing: ProofingConfig::load(environment)?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Vendor used for the state-ID address resolution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionVendor {
    LexisNexis,
    Socure,
}

impl FromStr for ResolutionVendor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lexis_nexis" | "lexisnexis" => Ok(Self::LexisNexis),
            "socure" => Ok(Self::Socure),
            other => Err(format!("unknown resolution vendor '{other}'")),
        }
    }
}

/// Knobs for the proofing pipeline and its background jobs.
#[derive(Debug, Clone)]
pub struct ProofingConfig {
    pub stale_job_timeout: Duration,
    pub fingerprint_key: FingerprintKey,
    pub fingerprint_key_queue: Vec<FingerprintKey>,
    pub argument_encryption_key: [u8; 32],
    pub resolution_vendor: ResolutionVendor,
    pub adjudication_rule: AdjudicationRule,
    pub device_profiling_enabled: bool,
    pub shadow_mode_enabled: bool,
    pub shadow_mode_percent: u8,
    pub eligible_one_account_providers: BTreeSet<String>,
    pub aamva_supported_jurisdictions: BTreeSet<String>,
    pub job_max_attempts: u32,
}

impl Default for ProofingConfig {
    fn default() -> Self {
        Self {
            stale_job_timeout: Duration::from_secs(300),
            fingerprint_key: FingerprintKey::new(DEVELOPMENT_FINGERPRINT_KEY),
            fingerprint_key_queue: Vec::new(),
            argument_encryption_key: DEVELOPMENT_ARGS_KEY,
            resolution_vendor: ResolutionVendor::LexisNexis,
            adjudication_rule: AdjudicationRule::AllChecks,
            device_profiling_enabled: true,
            shadow_mode_enabled: false,
            shadow_mode_percent: 0,
            eligible_one_account_providers: BTreeSet::new(),
            aamva_supported_jurisdictions: DEFAULT_AAMVA_JURISDICTIONS
                .iter()
                .map(|code| code.to_string())
                .collect(),
            job_max_attempts: 3,
        }
    }
}

impl ProofingConfig {
    fn load(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let requires_secrets = environment == AppEnvironment::Production;

        let stale_job_timeout = match env::var("IDV_STALE_JOB_TIMEOUT_SECONDS") {
            Ok(raw) => Duration::from_secs(parse_number("IDV_STALE_JOB_TIMEOUT_SECONDS", &raw)?),
            Err(_) => defaults.stale_job_timeout,
        };

        let fingerprint_key = match env::var("HMAC_FINGERPRINTER_KEY") {
            Ok(raw) if !raw.trim().is_empty() => FingerprintKey::new(raw),
            _ if requires_secrets => {
                return Err(ConfigError::MissingRequired("HMAC_FINGERPRINTER_KEY"))
            }
            _ => defaults.fingerprint_key,
        };

        let fingerprint_key_queue = match env::var("HMAC_FINGERPRINTER_KEY_QUEUE") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|_| ConfigError::InvalidKeyMaterial("HMAC_FINGERPRINTER_KEY_QUEUE"))?
                .into_iter()
                .map(FingerprintKey::new)
                .collect(),
            _ => Vec::new(),
        };

        let argument_encryption_key = match env::var("PROOFING_ARGS_ENCRYPTION_KEY") {
            Ok(raw) => decode_key(&raw)?,
            Err(_) if requires_secrets => {
                return Err(ConfigError::MissingRequired("PROOFING_ARGS_ENCRYPTION_KEY"))
            }
            Err(_) => defaults.argument_encryption_key,
        };

        let resolution_vendor = parse_enum_var("IDV_RESOLUTION_VENDOR", defaults.resolution_vendor)?;
        let adjudication_rule = parse_enum_var("IDV_ADJUDICATION_RULE", defaults.adjudication_rule)?;

        let device_profiling_enabled =
            parse_bool_var("PROOFING_DEVICE_PROFILING_ENABLED", defaults.device_profiling_enabled)?;
        let shadow_mode_enabled =
            parse_bool_var("IDV_SOCURE_SHADOW_MODE_ENABLED", defaults.shadow_mode_enabled)?;

        let shadow_mode_percent = match env::var("IDV_SOCURE_SHADOW_MODE_PERCENT") {
            Ok(raw) => {
                let percent = parse_number("IDV_SOCURE_SHADOW_MODE_PERCENT", &raw)?;
                if percent > 100 {
                    return Err(ConfigError::InvalidNumber("IDV_SOCURE_SHADOW_MODE_PERCENT"));
                }
                percent as u8
            }
            Err(_) => defaults.shadow_mode_percent,
        };

        let eligible_one_account_providers = env::var("ELIGIBLE_ONE_ACCOUNT_PROVIDERS")
            .map(|raw| split_list(&raw, false))
            .unwrap_or_default();

        let aamva_supported_jurisdictions = env::var("AAMVA_SUPPORTED_JURISDICTIONS")
            .map(|raw| split_list(&raw, true))
            .unwrap_or(defaults.aamva_supported_jurisdictions);

        let job_max_attempts = match env::var("PROOFING_JOB_MAX_ATTEMPTS") {
            Ok(raw) => parse_number("PROOFING_JOB_MAX_ATTEMPTS", &raw)?.max(1) as u32,
            Err(_) => defaults.job_max_attempts,
        };

        Ok(Self {
            stale_job_timeout,
            fingerprint_key,
            fingerprint_key_queue,
            argument_encryption_key,
            resolution_vendor,
            adjudication_rule,
            device_profiling_enabled,
            shadow_mode_enabled,
            shadow_mode_percent,
            eligible_one_account_providers,
            aamva_supported_jurisdictions,
            job_max_attempts,
        })
    }

    pub fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new(
            self.fingerprint_key.clone(),
            self.fingerprint_key_queue.clone(),
        )
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber(name))
}

fn parse_bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name,
                detail: format!("'{raw}' is not a boolean"),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_enum_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|detail| ConfigError::InvalidValue { name, detail }),
        Err(_) => Ok(default),
    }
}

fn decode_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = BASE64
        .decode(raw.trim().as_bytes())
        .map_err(|_| ConfigError::InvalidKeyMaterial("PROOFING_ARGS_ENCRYPTION_KEY"))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidKeyMaterial("PROOFING_ARGS_ENCRYPTION_KEY"))
}

fn split_list(raw: &str, uppercase: bool) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if uppercase {
                item.to_ascii_uppercase()
            } else {
                item.to_string()
            }
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber(&'static str),
    InvalidKeyMaterial(&'static str),
    InvalidValue { name: &'static str, detail: String },
    MissingRequired(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber(name) => {
                write!(f, "{name} must be a non-negative integer in range")
            }
            ConfigError::InvalidKeyMaterial(name) => write!(f, "{name} is not valid key material"),
            ConfigError::InvalidValue { name, detail } => write!(f, "{name}: {detail}"),
            ConfigError::MissingRequired(name) => {
                write!(f, "{name} must be set in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    const VARS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "IDV_STALE_JOB_TIMEOUT_SECONDS",
        "HMAC_FINGERPRINTER_KEY",
        "HMAC_FINGERPRINTER_KEY_QUEUE",
        "PROOFING_ARGS_ENCRYPTION_KEY",
        "IDV_RESOLUTION_VENDOR",
        "IDV_ADJUDICATION_RULE",
        "PROOFING_DEVICE_PROFILING_ENABLED",
        "IDV_SOCURE_SHADOW_MODE_ENABLED",
        "IDV_SOCURE_SHADOW_MODE_PERCENT",
        "ELIGIBLE_ONE_ACCOUNT_PROVIDERS",
        "AAMVA_SUPPORTED_JURISDICTIONS",
        "PROOFING_JOB_MAX_ATTEMPTS",
    ];

    fn reset_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.proofing.stale_job_timeout, Duration::from_secs(300));
        assert_eq!(config.proofing.resolution_vendor, ResolutionVendor::LexisNexis);
        assert_eq!(config.proofing.adjudication_rule, AdjudicationRule::AllChecks);
        assert!(!config.proofing.shadow_mode_enabled);
        assert!(config.proofing.aamva_supported_jurisdictions.contains("VA"));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn parses_proofing_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HMAC_FINGERPRINTER_KEY", "current");
        env::set_var("HMAC_FINGERPRINTER_KEY_QUEUE", r#"["old-1","old-2"]"#);
        env::set_var("PROOFING_ARGS_ENCRYPTION_KEY", BASE64.encode([1u8; 32]));
        env::set_var("IDV_RESOLUTION_VENDOR", "socure");
        env::set_var("IDV_ADJUDICATION_RULE", "identity_checks");
        env::set_var("IDV_SOCURE_SHADOW_MODE_ENABLED", "true");
        env::set_var("IDV_SOCURE_SHADOW_MODE_PERCENT", "25");
        env::set_var("ELIGIBLE_ONE_ACCOUNT_PROVIDERS", "urn:gov:sp:a, urn:gov:sp:b");
        env::set_var("AAMVA_SUPPORTED_JURISDICTIONS", "va,md");

        let proofing = AppConfig::load().expect("config loads").proofing;
        assert_eq!(proofing.fingerprint_key_queue.len(), 2);
        assert_eq!(proofing.argument_encryption_key, [1u8; 32]);
        assert_eq!(proofing.resolution_vendor, ResolutionVendor::Socure);
        assert_eq!(proofing.adjudication_rule, AdjudicationRule::IdentityChecks);
        assert!(proofing.shadow_mode_enabled);
        assert_eq!(proofing.shadow_mode_percent, 25);
        assert!(proofing.eligible_one_account_providers.contains("urn:gov:sp:b"));
        assert_eq!(
            proofing.aamva_supported_jurisdictions,
            ["MD", "VA"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<String>>()
        );
        reset_env();
    }

    #[test]
    fn production_requires_fingerprint_key() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        let err = AppConfig::load().expect_err("missing key rejected");
        assert!(matches!(
            err,
            ConfigError::MissingRequired("HMAC_FINGERPRINTER_KEY")
        ));
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_shadow_percent() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("IDV_SOCURE_SHADOW_MODE_PERCENT", "150");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber("IDV_SOCURE_SHADOW_MODE_PERCENT"))
        ));
        reset_env();
    }
}

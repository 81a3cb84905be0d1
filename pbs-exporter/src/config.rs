//! Startup configuration
//!
//! Flags first, then the environment: a non-empty `PBS_*` variable
//! overrides its flag. Credentials can also come from the first line of a
//! file named by `PBS_*_FILE`. The result is an immutable `Settings`.

use crate::auth::Credential;
use crate::client::ClientSettings;
use crate::error::ConfigError;
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Clone, Parser)]
#[command(name = "pbs-exporter", version, about = "Prometheus exporter for Proxmox Backup Server")]
pub struct Args {
    /// Proxmox Backup Server endpoint
    #[arg(long = "pbs.endpoint", default_value = "")]
    pub endpoint: String,

    /// Proxmox Backup Server username
    #[arg(long = "pbs.username", default_value = "root@pam")]
    pub username: String,

    /// Proxmox Backup Server API token
    #[arg(long = "pbs.api.token", default_value = "")]
    pub api_token: String,

    /// Proxmox Backup Server API token name
    #[arg(long = "pbs.api.token.name", default_value = "pbs-exporter")]
    pub api_token_name: String,

    /// Proxmox Backup Server timeout
    #[arg(long = "pbs.timeout", default_value = "5s")]
    pub timeout: String,

    /// Proxmox Backup Server insecure
    #[arg(long = "pbs.insecure", default_value = "false")]
    pub insecure: String,

    /// Path under which to expose metrics
    #[arg(long = "pbs.metrics-path", default_value = "/metrics")]
    pub metrics_path: String,

    /// Address on which to expose metrics
    #[arg(long = "pbs.listen-address", default_value = ":9101")]
    pub listen_address: String,

    /// Loglevel
    #[arg(long = "pbs.loglevel", default_value = "info")]
    pub loglevel: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Fixed target; when set the `target` query parameter is ignored.
    pub endpoint: Option<String>,
    pub credential: Credential,
    pub timeout: Duration,
    pub insecure: bool,
    pub metrics_path: String,
    pub listen_address: String,
    pub log_level: Level,
}

impl Settings {
    /// Resolve from the real process environment.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    pub fn resolve<F>(args: Args, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.is_empty());
        let secret = |key: &str, file_key: &str, fallback: String| -> Result<String, ConfigError> {
            match (var(key), var(file_key)) {
                (Some(value), _) => Ok(value),
                (None, Some(path)) => read_secret_file(path),
                (None, None) => Ok(fallback),
            }
        };

        let loglevel = var("PBS_LOGLEVEL").unwrap_or(args.loglevel);
        let endpoint = var("PBS_ENDPOINT").unwrap_or(args.endpoint);
        let username = secret("PBS_USERNAME", "PBS_USERNAME_FILE", args.username)?;
        let token_name =
            secret("PBS_API_TOKEN_NAME", "PBS_API_TOKEN_NAME_FILE", args.api_token_name)?;
        let token = secret("PBS_API_TOKEN", "PBS_API_TOKEN_FILE", args.api_token)?;
        let timeout = var("PBS_TIMEOUT").unwrap_or(args.timeout);
        let insecure = var("PBS_INSECURE").unwrap_or(args.insecure);
        let metrics_path = var("PBS_METRICS_PATH").unwrap_or(args.metrics_path);
        let listen_address = var("PBS_LISTEN_ADDRESS").unwrap_or(args.listen_address);

        if !is_valid_metrics_path(&metrics_path) {
            return Err(ConfigError::MetricsPath(metrics_path));
        }

        Ok(Settings {
            endpoint: Some(endpoint).filter(|e| !e.is_empty()),
            credential: Credential::api_token(&username, &token_name, &token),
            timeout: humantime::parse_duration(&timeout)
                .map_err(|source| ConfigError::Timeout { value: timeout.clone(), source })?,
            insecure: parse_bool(&insecure).ok_or(ConfigError::Insecure(insecure))?,
            metrics_path,
            listen_address: normalize_listen_address(&listen_address),
            log_level: loglevel
                .parse::<Level>()
                .map_err(|_| ConfigError::LogLevel(loglevel))?,
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: self.timeout,
            insecure: self.insecure,
        }
    }
}

/// First line of `path`, without its line terminator.
pub fn read_secret_file(path: impl AsRef<Path>) -> Result<String, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SecretFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.lines().next().unwrap_or_default().to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Absolute and free of route syntax: no segment may start with `:` or `*`,
/// and `{` `}` are capture markers.
fn is_valid_metrics_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}

/// `:9101` means every IPv4 interface.
fn normalize_listen_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn defaults() -> Args {
        Args::parse_from(["pbs-exporter"])
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(defaults(), env_of(&[])).unwrap();
        assert_eq!(settings.endpoint, None);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(!settings.insecure);
        assert_eq!(settings.metrics_path, "/metrics");
        assert_eq!(settings.listen_address, "0.0.0.0:9101");
        assert_eq!(settings.log_level, Level::INFO);
        assert_eq!(
            settings.credential.header_value(),
            "PBSAPIToken=root@pam!pbs-exporter:"
        );
    }

    #[test]
    fn test_flags_are_parsed() {
        let args = Args::parse_from([
            "pbs-exporter",
            "--pbs.endpoint",
            "https://pbs:8007",
            "--pbs.api.token",
            "abc",
            "--pbs.timeout",
            "1500ms",
            "--pbs.insecure",
            "true",
            "--pbs.listen-address",
            "127.0.0.1:9200",
        ]);
        let settings = Settings::resolve(args, env_of(&[])).unwrap();
        assert_eq!(settings.endpoint.as_deref(), Some("https://pbs:8007"));
        assert_eq!(settings.timeout, Duration::from_millis(1500));
        assert!(settings.insecure);
        assert_eq!(settings.listen_address, "127.0.0.1:9200");
        assert!(settings.credential.header_value().ends_with(":abc"));
    }

    #[test]
    fn test_env_overrides_flags() {
        let args = Args::parse_from([
            "pbs-exporter",
            "--pbs.username",
            "flag@pam",
            "--pbs.loglevel",
            "warn",
        ]);
        let env = env_of(&[
            ("PBS_USERNAME", "env@pbs"),
            ("PBS_LOGLEVEL", "DEBUG"),
            ("PBS_METRICS_PATH", "/pbs"),
            ("PBS_ENDPOINT", ""),
        ]);
        let settings = Settings::resolve(args, env).unwrap();
        assert!(settings.credential.header_value().starts_with("PBSAPIToken=env@pbs!"));
        assert_eq!(settings.log_level, Level::DEBUG);
        assert_eq!(settings.metrics_path, "/pbs");
        assert_eq!(settings.endpoint, None);
    }

    #[test]
    fn test_secret_from_file_first_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-secret").unwrap();
        writeln!(file, "ignored").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let settings =
            Settings::resolve(defaults(), env_of(&[("PBS_API_TOKEN_FILE", path.as_str())])).unwrap();
        assert!(settings.credential.header_value().ends_with(":file-secret"));
    }

    #[test]
    fn test_direct_value_beats_file() {
        let env = env_of(&[
            ("PBS_API_TOKEN", "direct"),
            ("PBS_API_TOKEN_FILE", "/nonexistent/secret"),
        ]);
        let settings = Settings::resolve(defaults(), env).unwrap();
        assert!(settings.credential.header_value().ends_with(":direct"));
    }

    #[test]
    fn test_missing_secret_file_is_fatal() {
        let env = env_of(&[("PBS_USERNAME_FILE", "/nonexistent/username")]);
        let err = Settings::resolve(defaults(), env).unwrap_err();
        assert!(matches!(err, ConfigError::SecretFile { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let err = Settings::resolve(defaults(), env_of(&[("PBS_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Timeout { .. }));

        let err = Settings::resolve(defaults(), env_of(&[("PBS_INSECURE", "yes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Insecure(_)));

        let err = Settings::resolve(defaults(), env_of(&[("PBS_LOGLEVEL", "chatty")])).unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(_)));

        let err =
            Settings::resolve(defaults(), env_of(&[("PBS_METRICS_PATH", "metrics")])).unwrap_err();
        assert!(matches!(err, ConfigError::MetricsPath(_)));
    }

    #[test]
    fn test_metrics_path_rejects_route_syntax() {
        for path in ["/*x", "/metrics/:id", "/{target}", "/a/*rest"] {
            let err = Settings::resolve(defaults(), env_of(&[("PBS_METRICS_PATH", path)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::MetricsPath(_)), "{path}");
        }
        for path in ["/", "/metrics", "/pbs/metrics", "/a:b"] {
            let settings =
                Settings::resolve(defaults(), env_of(&[("PBS_METRICS_PATH", path)])).unwrap();
            assert_eq!(settings.metrics_path, path);
        }
    }

    #[test]
    fn test_bool_spellings() {
        for v in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("tRuE"), None);
    }
}

//! CLI argument definitions for the Argo server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Argo - a conversational assistant grounded in your bank data.
#[derive(Parser, Debug)]
#[command(name = "argo", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Print a fresh API token for this email, creating the user if needed,
    /// then exit.
    #[arg(long = "issue-token", value_name = "EMAIL")]
    pub issue_token: Option<String>,

    /// Write the effective configuration to the config path, then exit.
    #[arg(long = "write-config")]
    pub write_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ARGO_CONFIG env var > ~/.argo/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ARGO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > ARGO_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = std::env::var("ARGO_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
        {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        3040
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".argo").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"));
    match (rest, home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "argo",
            "--config",
            "/tmp/argo.toml",
            "-p",
            "4100",
            "--issue-token",
            "me@example.com",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/argo.toml"));
        assert_eq!(args.resolve_port(3040), 4100);
        assert_eq!(args.issue_token.as_deref(), Some("me@example.com"));
        assert!(!args.write_config);
    }

    #[test]
    fn test_overrides_absent_by_default() {
        let args = CliArgs::parse_from(["argo"]);
        assert!(args.resolve_data_dir().is_none());
        assert!(args.resolve_log_level().is_none());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/argo"), PathBuf::from("/var/lib/argo"));
        assert_eq!(expand_home("data"), PathBuf::from("data"));
    }
}

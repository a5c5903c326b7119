//! # Config Loader
//!
//! Builds the proxy's `ProxyBlueprint` from a TOML or JSON file.
//!
//! The binary assembles its configuration in three steps, and this crate
//! exposes each one separately:
//! 1. `parse_path`: read the file; every field except `upstreams[].addr`
//!    falls back to its default
//! 2. the caller applies command-line overrides (`--remote`,
//!    `--listen-address`, ...), which replace the file's values
//! 3. `validate`: reject anything the proxy cannot run with, before any
//!    socket is opened
//!
//! `load_from_path` and `load_from_str` do steps 1 and 3 at once for callers
//! without overrides (`validate` / `info` commands, tests).
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use contracts::UpstreamSource;
//! use std::path::Path;
//!
//! let mut blueprint = ConfigLoader::parse_path(Path::new("beast-proxy.toml"))?;
//! blueprint.upstreams = vec![UpstreamSource::new("192.168.1.20:30005")];
//! ConfigLoader::validate(&blueprint)?;
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

pub use contracts::ProxyBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse and validate a `.toml` / `.json` file.
    pub fn load_from_path(path: &Path) -> Result<ProxyBlueprint, ContractError> {
        let blueprint = Self::parse_path(path)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Parse a file without validating it, so overrides can be applied first.
    ///
    /// # Errors
    /// - Extension is neither `.toml` nor `.json`
    /// - File cannot be read
    /// - Syntax error or missing `upstreams[].addr`
    pub fn parse_path(path: &Path) -> Result<ProxyBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse(&content, format)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProxyBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate a blueprint after overrides. The first violation wins and
    /// names the offending field (e.g. `proxy.keepalive_secs`).
    pub fn validate(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Effective configuration as TOML, printed by `run --dry-run`
    pub fn to_toml(blueprint: &ProxyBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::UpstreamSource;
    use std::io::Write;

    const LISTEN_ONLY_TOML: &str = r#"
[proxy]
listen = ["0.0.0.0:30005"]
keepalive_secs = 120
"#;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn validation_field(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_without_upstreams_needs_override() {
        let file = write_temp(".toml", LISTEN_ONLY_TOML);

        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert_eq!(validation_field(err), "upstreams");

        let mut bp = ConfigLoader::parse_path(file.path()).unwrap();
        bp.upstreams = vec![UpstreamSource::new("192.168.1.20:30005")];
        ConfigLoader::validate(&bp).unwrap();
        assert_eq!(bp.proxy.listen, vec!["0.0.0.0:30005"]);
        assert_eq!(bp.proxy.keepalive_secs, 120);
    }

    #[test]
    fn test_override_can_break_a_valid_file() {
        let file = write_temp(
            ".json",
            r#"{ "upstreams": [{ "name": "roof", "addr": "10.0.0.2:30005" }] }"#,
        );
        let mut bp = ConfigLoader::load_from_path(file.path()).unwrap();

        bp.proxy.listen = vec!["0.0.0.0".to_string()];
        let err = ConfigLoader::validate(&bp).unwrap_err();
        assert_eq!(validation_field(err), "proxy.listen[0]");
    }

    #[test]
    fn test_zero_keepalive_is_rejected() {
        let content = r#"
[proxy]
keepalive_secs = 0

[[upstreams]]
addr = "rx:30005"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert_eq!(validation_field(err), "proxy.keepalive_secs");
    }

    #[test]
    fn test_duplicate_upstream_names() {
        let content = r#"
[[upstreams]]
addr = "rx:30005"

[[upstreams]]
addr = "rx:30005"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate upstream name 'rx:30005'"));
    }

    #[test]
    fn test_effective_config_reloads() {
        let mut bp = ConfigLoader::parse_path(write_temp(".toml", LISTEN_ONLY_TOML).path()).unwrap();
        bp.upstreams = vec![UpstreamSource::new("rx1:30005"), UpstreamSource::new("rx2:30005")];
        bp.proxy.dump_frames = true;

        let rendered = ConfigLoader::to_toml(&bp).unwrap();
        let back = ConfigLoader::load_from_str(&rendered, ConfigFormat::Toml).unwrap();
        assert_eq!(back.upstreams, bp.upstreams);
        assert!(back.proxy.dump_frames);
        assert_eq!(back.backoff.max_ms, 60_000);
    }

    #[test]
    fn test_unknown_extension() {
        let file = write_temp(".yaml", "upstreams: []");
        let err = ConfigLoader::parse_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::parse_path(Path::new("/nonexistent/proxy.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}

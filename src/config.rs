//! Runtime settings.
//!
//! Defaults, then an optional TOML file, then `ASSET_REGISTER_*` environment
//! variables. Command-line flags are applied last by the binaries.

use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::loader::DEFAULT_HEADER_ROW;

pub const ENV_BIND: &str = "ASSET_REGISTER_BIND";
pub const ENV_HEADER_ROW: &str = "ASSET_REGISTER_HEADER_ROW";
pub const ENV_PAGE_SIZE: &str = "ASSET_REGISTER_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Address the web server listens on.
    pub bind: String,

    /// Zero-based sheet row holding the column names.
    pub header_row: usize,

    /// Rows per page in the web table.
    pub page_size: usize,

    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,

    /// Idle lifetime of a browser session.
    pub session_ttl_secs: u64,

    /// Default for the QR code on data sheets.
    pub include_qr: bool,

    /// Default for the location marker on data sheets.
    pub include_map: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            header_row: DEFAULT_HEADER_ROW,
            page_size: 50,
            max_upload_bytes: 20 * 1024 * 1024,
            session_ttl_secs: 4 * 60 * 60,
            include_qr: true,
            include_map: true,
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).map_err(|e| AppError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override fields from environment-style `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.bind = bind.trim().to_string();
        }
        if let Some(row) = lookup(ENV_HEADER_ROW) {
            self.header_row = parse_env(ENV_HEADER_ROW, &row)?;
        }
        if let Some(size) = lookup(ENV_PAGE_SIZE) {
            self.page_size = parse_env(ENV_PAGE_SIZE, &size)?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AppError::Config("page_size must be at least 1".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config("max_upload_bytes must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_env(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = Settings::from_toml("page_size = 25\ninclude_qr = false\n").unwrap();
        assert_eq!(s.page_size, 25);
        assert!(!s.include_qr);
        assert_eq!(s.bind, "127.0.0.1:3000");
        assert_eq!(s.header_row, 1);
    }

    #[test]
    fn unknown_or_invalid_keys_are_config_errors() {
        assert!(matches!(Settings::from_toml("colour = 1"), Err(AppError::Config(_))));
        assert!(matches!(Settings::from_toml("page_size = 0"), Err(AppError::Config(_))));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_BIND, "0.0.0.0:8080"), (ENV_HEADER_ROW, " 0 ")].into();
        let mut s = Settings::from_toml("bind = \"127.0.0.1:9\"").unwrap();
        s.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.bind, "0.0.0.0:8080");
        assert_eq!(s.header_row, 0);
        assert_eq!(s.page_size, 50);

        let err = s.apply_env(|k| (k == ENV_PAGE_SIZE).then(|| "many".to_string())).unwrap_err();
        assert!(err.to_string().contains(ENV_PAGE_SIZE));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_ttl_secs = 60").unwrap();
        let s = Settings::from_toml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(s.session_ttl_secs, 60);
        assert!(matches!(
            Settings::load(Some(Path::new("/nonexistent/settings.toml"))),
            Err(AppError::Config(_))
        ));
    }
}

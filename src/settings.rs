//! Runtime settings.
//!
//! Sources are layered: built-in defaults, then an optional TOML file, then
//! `LAUNDRY_*` environment variables (e.g. `LAUNDRY_PORT=9000`).

use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// When set, API requests must present this token.
    #[serde(default)]
    pub auth_token: Option<String>,
    pub log_level: String,
    /// Directory of extra `*.sql` files applied after model migrations.
    #[serde(default)]
    pub migrations_dir: Option<String>,
}

impl Settings {
    /// Load settings, reading `path` if given and present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("debug", false)?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            .set_default("database_url", "sqlite://laundry.db")?
            .set_default("log_level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("LAUNDRY").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Settings for tests and embedding: in-memory database, no auth.
    pub fn in_memory() -> Self {
        Settings {
            debug: true,
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            auth_token: None,
            log_level: "debug".to_string(),
            migrations_dir: None,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9123\nauth_token = \"s3cret\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.port, 9123);
        assert_eq!(settings.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.bind_addr(), "127.0.0.1:9123");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/laundry.toml"))).unwrap();
        assert_eq!(settings.log_level, "info");
        assert!(settings.migrations_dir.is_none());
    }
}

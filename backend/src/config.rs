//! Runtime configuration from the environment.
//!
//! A `.env` file in the working directory is loaded first when present.
//!
//! | Variable                  | Default    |
//! |---------------------------|------------|
//! | `LEAGUEGRID_PORT`         | `3000`     |
//! | `LEAGUEGRID_SHAPES_DIR`   | unset      |
//! | `LEAGUEGRID_MAX_UPLOAD`   | `10485760` |

use std::env;
use std::path::PathBuf;

use crate::catalog::ShapeCatalog;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// HTTP port for `serve`.
    pub port: u16,
    /// Directory of user table shapes.
    pub shapes_dir: Option<PathBuf>,
    /// Upload size limit in bytes.
    pub max_upload: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            shapes_dir: None,
            max_upload: DEFAULT_MAX_UPLOAD,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("LEAGUEGRID_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid LEAGUEGRID_PORT, using default");
                defaults.port
            }),
            None => defaults.port,
        };
        let max_upload = match lookup("LEAGUEGRID_MAX_UPLOAD") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid LEAGUEGRID_MAX_UPLOAD, using default");
                defaults.max_upload
            }),
            None => defaults.max_upload,
        };
        let shapes_dir = lookup("LEAGUEGRID_SHAPES_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            port,
            shapes_dir,
            max_upload,
        }
    }

    /// Catalog with built-ins plus the configured shapes directory.
    pub fn catalog(&self) -> ShapeCatalog {
        match &self.shapes_dir {
            Some(dir) => ShapeCatalog::with_dir(dir),
            None => ShapeCatalog::new(),
        }
    }
}

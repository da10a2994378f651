use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, warn};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ConfigError {
    #[error("Could not read config file {}", .path.display())]
    #[diagnostic(code(huka::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not parse config file {}", .path.display())]
    #[diagnostic(
        code(huka::config::parse),
        help("The file is RON, for example: (usuario: \"lucas\", trace: true)")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("ar", "Huka", "Huka")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub usuario: String,
    pub database_url: String,
    /// Where transcripts and trace files go.
    pub data_dir: PathBuf,
    /// Write the extractor trace next to the transcript.
    pub trace: bool,
    /// Fixed seed for reply selection.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            usuario: "pescador".to_string(),
            database_url: format!("sqlite://{}", data_dir.join("huka.db").display()),
            data_dir,
            trace: false,
            seed: None,
        }
    }
}

impl Config {
    /// Config file in the platform config directory, overridden by the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match project_dirs() {
            Some(dirs) => Self::from_path(&dirs.config_dir().join("config.ron"))?,
            None => {
                warn!("No home directory found, using the default configuration");
                Self::default()
            }
        };

        Ok(config.with_overrides(|key| env::var(key).ok()))
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `DATABASE_URL`, `HUKA_USER` and `HUKA_DATA_DIR`.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(usuario) = var("HUKA_USER") {
            self.usuario = usuario;
        }
        if let Some(dir) = var("HUKA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }
}

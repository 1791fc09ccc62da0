//! Code for loading program settings.
use crate::get_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use crate::optimisation::OptimisationOptions;
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str =
    "# This file contains the program settings for esm-storage
";

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// A directory in which to write a log file, in addition to the terminal
    pub log_directory: Option<PathBuf>,
    /// Verbosity of model diagnostics.
    ///
    /// 0 reports everything, 1 suppresses solver chatter and 2 also suppresses consistency
    /// warnings.
    #[serde(default)]
    pub verbose: u8,
    /// Treat build decisions as continuous variables in [0, 1]
    #[serde(default)]
    pub relax_is_built_binary: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_directory: None,
            verbose: 0,
            relax_is_built_binary: false,
        }
    }
}

impl Settings {
    /// Read the settings file from the user's config directory, or use defaults if there is none
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to defaults if the file doesn't exist
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// Initialise the program logger from these settings
    pub fn init_logger(&self) -> Result<()> {
        crate::log::init(Some(&self.log_level), self.log_directory.as_deref())
    }

    /// The options for building optimisation problems
    pub fn optimisation_options(&self) -> OptimisationOptions {
        OptimisationOptions {
            relax_is_built_binary: self.relax_is_built_binary,
        }
    }

    /// The contents of the default settings file, with every setting commented out and
    /// documented
    pub fn default_file_contents() -> Result<String> {
        let settings_raw = toml::to_string(&Settings::default())?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };

            let docs = Settings::get_field_docs(field.trim())
                .ok()
                .with_context(|| format!("Missing doc comment for setting {}", field.trim()))?;
            for doc_line in docs.lines() {
                write!(&mut out, "\n# # {}\n", doc_line.trim())?;
            }
            writeln!(&mut out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}

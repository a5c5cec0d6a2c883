use crate::cli::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// JSON configuration file format, mirroring the command-line options.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub dir: Option<String>,
    pub to_dir: Option<String>,
    pub overwrite: Option<bool>,
    pub command: Option<String>,
    pub colors: Option<i64>,
    pub timeout: Option<i64>,
    pub process: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub verbose: Option<bool>,
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line
    /// arguments. Command-line arguments take precedence over config file
    /// values.
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            self.merge_from_config(config);

            if self.verbose {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    /// Config file values only apply where the CLI value is still at its
    /// default.
    fn merge_from_config(&mut self, config: ConfigFile) {
        if self.source_dir == PathBuf::from(".") {
            if let Some(dir) = config.dir {
                self.source_dir = PathBuf::from(dir);
            }
        }

        if self.dest_dir.is_none() {
            if let Some(to_dir) = config.to_dir {
                self.dest_dir = Some(PathBuf::from(to_dir));
            }
        }

        if !self.overwrite {
            self.overwrite = config.overwrite.unwrap_or(false);
        }

        if self.command == "pngquant" {
            if let Some(command) = config.command {
                self.command = command;
            }
        }

        if self.colors == 256 {
            if let Some(colors) = config.colors {
                self.colors = colors;
            }
        }

        if self.timeout_ms == 60000 {
            if let Some(timeout) = config.timeout {
                self.timeout_ms = timeout;
            }
        }

        if self.process == "true" {
            if let Some(process) = config.process {
                self.process = process;
            }
        }

        if self.include.is_empty() {
            if let Some(include) = config.include {
                self.include = include;
            }
        }

        if self.exclude.is_empty() {
            if let Some(exclude) = config.exclude {
                self.exclude = exclude;
            }
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }
    }
}

pub mod batch;
pub mod capture;
pub mod naming;
pub mod probe;
pub mod supervisor;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use regex::Regex;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::utils::{check_dir, verbose_println};
pub use batch::{BatchOutcome, BatchRunner};
pub use probe::Availability;
pub use supervisor::ExecutionResult;

/// Whether files should be processed by the external command at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessPolicy {
    /// Processing is required; an unavailable command or a failed
    /// transformation fails the run.
    Must,
    /// Never invoke the external command; files are copied as-is.
    MustNot,
    /// Best effort: process when possible, fall back to a plain copy when
    /// the command is unavailable or fails on a file.
    Should,
}

impl ProcessPolicy {
    /// Parse the configuration string: "true"/"yes", "false"/"no" or "try"
    /// (case-insensitive, surrounding whitespace ignored). Anything else is
    /// a configuration error.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Ok(ProcessPolicy::Must),
            "false" | "no" => Ok(ProcessPolicy::MustNot),
            "try" => Ok(ProcessPolicy::Should),
            _ => Err(format!("Invalid value for \"process\" option: \"{}\".", s)),
        }
    }
}

/// The external command to supervise, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Name or path of the executable, run directly (never through a shell).
    pub program: String,
    /// Color count passed as the first argument (2-256).
    pub colors: u16,
    /// Wall-clock limit per invocation; None disables the timeout.
    pub timeout: Option<Duration>,
}

/// One candidate file, created during discovery and consumed once.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Source-relative path, used for matching and log messages.
    pub rel_name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Resolved configuration for one batch run.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub overwrite: bool,
    pub command: CommandSpec,
    pub policy: ProcessPolicy,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct QuantizeEngine {
    config: QuantizeConfig,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl QuantizeEngine {
    /// Validate the configuration and compile the filename filters.
    ///
    /// Directory and pattern violations are fatal configuration errors,
    /// surfaced here before any file is touched.
    pub fn new(config: QuantizeConfig) -> Result<Self> {
        check_dir("Source directory", &config.source_dir, true, false)?;
        check_dir("Destination directory", &config.dest_dir, false, true)?;

        let include = compile_patterns(&config.include, "include")?;
        let exclude = compile_patterns(&config.exclude, "exclude")?;

        Ok(Self {
            config,
            include,
            exclude,
        })
    }

    pub fn config(&self) -> &QuantizeConfig {
        &self.config
    }

    /// Enumerate candidate files under the source tree, in a deterministic
    /// order. Extension filtering happens later, per file, so that
    /// non-matching files are counted as skipped.
    pub fn discover_files(&self) -> Result<Vec<FileTask>> {
        verbose_println(
            self.config.verbose,
            &format!(
                "Transforming from {} to {}.",
                self.config.source_dir.display(),
                self.config.dest_dir.display()
            ),
        );

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.config.source_dir).follow_links(false);

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_name = match entry.path().strip_prefix(&self.config.source_dir) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if !self.matches_filters(&rel_name) {
                continue;
            }

            let metadata = entry.metadata().context("Failed to read file metadata")?;
            files.push(FileTask {
                source: entry.path().to_path_buf(),
                dest: self.config.dest_dir.join(naming::dest_file_name(&rel_name)),
                rel_name,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        // Sort for consistent processing order
        files.sort_by(|a, b| a.rel_name.cmp(&b.rel_name));

        verbose_println(
            self.config.verbose,
            &format!("Found {} candidate files", files.len()),
        );
        Ok(files)
    }

    fn matches_filters(&self, rel_name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(rel_name)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.is_match(rel_name))
    }

    /// Probe the command once, then run the batch sequentially.
    ///
    /// Returns the aggregate outcome; deciding whether a nonzero failure
    /// count fails the run is the caller's job.
    pub fn run(&self, files: &[FileTask], progress: &ProgressBar) -> Result<BatchOutcome> {
        let availability =
            probe::probe_command(&self.config.command, self.config.policy, self.config.verbose)?;

        let runner = BatchRunner::new(&self.config, &availability);
        Ok(runner.run(files, progress))
    }
}

fn compile_patterns(patterns: &[String], kind: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Invalid {} pattern \"{}\"", kind, p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse_accepted_values() {
        assert_eq!(ProcessPolicy::parse("true").unwrap(), ProcessPolicy::Must);
        assert_eq!(ProcessPolicy::parse("yes").unwrap(), ProcessPolicy::Must);
        assert_eq!(
            ProcessPolicy::parse("false").unwrap(),
            ProcessPolicy::MustNot
        );
        assert_eq!(ProcessPolicy::parse("no").unwrap(), ProcessPolicy::MustNot);
        assert_eq!(ProcessPolicy::parse("try").unwrap(), ProcessPolicy::Should);
    }

    #[test]
    fn test_policy_parse_is_normalized() {
        assert_eq!(ProcessPolicy::parse(" YES ").unwrap(), ProcessPolicy::Must);
        assert_eq!(
            ProcessPolicy::parse("False").unwrap(),
            ProcessPolicy::MustNot
        );
        assert_eq!(ProcessPolicy::parse("TRY").unwrap(), ProcessPolicy::Should);
    }

    #[test]
    fn test_policy_parse_rejects_everything_else() {
        assert!(ProcessPolicy::parse("maybe").is_err());
        assert!(ProcessPolicy::parse("").is_err());
        assert!(ProcessPolicy::parse("1").is_err());
    }

    #[test]
    fn test_engine_rejects_missing_source_dir() {
        let config = QuantizeConfig {
            source_dir: std::env::temp_dir().join("pngquant_batch_missing_src"),
            dest_dir: std::env::temp_dir(),
            overwrite: false,
            command: CommandSpec {
                program: "pngquant".to_string(),
                colors: 256,
                timeout: None,
            },
            policy: ProcessPolicy::Should,
            include: vec![],
            exclude: vec![],
            verbose: false,
        };
        assert!(QuantizeEngine::new(config).is_err());
    }

    #[test]
    fn test_engine_rejects_invalid_pattern() {
        let config = QuantizeConfig {
            source_dir: std::env::temp_dir(),
            dest_dir: std::env::temp_dir(),
            overwrite: false,
            command: CommandSpec {
                program: "pngquant".to_string(),
                colors: 256,
                timeout: None,
            },
            policy: ProcessPolicy::Should,
            include: vec!["[unclosed".to_string()],
            exclude: vec![],
            verbose: false,
        };
        let result = QuantizeEngine::new(config);
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("include pattern"));
    }

    #[test]
    fn test_discovery_applies_include_exclude() {
        let root = std::env::temp_dir().join(format!(
            "pngquant_batch_discover_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(root.join("src/sprites")).unwrap();
        std::fs::create_dir_all(root.join("src/vendor")).unwrap();
        std::fs::create_dir_all(root.join("out")).unwrap();
        std::fs::write(root.join("src/sprites/a.png"), b"data").unwrap();
        std::fs::write(root.join("src/sprites/b.png"), b"data").unwrap();
        std::fs::write(root.join("src/vendor/c.png"), b"data").unwrap();

        let config = QuantizeConfig {
            source_dir: root.join("src"),
            dest_dir: root.join("out"),
            overwrite: false,
            command: CommandSpec {
                program: "pngquant".to_string(),
                colors: 256,
                timeout: None,
            },
            policy: ProcessPolicy::Should,
            include: vec![r"^sprites/.*".to_string()],
            exclude: vec![r"b\.png$".to_string()],
            verbose: false,
        };

        let engine = QuantizeEngine::new(config).unwrap();
        let files = engine.discover_files().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_name, "sprites/a.png");
        assert_eq!(files[0].dest, root.join("out").join("sprites/a.png"));
        assert_eq!(files[0].size, 4);

        let _ = std::fs::remove_dir_all(&root);
    }
}

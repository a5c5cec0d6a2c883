use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::quantize::ProcessPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "pngquant-batch",
    about = "Batch PNG color quantization using the external pngquant command",
    long_about = "
pngquant-batch - Batch PNG color quantization for build pipelines

This tool walks a source directory of images, runs the external pngquant
command on each matching .png file and writes the quantized result into a
destination tree. When processing is disabled, unavailable or fails, the
source file is copied unchanged instead, depending on the --process policy.

Process policies:
  true / yes   Files MUST be processed. If the command is unavailable or
               fails on a file, the run fails.
  false / no   Files must NOT be processed; they are copied as-is.
  try          Best effort: process when possible, fall back to a plain
               copy when the command is unavailable or fails on a file.

Example Usage:
  # Quantize all PNGs under assets/ into build/assets/ (256 colors)
  pngquant-batch -d assets -t build/assets

  # Reduce to 64 colors, fail the build if pngquant cannot do its job
  pngquant-batch -d assets -t build/assets --colors 64 --process yes

  # Best-effort quantization with a 10 second per-file timeout
  pngquant-batch -d assets -t build/assets --process try --timeout 10000

  # Only sprite images, skipping anything under vendor/
  pngquant-batch -d assets -t build/assets --include 'sprites/.*' \\
    --exclude 'vendor/.*'

  # Re-generate everything, even when the destination is newer
  pngquant-batch -d assets -t build/assets --overwrite --verbose"
)]
pub struct Args {
    /// Source directory to read image files from
    #[arg(short = 'd', long = "dir", default_value = ".", value_name = "DIR")]
    pub source_dir: PathBuf,

    /// Destination directory to write .png files to (defaults to the source directory)
    #[arg(short = 't', long = "to-dir", value_name = "DIR")]
    pub dest_dir: Option<PathBuf>,

    /// Overwrite destination files even when they are newer than the source
    #[arg(long = "overwrite")]
    pub overwrite: bool,

    /// Name or path of the pngquant command to execute
    #[arg(long = "command", default_value = "pngquant", value_name = "CMD")]
    pub command: String,

    /// Number of colors to reduce to (2-256)
    #[arg(long = "colors", default_value = "256", value_name = "N")]
    pub colors: i64,

    /// Per-invocation timeout in milliseconds (0 or lower disables the timeout)
    #[arg(long = "timeout", default_value = "60000", value_name = "MS")]
    pub timeout_ms: i64,

    /// Whether files should be processed at all: true/yes, false/no, or try
    #[arg(long = "process", default_value = "true", value_name = "POLICY")]
    pub process: String,

    /// Regex patterns for source-relative paths to include (default: everything)
    #[arg(long = "include", value_name = "REGEX")]
    pub include: Vec<String>,

    /// Regex patterns for source-relative paths to exclude
    #[arg(long = "exclude", value_name = "REGEX")]
    pub exclude: Vec<String>,

    /// Optional JSON configuration file merged under command-line values
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Enable verbose output with per-file progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Parse the --process string into a policy
    pub fn parse_policy(&self) -> Result<ProcessPolicy, String> {
        ProcessPolicy::parse(&self.process)
    }

    /// Validate the color count (pngquant accepts 2-256)
    pub fn parse_colors(&self) -> Result<u16, String> {
        if self.colors < 2 {
            return Err(format!(
                "Number of colors ({}) is invalid, it is too low. It should be between 2 and 256.",
                self.colors
            ));
        }
        if self.colors > 256 {
            return Err(format!(
                "Number of colors ({}) is invalid, it is too high. It should be between 2 and 256.",
                self.colors
            ));
        }
        Ok(self.colors as u16)
    }

    /// Per-invocation timeout, or None when disabled
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms > 0 {
            Some(Duration::from_millis(self.timeout_ms as u64))
        } else {
            None
        }
    }

    /// Destination directory, defaulting to the source directory
    pub fn dest_dir(&self) -> PathBuf {
        self.dest_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colors_in_range() {
        let args = Args {
            colors: 2,
            ..Default::default()
        };
        assert_eq!(args.parse_colors().unwrap(), 2);

        let args = Args {
            colors: 256,
            ..Default::default()
        };
        assert_eq!(args.parse_colors().unwrap(), 256);
    }

    #[test]
    fn test_parse_colors_out_of_range() {
        let args = Args {
            colors: 1,
            ..Default::default()
        };
        assert!(args.parse_colors().is_err());

        let args = Args {
            colors: 257,
            ..Default::default()
        };
        assert!(args.parse_colors().is_err());

        let args = Args {
            colors: -5,
            ..Default::default()
        };
        assert!(args.parse_colors().is_err());
    }

    #[test]
    fn test_timeout_disabled_when_non_positive() {
        let args = Args {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(args.timeout().is_none());

        let args = Args {
            timeout_ms: -1,
            ..Default::default()
        };
        assert!(args.timeout().is_none());

        let args = Args {
            timeout_ms: 2500,
            ..Default::default()
        };
        assert_eq!(args.timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_dest_dir_defaults_to_source() {
        let args = Args {
            source_dir: PathBuf::from("assets"),
            dest_dir: None,
            ..Default::default()
        };
        assert_eq!(args.dest_dir(), PathBuf::from("assets"));

        let args = Args {
            source_dir: PathBuf::from("assets"),
            dest_dir: Some(PathBuf::from("build")),
            ..Default::default()
        };
        assert_eq!(args.dest_dir(), PathBuf::from("build"));
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            dest_dir: None,
            overwrite: false,
            command: "pngquant".to_string(),
            colors: 256,
            timeout_ms: 60000,
            process: "true".to_string(),
            include: vec![],
            exclude: vec![],
            config_file: None,
            verbose: false,
        }
    }
}

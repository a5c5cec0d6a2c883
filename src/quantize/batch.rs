use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::path::Path;
use std::time::{Duration, Instant};

use super::supervisor::run_command;
use super::{naming, Availability, FileTask, ProcessPolicy, QuantizeConfig};
use crate::utils::{
    error_println, format_duration, has_png_extension, unique_temp_path, verbose_println,
    warn_println,
};

/// Aggregate counts for one batch run. Accumulated monotonically; every
/// file that existed at decision time lands in exactly one bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl BatchOutcome {
    pub fn total_decided(&self) -> usize {
        self.processed + self.copied + self.skipped + self.failed
    }

    /// Aggregate message for a failed run (failed > 0).
    pub fn failure_message(&self) -> String {
        format!(
            "{} file(s) failed to be processed and/or copied; {} file(s) processed; {} file(s) copied; {} file(s) skipped. Total duration is {}.",
            self.failed,
            self.processed,
            self.copied,
            self.skipped,
            format_duration(self.duration)
        )
    }

    /// Informational summary for a successful run.
    pub fn success_message(&self) -> String {
        format!(
            "{} file(s) processed and {} file(s) copied in {}; {} file(s) skipped.",
            self.processed,
            self.copied,
            format_duration(self.duration),
            self.skipped
        )
    }
}

enum FileOutcome {
    Processed,
    Copied,
    Skipped,
    Failed,
}

/// Sequential per-file processor applying the three-way policy.
///
/// Files are handled one at a time, never in parallel; the only concurrency
/// is the pair of stream drains inside each supervised invocation.
pub struct BatchRunner<'a> {
    config: &'a QuantizeConfig,
    availability: &'a Availability,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a QuantizeConfig, availability: &'a Availability) -> Self {
        Self {
            config,
            availability,
        }
    }

    /// Process every candidate file in enumeration order and accumulate the
    /// aggregate outcome. A per-file failure never aborts the batch early.
    pub fn run(&self, files: &[FileTask], progress: &ProgressBar) -> BatchOutcome {
        let start = Instant::now();
        let mut outcome = BatchOutcome::default();

        let transform =
            self.config.policy != ProcessPolicy::MustNot && self.availability.is_available();

        for task in files {
            // Files that vanished since the scan are excluded silently.
            if task.source.exists() {
                match self.decide_file(task, transform) {
                    FileOutcome::Processed => outcome.processed += 1,
                    FileOutcome::Copied => outcome.copied += 1,
                    FileOutcome::Skipped => outcome.skipped += 1,
                    FileOutcome::Failed => outcome.failed += 1,
                }
            }
            progress.inc(1);
        }

        outcome.duration = start.elapsed();
        outcome
    }

    fn decide_file(&self, task: &FileTask, transform: bool) -> FileOutcome {
        let start = Instant::now();
        let verbose = self.config.verbose;

        if !has_png_extension(&task.rel_name) {
            verbose_println(
                verbose,
                &format!(
                    "Skipping \"{}\" because the file does not end in \".png\" (case-insensitive).",
                    task.rel_name
                ),
            );
            return FileOutcome::Skipped;
        }

        if !self.config.overwrite && dest_is_newer(task) {
            verbose_println(
                verbose,
                &format!("Skipping \"{}\" because output file is newer.", task.rel_name),
            );
            return FileOutcome::Skipped;
        }

        if task.size < 1 {
            warn_println(&format!(
                "Skipping \"{}\" because the file is completely empty.",
                task.rel_name
            ));
            return FileOutcome::Skipped;
        }

        if transform {
            match self.transform_file(task) {
                Ok(()) => {
                    verbose_println(
                        verbose,
                        &format!(
                            "Processed \"{}\" in {}.",
                            task.rel_name,
                            format_duration(start.elapsed())
                        ),
                    );
                    return FileOutcome::Processed;
                }
                Err(err) => {
                    error_println(&format!(
                        "Failed to process \"{}\" (took {}): {:#}",
                        task.source.display(),
                        format_duration(start.elapsed()),
                        err
                    ));
                    if self.config.policy == ProcessPolicy::Must {
                        return FileOutcome::Failed;
                    }
                    // Fall back to a plain copy of the original below.
                }
            }
        }

        match copy_file(&task.source, &task.dest) {
            Ok(()) => {
                verbose_println(
                    verbose,
                    &format!(
                        "Copied \"{}\" in {}.",
                        task.rel_name,
                        format_duration(start.elapsed())
                    ),
                );
                FileOutcome::Copied
            }
            Err(err) => {
                error_println(&format!(
                    "Failed to copy \"{}\" to \"{}\": {:#}",
                    task.source.display(),
                    task.dest.display(),
                    err
                ));
                FileOutcome::Failed
            }
        }
    }

    /// One transform attempt: materialize a temporary input, supervise the
    /// command, interpret the result, place the output at the destination.
    /// The temporary input is always removed, success or failure.
    fn transform_file(&self, task: &FileTask) -> Result<()> {
        let stem = task
            .source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        let temp_in = unique_temp_path(&format!("pngquant_batch_{}", stem), "png");

        std::fs::copy(&task.source, &temp_in).with_context(|| {
            format!(
                "Failed to create temporary input file \"{}\"",
                temp_in.display()
            )
        })?;
        verbose_println(
            self.config.verbose,
            &format!("Created temporary input file \"{}\".", temp_in.display()),
        );

        let result = self.run_quantizer(task, &temp_in);
        remove_file_logged(&temp_in);
        result
    }

    fn run_quantizer(&self, task: &FileTask, temp_in: &Path) -> Result<()> {
        let command = &self.config.command;
        let args = vec![
            command.colors.to_string(),
            temp_in.to_string_lossy().to_string(),
        ];
        verbose_println(
            self.config.verbose,
            &format!(
                "Command line: \"{} {} {}\".",
                command.program, args[0], args[1]
            ),
        );

        let exec = run_command(&command.program, &args, command.timeout)
            .map_err(|err| anyhow::anyhow!("{}", err))?;

        // Failure conditions, in order: timeout, nonzero exit, stderr
        // output, missing output, empty output, result placement.
        if exec.timed_out {
            bail!("Timed out after {}.", format_duration(exec.duration));
        }

        let stderr_text = exec.stderr_text();
        let stderr_trimmed = stderr_text.trim();
        match exec.exit_code {
            Some(0) => {}
            Some(code) if !stderr_trimmed.is_empty() => {
                bail!("Exit code {}: {}", code, stderr_trimmed)
            }
            Some(code) => bail!("Exit code {}.", code),
            None => bail!("Terminated by a signal."),
        }

        // The tool is known to sometimes exit 0 while emitting an error.
        if !stderr_trimmed.is_empty() {
            bail!("{}", stderr_trimmed);
        }

        let temp_out = naming::quantized_output_path(temp_in);
        if !temp_out.exists() {
            bail!("No output produced.");
        }
        let out_len = std::fs::metadata(&temp_out).map(|m| m.len()).unwrap_or(0);
        if out_len < 1 {
            remove_file_logged(&temp_out);
            bail!("No output produced.");
        }

        if let Err(err) = copy_file(&temp_out, &task.dest) {
            remove_file_logged(&temp_out);
            remove_file_logged(&task.dest);
            return Err(err).with_context(|| {
                format!(
                    "Failed to copy \"{}\" to \"{}\"",
                    temp_out.display(),
                    task.dest.display()
                )
            });
        }

        remove_file_logged(&temp_out);
        Ok(())
    }
}

fn dest_is_newer(task: &FileTask) -> bool {
    let dest_modified = match std::fs::metadata(&task.dest).and_then(|m| m.modified()) {
        Ok(time) => time,
        Err(_) => return false,
    };
    match task.modified {
        Some(source_modified) => dest_modified > source_modified,
        None => false,
    }
}

/// Byte-for-byte copy, creating destination parent directories as needed.
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory \"{}\"", parent.display()))?;
    }
    std::fs::copy(source, dest).with_context(|| {
        format!(
            "Failed to copy \"{}\" to \"{}\"",
            source.display(),
            dest.display()
        )
    })?;
    Ok(())
}

/// Cleanup failures are logged, never escalated.
fn remove_file_logged(path: &Path) {
    if path.exists() {
        if std::fs::remove_file(path).is_err() {
            error_println(&format!("Failed to delete file \"{}\".", path.display()));
        }
    }
}

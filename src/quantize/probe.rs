use anyhow::Result;
use regex::Regex;

use super::supervisor::run_command;
use super::{CommandSpec, ProcessPolicy};
use crate::utils::{error_println, verbose_println};

/// Exit codes accepted when the command is run without arguments.
///
/// pngquant prints its usage (with the version, on stderr) and exits 1 when
/// invoked with no arguments; 0 is accepted too. This set is specific to
/// pngquant's observed no-args behavior and must be re-derived when
/// targeting a different quantization tool.
const ACCEPTED_EXIT_CODES: [i32; 2] = [0, 1];

/// Version token: a leading run of non-digits followed by a dotted numeric
/// sequence, e.g. "1.0.4".
const VERSION_PATTERN: &str = r"^[^0-9]*([0-9]+(\.[0-9]+)*)";

/// Result of probing the configured command, once per batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available { version: String },
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available { .. })
    }
}

/// Probe whether the configured command exists, executes, and identifies
/// itself with a parseable version string.
///
/// The command is run once with no arguments. A launch failure or a
/// disallowed exit code is fatal under MUST, otherwise logged and reported
/// as unavailable. Missing version output is never fatal: presence of the
/// executable alone does not confirm it behaves as expected. Under MUST_NOT
/// the probe is skipped entirely.
pub fn probe_command(
    spec: &CommandSpec,
    policy: ProcessPolicy,
    verbose: bool,
) -> Result<Availability> {
    if policy == ProcessPolicy::MustNot {
        return Ok(Availability::Unavailable);
    }

    verbose_println(verbose, &format!("Command line: \"{}\".", spec.program));

    let result = match run_command(&spec.program, &[], spec.timeout) {
        Ok(result) => result,
        Err(err) => {
            let message = format!("Unable to execute command \"{}\": {}.", spec.program, err);
            if policy == ProcessPolicy::Must {
                return Err(anyhow::anyhow!(message));
            }
            error_println(&message);
            return Ok(Availability::Unavailable);
        }
    };

    let exit_accepted = !result.timed_out
        && matches!(result.exit_code, Some(code) if ACCEPTED_EXIT_CODES.contains(&code));
    if !exit_accepted {
        let detail = if result.timed_out {
            "the command timed out".to_string()
        } else {
            match result.exit_code {
                Some(code) => format!("running it without arguments resulted in exit code {}", code),
                None => "the command was terminated by a signal".to_string(),
            }
        };
        let message = format!(
            "Unable to execute command \"{}\": {}.",
            spec.program, detail
        );
        if policy == ProcessPolicy::Must {
            return Err(anyhow::anyhow!(message));
        }
        error_println(&message);
        return Ok(Availability::Unavailable);
    }

    // pngquant 1.0 writes the version to stderr, so search both streams.
    let combined = format!("{}{}", result.stdout_text(), result.stderr_text());
    let pattern = Regex::new(VERSION_PATTERN)?;
    match pattern.captures(&combined).and_then(|c| c.get(1)) {
        Some(version) => {
            let version = version.as_str().to_string();
            verbose_println(
                verbose,
                &format!(
                    "Using command \"{}\", version is \"{}\".",
                    spec.program, version
                ),
            );
            Ok(Availability::Available { version })
        }
        None => {
            error_println(&format!(
                "Unable to execute command \"{}\": no version output found when running the command without arguments.",
                spec.program
            ));
            Ok(Availability::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn spec(program: &str) -> CommandSpec {
        CommandSpec {
            program: program.to_string(),
            colors: 256,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn script_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pngquant_batch_probe_{}_{}_{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_skipped_under_must_not() {
        // No command with this name exists, yet the probe never runs it.
        let result =
            probe_command(&spec("pngquant-batch-missing"), ProcessPolicy::MustNot, false).unwrap();
        assert_eq!(result, Availability::Unavailable);
    }

    #[test]
    fn test_launch_failure_fatal_under_must() {
        let result = probe_command(&spec("pngquant-batch-missing"), ProcessPolicy::Must, false);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unable to execute command"));
    }

    #[test]
    fn test_launch_failure_downgraded_under_should() {
        let result =
            probe_command(&spec("pngquant-batch-missing"), ProcessPolicy::Should, false).unwrap();
        assert_eq!(result, Availability::Unavailable);
    }

    #[cfg(unix)]
    #[test]
    fn test_version_on_stderr_with_exit_1_is_available() {
        let dir = script_dir("version");
        let tool = write_script(
            &dir,
            "fake-pngquant",
            "#!/bin/sh\necho \"pngquant, version 1.0.4, by Greg Roelofs\" >&2\nexit 1\n",
        );

        let result = probe_command(
            &spec(tool.to_str().unwrap()),
            ProcessPolicy::Must,
            false,
        )
        .unwrap();
        assert_eq!(
            result,
            Availability::Available {
                version: "1.0.4".to_string()
            }
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_disallowed_exit_code_fatal_under_must() {
        let dir = script_dir("exitcode");
        let tool = write_script(&dir, "fake-pngquant", "#!/bin/sh\nexit 2\n");

        let must = probe_command(&spec(tool.to_str().unwrap()), ProcessPolicy::Must, false);
        assert!(must.is_err());

        let should =
            probe_command(&spec(tool.to_str().unwrap()), ProcessPolicy::Should, false).unwrap();
        assert_eq!(should, Availability::Unavailable);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_version_token_never_fatal() {
        let dir = script_dir("noversion");
        let tool = write_script(
            &dir,
            "fake-pngquant",
            "#!/bin/sh\necho \"usage: no digits here\" >&2\nexit 1\n",
        );

        // Even under MUST: tool presence alone does not satisfy the policy,
        // but missing version output downgrades rather than aborts.
        let result =
            probe_command(&spec(tool.to_str().unwrap()), ProcessPolicy::Must, false).unwrap();
        assert_eq!(result, Availability::Unavailable);

        let _ = std::fs::remove_dir_all(&dir);
    }
}

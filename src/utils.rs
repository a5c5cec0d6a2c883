use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Check that a path refers to an existing directory with the required access.
///
/// Violations are configuration errors surfaced before any file is touched.
pub fn check_dir(
    description: &str,
    path: &Path,
    must_be_readable: bool,
    must_be_writable: bool,
) -> Result<()> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} (\"{}\") does not exist.",
            description,
            path.display()
        ));
    }
    if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "{} (\"{}\") is not a directory.",
            description,
            path.display()
        ));
    }
    if must_be_readable && std::fs::read_dir(path).is_err() {
        return Err(anyhow::anyhow!(
            "{} (\"{}\") is not readable.",
            description,
            path.display()
        ));
    }
    if must_be_writable {
        let probe = path.join(format!(".pngquant_batch_write_check_{}", std::process::id()));
        match std::fs::File::create(&probe) {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
            }
            Err(_) => {
                return Err(anyhow::anyhow!(
                    "{} (\"{}\") is not writable.",
                    description,
                    path.display()
                ));
            }
        }
    }
    Ok(())
}

/// Check if a filename ends in ".png" (case-insensitive)
pub fn has_png_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".png")
}

/// Generate a unique temporary file path with the given prefix and extension.
///
/// Uniqueness matters because multiple task instances may share the same
/// temp directory across runs.
pub fn unique_temp_path(prefix: &str, extension: &str) -> PathBuf {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();

    std::env::temp_dir().join(format!("{}_{}_{}.{}", prefix, pid, timestamp, extension))
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_has_png_extension() {
        assert!(has_png_extension("image.png"));
        assert!(has_png_extension("image.PNG"));
        assert!(has_png_extension("image.PnG"));
        assert!(!has_png_extension("image.jpg"));
        assert!(!has_png_extension("image.JPG"));
        assert!(!has_png_extension("imagepng"));
        assert!(!has_png_extension("image.png.bak"));
    }

    #[test]
    fn test_unique_temp_path_is_unique() {
        let a = unique_temp_path("pngquant_batch_in", "png");
        let b = unique_temp_path("pngquant_batch_in", "png");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".png"));
    }

    #[test]
    fn test_check_dir_missing() {
        let missing = std::env::temp_dir().join("pngquant_batch_no_such_dir_xyz");
        let result = check_dir("Source directory", &missing, true, false);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_check_dir_not_a_directory() {
        let file_path = unique_temp_path("pngquant_batch_checkdir", "tmp");
        std::fs::write(&file_path, b"x").unwrap();
        let result = check_dir("Source directory", &file_path, true, false);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("is not a directory"));
        let _ = std::fs::remove_file(&file_path);
    }

    #[test]
    fn test_check_dir_ok() {
        let dir = std::env::temp_dir();
        assert!(check_dir("Temp directory", &dir, true, true).is_ok());
    }
}

//! Filename conventions shared with the external tool.
//!
//! pngquant writes its result next to the input file under a name derived
//! from the input filename. That convention is a contract with a specific
//! tool version, so it lives behind these functions and nowhere else.

use std::path::{Path, PathBuf};

/// Path pngquant writes its output to for a given input: the input's stem
/// with a fixed "-fs8.png" suffix, the original extension dropped.
pub fn quantized_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    input.with_file_name(format!("{}-fs8.png", stem))
}

/// Destination filename for a source-relative path: the trailing alphabetic
/// extension is replaced with ".png". Paths without such an extension are
/// left unchanged.
pub fn dest_file_name(rel_name: &str) -> String {
    if let Some(idx) = rel_name.rfind('.') {
        let ext = &rel_name[idx + 1..];
        if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) {
            return format!("{}.png", &rel_name[..idx]);
        }
    }
    rel_name.to_string()
}

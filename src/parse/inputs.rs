// src/parse/inputs.rs

//! Raw input discovery.
//!
//! A step's output postfix may end in a file-name glob (e.g.
//! `cpu_profile/*`). Only the last path component may contain glob
//! characters; the directory part is taken literally.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Files matching `pattern`, sorted by path.
///
/// A pattern without glob characters yields itself if it is an existing
/// file. A missing directory yields nothing.
pub fn expand(pattern: &Path) -> Result<Vec<PathBuf>> {
    let file_pattern = match pattern.file_name().and_then(|s| s.to_str()) {
        Some(name) if has_glob_chars(name) => name,
        _ => {
            return Ok(if pattern.is_file() {
                vec![pattern.to_path_buf()]
            } else {
                Vec::new()
            });
        }
    };

    let dir = pattern.parent().unwrap_or_else(|| Path::new("."));
    let matcher = Glob::new(file_pattern)
        .with_context(|| format!("invalid input pattern {:?}", pattern))?
        .compile_matcher();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("listing dir {:?}", dir)),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing dir {:?}", dir))?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

/// [`expand`] a postfix relative to `base`.
pub fn expand_under(base: &Path, postfix: &str) -> Result<Vec<PathBuf>> {
    expand(&base.join(postfix))
}

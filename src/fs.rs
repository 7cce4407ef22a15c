// src/fs.rs

//! Small filesystem helpers shared by the storage and view layers.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Write `contents` to `path` so readers never observe a partial file.
///
/// Parent directories are created. The data goes to a hidden sibling first
/// and is renamed into place.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{:?} has no parent directory", path))?;
    fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = parent.join(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file = fs::File::create(&tmp).with_context(|| format!("creating file {:?}", tmp))?;
    file.write_all(contents)
        .with_context(|| format!("writing to file {:?}", tmp))?;
    file.sync_all()
        .with_context(|| format!("syncing file {:?}", tmp))?;

    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", tmp, path))?;
    Ok(())
}

// Filesystem helpers shared by the data store, cache buckets and key-value backends.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Write bytes to `path` atomically via a sibling temp file.
/// Readers either see the previous contents or the new ones, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

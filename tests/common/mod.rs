pub mod synthetic;

use std::{fs, path::PathBuf};

/// Fresh, empty directory under the system temp dir, unique per test binary.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("thumbnails-it-{}-{name}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).expect("scratch dir should be removable");
    }
    fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

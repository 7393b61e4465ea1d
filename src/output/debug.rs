use std::path::{Path, PathBuf};

/// Saves the body of a blocked response for later inspection
///
/// Files are named `<prefix>_<unix-seconds>.html`; a numeric suffix keeps
/// two captures within the same second apart.
pub fn save_debug_page(dir: &Path, prefix: &str, body: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Utc::now().timestamp();

    let mut path = dir.join(format!("{}_{}.html", prefix, stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}_{}.html", prefix, stamp, n));
        n += 1;
    }

    std::fs::write(&path, body)?;
    Ok(path)
}

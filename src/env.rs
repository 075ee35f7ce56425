use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub fn load_dotenv(root: &Path) -> anyhow::Result<Option<PathBuf>> {
    let mut candidates = vec![root.join(".env")];
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(".env"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".env"));
    }

    let Some(path) = candidates.into_iter().find(|p| p.is_file()) else {
        return Ok(None);
    };

    dotenvy::from_path(&path).with_context(|| format!("load env file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded env file");
    Ok(Some(path))
}

pub fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    })
}

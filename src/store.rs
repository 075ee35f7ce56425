use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cli::LayoutArgs;

pub const CANDIDATES_FILE: &str = "candidates.json";
pub const CONSOLIDATED_FILE: &str = "candidates_consolidated.json";
pub const REMOVED_FILE: &str = "subjects_removed.json";
pub const PASS1_RESULTS_FILE: &str = "pass1_raw_results.json";
pub const PASS2_RESULTS_FILE: &str = "pass2_raw_results.json";
pub const FINAL_INDEX_FILE: &str = "final_index.json";
pub const LATEX_FILE: &str = "subject_index_new.tex";

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub out_dir: PathBuf,
}

impl Workspace {
    pub fn from_args(args: &LayoutArgs) -> Self {
        let root = PathBuf::from(&args.root);
        let out_dir = args
            .out_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join("index"));
        Self { root, out_dir }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }

    pub fn ensure_out_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("create output dir: {}", self.out_dir.display()))
    }
}

pub fn require_file(path: &Path, produced_by: &str) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!(
            "{} not found; run `bookindex {produced_by}` first",
            path.display()
        );
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    json.push('\n');
    write_text(path, &json)
}

/// Writes through a temp file in the same directory, so readers never see a
/// partial file.
pub fn write_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create output dir: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| anyhow::anyhow!("replace {}: {}", path.display(), err.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

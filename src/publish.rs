use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::chapters;
use crate::cli::RegenerateArgs;
use crate::formats::{CandidateEntry, ChapterRecord, ClassificationTag};
use crate::index::SubjectIndex;
use crate::render;
use crate::store::{self, Workspace};

pub fn approved_path(workspace: &Workspace, approved: Option<&str>) -> PathBuf {
    approved
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.path(store::CANDIDATES_FILE))
}

pub fn load_approved(path: &Path) -> anyhow::Result<Vec<CandidateEntry>> {
    store::require_file(path, "extract")?;
    let entries: Vec<CandidateEntry> = store::read_json(path)?;
    let approved = entries
        .into_iter()
        .filter(|e| e.include && !e.subject.trim().is_empty())
        .collect::<Vec<_>>();
    if approved.is_empty() {
        anyhow::bail!("no approved subjects in {}", path.display());
    }
    Ok(approved)
}

pub fn publish(
    workspace: &Workspace,
    records: &[ChapterRecord<ClassificationTag>],
    approved: &[CandidateEntry],
) -> anyhow::Result<SubjectIndex> {
    let (index, stats) = SubjectIndex::build(records, approved);
    tracing::info!(
        tags = stats.tags,
        exact = stats.exact,
        substring = stats.substring,
        dropped = stats.dropped,
        failed_chapters = stats.failed_chapters,
        subjects = index.len(),
        "built subject index"
    );

    workspace.ensure_out_dir()?;
    let index_path = workspace.path(store::FINAL_INDEX_FILE);
    store::write_json(&index_path, &index.to_json_map())?;

    let labels = chapter_labels(&workspace.root, records)?;
    let latex = render::render_latex(&index, &labels);
    let latex_path = workspace.path(store::LATEX_FILE);
    store::write_text(&latex_path, &latex)?;

    tracing::info!(
        index = %index_path.display(),
        latex = %latex_path.display(),
        labels = labels.len(),
        "wrote subject index"
    );
    Ok(index)
}

fn chapter_labels(
    root: &Path,
    records: &[ChapterRecord<ClassificationTag>],
) -> anyhow::Result<BTreeMap<u32, String>> {
    let by_dir = chapters::read_chapter_labels(root)?;
    if by_dir.is_empty() {
        tracing::debug!(root = %root.display(), "no chapter labels; using chapter numbers");
    }
    Ok(records
        .iter()
        .filter_map(|r| {
            by_dir
                .get(&r.chapter_dir)
                .map(|label| (r.chapter_num, label.clone()))
        })
        .collect())
}

pub fn regenerate(args: RegenerateArgs) -> anyhow::Result<()> {
    let workspace = Workspace::from_args(&args.layout);
    let results_path = workspace.path(store::PASS2_RESULTS_FILE);
    store::require_file(&results_path, "classify")?;
    let records: Vec<ChapterRecord<ClassificationTag>> = store::read_json(&results_path)
        .with_context(|| format!("load pass-2 results: {}", results_path.display()))?;

    let approved = load_approved(&approved_path(&workspace, args.approved.as_deref()))?;
    tracing::info!(
        chapters = records.len(),
        approved = approved.len(),
        "regenerating index from saved results"
    );
    publish(&workspace, &records, &approved)?;
    Ok(())
}

use std::sync::Arc;

use anyhow::Context as _;

use crate::chapters::{self, Chapter, LatexCleaner};
use crate::cli::ClassifyArgs;
use crate::fanout::{self, PoolLimits};
use crate::formats::{CandidateEntry, ChapterRecord, ClassificationTag};
use crate::model::{self, ModelClient};
use crate::prompts;
use crate::publish;
use crate::store::{self, Workspace};

pub async fn run(args: ClassifyArgs) -> anyhow::Result<()> {
    let workspace = Workspace::from_args(&args.layout);
    let approved =
        publish::load_approved(&publish::approved_path(&workspace, args.approved.as_deref()))?;
    let client = model::connect(&args.model).context("connect model")?;

    let chapters = chapters::discover(&workspace.root)?;
    if chapters.is_empty() {
        anyhow::bail!(
            "no chapter directories (NN_name) found under {}",
            workspace.root.display()
        );
    }
    workspace.ensure_out_dir()?;

    tracing::info!(
        chapters = chapters.len(),
        approved = approved.len(),
        "pass 2: classifying chapters"
    );
    let vocabulary = vocabulary_text(&approved);
    let records = classify_all(
        client,
        chapters,
        vocabulary,
        PoolLimits::from_args(&args.model),
    )
    .await?;

    let raw_path = workspace.path(store::PASS2_RESULTS_FILE);
    store::write_json(&raw_path, &records)?;
    tracing::info!(path = %raw_path.display(), "saved raw pass-2 results");

    publish::publish(&workspace, &records, &approved)?;
    Ok(())
}

pub async fn classify_all(
    client: Arc<dyn ModelClient>,
    chapters: Vec<Chapter>,
    vocabulary: String,
    limits: PoolLimits,
) -> anyhow::Result<Vec<ChapterRecord<ClassificationTag>>> {
    let cleaner = Arc::new(LatexCleaner::new()?);
    let vocabulary = Arc::new(vocabulary);

    let outcomes = fanout::run_all("classify", chapters.clone(), limits, move |chapter| {
        let client = Arc::clone(&client);
        let cleaner = Arc::clone(&cleaner);
        let vocabulary = Arc::clone(&vocabulary);
        async move {
            let content = chapter.read_content(&cleaner)?;
            let reply = client
                .generate(&prompts::classification(&vocabulary, &content))
                .await
                .context("call model")?;
            let tags: Vec<ClassificationTag> = model::parse_json_reply(&reply)?;
            Ok::<_, anyhow::Error>(tags)
        }
    })
    .await?;

    let mut records = chapters
        .into_iter()
        .zip(outcomes)
        .map(|(chapter, outcome)| {
            match &outcome {
                Ok(tags) => tracing::info!(
                    chapter = chapter.num,
                    dir = %chapter.name,
                    tags = tags.len(),
                    "classified"
                ),
                Err(err) => tracing::warn!(
                    chapter = chapter.num,
                    dir = %chapter.name,
                    error = %format!("{err:#}"),
                    "classification failed"
                ),
            }
            ChapterRecord::from_result(chapter.num, chapter.name, outcome)
        })
        .collect::<Vec<_>>();
    records.sort_by_key(|r| r.chapter_num);
    Ok(records)
}

pub fn vocabulary_text(approved: &[CandidateEntry]) -> String {
    approved
        .iter()
        .map(|entry| {
            let subject = entry.subject.trim();
            let subtopics = entry
                .subtopics
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if subtopics.is_empty() {
                format!("• {subject}")
            } else {
                format!("• {subject}: {}", subtopics.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

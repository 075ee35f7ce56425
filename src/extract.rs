use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context as _;

use crate::chapters::{self, LatexCleaner};
use crate::cli::ExtractArgs;
use crate::fanout::{self, PoolLimits};
use crate::formats::{CandidateEntry, ChapterRecord, ExtractionResponse, SubjectEntry};
use crate::model::{self, ModelClient};
use crate::prompts;
use crate::store::{self, Workspace};

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let workspace = Workspace::from_args(&args.layout);
    let client = model::connect(&args.model).context("connect model")?;

    let chapters = chapters::discover(&workspace.root)?;
    if chapters.is_empty() {
        anyhow::bail!(
            "no chapter directories (NN_name) found under {}",
            workspace.root.display()
        );
    }
    workspace.ensure_out_dir()?;

    tracing::info!(chapters = chapters.len(), "pass 1: extracting candidate subjects");
    let records = extract_all(client, chapters, PoolLimits::from_args(&args.model)).await?;

    let raw_path = workspace.path(store::PASS1_RESULTS_FILE);
    store::write_json(&raw_path, &records)?;
    tracing::info!(path = %raw_path.display(), "saved raw pass-1 results");

    let candidates = aggregate_candidates(&records);
    let candidates_path = workspace.path(store::CANDIDATES_FILE);
    store::write_json(&candidates_path, &candidates)?;

    let failed = records.iter().filter(|r| r.is_err()).count();
    tracing::info!(
        path = %candidates_path.display(),
        subjects = candidates.len(),
        failed_chapters = failed,
        "saved candidates; review them (set \"include\": false to drop), then run `bookindex consolidate` or `bookindex classify`"
    );
    Ok(())
}

pub async fn extract_all(
    client: Arc<dyn ModelClient>,
    chapters: Vec<chapters::Chapter>,
    limits: PoolLimits,
) -> anyhow::Result<Vec<ChapterRecord<SubjectEntry>>> {
    let cleaner = Arc::new(LatexCleaner::new()?);

    let outcomes = fanout::run_all("extract", chapters.clone(), limits, move |chapter| {
        let client = Arc::clone(&client);
        let cleaner = Arc::clone(&cleaner);
        async move {
            let content = chapter.read_content(&cleaner)?;
            let reply = client
                .generate(&prompts::extraction(&content))
                .await
                .context("call model")?;
            let parsed: ExtractionResponse = model::parse_json_reply(&reply)?;
            Ok::<_, anyhow::Error>(parsed.subjects)
        }
    })
    .await?;

    let mut records = chapters
        .into_iter()
        .zip(outcomes)
        .map(|(chapter, outcome)| {
            match &outcome {
                Ok(subjects) => tracing::info!(
                    chapter = chapter.num,
                    dir = %chapter.name,
                    subjects = subjects.len(),
                    "extracted"
                ),
                Err(err) => tracing::warn!(
                    chapter = chapter.num,
                    dir = %chapter.name,
                    error = %format!("{err:#}"),
                    "extraction failed"
                ),
            }
            ChapterRecord::from_result(chapter.num, chapter.name, outcome)
        })
        .collect::<Vec<_>>();
    records.sort_by_key(|r| r.chapter_num);
    Ok(records)
}

pub fn aggregate_candidates(records: &[ChapterRecord<SubjectEntry>]) -> Vec<CandidateEntry> {
    let mut merged: BTreeMap<String, (String, BTreeSet<String>)> = BTreeMap::new();

    for record in records {
        for entry in &record.entries {
            let subject = entry.subject.trim();
            if subject.is_empty() {
                continue;
            }
            let (_, subtopics) = merged
                .entry(subject.to_lowercase())
                .or_insert_with(|| (subject.to_owned(), BTreeSet::new()));
            subtopics.extend(
                entry
                    .subtopics
                    .iter()
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty()),
            );
        }
    }

    merged
        .into_values()
        .map(|(subject, subtopics)| CandidateEntry {
            subject,
            subtopics: subtopics.into_iter().collect(),
            include: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject: &str, subtopics: &[&str]) -> SubjectEntry {
        SubjectEntry {
            subject: subject.to_owned(),
            subtopics: subtopics.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn record(chapter_num: u32, entries: Vec<SubjectEntry>) -> ChapterRecord<SubjectEntry> {
        ChapterRecord {
            chapter_num,
            chapter_dir: format!("{chapter_num:02}_chapter"),
            entries,
            error: None,
        }
    }

    #[test]
    fn duplicate_subjects_merge_case_insensitively() {
        let records = vec![
            record(1, vec![entry("Gravity", &["Tides", "orbits"])]),
            record(2, vec![entry(" gravity ", &["tides", "escape velocity", ""])]),
        ];

        let candidates = aggregate_candidates(&records);
        assert_eq!(
            candidates,
            vec![CandidateEntry {
                subject: "Gravity".to_owned(),
                subtopics: vec![
                    "escape velocity".to_owned(),
                    "orbits".to_owned(),
                    "tides".to_owned()
                ],
                include: true,
            }]
        );
    }

    #[test]
    fn aggregation_ignores_input_order_for_subtopics() {
        let a = record(1, vec![entry("Optics", &["lenses"]), entry("optics", &["prisms"])]);
        let b = record(1, vec![entry("Optics", &["prisms"]), entry("Optics", &["Lenses"])]);

        let left = aggregate_candidates(std::slice::from_ref(&a));
        let right = aggregate_candidates(std::slice::from_ref(&b));
        assert_eq!(left, right);
        assert_eq!(aggregate_candidates(&[a.clone(), a]), left);
    }

    #[test]
    fn output_is_sorted_by_lowercased_subject_and_skips_blanks() {
        let records = vec![record(
            1,
            vec![entry("banana", &[]), entry("  ", &["x"]), entry("Apple", &[])],
        )];

        let subjects = aggregate_candidates(&records)
            .into_iter()
            .map(|c| c.subject)
            .collect::<Vec<_>>();
        assert_eq!(subjects, vec!["Apple", "banana"]);
    }
}

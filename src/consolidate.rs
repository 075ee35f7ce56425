use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::ConsolidateArgs;
use crate::fanout::{self, PoolLimits};
use crate::formats::{CandidateEntry, ConsolidationResponse};
use crate::model::{self, ModelClient};
use crate::prompts;
use crate::store::{self, Workspace};

pub const MAX_SUBTOPICS: usize = 8;

pub async fn run(args: ConsolidateArgs) -> anyhow::Result<()> {
    if args.batch_size == 0 {
        anyhow::bail!("--batch-size must be > 0");
    }

    let workspace = Workspace::from_args(&args.layout);
    let candidates_path = workspace.path(store::CANDIDATES_FILE);
    store::require_file(&candidates_path, "extract")?;
    let candidates: Vec<CandidateEntry> = store::read_json(&candidates_path)?;

    let included = candidates
        .into_iter()
        .filter(|c| c.include)
        .collect::<Vec<_>>();
    if included.is_empty() {
        anyhow::bail!(
            "no included subjects in {}; set \"include\": true for subjects to keep",
            candidates_path.display()
        );
    }

    let client = model::connect(&args.model).context("connect model")?;
    let batches = included
        .chunks(args.batch_size)
        .map(|chunk| chunk.iter().map(|c| c.subject.clone()).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    tracing::info!(
        subjects = included.len(),
        batches = batches.len(),
        batch_size = args.batch_size,
        "consolidating subjects"
    );

    let responses =
        consolidate_batches(client, batches, PoolLimits::from_args(&args.model)).await?;
    let (consolidated, removed) = merge_batches(responses);

    let consolidated_path = workspace.path(store::CONSOLIDATED_FILE);
    store::write_json(&consolidated_path, &consolidated)?;
    let removed_path = workspace.path(store::REMOVED_FILE);
    store::write_json(&removed_path, &removed)?;

    tracing::info!(
        path = %consolidated_path.display(),
        subjects = consolidated.len(),
        subtopics = consolidated.iter().map(|c| c.subtopics.len()).sum::<usize>(),
        removed = removed.len(),
        "saved consolidated subjects; review them and copy over candidates.json before `bookindex classify`"
    );
    Ok(())
}

pub async fn consolidate_batches(
    client: Arc<dyn ModelClient>,
    batches: Vec<Vec<String>>,
    limits: PoolLimits,
) -> anyhow::Result<Vec<ConsolidationResponse>> {
    let outcomes = fanout::run_all("consolidate", batches.clone(), limits, move |batch| {
        let client = Arc::clone(&client);
        async move {
            let subjects_json =
                serde_json::to_string_pretty(&batch).context("serialize subject batch")?;
            let prompt = prompts::consolidation(batch.len(), &subjects_json);
            let reply = client.generate(&prompt).await.context("call model")?;
            model::parse_json_reply::<ConsolidationResponse>(&reply)
        }
    })
    .await?;

    let responses = batches
        .iter()
        .zip(outcomes)
        .enumerate()
        .map(|(idx, (batch, outcome))| match outcome {
            Ok(response) => {
                tracing::info!(
                    batch = idx + 1,
                    subjects = batch.len(),
                    consolidated = response.consolidated.len(),
                    merged = response
                        .consolidated
                        .iter()
                        .map(|c| c.merged_from.len())
                        .sum::<usize>(),
                    removed = response.removed.len(),
                    "batch consolidated"
                );
                response
            }
            Err(err) => {
                let sample = batch.iter().take(5).cloned().collect::<Vec<_>>();
                tracing::warn!(
                    batch = idx + 1,
                    dropped_subjects = batch.len(),
                    dropped_sample = ?sample,
                    error = %format!("{err:#}"),
                    "consolidation batch failed; its subjects are missing from the output"
                );
                ConsolidationResponse::default()
            }
        })
        .collect();
    Ok(responses)
}

pub fn merge_batches(responses: Vec<ConsolidationResponse>) -> (Vec<CandidateEntry>, Vec<String>) {
    let mut merged: BTreeMap<String, (String, BTreeMap<String, String>)> = BTreeMap::new();
    let mut removed = BTreeSet::new();

    for response in responses {
        for item in response.consolidated {
            let subject = item.subject.trim();
            if subject.is_empty() {
                continue;
            }
            let (_, subtopics) = merged
                .entry(subject.to_lowercase())
                .or_insert_with(|| (subject.to_owned(), BTreeMap::new()));
            for subtopic in &item.subtopics {
                let subtopic = subtopic.trim();
                if subtopic.is_empty() {
                    continue;
                }
                subtopics
                    .entry(subtopic.to_lowercase())
                    .or_insert_with(|| subtopic.to_owned());
            }
        }
        removed.extend(
            response
                .removed
                .into_iter()
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
        );
    }

    let consolidated = merged
        .into_values()
        .map(|(subject, subtopics)| CandidateEntry {
            subject,
            subtopics: subtopics.into_values().take(MAX_SUBTOPICS).collect(),
            include: true,
        })
        .collect();
    (consolidated, removed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ConsolidatedSubject;

    fn consolidated(subject: &str, subtopics: &[&str]) -> ConsolidatedSubject {
        ConsolidatedSubject {
            subject: subject.to_owned(),
            subtopics: subtopics.iter().map(|s| (*s).to_owned()).collect(),
            merged_from: Vec::new(),
        }
    }

    #[test]
    fn subjects_from_different_batches_merge() {
        let responses = vec![
            ConsolidationResponse {
                consolidated: vec![consolidated("Quantum mechanics", &["tunneling", "spin"])],
                removed: vec!["QM".to_owned()],
            },
            ConsolidationResponse {
                consolidated: vec![consolidated("quantum Mechanics ", &["Spin", "entanglement"])],
                removed: vec!["QM".to_owned(), "Quantum theory".to_owned()],
            },
        ];

        let (subjects, removed) = merge_batches(responses);
        assert_eq!(
            subjects,
            vec![CandidateEntry {
                subject: "Quantum mechanics".to_owned(),
                subtopics: vec![
                    "entanglement".to_owned(),
                    "spin".to_owned(),
                    "tunneling".to_owned()
                ],
                include: true,
            }]
        );
        assert_eq!(removed, vec!["QM", "Quantum theory"]);
    }

    #[test]
    fn subtopics_are_capped_deterministically() {
        let many = ["j", "i", "h", "g", "f", "e", "d", "c", "b", "a"];
        let (subjects, _) = merge_batches(vec![ConsolidationResponse {
            consolidated: vec![consolidated("Letters", &many)],
            removed: Vec::new(),
        }]);

        assert_eq!(
            subjects[0].subtopics,
            vec!["a", "b", "c", "d", "e", "f", "g", "h"]
        );
    }

    #[test]
    fn failed_batches_contribute_nothing() {
        let (subjects, removed) = merge_batches(vec![
            ConsolidationResponse::default(),
            ConsolidationResponse {
                consolidated: vec![consolidated("Optics", &[])],
                removed: Vec::new(),
            },
        ]);
        assert_eq!(subjects.len(), 1);
        assert!(removed.is_empty());
    }

    struct Scripted;

    #[async_trait::async_trait]
    impl ModelClient for Scripted {
        fn describe(&self) -> String {
            "scripted".to_owned()
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            if prompt.contains("\"Broken\"") {
                anyhow::bail!("batch rejected");
            }
            Ok(r#"{"consolidated":[{"subject":"Gravity","subtopics":["tides"],"merged_from":["Gravitation","Weight"]}],"removed":["Weight"]}"#.to_owned())
        }
    }

    #[tokio::test]
    async fn batch_replies_keep_merge_provenance_and_failures_stay_empty() -> anyhow::Result<()> {
        let limits = PoolLimits {
            concurrency: 2,
            timeout: std::time::Duration::from_secs(5),
            retries: 0,
        };
        let batches = vec![
            vec!["Gravitation".to_owned(), "Weight".to_owned()],
            vec!["Broken".to_owned()],
        ];

        let responses = consolidate_batches(Arc::new(Scripted), batches, limits).await?;

        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0].consolidated[0].merged_from,
            vec!["Gravitation", "Weight"]
        );
        assert_eq!(responses[1], ConsolidationResponse::default());
        Ok(())
    }

    #[test]
    fn output_is_sorted_by_lowercased_subject() {
        let (subjects, _) = merge_batches(vec![ConsolidationResponse {
            consolidated: vec![
                consolidated("waves", &[]),
                consolidated("Entropy", &[]),
                consolidated("atoms", &[]),
            ],
            removed: Vec::new(),
        }]);
        let names = subjects.into_iter().map(|s| s.subject).collect::<Vec<_>>();
        assert_eq!(names, vec!["atoms", "Entropy", "waves"]);
    }
}

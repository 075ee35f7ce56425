use std::collections::{BTreeMap, BTreeSet};

use crate::formats::{CandidateEntry, ChapterRecord, ClassificationTag};

pub const KEEP_COMBINED: [&str; 3] = ["fields and forces", "formalism & notation", "error and bias"];

pub const NULL_SUBTOPIC_KEY: &str = "None";

const SPLIT_SEPARATOR: &str = " and ";

pub type ChapterSet = BTreeSet<u32>;
pub type SubtopicMap = BTreeMap<Option<String>, ChapterSet>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Exact(&'a str),
    Substring(&'a str),
    Dropped,
}

impl<'a> Resolution<'a> {
    pub fn subject(self) -> Option<&'a str> {
        match self {
            Resolution::Exact(s) | Resolution::Substring(s) => Some(s),
            Resolution::Dropped => None,
        }
    }
}

pub struct SubjectResolver<'a> {
    approved: Vec<(&'a str, String)>,
}

impl<'a> SubjectResolver<'a> {
    pub fn new(approved: &'a [CandidateEntry]) -> Self {
        let approved = approved
            .iter()
            .map(|entry| entry.subject.trim())
            .filter(|subject| !subject.is_empty())
            .map(|subject| (subject, subject.to_lowercase()))
            .collect();
        Self { approved }
    }

    /// Exact case-insensitive match first; otherwise the first approved
    /// subject (in list order) that contains, or is contained in, the tag.
    pub fn resolve(&self, tagged: &str) -> Resolution<'a> {
        let tagged = tagged.trim().to_lowercase();
        if tagged.is_empty() {
            return Resolution::Dropped;
        }

        if let Some((canonical, _)) = self.approved.iter().find(|(_, lower)| *lower == tagged) {
            return Resolution::Exact(*canonical);
        }

        self.approved
            .iter()
            .find(|(_, lower)| {
                lower.contains(tagged.as_str()) || tagged.contains(lower.as_str())
            })
            .map_or(Resolution::Dropped, |(canonical, _)| {
                Resolution::Substring(*canonical)
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub tags: usize,
    pub exact: usize,
    pub substring: usize,
    pub dropped: usize,
    pub failed_chapters: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectIndex {
    subjects: BTreeMap<String, SubtopicMap>,
}

impl SubjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        records: &[ChapterRecord<ClassificationTag>],
        approved: &[CandidateEntry],
    ) -> (Self, BuildStats) {
        let resolver = SubjectResolver::new(approved);
        let mut index = Self::new();
        let mut stats = BuildStats::default();

        for record in records {
            if record.is_err() {
                stats.failed_chapters += 1;
                continue;
            }
            for tag in &record.entries {
                if tag.subject.trim().is_empty() {
                    continue;
                }
                stats.tags += 1;
                let resolution = resolver.resolve(&tag.subject);
                match resolution {
                    Resolution::Exact(_) => stats.exact += 1,
                    Resolution::Substring(_) => stats.substring += 1,
                    Resolution::Dropped => {
                        stats.dropped += 1;
                        tracing::debug!(
                            chapter = record.chapter_num,
                            subject = %tag.subject,
                            "tag does not match an approved subject; dropping"
                        );
                    }
                }
                if let Some(subject) = resolution.subject() {
                    index.insert(subject, tag.subtopic.as_deref(), record.chapter_num);
                }
            }
        }

        index.split_compound_subtopics();
        (index, stats)
    }

    pub fn insert(&mut self, subject: &str, subtopic: Option<&str>, chapter: u32) {
        let key = subtopic
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self.subjects
            .entry(subject.to_owned())
            .or_default()
            .entry(key)
            .or_default()
            .insert(chapter);
    }

    /// Splits every subtopic containing `" and "` into its trimmed parts,
    /// unless it is one of [`KEEP_COMBINED`]. Parts inherit the original
    /// chapters and merge with existing keys; the combined key disappears.
    /// Produced parts are not split again.
    pub fn split_compound_subtopics(&mut self) {
        for subtopics in self.subjects.values_mut() {
            let mut rebuilt = SubtopicMap::new();
            for (key, chapters) in std::mem::take(subtopics) {
                for target in split_targets(key) {
                    rebuilt
                        .entry(target)
                        .or_default()
                        .extend(chapters.iter().copied());
                }
            }
            *subtopics = rebuilt;
        }
    }

    pub fn get(&self, subject: &str) -> Option<&SubtopicMap> {
        self.subjects.get(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubtopicMap)> {
        self.subjects.iter()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn to_json_map(&self) -> BTreeMap<String, BTreeMap<String, Vec<u32>>> {
        self.subjects
            .iter()
            .map(|(subject, subtopics)| {
                let inner = subtopics
                    .iter()
                    .map(|(key, chapters)| {
                        let key = key.clone().unwrap_or_else(|| NULL_SUBTOPIC_KEY.to_owned());
                        (key, chapters.iter().copied().collect())
                    })
                    .collect();
                (subject.clone(), inner)
            })
            .collect()
    }
}

fn is_kept_compound(key: &str) -> bool {
    KEEP_COMBINED.iter().any(|kept| kept.eq_ignore_ascii_case(key))
}

fn split_targets(key: Option<String>) -> Vec<Option<String>> {
    let Some(text) = key else {
        return vec![None];
    };
    if is_kept_compound(&text) || !text.contains(SPLIT_SEPARATOR) {
        return vec![Some(text)];
    }

    let parts = text
        .split(SPLIT_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Some(part.to_owned()))
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return vec![Some(text)];
    }
    parts
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub subject: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEntry {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTag {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub subtopic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord<T> {
    pub chapter_num: u32,
    pub chapter_dir: String,
    #[serde(alias = "subjects", default = "Vec::new")]
    pub entries: Vec<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ChapterRecord<T> {
    pub fn from_result(
        chapter_num: u32,
        chapter_dir: String,
        result: anyhow::Result<Vec<T>>,
    ) -> Self {
        match result {
            Ok(entries) => Self {
                chapter_num,
                chapter_dir,
                entries,
                error: None,
            },
            Err(err) => Self {
                chapter_num,
                chapter_dir,
                entries: Vec::new(),
                error: Some(format!("{err:#}")),
            },
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedSubject {
    pub subject: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub merged_from: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationResponse {
    #[serde(default)]
    pub consolidated: Vec<ConsolidatedSubject>,
    #[serde(default)]
    pub removed: Vec<String>,
}

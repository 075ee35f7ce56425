use std::collections::{BTreeMap, BTreeSet};

use crate::index::{ChapterSet, SubjectIndex, SubtopicMap};

const PREAMBLE: [&str; 12] = [
    "% Subject Index",
    "% Generated by bookindex",
    "% Two-pass extraction (candidate extraction + classification)",
    "",
    "\\chapter*{Subject Index}",
    "\\markboth{SUBJECT INDEX}{SUBJECT INDEX}",
    "\\addcontentsline{toc}{chapter}{Subject Index}",
    "",
    "\\begin{multicols}{2}",
    "\\small",
    "\\setlength{\\parskip}{0.3em}",
    "",
];

const SUBTOPIC_INDENT: &str = "\\hspace*{1.5em}";

pub fn render_latex(index: &SubjectIndex, labels: &BTreeMap<u32, String>) -> String {
    let mut lines = PREAMBLE.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();

    let mut subjects = index.iter().collect::<Vec<_>>();
    subjects.sort_by_cached_key(|(subject, _)| subject.to_lowercase());

    let mut current_letter: Option<String> = None;
    for (subject, subtopics) in subjects {
        let letter = section_letter(subject);
        if current_letter.as_deref() != Some(letter.as_str()) {
            if current_letter.is_some() {
                lines.push(String::new());
            }
            lines.push(format!("\\noindent\\textbf{{{letter}}}\\\\[0.3em]"));
            current_letter = Some(letter);
        }
        render_subject(&mut lines, subject, subtopics, labels);
    }

    lines.push(String::new());
    lines.push("\\end{multicols}".to_owned());
    lines.push(String::new());
    lines.join("\n")
}

fn section_letter(subject: &str) -> String {
    subject
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_owned())
}

fn render_subject(
    lines: &mut Vec<String>,
    subject: &str,
    subtopics: &SubtopicMap,
    labels: &BTreeMap<u32, String>,
) {
    let name = escape(subject);
    let subject_level = subtopics.get(&None);
    let named = subtopics
        .iter()
        .filter_map(|(key, chapters)| key.as_deref().map(|key| (key, chapters)))
        .collect::<Vec<_>>();

    if named.is_empty() {
        let all = subtopics.values().flatten().copied().collect::<ChapterSet>();
        lines.push(format!("\\textbf{{{name}}}, {}\\\\", references(&all, labels)));
        return;
    }

    let mut groups: BTreeMap<&ChapterSet, BTreeSet<&str>> = BTreeMap::new();
    for (key, chapters) in &named {
        groups.entry(*chapters).or_default().insert(*key);
    }

    if let Some((shared, keys)) = single_group(&groups)
        && subject_level.is_none_or(|chapters| chapters == shared)
    {
        let merged = keys.iter().map(|k| escape(k)).collect::<Vec<_>>().join(", ");
        lines.push(format!(
            "\\textbf{{{name}}} ({merged}), {}\\\\",
            references(shared, labels)
        ));
        return;
    }

    match subject_level {
        Some(chapters) => lines.push(format!(
            "\\textbf{{{name}}}, {}\\\\",
            references(chapters, labels)
        )),
        None => lines.push(format!("\\textbf{{{name}}}\\\\")),
    }
    for (key, chapters) in named {
        lines.push(format!(
            "{SUBTOPIC_INDENT}{}, {}\\\\",
            escape(key),
            references(chapters, labels)
        ));
    }
}

fn single_group<'a>(
    groups: &'a BTreeMap<&'a ChapterSet, BTreeSet<&'a str>>,
) -> Option<(&'a ChapterSet, &'a BTreeSet<&'a str>)> {
    if groups.len() != 1 {
        return None;
    }
    groups.iter().next().map(|(chapters, keys)| (*chapters, keys))
}

fn references(chapters: &ChapterSet, labels: &BTreeMap<u32, String>) -> String {
    chapters
        .iter()
        .map(|chapter| match labels.get(chapter) {
            Some(label) => format!("\\pageref{{{label}}}"),
            None => chapter.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(text: &str) -> String {
    text.replace('&', "\\&")
}

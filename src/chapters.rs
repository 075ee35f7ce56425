use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use regex::Regex;

pub const CHAPTER_FILES: [&str; 5] = [
    "title.tex",
    "summary.tex",
    "historical.tex",
    "main.tex",
    "technical.tex",
];

pub const MAX_CHAPTER_CHARS: usize = 40_000;

pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in name order.
    pub num: u32,
    pub name: String,
    pub dir: PathBuf,
}

pub fn discover(root: &Path) -> anyhow::Result<Vec<Chapter>> {
    let pattern = Regex::new(r"^\d{2}_").context("compile chapter dir pattern")?;

    let mut dirs = Vec::new();
    for entry in
        std::fs::read_dir(root).with_context(|| format!("read book root: {}", root.display()))?
    {
        let entry = entry.with_context(|| format!("read dir entry in {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if pattern.is_match(name) {
            dirs.push((name.to_owned(), path));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let chapters = dirs
        .into_iter()
        .enumerate()
        .map(|(idx, (name, dir))| {
            let num = u32::try_from(idx + 1).context("chapter count overflows u32")?;
            Ok(Chapter { num, name, dir })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(chapters)
}

impl Chapter {
    pub fn read_content(&self, cleaner: &LatexCleaner) -> anyhow::Result<String> {
        let mut parts = Vec::new();
        for filename in CHAPTER_FILES {
            let path = self.dir.join(filename);
            if !path.exists() {
                continue;
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("read chapter file: {}", path.display()))?;
            let text = cleaner.clean(&String::from_utf8_lossy(&bytes));
            parts.push(format!("=== {} ===\n{}", filename.to_uppercase(), text.trim()));
        }

        Ok(truncate_chars(parts.join("\n\n"), MAX_CHAPTER_CHARS))
    }
}

pub fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text,
    }
}

pub struct LatexCleaner {
    rules: Vec<(Regex, &'static str)>,
}

impl LatexCleaner {
    pub fn new() -> anyhow::Result<Self> {
        let specs: [(&str, &'static str); 8] = [
            (r"\\begin\{[^}]+\}", ""),
            (r"\\end\{[^}]+\}", ""),
            (r"\\[a-zA-Z]+\*?\{([^}]*)\}", "$1"),
            (r"\\[a-zA-Z]+\[[^\]]*\]", ""),
            (r"\\[a-zA-Z]+", " "),
            (r"[{}]", ""),
            (r"\$[^$]+\$", "[math]"),
            (r"\s+", " "),
        ];

        let rules = specs
            .into_iter()
            .map(|(pattern, replacement)| {
                let re = Regex::new(pattern)
                    .with_context(|| format!("compile latex cleanup pattern: {pattern}"))?;
                Ok((re, replacement))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, *replacement).into_owned();
        }
        out
    }
}

pub fn read_chapter_labels(root: &Path) -> anyhow::Result<HashMap<String, String>> {
    let main_tex = root.join("main.tex");
    if !main_tex.exists() {
        tracing::debug!(path = %main_tex.display(), "no main.tex; chapter labels unavailable");
        return Ok(HashMap::new());
    }
    let bytes =
        std::fs::read(&main_tex).with_context(|| format!("read {}", main_tex.display()))?;
    parse_chapter_labels(&String::from_utf8_lossy(&bytes))
}

pub fn parse_chapter_labels(main_tex: &str) -> anyhow::Result<HashMap<String, String>> {
    let re = Regex::new(r"\\chapterwithsummaryfromfile\[([^\]]+)\]\{([^}]+)\}")
        .context("compile chapter label pattern")?;

    let mut labels = HashMap::new();
    for caps in re.captures_iter(main_tex) {
        labels.insert(caps[2].to_owned(), caps[1].to_owned());
    }
    Ok(labels)
}

pub fn extraction(chapter_content: &str) -> String {
    format!(
        "You are a professional book indexer building a detailed subject index.\n\
\n\
Task: Read the chapter below and list every significant subject a reader might look up.\n\
For each subject, list the subtopics of it that this chapter covers.\n\
\n\
Guidelines:\n\
- Aim for 20-50 entries depending on how dense the chapter is.\n\
- Include scientific concepts, mathematical terms, historical figures, phenomena, theories, \
techniques, named effects and laws, and applications.\n\
- Prefer broad subjects with specific subtopics, e.g.\n\
  {{\"subject\": \"Quantum mechanics\", \"subtopics\": [\"tunneling\", \"wave function\"]}}\n\
  {{\"subject\": \"Relativity\", \"subtopics\": [\"time dilation\", \"length contraction\"]}}\n\
- Keep subject names short (1-4 words).\n\
- Include people as subjects when they are discussed in depth.\n\
- Do NOT include chapter titles or generic words like \"introduction\".\n\
\n\
BEGIN_CHAPTER_CONTENT\n\
{chapter_content}\n\
END_CHAPTER_CONTENT\n\
\n\
Output:\n\
- Output ONLY a single JSON object (no markdown fences, no commentary).\n\
- Schema: {{\"subjects\":[{{\"subject\":\"...\",\"subtopics\":[\"...\"]}}]}}\n"
    )
}

pub fn consolidation(count: usize, subjects_json: &str) -> String {
    format!(
        "You are preparing the subject index of a science book.\n\
\n\
Task: The {count} subject names below were extracted chapter by chapter. Many are near-duplicates, \
too specific, or inconsistently named. Consolidate them into a clean, well-organized list.\n\
\n\
Rules:\n\
- Keep famous people as their own subjects; fold obscure names into their field or drop them.\n\
- Fold overly specific topics into broader subjects as subtopics.\n\
- Standardize naming (e.g. \"Quantum mechanics\", not \"QM\" or \"Quantum theory\").\n\
- Give each subject 2-8 subtopics at most.\n\
- Prefer established terminology.\n\
- List every original name you absorbed in `merged_from`, and names you dropped in `removed`.\n\
\n\
BEGIN_SUBJECTS_JSON\n\
{subjects_json}\n\
END_SUBJECTS_JSON\n\
\n\
Output:\n\
- Output ONLY a single JSON object (no markdown fences, no commentary).\n\
- Schema: {{\"consolidated\":[{{\"subject\":\"...\",\"subtopics\":[\"...\"],\"merged_from\":[\"...\"]}}],\"removed\":[\"...\"]}}\n"
    )
}

pub fn classification(approved_subjects: &str, chapter_content: &str) -> String {
    format!(
        "You are a professional book indexer.\n\
\n\
Task: Classify the chapter below using ONLY the approved subjects and subtopics.\n\
\n\
BEGIN_APPROVED_SUBJECTS\n\
{approved_subjects}\n\
END_APPROVED_SUBJECTS\n\
\n\
Rules:\n\
- Use ONLY subjects from the approved list, spelled exactly as listed. Do not invent new ones.\n\
- Include a subject only if the chapter discusses it meaningfully, not just in passing.\n\
- Include a subtopic only if the chapter discusses it specifically; otherwise use null.\n\
- Return 10-30 entries.\n\
\n\
BEGIN_CHAPTER_CONTENT\n\
{chapter_content}\n\
END_CHAPTER_CONTENT\n\
\n\
Output:\n\
- Output ONLY a JSON array (no markdown fences, no commentary).\n\
- Schema: [{{\"subject\":\"Exact Subject Name\",\"subtopic\":\"exact subtopic\" or null}}]\n"
    )
}

use crate::length::LengthRequirement;

// Lines starting with these phrases are model filler, not content.
const INTRO_PREFIXES: &[&str] = &[
    "here's", "here is", "here are", "this is", "caption:", "response:",
];

fn is_intro_line(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    INTRO_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Enforces the requested length bound on raw backend output. Truncation is
/// mechanical: it never re-invokes a backend and never pads, so short output
/// stays short. Idempotent for line and word requirements.
pub fn normalize_output(raw: &str, requirement: &LengthRequirement) -> String {
    match requirement {
        LengthRequirement::Lines(n) => enforce_line_limit(raw, *n),
        LengthRequirement::Words(n) => enforce_word_limit(raw, *n),
        LengthRequirement::Default => raw.trim().to_string(),
    }
}

fn enforce_line_limit(text: &str, max_lines: usize) -> String {
    text.trim()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_intro_line(line))
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

fn enforce_word_limit(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

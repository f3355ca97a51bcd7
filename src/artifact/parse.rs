//! Fenced-code-block extraction and title inference.

use super::{ArtifactLanguage, FALLBACK_TITLE, ReactArtifact, ReactArtifactCandidate, now_rfc3339};

const FENCE: &str = "```";

/// Extract the first fenced block tagged with a supported language.
///
/// Blocks with other (or no) language tags are skipped, as are blocks that
/// are empty after trimming. Returns `None` when the text holds no usable
/// block.
#[must_use]
pub fn parse_react_artifact(text: &str) -> Option<ReactArtifactCandidate> {
    if text.trim().is_empty() {
        return None;
    }

    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let newline = after_open.find('\n')?;
        let tag = &after_open[..newline];
        let body_and_rest = &after_open[newline + 1..];
        let close = body_and_rest.find(FENCE)?;
        let body = &body_and_rest[..close];
        rest = &body_and_rest[close + FENCE.len()..];

        let Some(language) = ArtifactLanguage::from_fence_tag(tag) else {
            continue;
        };
        let code = body.trim();
        if code.is_empty() {
            continue;
        }

        return Some(ReactArtifactCandidate {
            code: code.to_owned(),
            language,
            title: Some(infer_title(code)),
        });
    }

    None
}

/// Infer a display title from component source.
///
/// Priority: the name of an `export default function`, then the first named
/// function declaration, then [`FALLBACK_TITLE`].
#[must_use]
pub fn infer_title(code: &str) -> String {
    let words = scan_words(code);

    for (i, word) in words.iter().enumerate() {
        if word.text != "export" {
            continue;
        }
        let Some(default) = words.get(i + 1).filter(|w| w.text == "default" && adjacent(code, word, w, "")) else {
            continue;
        };
        let mut next = i + 2;
        if words.get(next).is_some_and(|w| w.text == "async" && adjacent(code, default, w, "")) {
            next += 1;
        }
        let Some(function) = words.get(next).filter(|w| w.text == "function") else {
            continue;
        };
        if !adjacent(code, &words[next - 1], function, "") {
            continue;
        }
        if let Some(name) = words.get(next + 1).filter(|w| adjacent(code, function, w, "*")) {
            return name.text.to_owned();
        }
    }

    for pair in words.windows(2) {
        if pair[0].text == "function" && adjacent(code, &pair[0], &pair[1], "*") {
            return pair[1].text.to_owned();
        }
    }

    FALLBACK_TITLE.to_owned()
}

/// Turn a parsed candidate into a working artifact owned by `message_id`.
#[must_use]
pub fn build_artifact(message_id: &str, candidate: ReactArtifactCandidate) -> ReactArtifact {
    let title = candidate
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_owned());
    ReactArtifact {
        id: artifact_id_for(message_id),
        title,
        code: candidate.code,
        language: candidate.language,
        source_message_id: message_id.to_owned(),
        updated_at: now_rfc3339(),
    }
}

/// Deterministic artifact identity for a source message.
#[must_use]
pub fn artifact_id_for(message_id: &str) -> String {
    format!("react-artifact-{message_id}")
}

// =============================================================================
// WORD SCANNING
// =============================================================================

struct Word<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Identifier-like words with their byte spans. Words starting with a digit
/// are skipped.
fn scan_words(code: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in code.char_indices() {
        let is_word = ch.is_alphanumeric() || ch == '_' || ch == '$';
        match (start, is_word) {
            (None, true) => start = Some(idx),
            (Some(s), false) => {
                push_word(code, s, idx, &mut words);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        push_word(code, s, code.len(), &mut words);
    }

    words
}

fn push_word<'a>(code: &'a str, start: usize, end: usize, words: &mut Vec<Word<'a>>) {
    let text = &code[start..end];
    if text.chars().next().is_some_and(|c| !c.is_ascii_digit()) {
        words.push(Word { text, start, end });
    }
}

/// `true` when only whitespace (plus any of `extra`) separates the words.
fn adjacent(code: &str, left: &Word<'_>, right: &Word<'_>, extra: &str) -> bool {
    let gap = &code[left.end..right.start];
    !gap.is_empty() && gap.chars().all(|c| c.is_whitespace() || extra.contains(c))
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;

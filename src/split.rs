//! Splits language-model replies into speakable sentence chunks.
//!
//! Smaller chunks let playback start before the whole reply is
//! synthesized, and a barge-in wastes at most one sentence of audio.

/// Characters which may end a sentence.
fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '?' | '!' | '\n' | '\u{a0}')
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Window `\w.\w.` right before the split point, as in "e.g." or "U.S.".
fn ends_in_initialism(prefix: &[char]) -> bool {
    let n = prefix.len();
    n >= 4 && is_word(prefix[n - 4]) && prefix[n - 3] == '.' && is_word(prefix[n - 2])
}

/// Window `[upper][lower].` right before the split point, as in "Mr.".
fn ends_in_honorific(prefix: &[char]) -> bool {
    let n = prefix.len();
    n >= 3 && prefix[n - 3].is_uppercase() && prefix[n - 2].is_lowercase() && prefix[n - 1] == '.'
}

/// Splits `text` into trimmed sentence chunks.
///
/// A split happens at any whitespace character directly preceded by one
/// of `.`, `?`, `!`, a newline or a non-breaking space, unless the
/// preceding characters look like a common abbreviation. Empty chunks
/// are discarded.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        if !chars[i].is_whitespace() || !is_terminator(chars[i - 1]) {
            continue;
        }
        let prefix = &chars[..i];
        if ends_in_initialism(prefix) || ends_in_honorific(prefix) {
            continue;
        }

        push_trimmed(&mut chunks, &chars[start..i]);
        start = i + 1;
    }

    push_trimmed(&mut chunks, &chars[start.min(chars.len())..]);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, segment: &[char]) {
    let chunk: String = segment.iter().collect();
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_boundaries() {
        assert_eq!(
            split_sentences("Hello! How are you? I am fine."),
            vec!["Hello!", "How are you?", "I am fine."]
        );
    }

    #[test]
    fn keeps_single_sentences_whole() {
        assert_eq!(split_sentences("Just one sentence."), vec!["Just one sentence."]);
        assert_eq!(split_sentences("No terminator at all"), vec!["No terminator at all"]);
    }

    #[test]
    fn does_not_split_after_initialisms() {
        assert_eq!(
            split_sentences("Ask for the U.S. office. Then wait."),
            vec!["Ask for the U.S. office.", "Then wait."]
        );
        assert_eq!(
            split_sentences("Use shorter prompts, e.g. a single word."),
            vec!["Use shorter prompts, e.g. a single word."]
        );
    }

    #[test]
    fn does_not_split_after_honorifics() {
        assert_eq!(
            split_sentences("Mr. Smith is calling. Please hold."),
            vec!["Mr. Smith is calling.", "Please hold."]
        );
    }

    #[test]
    fn splits_on_newlines() {
        assert_eq!(
            split_sentences("First line.\nSecond line."),
            vec!["First line.", "Second line."]
        );
    }

    #[test]
    fn discards_empty_chunks() {
        assert_eq!(split_sentences("Wait...  \n  "), vec!["Wait..."]);
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n ").is_empty());
    }
}

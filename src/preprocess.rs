const FILLER_WORDS: &[&str] = &[
    "um", "uh", "er", "ah", "eh", "hmm", "hm", "like", "well", "actually", "basically",
    "literally", "right", "okay", "ok",
];

// Two-word fillers matched against adjacent word pairs.
const FILLER_PHRASES: &[(&str, &str)] = &[
    ("you", "know"),
    ("sort", "of"),
    ("kind", "of"),
    ("i", "mean"),
    ("you", "see"),
];

/// Normalize raw journal text before classification: lowercase, strip filler
/// words, collapse stretched characters ("sooo" -> "soo"), and tidy
/// whitespace and punctuation spacing.
pub fn preprocess_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let mut kept: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let bare = strip_punct(words[i]);
        if i + 1 < words.len() {
            let next_bare = strip_punct(words[i + 1]);
            if FILLER_PHRASES
                .iter()
                .any(|(a, b)| bare == *a && next_bare == *b)
            {
                i += 2;
                continue;
            }
        }
        if !FILLER_WORDS.contains(&bare.as_str()) {
            kept.push(words[i]);
        }
        i += 1;
    }

    let joined = kept.join(" ");
    let collapsed = collapse_repeats(&joined);
    normalize_punct_spacing(&collapsed)
}

fn strip_punct(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Collapse runs of three or more identical characters down to two.
pub fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if Some(c) == last {
            run += 1;
        } else {
            last = Some(c);
            run = 1;
        }
        if run <= 2 {
            out.push(c);
        }
    }

    out
}

fn normalize_punct_spacing(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            prev_space = true;
            continue;
        }
        if prev_space {
            // Drop the space entirely when punctuation follows.
            if !matches!(c, ',' | '.' | '!' | '?' | ';' | ':') && !out.is_empty() {
                out.push(' ');
            }
            prev_space = false;
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_filler_words_and_phrases() {
        let cleaned = preprocess_text("Um, I was like, you know, feeling sad today");
        assert_eq!(cleaned, "i was feeling sad today");
    }

    #[test]
    fn collapses_stretched_characters() {
        assert_eq!(collapse_repeats("sooo happyyy"), "soo happyy");
        assert_eq!(collapse_repeats("fine"), "fine");
    }

    #[test]
    fn normalizes_whitespace_and_punctuation() {
        let cleaned = preprocess_text("today   was hard .  very hard");
        assert_eq!(cleaned, "today was hard. very hard");
    }

    #[test]
    fn empty_and_blank_input_stay_empty() {
        assert_eq!(preprocess_text(""), "");
        assert_eq!(preprocess_text("   "), "");
    }

    #[test]
    fn idempotent_on_clean_text() {
        let once = preprocess_text("i felt calm after the walk");
        let twice = preprocess_text(&once);
        assert_eq!(once, twice);
    }
}

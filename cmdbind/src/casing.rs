//! Identifier case transforms
//!
//! Splits identifier-like phrases into words and recomposes them as pascal,
//! camel, snake, kebab or train case. Default command, argument and option
//! names are derived with these transforms when no name is declared.

/// Split an identifier-like phrase into its word tokens.
///
/// A token is a leading lowercase run, an uppercase run not followed by a
/// lowercase letter, an uppercase letter with its trailing lowercase run, a
/// digit run, or a lowercase run. Any other characters separate tokens and
/// are dropped.
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_lowercase() {
            let start = i;
            while i < chars.len() && chars[i].is_lowercase() {
                i += 1;
            }
            words.push(chars[start..i].iter().collect());
        } else if c.is_uppercase() {
            let start = i;
            let mut end = i;
            while end < chars.len() && chars[end].is_uppercase() {
                end += 1;
            }
            if end < chars.len() && chars[end].is_lowercase() {
                // The last uppercase letter starts the next word.
                if end - start > 1 {
                    words.push(chars[start..end - 1].iter().collect());
                }
                let word_start = end - 1;
                i = end;
                while i < chars.len() && chars[i].is_lowercase() {
                    i += 1;
                }
                words.push(chars[word_start..i].iter().collect());
            } else {
                words.push(chars[start..end].iter().collect());
                i = end;
            }
        } else if c.is_numeric() {
            let start = i;
            while i < chars.len() && chars[i].is_numeric() {
                i += 1;
            }
            words.push(chars[start..i].iter().collect());
        } else {
            i += 1;
        }
    }
    words
}

// Two-letter all-caps tokens (IO, DB) pass through unchanged.
fn cap_word(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    match chars.len() {
        2 => {
            if chars[0].is_lowercase() {
                let mut out: String = chars[0].to_uppercase().collect();
                out.push(chars[1]);
                out
            } else {
                word.to_string()
            }
        }
        n if n > 2 => {
            let mut out: String = chars[0].to_uppercase().collect();
            out.extend(chars[1..].iter().flat_map(|c| c.to_lowercase()));
            out
        }
        _ => word.to_uppercase(),
    }
}

pub fn pascal_case(input: &str) -> String {
    split_words(input).iter().map(|w| cap_word(w)).collect()
}

pub fn camel_case(input: &str) -> String {
    split_words(input)
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == 0 {
                w.to_lowercase()
            } else {
                cap_word(w)
            }
        })
        .collect()
}

pub fn snake_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn kebab_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn train_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| cap_word(w))
        .collect::<Vec<_>>()
        .join("-")
}

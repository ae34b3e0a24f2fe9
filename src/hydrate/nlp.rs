//! Frequency-based keyword and summary heuristics.
//!
//! These only populate the `keywords` and `summary` fields of a record; they
//! make no attempt at language detection and use an English stopword list.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Keywords kept per article.
pub const KEYWORD_COUNT: usize = 10;
/// Sentences kept in a summary.
pub const SUMMARY_SENTENCES: usize = 5;

const IDEAL_SENTENCE_WORDS: f64 = 20.0;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’]*").unwrap());
static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^.!?]+(?:[.!?]+["'”’)]*|$)"#).unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he",
        "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
        "into", "is", "it", "its", "itself", "just", "may", "me", "more", "most", "my",
        "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "one", "only", "or",
        "other", "our", "ours", "ourselves", "out", "over", "own", "said", "same", "says",
        "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
        "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
        "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
        "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
        "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Lowercased content words of `text`, in order.
fn content_words(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Split `text` into trimmed sentences.
pub fn sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().split_whitespace().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// The most frequent content words across the title and body.
///
/// Ties are broken by first appearance so the result is stable.
pub fn keywords(title: &str, text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let words = content_words(title).into_iter().chain(content_words(text));
    for (position, word) in words.enumerate() {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .sorted_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)))
        .take(limit)
        .map(|(word, _)| word)
        .collect()
}

fn position_score(index: usize, total: usize) -> f64 {
    let normalized = (index as f64 + 1.0) / total.max(1) as f64;
    match normalized {
        n if n <= 0.1 => 0.17,
        n if n <= 0.2 => 0.23,
        n if n <= 0.3 => 0.14,
        n if n <= 0.4 => 0.08,
        n if n <= 0.5 => 0.05,
        n if n <= 0.6 => 0.04,
        n if n <= 0.7 => 0.06,
        n if n <= 0.8 => 0.04,
        n if n <= 0.9 => 0.04,
        _ => 0.15,
    }
}

fn length_score(words: usize) -> f64 {
    let delta = (IDEAL_SENTENCE_WORDS - words as f64).abs();
    (1.0 - delta / IDEAL_SENTENCE_WORDS).max(0.0)
}

/// Pick the highest-scoring sentences of `text`, returned in document order
/// and joined by newlines.
///
/// A sentence scores for sharing words with the title, for containing
/// keywords, for its length and for where it sits in the article.
pub fn summarize(title: &str, text: &str, keywords: &[String], limit: usize) -> String {
    let all = sentences(text);
    if all.is_empty() || limit == 0 {
        return String::new();
    }

    let title_words: HashSet<String> = content_words(title).into_iter().collect();
    let keyword_set: HashSet<&str> = keywords.iter().map(String::as_str).collect();
    let total = all.len();

    let scored = all.iter().enumerate().map(|(index, sentence)| {
        let words = content_words(sentence);
        let title_overlap = if title_words.is_empty() {
            0.0
        } else {
            words.iter().filter(|w| title_words.contains(*w)).count() as f64
                / title_words.len() as f64
        };
        let keyword_hits = if keyword_set.is_empty() {
            0.0
        } else {
            words.iter().filter(|w| keyword_set.contains(w.as_str())).count() as f64
                / keyword_set.len() as f64
        };
        let word_count = sentence.split_whitespace().count();
        let score = title_overlap * 1.5
            + keyword_hits * 2.0
            + length_score(word_count) * 0.5
            + position_score(index, total);
        (index, score)
    });

    scored
        .sorted_by(|(ia, sa), (ib, sb)| sb.total_cmp(sa).then(ia.cmp(ib)))
        .take(limit)
        .map(|(index, _)| index)
        .sorted()
        .map(|index| all[index].as_str())
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences_split_on_terminators() {
        let got = sentences("Rain fell in Delhi. Roads flooded!  Was anyone hurt? No reports yet");
        assert_eq!(
            got,
            vec![
                "Rain fell in Delhi.",
                "Roads flooded!",
                "Was anyone hurt?",
                "No reports yet"
            ]
        );
    }

    #[test]
    fn test_keywords_rank_by_frequency() {
        let kws = keywords(
            "Monsoon floods Mumbai",
            "The monsoon arrived early. Floods followed the monsoon, and Mumbai shut schools.",
            3,
        );
        assert_eq!(kws, vec!["monsoon", "floods", "mumbai"]);
    }

    #[test]
    fn test_keywords_drop_stopwords_and_numbers() {
        let kws = keywords("", "the and of 2020 1999 it is", 10);
        assert!(kws.is_empty());
    }

    #[test]
    fn test_summary_keeps_document_order() {
        let text = "Parliament met on Monday. Lunch was served. \
                    The budget bill passed parliament after a long debate. \
                    Weather was mild.";
        let kws = keywords("Budget bill passes parliament", text, KEYWORD_COUNT);
        let summary = summarize("Budget bill passes parliament", text, &kws, 2);
        assert_eq!(
            summary,
            "Parliament met on Monday.\nThe budget bill passed parliament after a long debate."
        );
    }

    #[test]
    fn test_summary_of_empty_text() {
        assert_eq!(summarize("Title", "", &[], SUMMARY_SENTENCES), "");
    }
}

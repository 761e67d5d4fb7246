// Extractive summaries: fetch the article, keep its most central sentences.
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::scraping;

/// Produces a short summary of the article behind a URL.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, url: &str, sentences: usize) -> Result<String>;
}

/// Downloads the article with readability and ranks its sentences
/// LexRank-style (tf-idf cosine similarity graph + power iteration).
pub struct ExtractiveSummarizer {
    timeout_secs: u64,
}

impl ExtractiveSummarizer {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait::async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, url: &str, sentences: usize) -> Result<String> {
        let text = scraping::scrape_article_content(url, self.timeout_secs).await?;
        let summary = extract_summary(&text, sentences);
        info!("summary: {} chars of article text -> {} chars", text.len(), summary.len());
        Ok(summary)
    }
}

const SIMILARITY_THRESHOLD: f64 = 0.1;
const DAMPING: f64 = 0.85;
const MIN_WORDS: usize = 4;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he",
    "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "more", "most", "no", "not",
    "of", "on", "one", "or", "other", "our", "out", "over", "said", "says", "she", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "up", "was", "we", "were", "what", "when", "which", "who", "will", "with", "would",
    "you",
];

/// Pick the `count` most central sentences of `text`, in document order.
pub fn extract_summary(text: &str, count: usize) -> String {
    let sentences = split_sentences(text);
    if count == 0 || sentences.is_empty() {
        return String::new();
    }
    if sentences.len() <= count {
        return sentences.join(" ");
    }

    let scores = centrality(&sentences);
    let mut ranked: Vec<usize> = (0..sentences.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    ranked.truncate(count);
    ranked.sort_unstable();

    ranked.into_iter().map(|i| sentences[i].as_str()).collect::<Vec<_>>().join(" ")
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    // blank lines separate paragraphs and headings
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut current = String::new();
        let mut chars = paragraph.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if trimmed.split_whitespace().count() >= MIN_WORDS {
        sentences.push(trimmed.to_string());
    }
}

fn terms(sentence: &str) -> HashMap<String, f64> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut tf = HashMap::new();
    for word in sentence
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1 && !stop.contains(w.as_str()))
    {
        *tf.entry(word).or_insert(0.0) += 1.0;
    }
    tf
}

fn centrality(sentences: &[String]) -> Vec<f64> {
    let n = sentences.len();
    let tfs: Vec<HashMap<String, f64>> = sentences.iter().map(|s| terms(s)).collect();

    let mut df: HashMap<&str, f64> = HashMap::new();
    for tf in &tfs {
        for term in tf.keys() {
            *df.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
    }
    let idf = |term: &str| (n as f64 / df.get(term).copied().unwrap_or(1.0)).ln() + 1.0;

    let vectors: Vec<HashMap<&str, f64>> = tfs
        .iter()
        .map(|tf| tf.iter().map(|(t, f)| (t.as_str(), f * idf(t.as_str()))).collect())
        .collect();
    let norms: Vec<f64> = vectors
        .iter()
        .map(|v| v.values().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let mut adjacency = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let sim = if i == j || norms[i] == 0.0 || norms[j] == 0.0 {
                0.0
            } else {
                let dot: f64 = vectors[i]
                    .iter()
                    .filter_map(|(t, x)| vectors[j].get(t).map(|y| x * y))
                    .sum();
                dot / (norms[i] * norms[j])
            };
            if sim > SIMILARITY_THRESHOLD {
                adjacency[i][j] = 1.0;
            }
        }
    }
    // sentences similar to nothing spread their score evenly
    for row in adjacency.iter_mut() {
        let degree: f64 = row.iter().sum();
        if degree == 0.0 {
            row.iter_mut().for_each(|x| *x = 1.0 / n as f64);
        } else {
            row.iter_mut().for_each(|x| *x /= degree);
        }
    }

    let mut scores = vec![1.0 / n as f64; n];
    for _ in 0..100 {
        let mut next = vec![(1.0 - DAMPING) / n as f64; n];
        for (i, row) in adjacency.iter().enumerate() {
            for (j, weight) in row.iter().enumerate() {
                next[j] += DAMPING * scores[i] * weight;
            }
        }
        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta < 1e-9 {
            break;
        }
    }
    scores
}

//! Term-weighted text vectors.
//!
//! `tfidf(t, d) = count(t, d) × idf(t)` with the smoothed
//! `idf(t) = ln((1 + n) / (1 + df(t))) + 1`, and every row scaled to unit
//! length. Terms are lowercase runs of two or more word characters with
//! English stop words removed. The vocabulary is kept in lexicographic order
//! and all sums run in term order, so the same documents always produce a
//! bit-identical matrix.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use super::stop_words::ENGLISH_STOP_WORDS;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

/// Sparse row of `(term index, weight)` pairs sorted by term index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// True when no term has a non-zero weight
    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(|&(_, w)| w == 0.0)
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, wi) = self.entries[i];
            let (tj, wj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wi * wj;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine similarity in [0, 1]; 0 when either vector is all zero
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let denominator = self.norm() * other.norm();
        if denominator == 0.0 {
            return 0.0;
        }
        (self.dot(other) / denominator).clamp(0.0, 1.0)
    }
}

/// Document-by-term weight matrix, one row per input document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermMatrix {
    vocabulary: Vec<String>,
    rows: Vec<SparseVector>,
}

impl TermMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn row(&self, index: usize) -> Option<&SparseVector> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }
}

/// Vectorizer producing unit-length tf-idf rows
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    stop_words: HashSet<&'static str>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::english()
    }
}

impl TfidfVectorizer {
    /// Vectorizer that discards English stop words
    pub fn english() -> Self {
        Self {
            stop_words: ENGLISH_STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Lowercased terms of `text` in order of appearance, stop words removed
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        token_pattern()
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(token))
            .map(str::to_string)
            .collect()
    }

    /// Learns the vocabulary from `documents` and weights every document
    ///
    /// A document with no surviving terms gets an all-zero row. If no
    /// document has any term the vocabulary is empty and every row is zero.
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> TermMatrix {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| self.tokenize(doc.as_ref()))
            .collect();

        let vocabulary: Vec<String> = tokenized
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let term_index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        let counts: Vec<BTreeMap<usize, f64>> = tokenized
            .iter()
            .map(|tokens| {
                let mut row = BTreeMap::new();
                for token in tokens {
                    *row.entry(term_index[token.as_str()]).or_insert(0.0) += 1.0;
                }
                row
            })
            .collect();

        let mut doc_freq = vec![0usize; vocabulary.len()];
        for row in &counts {
            for &term in row.keys() {
                doc_freq[term] += 1;
            }
        }

        let n_docs = documents.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|row| {
                let mut entries: Vec<(usize, f64)> = row
                    .into_iter()
                    .map(|(term, count)| (term, count * idf[term]))
                    .collect();
                let norm = entries.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for entry in &mut entries {
                        entry.1 /= norm;
                    }
                }
                SparseVector { entries }
            })
            .collect();

        TermMatrix { vocabulary, rows }
    }
}

// src/rank.rs
//! Lexical relevance ranking (BM25 Okapi) over search results.
//!
//! Corpus text per document = `content`, or `title + " " + url` when content is empty.
//! Ordering is by descending score; `sort_by` is stable, so ties keep input order.
//!
//! IDF follows the Okapi variant with an epsilon floor: terms that occur in more than
//! half of the corpus would get a negative IDF and are lifted to `epsilon * mean_idf`.

use std::collections::HashMap;

use crate::model::SearchResult;
use crate::text::tokenize;

pub const DEFAULT_TOP_K: usize = 5;

/// BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Scores a pre-tokenized corpus.
#[derive(Debug)]
pub struct Bm25 {
    params: Bm25Params,
    doc_len: Vec<usize>,
    avg_len: f64,
    term_freqs: Vec<HashMap<String, usize>>,
    idf: HashMap<String, f64>,
}

impl Bm25 {
    pub fn new(corpus: &[Vec<String>], params: Bm25Params) -> Self {
        let n_docs = corpus.len();
        let mut doc_len = Vec::with_capacity(n_docs);
        let mut term_freqs = Vec::with_capacity(n_docs);
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            doc_len.push(doc.len());
            let mut tf: HashMap<String, usize> = HashMap::new();
            for tok in doc {
                *tf.entry(tok.clone()).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(tf);
        }

        let total_len: usize = doc_len.iter().sum();
        let avg_len = if n_docs == 0 {
            0.0
        } else {
            total_len as f64 / n_docs as f64
        };

        let n = n_docs as f64;
        let mut idf = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_freq {
            let df = df as f64;
            let v = (n - df + 0.5).ln() - (df + 0.5).ln();
            idf_sum += v;
            if v < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, v);
        }
        if !idf.is_empty() {
            let floor = params.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            params,
            doc_len,
            avg_len,
            term_freqs,
            idf,
        }
    }

    /// One score per corpus document, in corpus order.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut out = vec![0.0; self.doc_len.len()];
        if self.avg_len == 0.0 {
            return out;
        }
        for term in query {
            let Some(&idf) = self.idf.get(term) else {
                continue;
            };
            for (i, tf) in self.term_freqs.iter().enumerate() {
                let f = tf.get(term).copied().unwrap_or(0) as f64;
                if f == 0.0 {
                    continue;
                }
                let norm = 1.0 - b + b * (self.doc_len[i] as f64 / self.avg_len);
                out[i] += idf * (f * (k1 + 1.0)) / (f + k1 * norm);
            }
        }
        out
    }
}

/// Text used to score one result.
fn corpus_text(r: &SearchResult) -> String {
    if r.content.trim().is_empty() {
        format!("{} {}", r.title, r.url)
    } else {
        r.content.clone()
    }
}

/// Return the `top_k` most relevant documents for `query`, best first.
///
/// - fewer than `top_k` documents: all of them, still ordered.
/// - corpus empty after tokenization: the first `top_k` documents unranked.
pub fn rank(query: &str, documents: &[SearchResult], top_k: usize) -> Vec<SearchResult> {
    rank_with(query, documents, top_k, Bm25Params::default())
}

pub fn rank_with(
    query: &str,
    documents: &[SearchResult],
    top_k: usize,
    params: Bm25Params,
) -> Vec<SearchResult> {
    if documents.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let corpus: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&corpus_text(d))).collect();
    if corpus.iter().all(Vec::is_empty) {
        return documents.iter().take(top_k).cloned().collect();
    }

    let bm25 = Bm25::new(&corpus, params);
    let scores = bm25.scores(&tokenize(query));

    let mut scored: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(top_k)
        .map(|(i, _)| documents[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, content: &str) -> SearchResult {
        SearchResult::new(url, "", content)
    }

    #[test]
    fn most_relevant_first() {
        let docs = vec![
            doc("https://a", "bananas are yellow fruit"),
            doc("https://b", "sodium intake raises blood pressure"),
            doc("https://c", "potassium and sodium balance in dialysis"),
        ];
        let out = rank("sodium blood pressure", &docs, 5);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].url, "https://b");
        assert_eq!(out[1].url, "https://c");
        assert_eq!(out[2].url, "https://a");
    }

    #[test]
    fn top_k_truncates() {
        let docs = vec![
            doc("https://a", "salt"),
            doc("https://b", "salt salt"),
            doc("https://c", "pepper"),
        ];
        let out = rank("salt", &docs, 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn zero_relevance_ties_keep_input_order() {
        let docs = vec![
            doc("https://1", "alpha"),
            doc("https://2", "beta"),
            doc("https://3", "gamma"),
        ];
        let out = rank("unrelated", &docs, 10);
        let urls: Vec<_> = out.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["https://1", "https://2", "https://3"]);
    }

    #[test]
    fn empty_corpus_returns_first_k_unranked() {
        let docs = vec![
            SearchResult::new("", "", ""),
            SearchResult::new("", "!!", "  "),
            SearchResult::new("", "", "..."),
        ];
        let out = rank("anything", &docs, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].title, "!!");
    }

    #[test]
    fn falls_back_to_title_and_url_when_content_empty() {
        let docs = vec![
            SearchResult::new("https://x/other", "Unrelated page", ""),
            SearchResult::new("https://x/misc", "Misc notes", ""),
            SearchResult::new("https://x/hypertension", "Hypertension and diet", ""),
        ];
        let out = rank("hypertension", &docs, 3);
        assert_eq!(out[0].url, "https://x/hypertension");
    }

    #[test]
    fn two_doc_corpus_keeps_input_order() {
        let docs = vec![
            SearchResult::new("https://x/other", "Unrelated page", ""),
            SearchResult::new("https://x/hypertension", "Hypertension and diet", ""),
        ];
        let out = rank("hypertension", &docs, 2);
        let urls: Vec<_> = out.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/other", "https://x/hypertension"]);
    }

    #[test]
    fn common_terms_get_epsilon_floor_not_negative() {
        // "salt" appears in all three docs: raw idf is negative, floored to epsilon * mean.
        let corpus = vec![
            tokenize("salt rare"),
            tokenize("salt"),
            tokenize("salt"),
        ];
        let bm = Bm25::new(&corpus, Bm25Params::default());
        let s = bm.scores(&tokenize("rare"));
        assert!(s[0] > 0.0);
        assert_eq!(s[1], 0.0);
    }

    #[test]
    fn empty_input() {
        assert!(rank("q", &[], 5).is_empty());
    }
}

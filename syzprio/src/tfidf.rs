//! TF-IDF corpus model (spec.md §4.1).
//!
//! Documents are whitespace-joined decimal syscall IDs. Document identity
//! is `MD5(doc)` (hex), matching `original_source/vendor/.../tfidf.go`;
//! re-adding an identical document is a no-op. `Cal` mutates `all_terms` as
//! a side effect — spec.md §9 notes this coupling explicitly and keeps it
//! rather than splitting scoring from observation, so this port preserves
//! it too, documented here instead of silently "fixed".

use std::collections::HashMap;

use md5::{Digest, Md5};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct TfIdfState {
    /// MD5(doc) -> position in `term_freqs`.
    doc_index: HashMap<String, usize>,
    /// term frequency map per document, indexed like `doc_index`'s values.
    term_freqs: Vec<HashMap<u32, u32>>,
    /// number of documents containing each term.
    term_docs: HashMap<u32, u32>,
    /// number of documents added.
    n: usize,
    /// per-term occurrence counts across every `Cal` call (not just
    /// `AddDocs`) — feeds `ChoiceTable::choose_with_tfidf`'s zero/non-zero
    /// partition.
    all_terms: HashMap<u32, u32>,
    stop_words: std::collections::HashSet<String>,
}

impl TfIdfState {
    fn tokenize(doc: &str) -> Vec<u32> {
        doc.split_whitespace().filter_map(|t| t.parse::<u32>().ok()).collect()
    }

    fn term_freq(&mut self, doc: &str) -> HashMap<u32, u32> {
        let mut freq = HashMap::new();
        for term in Self::tokenize(doc) {
            if self.stop_words.contains(&term.to_string()) {
                continue;
            }
            *self.all_terms.entry(term).or_insert(0) += 1;
            *freq.entry(term).or_insert(0) += 1;
        }
        freq
    }
}

fn md5_hex(doc: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(doc.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Serialized by a single dedicated mutex covering every read and write
/// (spec.md §5), since `Cal` mutates `all_terms` as a side effect of what
/// looks like a read.
#[derive(Debug, Default)]
pub struct TfIdfModel {
    state: Mutex<TfIdfState>,
}

impl TfIdfModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_words(stop_words: impl IntoIterator<Item = String>) -> Self {
        let model = Self::new();
        model.state.lock().stop_words.extend(stop_words);
        model
    }

    /// Loads stop words from a file, one per line. Failure to load is a
    /// warning, not an error (spec.md §4.1 contract).
    pub fn load_stop_words_file(&self, path: &std::path::Path) {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let mut state = self.state.lock();
                for line in contents.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        state.stop_words.insert(line.to_string());
                    }
                }
            }
            Err(err) => {
                tracing::warn!(target: "tfidf", "failed to load stop words from {path:?}: {err}");
            }
        }
    }

    /// Adds documents, skipping any whose MD5 hash is already known.
    pub fn add_docs(&self, docs: impl IntoIterator<Item = impl AsRef<str>>) {
        let mut state = self.state.lock();
        for doc in docs {
            let doc = doc.as_ref();
            let h = md5_hex(doc);
            if state.doc_index.contains_key(&h) {
                continue;
            }
            let freq = state.term_freq(doc);
            if freq.is_empty() {
                continue;
            }
            state.doc_index.insert(h, state.n);
            state.n += 1;
            for &term in freq.keys() {
                *state.term_docs.entry(term).or_insert(0) += 1;
            }
            state.term_freqs.push(freq);
        }
    }

    /// Calculates TF-IDF weights for `doc`. Pure w.r.t. model state when
    /// `doc` was previously added (its stored frequencies are reused);
    /// otherwise tokenizing `doc` on the fly still increments `all_terms`,
    /// matching the original's coupled behavior.
    pub fn cal(&self, doc: &str) -> HashMap<u32, f64> {
        let mut state = self.state.lock();
        let h = md5_hex(doc);
        let term_freq = if let Some(&pos) = state.doc_index.get(&h) {
            state.term_freqs[pos].clone()
        } else {
            state.term_freq(doc)
        };

        let doc_terms: u32 = term_freq.values().sum();
        let n = state.n;
        let mut weight = HashMap::with_capacity(term_freq.len());
        for (&term, &freq) in &term_freq {
            let term_docs = *state.term_docs.get(&term).unwrap_or(&0);
            let tf = freq as f64 / doc_terms as f64;
            let idf = ((1 + n) as f64 / (1 + term_docs) as f64).ln();
            weight.insert(term, tf * idf);
        }
        weight
    }

    /// Ensures `id` has an entry in `all_terms`, defaulting to 0.
    pub fn init_terms(&self, id: u32) {
        self.state.lock().all_terms.entry(id).or_insert(0);
    }

    /// Returns a snapshot of `all_terms`, used by
    /// `ChoiceTable::choose_with_tfidf` to partition zero/non-zero count
    /// terms.
    pub fn all_terms(&self) -> HashMap<u32, u32> {
        self.state.lock().all_terms.clone()
    }

    pub fn doc_count(&self) -> usize {
        self.state.lock().n
    }

    /// Union-merges `other` into `self` by document hash; duplicate hashes
    /// are skipped, `all_terms` counts are summed.
    pub fn merge(&self, other: &TfIdfModel) {
        let other_state = other.state.lock();
        let mut state = self.state.lock();
        for (h, &pos) in &other_state.doc_index {
            if state.doc_index.contains_key(h) {
                continue;
            }
            let freq = other_state.term_freqs[pos].clone();
            state.doc_index.insert(h.clone(), state.n);
            state.n += 1;
            for &term in freq.keys() {
                *state.term_docs.entry(term).or_insert(0) += 1;
            }
            state.term_freqs.push(freq);
        }
        for (&id, &count) in &other_state.all_terms {
            *state.all_terms.entry(id).or_insert(0) += count;
        }
    }
}

//! Keyword index engine
//!
//! Default engine implementation: per-document term frequencies, summed-TF
//! scoring, best-sentence passage extraction. Deterministic and serializable;
//! good enough to exercise the coordination layer end to end without an
//! external model.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::tokenize::{document_terms, query_terms};
use super::{IndexEngine, IndexHandle};
use crate::types::Document;

/// Factory for [`KeywordIndex`] handles
#[derive(Debug, Default, Clone)]
pub struct KeywordEngine;

impl IndexEngine for KeywordEngine {
    fn build(&self, documents: Vec<Document>) -> Result<Box<dyn IndexHandle>> {
        let mut index = KeywordIndex::default();
        for document in documents {
            index.add(document);
        }
        Ok(Box::new(index))
    }

    fn restore(&self, image: &[u8]) -> Result<Box<dyn IndexHandle>> {
        let index: KeywordIndex =
            bincode::deserialize(image).context("failed to decode index image")?;
        Ok(Box::new(index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    document: Document,
    terms: HashMap<String, u32>,
}

/// Term-frequency index over whole documents
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeywordIndex {
    entries: Vec<Entry>,
}

impl KeywordIndex {
    fn add(&mut self, document: Document) {
        let terms = document_terms(&document.text);
        let entry = Entry { document, terms };
        match self
            .entries
            .iter()
            .position(|e| e.document.id == entry.document.id)
        {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
    }

    fn score(entry: &Entry, terms: &[String]) -> u32 {
        terms
            .iter()
            .map(|t| entry.terms.get(t).copied().unwrap_or(0))
            .sum()
    }

    /// Best-scoring entry for the query; earlier entries win ties. Falls back
    /// to the most recently added document when nothing matches so an answer
    /// is always derived from indexed content.
    fn best_entry(&self, terms: &[String]) -> Option<&Entry> {
        let mut best: Option<(u32, &Entry)> = None;
        for entry in &self.entries {
            let score = Self::score(entry, terms);
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, entry));
            }
        }
        match best? {
            (0, _) => self.entries.last(),
            (_, entry) => Some(entry),
        }
    }
}

impl IndexHandle for KeywordIndex {
    fn answer(&self, question: &str) -> Result<String> {
        let terms = query_terms(question);
        let entry = self
            .best_entry(&terms)
            .context("cannot answer against an empty index")?;
        let passage = best_passage(&entry.document.text, &terms);
        Ok(format!("{} (source: {})", passage, entry.document.source))
    }

    fn insert(&mut self, document: Document) -> Result<()> {
        self.add(document);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to encode index image")
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Pick the sentence with the highest query-term overlap; earlier sentences
/// win ties. Falls back to the leading text when the document has no
/// sentence boundaries.
fn best_passage(text: &str, terms: &[String]) -> String {
    const MAX_PASSAGE_LEN: usize = 280;

    let sentences: Vec<&str> = text
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut best: Option<(usize, &str)> = None;
    for &sentence in &sentences {
        let lowered = sentence.to_lowercase();
        let overlap = terms.iter().filter(|t| lowered.contains(t.as_str())).count();
        if best.map_or(true, |(top, _)| overlap > top) {
            best = Some((overlap, sentence));
        }
    }
    let best = best.map(|(_, s)| s).unwrap_or_else(|| text.trim());

    let mut passage = best.to_string();
    if passage.len() > MAX_PASSAGE_LEN {
        let cut = passage
            .char_indices()
            .take_while(|(i, _)| *i < MAX_PASSAGE_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        passage.truncate(cut);
        passage.push('…');
    }
    passage
}

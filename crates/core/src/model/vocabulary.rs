use serde::{Deserialize, Serialize};

use crate::model::{ids::WordId, word_record::WordRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    /// e.g. "us", "uk"
    pub accent: String,
    pub phonetic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub part_of_speech: Option<String>,
    pub meaning: String,
}

/// Catalog metadata for a word. Read-only from the scheduler's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word_id: WordId,
    pub spelling: String,
    pub pronunciations: Vec<Pronunciation>,
    pub translations: Vec<Translation>,
}

impl VocabularyEntry {
    #[must_use]
    pub fn new(word_id: WordId, spelling: impl Into<String>) -> Self {
        Self {
            word_id,
            spelling: spelling.into(),
            pronunciations: Vec::new(),
            translations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pronunciation(mut self, accent: impl Into<String>, phonetic: impl Into<String>) -> Self {
        self.pronunciations.push(Pronunciation {
            accent: accent.into(),
            phonetic: phonetic.into(),
        });
        self
    }

    #[must_use]
    pub fn with_translation(mut self, part_of_speech: Option<&str>, meaning: impl Into<String>) -> Self {
        self.translations.push(Translation {
            part_of_speech: part_of_speech.map(str::to_owned),
            meaning: meaning.into(),
        });
        self
    }
}

/// A learner's word record with its catalog entry attached when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordWithMetadata {
    pub record: WordRecord,
    pub entry: Option<VocabularyEntry>,
}

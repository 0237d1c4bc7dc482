use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CaptionError;

/// The words used as reserved control tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    /// Beginning-of-sequence word.
    #[serde(rename = "BOS_token")]
    pub bos: String,
    /// End-of-sequence word.
    #[serde(rename = "EOS_token")]
    pub eos: String,
    /// Padding word.
    #[serde(rename = "PAD_token")]
    pub pad: String,
    /// Out-of-vocabulary word.
    #[serde(rename = "UNK_token")]
    pub unk: String,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            bos: "<bos>".to_string(),
            eos: "<eos>".to_string(),
            pad: "<pad>".to_string(),
            unk: "<unk>".to_string(),
        }
    }
}

// serialized layout of the vocabulary asset
#[derive(Deserialize)]
struct VocabularyAsset {
    idx2word: Vec<String>,
    special_tokens: SpecialTokens,
}

/// Bidirectional mapping between token ids and words.
///
/// Ids form the dense range `[0, len)`. The four reserved ids (BOS, EOS, PAD and UNK)
/// are resolved once at construction and the mapping is immutable afterwards.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    idx2word: Vec<String>,
    word2idx: HashMap<String, u32>,
    bos: u32,
    eos: u32,
    pad: u32,
    unk: u32,
}

impl Vocabulary {
    /// Create a vocabulary from an id-ordered list of words.
    ///
    /// # Arguments
    ///
    /// * `words` - The words, where the position of each word is its token id.
    /// * `special` - The words acting as reserved tokens. They must be part of `words`.
    ///
    /// # Errors
    ///
    /// * `InvalidVocabulary` if the list is empty, too large or contains duplicates.
    /// * `UnknownWord` if a special token is missing from the list.
    pub fn new(words: Vec<String>, special: &SpecialTokens) -> Result<Self, CaptionError> {
        if words.is_empty() {
            return Err(CaptionError::InvalidVocabulary(
                "the word list is empty".to_string(),
            ));
        }

        if u32::try_from(words.len()).is_err() {
            return Err(CaptionError::InvalidVocabulary(format!(
                "{} words do not fit in a u32 token id",
                words.len()
            )));
        }

        let mut word2idx = HashMap::with_capacity(words.len());
        for (idx, word) in words.iter().enumerate() {
            if word2idx.insert(word.clone(), idx as u32).is_some() {
                return Err(CaptionError::InvalidVocabulary(format!(
                    "duplicated word '{word}'"
                )));
            }
        }

        let lookup = |word: &str| {
            word2idx
                .get(word)
                .copied()
                .ok_or_else(|| CaptionError::UnknownWord(word.to_string()))
        };

        let (bos, eos, pad, unk) = (
            lookup(&special.bos)?,
            lookup(&special.eos)?,
            lookup(&special.pad)?,
            lookup(&special.unk)?,
        );

        let reserved = [bos, eos, pad, unk];
        for (i, a) in reserved.iter().enumerate() {
            if reserved[i + 1..].contains(a) {
                return Err(CaptionError::InvalidVocabulary(format!(
                    "token id {a} is used by more than one special token"
                )));
            }
        }

        Ok(Self {
            idx2word: words,
            word2idx,
            bos,
            eos,
            pad,
            unk,
        })
    }

    /// Load the vocabulary from a JSON reader.
    ///
    /// The expected layout is `{"idx2word": [...], "special_tokens": {"BOS_token": ..,
    /// "EOS_token": .., "PAD_token": .., "UNK_token": ..}}`.
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self, CaptionError> {
        let asset: VocabularyAsset = serde_json::from_reader(reader)?;
        Self::new(asset.idx2word, &asset.special_tokens)
    }

    /// Load the vocabulary from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CaptionError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let vocab = Self::from_json_reader(std::io::BufReader::new(file))?;
        log::debug!("Loaded {} words from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    /// Map a token id to its word.
    pub fn id_to_word(&self, id: u32) -> Result<&str, CaptionError> {
        self.idx2word
            .get(id as usize)
            .map(String::as_str)
            .ok_or(CaptionError::UnknownId(id))
    }

    /// Map a word to its token id.
    pub fn word_to_id(&self, word: &str) -> Result<u32, CaptionError> {
        self.word2idx
            .get(word)
            .copied()
            .ok_or_else(|| CaptionError::UnknownWord(word.to_string()))
    }

    /// Map a word to its token id, falling back to the UNK id for unknown words.
    pub fn word_to_id_or_unk(&self, word: &str) -> u32 {
        self.word2idx.get(word).copied().unwrap_or(self.unk)
    }

    /// The number of words, `VOCAB_SIZE`.
    #[inline]
    pub fn len(&self) -> usize {
        self.idx2word.len()
    }

    /// Always false, a vocabulary holds at least its special tokens.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx2word.is_empty()
    }

    #[inline]
    pub fn bos(&self) -> u32 {
        self.bos
    }

    #[inline]
    pub fn eos(&self) -> u32 {
        self.eos
    }

    #[inline]
    pub fn pad(&self) -> u32 {
        self.pad
    }

    #[inline]
    pub fn unk(&self) -> u32 {
        self.unk
    }

    /// The reserved ids in `[BOS, EOS, PAD, UNK]` order.
    pub fn reserved_ids(&self) -> [u32; 4] {
        [self.bos, self.eos, self.pad, self.unk]
    }
}

//! Feature-hashing sentence encoder.
//!
//! Produces deterministic (but non-semantic) sentence embeddings from hashing
//! alone: no model files, no inference. Instructions and state descriptions
//! are short templated sentences, so the encoder hashes content words and
//! adjacent word pairs into signed buckets. Function words are skipped and
//! numbers are kept, so "cell 3" and "cell 4" stay apart while "the door is
//! open" and "door open" coincide.

use helios_core::error::HeliosResult;
use helios_core::traits::{SentenceEncoder, l2_normalize};
use helios_core::types::Embedding;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Separates the two words of a bigram feature.
const PAIR_SEPARATOR: u8 = 0x1f;

const DEFAULT_DIMENSION: usize = 384;
const DEFAULT_BIGRAM_WEIGHT: f32 = 0.5;

/// Words carrying no state information in descriptions.
const STOPWORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "for", "in", "is", "it", "its", "of", "on", "or",
    "that", "the", "there", "this", "to", "was", "with",
];

/// Feature-hashing sentence encoder.
///
/// Text is split into sentences on `.`, `!`, `?` and newlines; each sentence
/// becomes one L2-normalized vector. Text without any sentence content
/// encodes to a single zero vector.
///
/// # Examples
///
/// ```
/// use helios_core::SentenceEncoder;
/// use helios_embed::HashSentenceEncoder;
///
/// let encoder = HashSentenceEncoder::default_384();
/// let sentences = encoder.encode("Go to the door. Open it!").unwrap();
/// assert_eq!(sentences.len(), 2);
/// assert_eq!(sentences[0].len(), 384);
/// ```
#[derive(Debug, Clone)]
pub struct HashSentenceEncoder {
    dimension: usize,
    bigram_weight: f32,
    skip_stopwords: bool,
    id: String,
}

impl HashSentenceEncoder {
    /// Encoder with `dimension` buckets, stopword skipping and bigrams at
    /// half the weight of single words.
    ///
    /// # Panics
    ///
    /// Panics if `dimension` is zero.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be > 0");
        Self {
            dimension,
            bigram_weight: DEFAULT_BIGRAM_WEIGHT,
            skip_stopwords: true,
            id: format!("hash-sentence-{dimension}"),
        }
    }

    /// 384 buckets, the width of common small sentence models.
    #[must_use]
    pub fn default_384() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }

    /// Weight of adjacent word pairs relative to single words. Zero makes
    /// the encoding a bag of words.
    #[must_use]
    pub fn with_bigram_weight(mut self, weight: f32) -> Self {
        self.bigram_weight = weight.max(0.0);
        self
    }

    /// Hash function words too.
    #[must_use]
    pub fn keep_stopwords(mut self) -> Self {
        self.skip_stopwords = false;
        self
    }

    /// Encode a single sentence, ignoring sentence boundaries.
    #[must_use]
    pub fn encode_sentence(&self, sentence: &str) -> Embedding {
        let words: Vec<String> = words(sentence)
            .filter(|word| !(self.skip_stopwords && STOPWORDS.contains(&word.as_str())))
            .collect();

        let mut embedding = vec![0.0_f32; self.dimension];
        for word in &words {
            self.add_feature(&mut embedding, fnv1a(word.bytes()), 1.0);
        }
        if self.bigram_weight > 0.0 {
            for pair in words.windows(2) {
                let bytes = pair[0]
                    .bytes()
                    .chain(std::iter::once(PAIR_SEPARATOR))
                    .chain(pair[1].bytes());
                self.add_feature(&mut embedding, fnv1a(bytes), self.bigram_weight);
            }
        }
        l2_normalize(&embedding)
    }

    /// Low bits pick the bucket, the top bit the sign.
    fn add_feature(&self, embedding: &mut [f32], hash: u64, weight: f32) {
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (hash % self.dimension as u64) as usize;
        embedding[bucket] += if hash >> 63 == 0 { -weight } else { weight };
    }
}

impl SentenceEncoder for HashSentenceEncoder {
    fn encode(&self, text: &str) -> HeliosResult<Vec<Embedding>> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(vec![vec![0.0; self.dimension]]);
        }
        Ok(sentences
            .into_iter()
            .map(|sentence| self.encode_sentence(sentence))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Split text into trimmed, non-empty sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    bytes
        .into_iter()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Lowercased alphanumeric words. Single letters are dropped, numbers are
/// kept whatever their length.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 1 || word.chars().all(|c| c.is_ascii_digit()))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

//! Sentence encoder implementations for helios.
//!
//! - **Hash**: feature-hashing sentence encoder (content words and word
//!   pairs) with no model files, always available and fully deterministic.
//!
//! Learned encoders plug in by implementing
//! [`helios_core::SentenceEncoder`].

pub mod hash_encoder;

pub use hash_encoder::{HashSentenceEncoder, split_sentences};

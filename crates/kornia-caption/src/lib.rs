#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Kornia Image Captioning
//!
//! Turns an image embedding into natural-language captions with an autoregressive
//! language model.
//!
//! The pipeline is split in the following stages:
//!
//! - **Encoder**: preprocesses the image and wraps the pretrained image-to-embedding model
//! - **Decoder**: runs the autoregressive loop with best-path or temperature sampling
//! - **Renderer**: maps the generated token ids to words, hiding the reserved tokens
//!
//! ## Example
//!
//! ```rust,ignore
//! use kornia_caption::{CaptionConfig, Captioner, ImagePreprocessor, Vocabulary};
//!
//! let vocab = Vocabulary::from_json_file("vocab.json")?;
//! let captioner = Captioner::new(encoder, model, vocab)?;
//!
//! let (image, _size) = ImagePreprocessor::default().process_bytes(&bytes)?;
//! let captions = captioner.caption_image(&image, &CaptionConfig::default())?;
//! ```

/// Decoding configuration and the autoregressive sequence decoder.
pub mod decoder;

/// Image preprocessing and the image encoder capability.
pub mod encoder;

/// Error types for the caption module.
pub mod error;

/// The language model capability consumed by the decoder.
pub mod model;

/// High-level captioning entry points.
pub mod pipeline;

/// Rendering of token sequences into captions.
pub mod render;

/// Next-token selection strategies.
pub mod strategy;

/// Token id to word mapping.
pub mod vocab;

pub use decoder::{CaptionConfig, SequenceDecoder};
pub use encoder::{ImageEncoder, ImagePreprocessor, ModuleEncoder};
pub use error::CaptionError;
pub use model::LanguageModel;
pub use pipeline::{generate_captions, Captioner};
pub use render::{render_caption, render_captions};
pub use strategy::DecodingStrategy;
pub use vocab::{SpecialTokens, Vocabulary};

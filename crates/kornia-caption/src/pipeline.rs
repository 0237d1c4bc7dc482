use std::collections::HashSet;

use candle_core::Tensor;

use crate::decoder::{CaptionConfig, SequenceDecoder};
use crate::encoder::ImageEncoder;
use crate::error::CaptionError;
use crate::model::LanguageModel;
use crate::render::render_captions;
use crate::vocab::Vocabulary;

/// Generate captions for an image embedding.
///
/// # Arguments
///
/// * `embedding` - The image embedding produced by the image encoder.
/// * `model` - The language model predicting next-token distributions.
/// * `vocab` - The vocabulary used to render the sequences.
/// * `excluded` - The token ids hidden from the captions. The stop token is always hidden.
/// * `start_token` - The token fed to the model at the first step.
/// * `stop_token` - The token ending a sequence.
/// * `config` - The decoding parameters.
///
/// # Returns
///
/// `config.num_captions` captions in generation order.
pub fn generate_captions<M: LanguageModel>(
    embedding: &Tensor,
    model: &M,
    vocab: &Vocabulary,
    excluded: &HashSet<u32>,
    start_token: u32,
    stop_token: u32,
    config: &CaptionConfig,
) -> Result<Vec<String>, CaptionError> {
    let sequences = SequenceDecoder::new(model, config, start_token, stop_token)?.decode(embedding)?;

    if excluded.contains(&stop_token) {
        render_captions(&sequences, vocab, excluded)
    } else {
        let mut excluded = excluded.clone();
        excluded.insert(stop_token);
        render_captions(&sequences, vocab, &excluded)
    }
}

/// The image captioning pipeline.
///
/// Holds the initialized encoder, language model and vocabulary. It is built once and
/// shared by every caption request.
pub struct Captioner<E: ImageEncoder, M: LanguageModel> {
    encoder: E,
    model: M,
    vocab: Vocabulary,
    excluded: HashSet<u32>,
}

impl<E: ImageEncoder, M: LanguageModel> Captioner<E, M> {
    /// Create a captioner hiding the four reserved tokens from the captions.
    ///
    /// # Errors
    ///
    /// `InvalidVocabulary` if the model does not predict over the vocabulary.
    pub fn new(encoder: E, model: M, vocab: Vocabulary) -> Result<Self, CaptionError> {
        if model.vocab_size() != vocab.len() {
            return Err(CaptionError::InvalidVocabulary(format!(
                "the model predicts {} tokens but the vocabulary has {} words",
                model.vocab_size(),
                vocab.len()
            )));
        }

        let excluded = vocab.reserved_ids().into_iter().collect();

        Ok(Self {
            encoder,
            model,
            vocab,
            excluded,
        })
    }

    /// Replace the token ids hidden from the captions.
    pub fn with_excluded(mut self, excluded: impl IntoIterator<Item = u32>) -> Self {
        self.excluded = excluded.into_iter().collect();
        self
    }

    #[inline]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    #[inline]
    pub fn excluded(&self) -> &HashSet<u32> {
        &self.excluded
    }

    /// Caption a preprocessed image tensor.
    ///
    /// A failure of the image encoder is reported as `ModelFailure`.
    pub fn caption_image(
        &self,
        image: &Tensor,
        config: &CaptionConfig,
    ) -> Result<Vec<String>, CaptionError> {
        let embedding = self.encoder.encode(image).map_err(CaptionError::model)?;
        self.caption_embedding(&embedding, config)
    }

    /// Caption an image embedding, starting from BOS and stopping at EOS.
    pub fn caption_embedding(
        &self,
        embedding: &Tensor,
        config: &CaptionConfig,
    ) -> Result<Vec<String>, CaptionError> {
        generate_captions(
            embedding,
            &self.model,
            &self.vocab,
            &self.excluded,
            self.vocab.bos(),
            self.vocab.eos(),
            config,
        )
    }
}

use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use candle_core::Tensor;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CaptionError;
use crate::model::LanguageModel;
use crate::strategy::{read_distribution, DecodingStrategy};

/// Caption lengths offered by the demo front-end.
pub const MAX_LENGTH_RANGE: RangeInclusive<usize> = 1..=20;

/// Number of captions offered by the demo front-end when sampling.
pub const NUM_CAPTIONS_RANGE: RangeInclusive<usize> = 1..=15;

/// Sampling temperatures offered by the demo front-end.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.1..=2.0;

/// Configuration of a caption generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// The maximal number of generated tokens per sequence, stop token included.
    pub max_length: usize,
    /// The number of independent sequences to generate.
    ///
    /// NOTE: under [`DecodingStrategy::BestPath`] every sequence is identical.
    pub num_captions: usize,
    /// The sampling temperature, must be positive when sampling.
    pub temperature: f64,
    pub strategy: DecodingStrategy,
    /// Seed of the random source. Sequence `i` is sampled with `seed + i`.
    pub seed: u64,
    /// Optional wall-clock bound for the whole decode call, checked before each model step.
    pub timeout: Option<Duration>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_length: 8,
            num_captions: 5,
            temperature: 0.5,
            strategy: DecodingStrategy::Sample,
            seed: 299792458,
            timeout: None,
        }
    }
}

impl CaptionConfig {
    /// A single deterministic caption, the "use best option" mode of the demo.
    pub fn best_path(max_length: usize) -> Self {
        Self {
            max_length,
            num_captions: 1,
            temperature: 1.0,
            strategy: DecodingStrategy::BestPath,
            ..Default::default()
        }
    }

    /// Check the parameters before any model call.
    pub fn validate(&self) -> Result<(), CaptionError> {
        if self.max_length < 1 {
            return Err(CaptionError::InvalidParameter(
                "max_length must be at least 1".to_string(),
            ));
        }
        if self.num_captions < 1 {
            return Err(CaptionError::InvalidParameter(
                "num_captions must be at least 1".to_string(),
            ));
        }
        if self.strategy == DecodingStrategy::Sample
            && !(self.temperature > 0.0 && self.temperature.is_finite())
        {
            return Err(CaptionError::InvalidParameter(format!(
                "temperature must be positive when sampling, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Autoregressive decoder producing token sequences from an image embedding.
pub struct SequenceDecoder<'a, M: LanguageModel> {
    model: &'a M,
    config: &'a CaptionConfig,
    start_token: u32,
    stop_token: u32,
}

impl<'a, M: LanguageModel> SequenceDecoder<'a, M> {
    /// Create a decoder for one request.
    ///
    /// # Arguments
    ///
    /// * `model` - The language model predicting next-token distributions.
    /// * `config` - The decoding parameters, validated here.
    /// * `start_token` - The token fed to the model at the first step, usually BOS.
    /// * `stop_token` - The token ending a sequence, usually EOS.
    pub fn new(
        model: &'a M,
        config: &'a CaptionConfig,
        start_token: u32,
        stop_token: u32,
    ) -> Result<Self, CaptionError> {
        config.validate()?;

        let vocab_size = model.vocab_size();
        for (name, token) in [("start", start_token), ("stop", stop_token)] {
            if token as usize >= vocab_size {
                return Err(CaptionError::InvalidParameter(format!(
                    "{name} token {token} is outside of the vocabulary of size {vocab_size}"
                )));
            }
        }

        if config.strategy == DecodingStrategy::BestPath && config.num_captions > 1 {
            log::warn!(
                "Best-path decoding of {} captions yields identical sequences",
                config.num_captions
            );
        }

        Ok(Self {
            model,
            config,
            start_token,
            stop_token,
        })
    }

    /// Generate `num_captions` sequences in generation order.
    ///
    /// Each sequence holds between 1 and `max_length` tokens and ends with the stop
    /// token unless the length limit was reached first.
    pub fn decode(&self, embedding: &Tensor) -> Result<Vec<Vec<u32>>, CaptionError> {
        let start = Instant::now();
        let sequences = (0..self.config.num_captions)
            .map(|index| self.decode_one(embedding, index, start))
            .collect::<Result<Vec<_>, _>>()?;
        self.log_summary(&sequences, start);
        Ok(sequences)
    }

    fn log_summary(&self, sequences: &[Vec<u32>], start: Instant) {
        let dt = start.elapsed();
        let generated_tokens = sequences.iter().map(Vec::len).sum::<usize>();
        log::info!(
            "{} sequences, {generated_tokens} tokens generated ({:.2} token/s)",
            sequences.len(),
            generated_tokens as f64 / dt.as_secs_f64().max(f64::EPSILON),
        );
    }

    fn check_timeout(&self, start: Instant) -> Result<(), CaptionError> {
        match self.config.timeout {
            Some(timeout) if start.elapsed() >= timeout => Err(CaptionError::Timeout(timeout)),
            _ => Ok(()),
        }
    }

    fn decode_one(
        &self,
        embedding: &Tensor,
        index: usize,
        start: Instant,
    ) -> Result<Vec<u32>, CaptionError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(index as u64));
        let mut state = self
            .model
            .init_state(embedding)
            .map_err(CaptionError::model)?;
        self.check_timeout(start)?;

        let vocab_size = self.model.vocab_size();
        let mut tokens = Vec::with_capacity(self.config.max_length);
        let mut token = self.start_token;

        while tokens.len() < self.config.max_length {
            if !tokens.is_empty() {
                self.check_timeout(start)?;
            }

            let dist = self
                .model
                .predict(&mut state, token)
                .map_err(CaptionError::model)?;
            let probs = read_distribution(&dist, vocab_size)?;

            token = self.config.strategy.choose_next_token(
                &probs,
                self.config.temperature,
                &mut rng,
            )?;
            tokens.push(token);

            if token == self.stop_token {
                break;
            }
        }

        log::debug!("sequence {index}: {tokens:?}");

        Ok(tokens)
    }
}

impl<M: LanguageModel + Sync> SequenceDecoder<'_, M> {
    /// Same as [`SequenceDecoder::decode`], generating the sequences on the rayon pool.
    ///
    /// Every sequence owns its state and random source, the result is identical to
    /// the sequential decode.
    pub fn decode_parallel(&self, embedding: &Tensor) -> Result<Vec<Vec<u32>>, CaptionError> {
        let start = Instant::now();
        let sequences = (0..self.config.num_captions)
            .into_par_iter()
            .map(|index| self.decode_one(embedding, index, start))
            .collect::<Result<Vec<_>, _>>()?;
        self.log_summary(&sequences, start);
        Ok(sequences)
    }
}

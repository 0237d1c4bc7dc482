use candle_core::{DType, Tensor};
use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CaptionError;

/// How the next token is chosen from the predicted distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodingStrategy {
    /// Draw the next token from the temperature-rescaled distribution.
    #[default]
    Sample,
    /// Pick the most probable token, the lowest id wins ties.
    BestPath,
}

impl DecodingStrategy {
    /// Select the next token from a validated probability distribution.
    ///
    /// # Arguments
    ///
    /// * `probs` - The probabilities over the vocabulary, as returned by [`read_distribution`].
    /// * `temperature` - The sampling temperature, ignored by best-path.
    /// * `rng` - The random source, ignored by best-path.
    pub fn choose_next_token<R: Rng + ?Sized>(
        &self,
        probs: &[f32],
        temperature: f64,
        rng: &mut R,
    ) -> Result<u32, CaptionError> {
        match self {
            Self::BestPath => best_path(probs),
            Self::Sample => sample(probs, temperature, rng),
        }
    }
}

fn best_path(probs: &[f32]) -> Result<u32, CaptionError> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &p) in probs.iter().enumerate() {
        // strict comparison keeps the first index on ties
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((idx, p)),
        }
    }

    best.map(|(idx, _)| idx as u32)
        .ok_or_else(|| CaptionError::ModelFailure("empty distribution".to_string()))
}

fn sample<R: Rng + ?Sized>(probs: &[f32], temperature: f64, rng: &mut R) -> Result<u32, CaptionError> {
    let weights = rescale(probs, temperature);
    let dist = WeightedIndex::new(&weights).map_err(CaptionError::model)?;
    Ok(dist.sample(rng) as u32)
}

/// Rescale probabilities by `p^(1 / temperature)` in log space.
///
/// The weights are not normalized, the largest one is always `1.0` and zero
/// probabilities stay zero. The log-probabilities are centered on their maximum
/// before the division so tiny temperatures underflow to zero instead of `-inf`.
pub(crate) fn rescale(probs: &[f32], temperature: f64) -> Vec<f64> {
    let log_probs = probs.iter().map(|&p| (p as f64).ln()).collect::<Vec<_>>();

    let max = log_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    log_probs
        .into_iter()
        .map(|l| {
            if l.is_finite() {
                ((l - max) / temperature).exp()
            } else {
                0.0
            }
        })
        .collect()
}

/// Read a predicted distribution into a vector of probabilities.
///
/// Leading singleton dimensions are accepted, e.g. `[1, 1, VOCAB_SIZE]`.
///
/// # Errors
///
/// `ModelFailure` if the distribution has the wrong length, holds non-finite or
/// negative values, or has no probability mass.
pub fn read_distribution(dist: &Tensor, vocab_size: usize) -> Result<Vec<f32>, CaptionError> {
    let dims = dist.dims();
    let well_shaped = match dims.split_last() {
        Some((&last, leading)) => last == vocab_size && leading.iter().all(|&d| d == 1),
        None => false,
    };
    if !well_shaped {
        return Err(CaptionError::ModelFailure(format!(
            "expected a distribution over {vocab_size} tokens, got shape {dims:?}"
        )));
    }

    let probs = dist
        .flatten_all()
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(CaptionError::model)?;

    if let Some((idx, p)) = probs
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(CaptionError::ModelFailure(format!(
            "invalid probability {p} for token {idx}"
        )));
    }

    if probs.iter().all(|&p| p == 0.0) {
        return Err(CaptionError::ModelFailure(
            "the distribution has no probability mass".to_string(),
        ));
    }

    Ok(probs)
}

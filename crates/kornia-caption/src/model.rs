use candle_core::Tensor;

/// An autoregressive language model conditioned on an image embedding.
///
/// The decoder only relies on this capability: the running state is seeded from the
/// embedding and each prediction advances it by one token.
pub trait LanguageModel {
    /// The running hidden representation of one sequence.
    type State;

    /// The size of the predicted distributions, `VOCAB_SIZE`.
    fn vocab_size(&self) -> usize;

    /// Initialize the decoder state from the image embedding.
    fn init_state(&self, embedding: &Tensor) -> candle_core::Result<Self::State>;

    /// Predict the next-token distribution given the previous token.
    ///
    /// The returned tensor must be rank-1 with `vocab_size` finite, non-negative
    /// probabilities. The state is advanced in place.
    fn predict(&self, state: &mut Self::State, token: u32) -> candle_core::Result<Tensor>;
}

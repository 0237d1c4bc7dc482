use std::collections::HashSet;

use crate::error::CaptionError;
use crate::vocab::Vocabulary;

/// Render a generated sequence into a caption.
///
/// The words of the tokens not in `excluded` are joined by single spaces, in the
/// original order. A sequence with no surviving token renders to an empty string.
pub fn render_caption(
    tokens: &[u32],
    vocab: &Vocabulary,
    excluded: &HashSet<u32>,
) -> Result<String, CaptionError> {
    let words = tokens
        .iter()
        .filter(|&&token| !excluded.contains(&token))
        .map(|&token| vocab.id_to_word(token))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(words.join(" "))
}

/// Render a batch of sequences, keeping the generation order.
pub fn render_captions(
    sequences: &[Vec<u32>],
    vocab: &Vocabulary,
    excluded: &HashSet<u32>,
) -> Result<Vec<String>, CaptionError> {
    sequences
        .iter()
        .map(|tokens| render_caption(tokens, vocab, excluded))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::SpecialTokens;

    fn vocab() -> Vocabulary {
        let words = ["<bos>", "<eos>", "<pad>", "<unk>", "a", "dog", "runs"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        Vocabulary::new(words, &SpecialTokens::default()).unwrap()
    }

    #[test]
    fn test_render_filters_excluded() -> Result<(), CaptionError> {
        let vocab = vocab();
        let excluded = vocab.reserved_ids().into_iter().collect();
        let caption = render_caption(&[0, 4, 5, 2, 3, 6, 1], &vocab, &excluded)?;
        assert_eq!(caption, "a dog runs");
        Ok(())
    }

    #[test]
    fn test_render_empty() -> Result<(), CaptionError> {
        let vocab = vocab();
        let excluded = HashSet::from([vocab.eos()]);
        assert_eq!(render_caption(&[1], &vocab, &excluded)?, "");
        assert_eq!(render_caption(&[], &vocab, &excluded)?, "");
        Ok(())
    }

    #[test]
    fn test_render_without_exclusions() -> Result<(), CaptionError> {
        let vocab = vocab();
        let caption = render_caption(&[5, 1], &vocab, &HashSet::new())?;
        assert_eq!(caption, "dog <eos>");
        Ok(())
    }

    #[test]
    fn test_render_unknown_id() {
        let vocab = vocab();
        let res = render_caption(&[4, 42], &vocab, &HashSet::new());
        assert!(matches!(res, Err(CaptionError::UnknownId(42))));
    }

    #[test]
    fn test_excluded_unknown_id_is_skipped() -> Result<(), CaptionError> {
        let vocab = vocab();
        let caption = render_caption(&[4, 42], &vocab, &HashSet::from([42]))?;
        assert_eq!(caption, "a");
        Ok(())
    }

    #[test]
    fn test_render_batch_order() -> Result<(), CaptionError> {
        let vocab = vocab();
        let excluded = HashSet::from([vocab.eos()]);
        let captions = render_captions(&[vec![5, 1], vec![4, 5], vec![6]], &vocab, &excluded)?;
        assert_eq!(captions, vec!["dog", "a dog", "runs"]);
        Ok(())
    }
}

#![cfg(test)]

use std::sync::Arc;

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::lexicon::Lexicon;
use crate::lm::ArpaModel;
use crate::scorer::Scorer;

/// Two labels plus blank: 'a' = 0, 'b' = 1, blank = 2.
pub fn ab_alphabet() -> Alphabet {
    Alphabet::new(vec!["a".into(), "b".into()]).unwrap()
}

/// Word-mode alphabet: 'a' = 0, 'b' = 1, space = 2, blank = 3.
pub fn word_alphabet() -> Alphabet {
    Alphabet::new(vec!["a".into(), "b".into(), " ".into()]).unwrap()
}

/// Bigram model over the words "a" and "ab".
pub const TOY_ARPA: &str = "\
\\data\\
ngram 1=5
ngram 2=4

\\1-grams:
-99.0\t<s>\t-0.30103
-0.7\t</s>
-0.7\t<unk>
-0.39794\ta\t-0.30103
-0.69897\tab\t-0.30103

\\2-grams:
-0.30103\t<s> a
-0.69897\t<s> ab
-0.47712\ta ab
-0.60206\ta </s>

\\end\\
";

pub fn toy_scorer(alpha: f32, beta: f32, alphabet: Alphabet) -> Scorer {
    let lm = ArpaModel::from_text(TOY_ARPA).unwrap();
    Scorer::new(alpha, beta, Box::new(lm), alphabet)
}

pub fn ab_lexicon(alphabet: &Alphabet) -> Arc<Lexicon> {
    Arc::new(Lexicon::from_words(["a", "ab"], alphabet).unwrap())
}

/// Wide-open cutoffs so small scenarios see every label.
pub fn test_config(alphabet: &Alphabet, beam_size: usize) -> DecoderConfig {
    DecoderConfig {
        beam_size,
        cutoff_prob: 1.0,
        cutoff_top_n: alphabet.size() + 1,
        top_paths: 1,
        num_workers: 1,
    }
}

/// Flatten probability rows into the `[time][class]` layout `feed` takes.
pub fn rows(frames: &[&[f32]]) -> Vec<f32> {
    frames.iter().flat_map(|row| row.iter().copied()).collect()
}

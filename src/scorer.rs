//! Language-model façade consumed by the beam search.
//!
//! Wraps an n-gram model, the alphabet it scores over, an optional lexicon
//! and the two search weights: `alpha` scales language-model
//! log-probabilities, `beta` is a flat bonus per scored unit.

use std::path::Path;
use std::sync::Arc;

use crate::alphabet::Alphabet;
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::lm::{ArpaModel, LanguageModel, START_TOKEN};

use crate::decoder::trie::{NodeId, PathTrie};

pub struct Scorer {
    /// Language-model weight.
    pub alpha: f32,
    /// Per-unit insertion weight.
    pub beta: f32,
    lm: Box<dyn LanguageModel>,
    lexicon: Option<Arc<Lexicon>>,
    alphabet: Alphabet,
    character_based: bool,
}

impl Scorer {
    /// Word-based scorer over the given model. Switch to per-character
    /// scoring with [`character_based`](Self::character_based).
    pub fn new(alpha: f32, beta: f32, lm: Box<dyn LanguageModel>, alphabet: Alphabet) -> Self {
        Self {
            alpha,
            beta,
            lm,
            lexicon: None,
            alphabet,
            character_based: false,
        }
    }

    pub fn from_arpa_file(alpha: f32, beta: f32, path: &Path, alphabet: Alphabet) -> Result<Self> {
        let lm = ArpaModel::open(path)?;
        Ok(Self::new(alpha, beta, Box::new(lm), alphabet))
    }

    pub fn with_lexicon(mut self, lexicon: Arc<Lexicon>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    pub fn character_based(mut self, yes: bool) -> Self {
        self.character_based = yes;
        self
    }

    pub fn is_character_based(&self) -> bool {
        self.character_based
    }

    pub fn max_order(&self) -> usize {
        self.lm.order()
    }

    pub fn lexicon(&self) -> Option<&Arc<Lexicon>> {
        self.lexicon.as_ref()
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Whether appending `new_label` to `prefix` completes a scorable unit.
    ///
    /// Character-based models score every extension. Word-based models
    /// score exactly at a space following a non-empty prefix that does not
    /// already end in one.
    pub(crate) fn is_scoring_boundary(
        &self,
        trie: &PathTrie,
        prefix: NodeId,
        new_label: u32,
    ) -> bool {
        if self.character_based {
            return true;
        }
        let Some(space_id) = self.alphabet.space_id() else {
            return false;
        };
        if new_label != space_id || trie.is_root(prefix) {
            return false;
        }
        trie.node(prefix).character != Some(space_id)
    }

    /// The scored units ending at `prefix`: up to `max_order - 1` preceding
    /// units plus the current one, oldest first, left-padded with the
    /// sentence-start token when the walk reaches the utterance start.
    pub(crate) fn make_ngram(&self, trie: &PathTrie, prefix: NodeId) -> Vec<String> {
        let max_order = self.lm.order();
        let mut ngram = Vec::with_capacity(max_order);
        let mut current = prefix;
        for order in 0..max_order {
            if trie.is_root(current) {
                for _ in order..max_order {
                    ngram.push(START_TOKEN.to_string());
                }
                break;
            }
            let (labels, stop) = if self.character_based {
                trie.prev_grapheme(current)
            } else {
                trie.prev_word(current, self.alphabet.space_id())
            };
            ngram.push(self.alphabet.labels_to_string(&labels));
            if trie.is_root(stop) {
                for _ in order + 1..max_order {
                    ngram.push(START_TOKEN.to_string());
                }
                break;
            }
            match trie.node(stop).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        ngram.reverse();
        ngram
    }

    /// Conditional probability of the last unit of `ngram` given the
    /// preceding ones, in natural log. The search weight `alpha` is applied
    /// by the caller.
    pub fn get_log_cond_prob(&self, ngram: &[String], bos: bool) -> f32 {
        self.lm.log_cond_prob(ngram, bos, false)
    }

    /// Full-sentence log-probability with start and end framing; used only
    /// to back language-model contributions out of emitted confidences.
    pub fn get_sent_log_prob(&self, words: &[String]) -> f32 {
        let order = self.lm.order();
        let n = words.len();
        let mut score = 0.0;
        for i in 0..n {
            let (begin, bos) = if i + 1 < order {
                (0, true)
            } else {
                (i + 1 - order, false)
            };
            score += self.lm.log_cond_prob(&words[begin..=i], bos, false);
        }
        let (begin, bos) = if n + 1 < order {
            (0, true)
        } else {
            (n + 1 - order, false)
        };
        score + self.lm.log_cond_prob(&words[begin..], bos, true)
    }

    /// Inverse of label emission: the label sequence split into the units
    /// the language model scores. Empty units (runs of spaces) are dropped.
    pub fn split_labels_into_scored_units(&self, labels: &[u32]) -> Vec<String> {
        let mut units = Vec::new();
        let mut current: Vec<u32> = Vec::new();
        for &label in labels {
            if self.character_based {
                if Alphabet::is_codepoint_boundary(label) && !current.is_empty() {
                    units.push(self.alphabet.labels_to_string(&current));
                    current.clear();
                }
                current.push(label);
            } else if Some(label) == self.alphabet.space_id() {
                if !current.is_empty() {
                    units.push(self.alphabet.labels_to_string(&current));
                    current.clear();
                }
            } else {
                current.push(label);
            }
        }
        if !current.is_empty() {
            units.push(self.alphabet.labels_to_string(&current));
        }
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::trie::{PathTrie, ROOT};

    const WORD_ARPA: &str = "\
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

    fn word_alphabet() -> Alphabet {
        Alphabet::new(vec!["a".into(), "b".into(), " ".into()]).unwrap()
    }

    fn word_scorer(alpha: f32, beta: f32) -> Scorer {
        let lm = ArpaModel::from_text(WORD_ARPA).unwrap();
        Scorer::new(alpha, beta, Box::new(lm), word_alphabet())
    }

    fn char_scorer() -> Scorer {
        let lm = ArpaModel::from_text(WORD_ARPA).unwrap();
        Scorer::new(1.0, 0.0, Box::new(lm), word_alphabet()).character_based(true)
    }

    /// Trie spelling "ab a" (labels a=0, b=1, space=2), returning the node
    /// of each step.
    fn ab_space_a(trie: &mut PathTrie) -> Vec<crate::decoder::trie::NodeId> {
        let mut nodes = Vec::new();
        let mut prefix = ROOT;
        for (t, &label) in [0u32, 1, 2, 0].iter().enumerate() {
            prefix = trie.extend(prefix, label, t, -0.1, true).unwrap();
            nodes.push(prefix);
        }
        nodes
    }

    #[test]
    fn test_word_boundary_predicate() {
        let scorer = word_scorer(1.0, 0.0);
        let mut trie = PathTrie::new();
        let nodes = ab_space_a(&mut trie);
        // space after "ab": boundary
        assert!(scorer.is_scoring_boundary(&trie, nodes[1], 2));
        // non-space labels never are
        assert!(!scorer.is_scoring_boundary(&trie, nodes[1], 0));
        // space at the very start is not
        assert!(!scorer.is_scoring_boundary(&trie, ROOT, 2));
        // double space is not
        assert!(!scorer.is_scoring_boundary(&trie, nodes[2], 2));
    }

    #[test]
    fn test_char_boundary_predicate() {
        let scorer = char_scorer();
        let mut trie = PathTrie::new();
        let nodes = ab_space_a(&mut trie);
        assert!(scorer.is_scoring_boundary(&trie, nodes[0], 1));
        assert!(scorer.is_scoring_boundary(&trie, ROOT, 0));
    }

    #[test]
    fn test_make_ngram_pads_with_sentence_start() {
        let scorer = word_scorer(1.0, 0.0);
        let mut trie = PathTrie::new();
        let nodes = ab_space_a(&mut trie);
        // first word only: [<s>, "ab"]
        let ngram = scorer.make_ngram(&trie, nodes[1]);
        assert_eq!(ngram, vec![START_TOKEN.to_string(), "ab".to_string()]);
    }

    #[test]
    fn test_make_ngram_crosses_space() {
        let scorer = word_scorer(1.0, 0.0);
        let mut trie = PathTrie::new();
        let nodes = ab_space_a(&mut trie);
        // second word with its predecessor: ["ab", "a"]
        let ngram = scorer.make_ngram(&trie, nodes[3]);
        assert_eq!(ngram, vec!["ab".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_make_ngram_character_mode() {
        let scorer = char_scorer();
        let mut trie = PathTrie::new();
        let nodes = ab_space_a(&mut trie);
        // bigram of the last two characters
        let ngram = scorer.make_ngram(&trie, nodes[1]);
        assert_eq!(ngram, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_split_units_word_mode() {
        let scorer = word_scorer(1.0, 0.0);
        assert_eq!(
            scorer.split_labels_into_scored_units(&[0, 1, 2, 0]),
            vec!["ab".to_string(), "a".to_string()]
        );
        // runs of spaces produce no empty units
        assert_eq!(
            scorer.split_labels_into_scored_units(&[2, 0, 2, 2]),
            vec!["a".to_string()]
        );
        assert!(scorer.split_labels_into_scored_units(&[]).is_empty());
    }

    #[test]
    fn test_split_units_char_mode() {
        let scorer = char_scorer();
        assert_eq!(
            scorer.split_labels_into_scored_units(&[0, 1, 0]),
            vec!["a".to_string(), "b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_sent_log_prob_matches_chain_rule() {
        let scorer = word_scorer(1.0, 0.0);
        let words = vec!["a".to_string(), "ab".to_string()];
        // P(a|<s>) * P(ab|a) * P(</s>|ab)
        let p_a = scorer.lm.log_cond_prob(&words[..1], true, false);
        let p_ab = scorer.lm.log_cond_prob(&words[..2], false, false);
        let p_end = scorer.lm.log_cond_prob(&words[1..], false, true);
        let want = p_a + p_ab + p_end;
        let got = scorer.get_sent_log_prob(&words);
        assert!((got - want).abs() < 1e-5, "got {got}, want {want}");
    }

    #[test]
    fn test_sent_log_prob_empty() {
        let scorer = word_scorer(1.0, 0.0);
        // just P(</s> | <s>)
        let got = scorer.get_sent_log_prob(&[]);
        let want = scorer.lm.log_cond_prob(&[], true, true);
        assert!((got - want).abs() < 1e-6);
    }
}

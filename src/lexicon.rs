//! Lexicon acceptor used to constrain beam extensions to in-vocabulary
//! words.
//!
//! The acceptor is a prefix-sharing FST whose arc input labels are alphabet
//! labels shifted by one (0 stays reserved for epsilon, see
//! [`Alphabet::fst_input_label`]). Word ends are final states. During
//! decoding the FST itself is shared read-only; each prefix node carries its
//! own state id, and arc lookup is a binary search over the input-sorted
//! arc list, so no scan state outlives a query.

use std::collections::BTreeMap;
use std::path::Path;

use rustfst::prelude::*;

use crate::alphabet::Alphabet;
use crate::error::{DecodeError, Result};

pub struct Lexicon {
    fst: VectorFst<TropicalWeight>,
}

impl Lexicon {
    /// Build the acceptor from a word list.
    ///
    /// Words that contain text outside the alphabet are rejected. Arcs are
    /// emitted in ascending input-label order per state.
    pub fn from_words<'a, I>(words: I, alphabet: &Alphabet) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        // First pass: a plain trie over label sequences.
        let mut children: Vec<BTreeMap<Label, usize>> = vec![BTreeMap::new()];
        let mut finals: Vec<bool> = vec![false];
        for word in words {
            let labels = alphabet.encode(word).ok_or_else(|| {
                DecodeError::InvalidArgument(format!(
                    "word {word:?} contains labels outside the alphabet"
                ))
            })?;
            let mut node = 0usize;
            for label in labels {
                let ilabel = Alphabet::fst_input_label(label) as Label;
                node = match children[node].get(&ilabel) {
                    Some(&next) => next,
                    None => {
                        let next = children.len();
                        children[node].insert(ilabel, next);
                        children.push(BTreeMap::new());
                        finals.push(false);
                        next
                    }
                };
            }
            finals[node] = true;
        }

        // Second pass: emit the FST with input-sorted arcs.
        let mut fst = VectorFst::<TropicalWeight>::new();
        let states: Vec<StateId> = (0..children.len()).map(|_| fst.add_state()).collect();
        fst.set_start(states[0])
            .map_err(|e| DecodeError::Lexicon(e.to_string()))?;
        for (node, arcs) in children.iter().enumerate() {
            for (&ilabel, &next) in arcs {
                fst.add_tr(
                    states[node],
                    Tr::new(ilabel, ilabel, TropicalWeight::one(), states[next]),
                )
                .map_err(|e| DecodeError::Lexicon(e.to_string()))?;
            }
            if finals[node] {
                fst.set_final(states[node], TropicalWeight::one())
                    .map_err(|e| DecodeError::Lexicon(e.to_string()))?;
            }
        }
        Ok(Self { fst })
    }

    /// Load a prebuilt acceptor from its binary form.
    ///
    /// The file contract requires input-sorted arcs (anything produced by
    /// [`Lexicon::save`] qualifies); unsorted input is rejected.
    pub fn open(path: &Path) -> Result<Self> {
        let fst = VectorFst::<TropicalWeight>::read(path)
            .map_err(|e| DecodeError::Lexicon(e.to_string()))?;
        let lexicon = Self { fst };
        for state in lexicon.fst.states_iter() {
            let trs = lexicon
                .fst
                .get_trs(state)
                .map_err(|e| DecodeError::Lexicon(e.to_string()))?;
            let arcs = trs.trs();
            if arcs.windows(2).any(|w| w[0].ilabel > w[1].ilabel) {
                return Err(DecodeError::Lexicon(format!(
                    "state {state} has unsorted input labels"
                )));
            }
        }
        Ok(lexicon)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.fst
            .write(path)
            .map_err(|e| DecodeError::Lexicon(e.to_string()))
    }

    pub fn start(&self) -> StateId {
        self.fst.start().unwrap_or(0)
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.fst.is_final(state).unwrap_or(false)
    }

    /// Final state with no outgoing arcs: the word admits no continuation.
    pub fn is_final_leaf(&self, state: StateId) -> bool {
        self.is_final(state) && self.fst.num_trs(state).map(|n| n == 0).unwrap_or(true)
    }

    /// Follow the arc with the given input label, if present.
    pub fn advance(&self, state: StateId, ilabel: Label) -> Option<StateId> {
        let trs = self.fst.get_trs(state).ok()?;
        let arcs = trs.trs();
        arcs.binary_search_by_key(&ilabel, |tr| tr.ilabel)
            .ok()
            .map(|i| arcs[i].nextstate)
    }

    /// Whether the label sequence spells a complete in-vocabulary word.
    pub fn accepts(&self, labels: &[u32]) -> bool {
        let mut state = self.start();
        for &label in labels {
            match self.advance(state, Alphabet::fst_input_label(label) as Label) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.is_final(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_alphabet() -> Alphabet {
        Alphabet::new(vec!["a".into(), "b".into()]).unwrap()
    }

    fn ab_lexicon() -> Lexicon {
        Lexicon::from_words(["a", "ab"], &ab_alphabet()).unwrap()
    }

    #[test]
    fn test_accepts_vocabulary_words() {
        let lex = ab_lexicon();
        assert!(lex.accepts(&[0]));
        assert!(lex.accepts(&[0, 1]));
        assert!(!lex.accepts(&[1]));
        assert!(!lex.accepts(&[0, 1, 0]));
        assert!(!lex.accepts(&[]));
    }

    #[test]
    fn test_prefix_sharing() {
        let lex = ab_lexicon();
        let s1 = lex
            .advance(lex.start(), Alphabet::fst_input_label(0) as Label)
            .unwrap();
        // "a" is both a word and the prefix of "ab"
        assert!(lex.is_final(s1));
        let s2 = lex.advance(s1, Alphabet::fst_input_label(1) as Label).unwrap();
        assert!(lex.is_final(s2));
        assert!(lex.advance(s1, Alphabet::fst_input_label(0) as Label).is_none());
    }

    #[test]
    fn test_rejects_out_of_alphabet_word() {
        let err = Lexicon::from_words(["ax"], &ab_alphabet());
        assert!(matches!(err, Err(DecodeError::InvalidArgument(_))));
    }

    #[test]
    fn test_save_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.fst");
        let lex = ab_lexicon();
        lex.save(&path).unwrap();
        let loaded = Lexicon::open(&path).unwrap();
        assert!(loaded.accepts(&[0, 1]));
        assert!(!loaded.accepts(&[1, 0]));
    }
}

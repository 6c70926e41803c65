use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::error::{DecodeError, Result};
use crate::lm::OOV_SCORE;
use crate::logmath::{log_sum_exp, pruned_top_k, LOG_ZERO};
use crate::scorer::Scorer;

use super::trie::{NodeId, PathTrie, ROOT};
use super::Output;

/// Incremental beam-search state over one utterance.
///
/// Frames are consumed by [`feed`](Self::feed); [`finish`](Self::finish)
/// ranks the surviving prefixes and emits the best hypotheses without
/// consuming the state, so more frames may still follow.
///
/// The state is single-threaded by construction; parallelism happens one
/// utterance per decoder (see [`decode_batch`](super::decode_batch)).
pub struct CtcDecoderState<'s> {
    abs_time_step: usize,
    beam_size: usize,
    cutoff_prob: f32,
    cutoff_top_n: usize,
    top_paths: usize,
    blank_id: u32,
    class_dim: usize,
    trie: PathTrie,
    beam: Vec<NodeId>,
    scorer: Option<&'s Scorer>,
}

impl<'s> CtcDecoderState<'s> {
    pub fn new(
        alphabet: &Alphabet,
        config: &DecoderConfig,
        scorer: Option<&'s Scorer>,
    ) -> Result<Self> {
        let class_dim = alphabet.size() + 1;
        config.validate(class_dim)?;
        if let Some(scorer) = scorer {
            if scorer.alphabet().size() != alphabet.size() {
                return Err(DecodeError::InvalidArgument(format!(
                    "scorer alphabet has {} labels, decoder alphabet has {}",
                    scorer.alphabet().size(),
                    alphabet.size()
                )));
            }
        }

        let mut trie = PathTrie::new();
        if let Some(scorer) = scorer {
            if let Some(lexicon) = scorer.lexicon() {
                trie.attach_lexicon(Arc::clone(lexicon));
            }
        }
        debug!(
            beam_size = config.beam_size,
            class_dim,
            has_scorer = scorer.is_some(),
            "decoder initialized"
        );
        Ok(Self {
            abs_time_step: 0,
            beam_size: config.beam_size,
            cutoff_prob: config.cutoff_prob,
            cutoff_top_n: config.cutoff_top_n,
            top_paths: config.top_paths,
            blank_id: alphabet.blank_id(),
            class_dim,
            trie,
            beam: vec![ROOT],
            scorer,
        })
    }

    /// Consume `time_dim` probability rows laid out `[time_dim][class_dim]`.
    pub fn feed(&mut self, probs: &[f32], time_dim: usize) -> Result<()> {
        if probs.len() != time_dim * self.class_dim {
            return Err(DecodeError::InvalidArgument(format!(
                "expected {} probabilities for {time_dim} frames of {} classes, got {}",
                time_dim * self.class_dim,
                self.class_dim,
                probs.len()
            )));
        }
        for row in probs.chunks_exact(self.class_dim) {
            self.step(row);
            self.abs_time_step += 1;
        }
        debug!(
            frames = time_dim,
            beam = self.beam.len(),
            "frames consumed"
        );
        Ok(())
    }

    /// One frame of the prefix-beam recurrence.
    fn step(&mut self, row: &[f32]) {
        // Lower bound under which no extension can beat the current worst
        // beam entry even by consuming this frame's blank.
        let mut min_cutoff = LOG_ZERO;
        let mut full_beam = false;
        if let Some(scorer) = self.scorer {
            let num_prefixes = self.beam.len().min(self.beam_size);
            let trie = &self.trie;
            self.beam
                .sort_by(|&a, &b| trie.node(b).score.total_cmp(&trie.node(a).score));
            min_cutoff = trie.node(self.beam[num_prefixes - 1]).score + row[self.blank_id as usize].ln()
                - scorer.beta.max(0.0);
            full_beam = num_prefixes == self.beam_size;
        }

        let candidates = pruned_top_k(
            row,
            self.cutoff_prob,
            self.cutoff_top_n,
            self.blank_id as usize,
        );

        for &(c, log_prob_c) in &candidates {
            let c = c as u32;
            for i in 0..self.beam.len().min(self.beam_size) {
                let prefix = self.beam[i];
                let prefix_score = self.trie.node(prefix).score;
                if full_beam && log_prob_c + prefix_score < min_cutoff {
                    break;
                }

                if c == self.blank_id {
                    let node = self.trie.node_mut(prefix);
                    node.log_prob_b_cur =
                        log_sum_exp(node.log_prob_b_cur, log_prob_c + prefix_score);
                    continue;
                }

                let prefix_character = self.trie.node(prefix).character;
                if prefix_character == Some(c) {
                    // Same-label repeat collapses into the prefix itself;
                    // only the non-blank channel carries it.
                    let node = self.trie.node_mut(prefix);
                    node.log_prob_nb_cur =
                        log_sum_exp(node.log_prob_nb_cur, log_prob_c + node.log_prob_nb_prev);
                }

                let Some(child) = self.trie.extend(prefix, c, self.abs_time_step, log_prob_c, true)
                else {
                    continue;
                };

                let mut log_p = LOG_ZERO;
                let blank_prev = self.trie.node(prefix).log_prob_b_prev;
                if prefix_character == Some(c) && blank_prev > LOG_ZERO {
                    // Blank-separated repeat: only paths that just ended in
                    // blank may restate the same label.
                    log_p = log_prob_c + blank_prev;
                } else if prefix_character != Some(c) {
                    log_p = log_prob_c + prefix_score;
                }

                if let Some(scorer) = self.scorer {
                    let target = if scorer.is_character_based() { child } else { prefix };
                    if scorer.is_scoring_boundary(&self.trie, target, c) {
                        let ngram = scorer.make_ngram(&self.trie, target);
                        let bos = ngram.len() < scorer.max_order();
                        log_p += scorer.alpha * scorer.get_log_cond_prob(&ngram, bos);
                        log_p += scorer.beta;
                    }
                }

                let node = self.trie.node_mut(child);
                node.log_prob_nb_cur = log_sum_exp(node.log_prob_nb_cur, log_p);
            }
        }

        // Commit the frame and rebuild the beam from the trie.
        self.beam.clear();
        let mut beam = std::mem::take(&mut self.beam);
        self.trie.collect(&mut beam);
        if beam.len() > self.beam_size {
            // Stable sort: equal scores keep pre-order (creation order),
            // which makes pruning deterministic.
            let trie = &self.trie;
            beam.sort_by(|&a, &b| trie.node(b).score.total_cmp(&trie.node(a).score));
            for id in beam.split_off(self.beam_size) {
                self.trie.remove(id);
            }
        }
        self.beam = beam;
    }

    /// Rank the surviving prefixes and emit the best hypotheses.
    ///
    /// With a scorer attached, prefixes that end mid-word first receive the
    /// pending language-model score for their unfinished unit. Each emitted
    /// confidence is the negated acoustic-only score: language-model and
    /// insertion contributions are subtracted back out.
    pub fn finish(&self) -> Vec<Output> {
        let mut beam = self.beam.clone();
        let mut scores: HashMap<NodeId, f32> = beam
            .iter()
            .map(|&id| (id, self.trie.node(id).score))
            .collect();

        if let Some(scorer) = self.scorer {
            for &prefix in beam.iter().take(self.beam_size) {
                if self.trie.is_root(prefix) {
                    scores.insert(prefix, OOV_SCORE);
                    continue;
                }
                let node = self.trie.node(prefix);
                let (Some(parent), Some(character)) = (node.parent, node.character) else {
                    continue;
                };
                if !scorer.is_scoring_boundary(&self.trie, parent, character) {
                    let ngram = scorer.make_ngram(&self.trie, prefix);
                    let bos = ngram.len() < scorer.max_order();
                    let tail = scorer.alpha * scorer.get_log_cond_prob(&ngram, bos) + scorer.beta;
                    if let Some(score) = scores.get_mut(&prefix) {
                        *score += tail;
                    }
                }
            }
        }

        // Rank by rescored value; ties prefer the deeper prefix, then the
        // earlier alignment.
        let keys: HashMap<NodeId, (usize, usize)> = beam
            .iter()
            .map(|&id| {
                let (_, timesteps) = self.trie.path(id);
                (id, (self.trie.depth(id), timesteps.iter().sum()))
            })
            .collect();
        beam.sort_by(|&a, &b| {
            scores[&b]
                .total_cmp(&scores[&a])
                .then_with(|| keys[&b].0.cmp(&keys[&a].0))
                .then_with(|| keys[&a].1.cmp(&keys[&b].1))
        });

        let num_returned = beam.len().min(self.beam_size).min(self.top_paths);
        beam.iter()
            .take(num_returned)
            .map(|&prefix| {
                let (tokens, timesteps) = self.trie.path(prefix);
                let mut approx_ctc = scores[&prefix];
                if let Some(scorer) = self.scorer {
                    let words = scorer.split_labels_into_scored_units(&tokens);
                    approx_ctc -= words.len() as f32 * scorer.beta;
                    approx_ctc -= scorer.alpha * scorer.get_sent_log_prob(&words);
                }
                Output {
                    tokens,
                    timesteps,
                    confidence: -approx_ctc,
                }
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn beam_len(&self) -> usize {
        self.beam.len()
    }

    /// Structural checks used by randomized tests: the beam is bounded and
    /// every live node's score matches its committed probabilities.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert!(self.beam.len() <= self.beam_size, "beam exceeds beam_size");
        for &id in &self.beam {
            let node = self.trie.node(id);
            assert!(node.exists);
            let expected = log_sum_exp(node.log_prob_b_prev, node.log_prob_nb_prev);
            assert!(
                node.score == expected || (node.score - expected).abs() < 1e-6,
                "score {} != log_sum_exp(b_prev, nb_prev) {}",
                node.score,
                expected
            );
        }
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{DecodeError, Result};

use super::{LanguageModel, END_TOKEN, OOV_SCORE, START_TOKEN};

/// Backoff weight used when an n-gram carries none.
const NO_BACKOFF: f32 = 0.0;

/// Log10 probability for a unit that has no unigram entry at all. Matches
/// the conventional ARPA "never predicted" value.
const MISSING_UNIGRAM: f32 = -99.0;

struct Entry {
    logp: f32,
    backoff: f32,
}

/// Katz-backoff n-gram model parsed from ARPA text.
///
/// Table values stay in log10 as stored in the file; queries convert to
/// natural log at the boundary.
pub struct ArpaModel {
    order: usize,
    vocab: HashMap<String, u32>,
    grams: Vec<HashMap<Vec<u32>, Entry>>,
}

impl ArpaModel {
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines();

        // \data\ header: one "ngram N=count" line per order.
        for line in lines.by_ref() {
            if line.trim() == "\\data\\" {
                break;
            }
        }
        let mut counts: Vec<usize> = Vec::new();
        for line in lines.by_ref() {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let rest = line
                .strip_prefix("ngram ")
                .ok_or_else(|| DecodeError::Parse(format!("expected ngram count line: {line:?}")))?;
            let (order_str, count_str) = rest
                .split_once('=')
                .ok_or_else(|| DecodeError::Parse(format!("malformed count line: {line:?}")))?;
            let order: usize = order_str
                .trim()
                .parse()
                .map_err(|e| DecodeError::Parse(format!("ngram order: {e}")))?;
            let count: usize = count_str
                .trim()
                .parse()
                .map_err(|e| DecodeError::Parse(format!("ngram count: {e}")))?;
            if order != counts.len() + 1 {
                return Err(DecodeError::Parse(format!(
                    "non-contiguous ngram orders at {line:?}"
                )));
            }
            counts.push(count);
        }
        if counts.is_empty() {
            return Err(DecodeError::Parse("missing \\data\\ section".to_string()));
        }

        let order = counts.len();
        let mut model = Self {
            order,
            vocab: HashMap::new(),
            grams: (0..order).map(|_| HashMap::new()).collect(),
        };

        let mut current: Option<usize> = None;
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "\\end\\" {
                break;
            }
            if let Some(section) = line.strip_prefix('\\').and_then(|s| s.strip_suffix("-grams:")) {
                let n: usize = section
                    .parse()
                    .map_err(|e| DecodeError::Parse(format!("section header {line:?}: {e}")))?;
                if n == 0 || n > order {
                    return Err(DecodeError::Parse(format!("unexpected section {line:?}")));
                }
                current = Some(n);
                continue;
            }
            let n = current
                .ok_or_else(|| DecodeError::Parse(format!("ngram line outside a section: {line:?}")))?;
            model.push_gram(n, line)?;
        }

        for (n, count) in counts.iter().enumerate() {
            let got = model.grams[n].len();
            if got != *count {
                return Err(DecodeError::Parse(format!(
                    "{}-gram count mismatch: header says {count}, found {got}",
                    n + 1
                )));
            }
        }
        Ok(model)
    }

    fn push_gram(&mut self, n: usize, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != n + 1 && fields.len() != n + 2 {
            return Err(DecodeError::Parse(format!(
                "{n}-gram line has {} fields: {line:?}",
                fields.len()
            )));
        }
        let logp: f32 = fields[0]
            .parse()
            .map_err(|e| DecodeError::Parse(format!("log probability: {e}")))?;
        let backoff = if fields.len() == n + 2 {
            fields[n + 1]
                .parse()
                .map_err(|e| DecodeError::Parse(format!("backoff weight: {e}")))?
        } else {
            NO_BACKOFF
        };
        let ids: Vec<u32> = fields[1..=n].iter().map(|w| self.intern(w)).collect();
        self.grams[n - 1].insert(ids, Entry { logp, backoff });
        Ok(())
    }

    fn intern(&mut self, word: &str) -> u32 {
        let next = self.vocab.len() as u32;
        *self.vocab.entry(word.to_string()).or_insert(next)
    }

    fn id(&self, word: &str) -> Option<u32> {
        self.vocab.get(word).copied()
    }

    fn lookup(&self, ids: &[u32]) -> Option<&Entry> {
        self.grams.get(ids.len() - 1)?.get(ids)
    }

    /// Backoff-resolved log10 conditional probability of `word` given
    /// `context` (most recent unit last).
    fn cond_log10(&self, context: &[u32], word: u32) -> f32 {
        let start = context.len().saturating_sub(self.order - 1);
        let mut ctx = &context[start..];
        let mut penalty = 0.0;
        loop {
            let mut key = Vec::with_capacity(ctx.len() + 1);
            key.extend_from_slice(ctx);
            key.push(word);
            if let Some(entry) = self.lookup(&key) {
                return penalty + entry.logp;
            }
            if ctx.is_empty() {
                return penalty
                    + self
                        .lookup(&[word])
                        .map(|e| e.logp)
                        .unwrap_or(MISSING_UNIGRAM);
            }
            penalty += self.lookup(ctx).map(|e| e.backoff).unwrap_or(NO_BACKOFF);
            ctx = &ctx[1..];
        }
    }
}

impl LanguageModel for ArpaModel {
    fn order(&self) -> usize {
        self.order
    }

    fn log_cond_prob(&self, ngram: &[String], bos: bool, eos: bool) -> f32 {
        let mut ids = Vec::with_capacity(ngram.len() + 2);
        if bos {
            match self.id(START_TOKEN) {
                Some(id) => ids.push(id),
                None => return OOV_SCORE,
            }
        }
        for word in ngram {
            match self.id(word) {
                Some(id) => ids.push(id),
                None => return OOV_SCORE,
            }
        }
        if eos {
            match self.id(END_TOKEN) {
                Some(id) => ids.push(id),
                None => return OOV_SCORE,
            }
        }
        let Some((&word, context)) = ids.split_last() else {
            return OOV_SCORE;
        };
        self.cond_log10(context, word) * std::f32::consts::LN_10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bigram model over the words "a" and "ab"; log10(0.5) = -0.30103.
    const TOY_ARPA: &str = "\
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

    fn toy() -> ArpaModel {
        ArpaModel::from_text(TOY_ARPA).unwrap()
    }

    fn s(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_order_and_counts() {
        let lm = toy();
        assert_eq!(lm.order(), 2);
    }

    #[test]
    fn test_direct_bigram() {
        let lm = toy();
        // P(a | <s>) = 0.5
        let got = lm.log_cond_prob(&s(&["<s>", "a"]), false, false);
        assert!((got - 0.5f32.ln()).abs() < 1e-4, "got {got}");
    }

    #[test]
    fn test_bos_flag_matches_explicit_token() {
        let lm = toy();
        let explicit = lm.log_cond_prob(&s(&["<s>", "a"]), false, false);
        let flagged = lm.log_cond_prob(&s(&["a"]), true, false);
        assert!((explicit - flagged).abs() < 1e-6);
    }

    #[test]
    fn test_eos_scores_end_token() {
        let lm = toy();
        // P(</s> | a) = 10^-0.60206 = 0.25
        let got = lm.log_cond_prob(&s(&["a"]), false, true);
        assert!((got - 0.25f32.ln()).abs() < 1e-4, "got {got}");
    }

    #[test]
    fn test_backoff_path() {
        let lm = toy();
        // "ab ab" has no bigram: backoff(ab) + unigram(ab)
        let got = lm.log_cond_prob(&s(&["ab", "ab"]), false, false);
        let want = (-0.30103f32 + -0.69897) * std::f32::consts::LN_10;
        assert!((got - want).abs() < 1e-4, "got {got}, want {want}");
    }

    #[test]
    fn test_oov_short_circuits() {
        let lm = toy();
        assert_eq!(lm.log_cond_prob(&s(&["zzz"]), false, false), OOV_SCORE);
        assert_eq!(lm.log_cond_prob(&s(&["a", "zzz"]), false, false), OOV_SCORE);
    }

    #[test]
    fn test_context_truncated_to_order() {
        let lm = toy();
        // Only the last context unit matters for a bigram model.
        let long = lm.log_cond_prob(&s(&["ab", "ab", "a", "ab"]), false, false);
        let short = lm.log_cond_prob(&s(&["a", "ab"]), false, false);
        assert!((long - short).abs() < 1e-6);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let bad = TOY_ARPA.replace("ngram 2=4", "ngram 2=5");
        assert!(matches!(
            ArpaModel::from_text(&bad),
            Err(DecodeError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_data_section_rejected() {
        assert!(ArpaModel::from_text("\\1-grams:\n-0.5 a\n").is_err());
    }
}

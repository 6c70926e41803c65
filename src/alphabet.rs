use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{DecodeError, Result};

/// Mapping between class indices of the acoustic model and the UTF-8 text
/// they stand for.
///
/// Labels `0..size` are real symbols; by convention the blank class of a
/// probability row is `size` (one past the last label). The space label, if
/// present, marks word boundaries for word-based language models.
pub struct Alphabet {
    labels: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, u32>,
    space_id: Option<u32>,
}

impl Alphabet {
    /// Build an alphabet from one string per label.
    ///
    /// Rejects empty label sets and duplicate labels.
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(DecodeError::InvalidArgument(
                "alphabet must contain at least one label".to_string(),
            ));
        }
        let mut index = HashMap::with_capacity(labels.len());
        let mut space_id = None;
        let mut bytes = Vec::with_capacity(labels.len());
        for (i, label) in labels.into_iter().enumerate() {
            if label == " " {
                space_id = Some(i as u32);
            }
            let b = label.into_bytes();
            if index.insert(b.clone(), i as u32).is_some() {
                return Err(DecodeError::InvalidArgument(format!(
                    "duplicate label at index {i}"
                )));
            }
            bytes.push(b);
        }
        Ok(Self {
            labels: bytes,
            index,
            space_id,
        })
    }

    /// The byte-mode alphabet: 255 labels where label `l` stands for the
    /// single byte `l + 1` (byte 0 is unused). Space is byte 0x20, label 31.
    pub fn utf8() -> Self {
        let mut index = HashMap::with_capacity(255);
        let mut labels = Vec::with_capacity(255);
        for l in 0u32..255 {
            let b = vec![(l + 1) as u8];
            index.insert(b.clone(), l);
            labels.push(b);
        }
        Self {
            labels,
            index,
            space_id: Some(b' ' as u32 - 1),
        }
    }

    /// Load an alphabet from a text file with one label per line.
    ///
    /// Empty lines and lines starting with `#` are skipped, so a label line
    /// consisting of a single space is how the space label is written.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let labels: Vec<String> = text
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_string())
            .collect();
        Self::new(labels)
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// The blank class index of a probability row over this alphabet.
    pub fn blank_id(&self) -> u32 {
        self.labels.len() as u32
    }

    pub fn space_id(&self) -> Option<u32> {
        self.space_id
    }

    pub fn label_bytes(&self, label: u32) -> &[u8] {
        self.labels
            .get(label as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Concatenate label strings. Byte sequences that do not form valid
    /// UTF-8 (a partial codepoint in byte mode) are replaced lossily.
    pub fn labels_to_string(&self, labels: &[u32]) -> String {
        let mut bytes = Vec::new();
        for &l in labels {
            bytes.extend_from_slice(self.label_bytes(l));
        }
        String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
    }

    /// Map text to label ids: per codepoint first, falling back to one
    /// label per byte for byte-mode alphabets. `None` if any part of the
    /// text is not covered by the alphabet.
    pub fn encode(&self, text: &str) -> Option<Vec<u32>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let s = ch.encode_utf8(&mut buf).as_bytes();
            if let Some(&id) = self.index.get(s) {
                out.push(id);
            } else {
                for b in s {
                    out.push(*self.index.get(&[*b][..])?);
                }
            }
        }
        Some(out)
    }

    /// Whether a label starts a new UTF-8 codepoint in byte mode: the low
    /// byte of `label + 1` is not a continuation byte.
    pub fn is_codepoint_boundary(label: u32) -> bool {
        let b = ((label + 1) & 0xFF) as u8;
        (b & 0xC0) != 0x80
    }

    /// Arc input label used by the lexicon FST: labels are shifted by one
    /// so that 0 stays reserved for epsilon.
    pub fn fst_input_label(label: u32) -> u32 {
        label + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Alphabet {
        Alphabet::new(vec!["a".into(), "b".into(), " ".into()]).unwrap()
    }

    #[test]
    fn test_basic_ids() {
        let a = abc();
        assert_eq!(a.size(), 3);
        assert_eq!(a.blank_id(), 3);
        assert_eq!(a.space_id(), Some(2));
        assert_eq!(a.labels_to_string(&[0, 1, 2, 0]), "ab a");
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(Alphabet::new(Vec::new()).is_err());
        assert!(Alphabet::new(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn test_encode_per_codepoint() {
        let a = abc();
        assert_eq!(a.encode("ab"), Some(vec![0, 1]));
        assert_eq!(a.encode("a b"), Some(vec![0, 2, 1]));
        assert_eq!(a.encode("c"), None);
    }

    #[test]
    fn test_utf8_alphabet_round_trip() {
        let a = Alphabet::utf8();
        assert_eq!(a.size(), 255);
        assert_eq!(a.space_id(), Some(31));
        let labels = a.encode("héllo").unwrap();
        assert_eq!(labels.len(), "héllo".len());
        assert_eq!(a.labels_to_string(&labels), "héllo");
    }

    #[test]
    fn test_codepoint_boundary() {
        // ASCII bytes are boundaries, continuation bytes 0x80..0xC0 are not.
        assert!(Alphabet::is_codepoint_boundary(b'a' as u32 - 1));
        assert!(!Alphabet::is_codepoint_boundary(0x80 - 1));
        assert!(!Alphabet::is_codepoint_boundary(0xBF - 1));
        assert!(Alphabet::is_codepoint_boundary(0xC3 - 1));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alphabet.txt");
        std::fs::write(&path, "# labels\na\nb\n \n").unwrap();
        let a = Alphabet::from_file(&path).unwrap();
        assert_eq!(a.size(), 3);
        assert_eq!(a.space_id(), Some(2));
    }
}

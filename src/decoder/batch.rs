//! Batch decoding over a bounded pool of worker threads.

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use tracing::debug;

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::error::{DecodeError, Result};
use crate::scorer::Scorer;

use super::{decode, Output};

/// Decode a ragged batch of utterances, at most `config.num_workers`
/// concurrently.
///
/// `batch[i]` holds at least `seq_lengths[i]` rows of `alphabet.size() + 1`
/// probabilities; extra rows (padding up to a common length) are ignored.
/// All arguments are validated before any job is dispatched, jobs are
/// handed out first-in first-out, and results come back in input order.
/// The scorer is shared read-only; every job owns its decoder and trie.
pub fn decode_batch(
    batch: &[&[f32]],
    seq_lengths: &[usize],
    alphabet: &Alphabet,
    config: &DecoderConfig,
    scorer: Option<&Scorer>,
) -> Result<Vec<Vec<Output>>> {
    let class_dim = alphabet.size() + 1;
    config.validate(class_dim)?;
    if batch.len() != seq_lengths.len() {
        return Err(DecodeError::InvalidArgument(format!(
            "batch has {} elements but {} sequence lengths",
            batch.len(),
            seq_lengths.len()
        )));
    }
    for (i, (probs, &len)) in batch.iter().zip(seq_lengths).enumerate() {
        if probs.len() < len * class_dim {
            return Err(DecodeError::InvalidArgument(format!(
                "batch element {i}: {} probabilities cannot cover {len} frames of {class_dim} classes",
                probs.len()
            )));
        }
    }
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let workers = config.num_workers.min(batch.len());
    debug!(batch = batch.len(), workers, "dispatching batch decode");

    // FIFO job queue of batch indices; workers pull until it drains.
    let (job_tx, job_rx) = mpsc::channel::<usize>();
    for i in 0..batch.len() {
        let _ = job_tx.send(i);
    }
    drop(job_tx);
    let job_rx = Mutex::new(job_rx);

    let (result_tx, result_rx) = mpsc::channel::<(usize, Result<Vec<Output>>)>();
    thread::scope(|s| {
        for _ in 0..workers {
            let result_tx = result_tx.clone();
            let job_rx = &job_rx;
            s.spawn(move || loop {
                let job = match job_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                let Ok(i) = job else { break };
                let frames = seq_lengths[i];
                let rows = &batch[i][..frames * class_dim];
                let _ = result_tx.send((i, decode(rows, frames, alphabet, config, scorer)));
            });
        }
        drop(result_tx);
    });

    let mut slots: Vec<Option<Result<Vec<Output>>>> = (0..batch.len()).map(|_| None).collect();
    while let Ok((i, result)) = result_rx.recv() {
        slots[i] = Some(result);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or_else(|| {
                Err(DecodeError::Internal(format!(
                    "worker produced no result for batch element {i}"
                )))
            })
        })
        .collect()
}

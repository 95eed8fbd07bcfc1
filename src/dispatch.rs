//! Per-sample work spread over a rayon pool
use crate::error::AttackError;
use log::debug;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Applies `work` to every index in `0..n` in parallel and returns the results
/// in index order.
///
/// With `n_jobs` set, the work runs on a dedicated pool of that many threads,
/// otherwise on rayon's global pool.
///
/// # Errors
/// Fails only if the dedicated pool cannot be built.
pub fn map_indices<T, F>(n: usize, n_jobs: Option<usize>, work: F) -> Result<Vec<T>, AttackError>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    let progress = AtomicUsize::new(0);
    let tracked = |idx: usize| {
        let out = work(idx);
        let completed = progress.fetch_add(1, Ordering::Relaxed) + 1;
        if completed % 100 == 0 || completed == n {
            debug!("Progress: {}/{} samples", completed, n);
        }
        out
    };

    match n_jobs {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            Ok(pool.install(|| (0..n).into_par_iter().map(tracked).collect()))
        }
        None => Ok((0..n).into_par_iter().map(tracked).collect()),
    }
}

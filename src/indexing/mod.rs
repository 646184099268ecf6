//! Refresh planning and the dedicated worker pool.

pub mod refresh;

pub use refresh::{IndexTarget, RefreshJob, RefreshPlan};

/// Build the fixed-size pool all index and delete jobs run on.
///
/// Dedicated so small queries never queue behind long batch work.
pub(crate) fn build_pool(threads: usize) -> crate::error::IndexResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("classdex-worker-{i}"))
        .build()
        .map_err(|e| crate::error::IndexError::Config {
            reason: format!("worker pool: {e}"),
        })
}

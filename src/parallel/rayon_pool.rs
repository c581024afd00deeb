// rayon-backed worker pool

use crate::error::LaError;

use super::{Job, WorkerPool};

/// Dedicated rayon thread pool. Jobs are spawned into a scope, so they may
/// borrow from the caller.
#[derive(Debug)]
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// One thread per logical CPU.
    pub fn new() -> Result<Self, LaError> {
        Self::with_threads(num_cpus::get())
    }

    pub fn with_threads(threads: usize) -> Result<Self, LaError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|k| format!("lazla-worker-{k}"))
            .build()
            .map_err(|e| LaError::Pool(e.to_string()))?;
        log::debug!("started rayon pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Releases the threads; pending work has always finished by now.
    pub fn shutdown(self) {
        log::debug!("shutting down rayon pool");
        drop(self.pool);
    }
}

impl WorkerPool for RayonPool {
    fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn join_all<'s>(&self, jobs: Vec<Job<'s>>) {
        self.pool.scope(|s| {
            for job in jobs {
                s.spawn(move |_| job());
            }
        });
    }
}

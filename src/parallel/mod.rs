//! Worker pools used by the evaluation engine to run independent blocks.
//!
//! A pool only has to run a batch of jobs to completion; jobs may borrow from
//! the caller's stack because [`WorkerPool::join_all`] does not return before
//! every job has finished.

/// One unit of work borrowing data for `'s`.
pub type Job<'s> = Box<dyn FnOnce() + Send + 's>;

pub trait WorkerPool: Sync {
    /// Number of jobs that can run at the same time.
    fn size(&self) -> usize;
    /// Runs every job and waits for all of them.
    fn join_all<'s>(&self, jobs: Vec<Job<'s>>);
}

/// Runs jobs one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPool;

impl WorkerPool for SerialPool {
    fn size(&self) -> usize {
        1
    }

    fn join_all<'s>(&self, jobs: Vec<Job<'s>>) {
        for job in jobs {
            job();
        }
    }
}

#[cfg(feature = "rayon")]
pub mod rayon_pool;
#[cfg(feature = "rayon")]
pub use rayon_pool::RayonPool;

/// The pools compiled into this build.
#[derive(Debug)]
pub enum Workers {
    Serial(SerialPool),
    #[cfg(feature = "rayon")]
    Rayon(RayonPool),
}

impl Workers {
    /// A thread pool sized to the machine when available, otherwise serial.
    pub fn new() -> Result<Self, crate::error::LaError> {
        #[cfg(feature = "rayon")]
        {
            Ok(Workers::Rayon(RayonPool::new()?))
        }
        #[cfg(not(feature = "rayon"))]
        {
            Ok(Workers::Serial(SerialPool))
        }
    }
}

impl WorkerPool for Workers {
    fn size(&self) -> usize {
        match self {
            Workers::Serial(pool) => pool.size(),
            #[cfg(feature = "rayon")]
            Workers::Rayon(pool) => pool.size(),
        }
    }

    fn join_all<'s>(&self, jobs: Vec<Job<'s>>) {
        match self {
            Workers::Serial(pool) => pool.join_all(jobs),
            #[cfg(feature = "rayon")]
            Workers::Rayon(pool) => pool.join_all(jobs),
        }
    }
}

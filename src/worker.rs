use crate::config::Config;
use crate::error::{CubeError, Result};
use log::{error, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const DEFAULT_STACK_BYTES: usize = 4 * 1024 * 1024;

/// Dedicated rayon pool for Monte Carlo trials.
pub struct SimWorker {
    pool: Arc<ThreadPool>,
    num_threads: usize,
}

impl SimWorker {
    #[allow(dead_code)]
    pub fn new(requested_threads: usize) -> Result<Self> {
        let num_threads = if requested_threads == 0 {
            available_cores()
        } else {
            requested_threads
        };
        Self::build_pool(num_threads, DEFAULT_STACK_BYTES)
    }

    pub fn new_with_config(config: &Config) -> Result<Self> {
        let cores = available_cores();
        let mut num_threads = cores.saturating_sub(config.worker_reserve_cores).max(1);
        if config.worker_max_threads > 0 {
            num_threads = num_threads.min(config.worker_max_threads);
        }
        let stack_size = if config.worker_stack_size_mb == 0 {
            DEFAULT_STACK_BYTES
        } else {
            config.worker_stack_size_mb * 1024 * 1024
        };
        Self::build_pool(num_threads, stack_size)
    }

    fn build_pool(num_threads: usize, stack_size: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("cube-sim-{}", i))
            .stack_size(stack_size)
            .panic_handler(|err| {
                error!("Simulation thread panicked: {:?}", err);
            })
            .build()
            .map_err(|e| CubeError::Worker(e.to_string()))?;

        info!("Simulation worker ready with {} threads", num_threads);

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
        })
    }

    /// Runs `f` inside the pool; a panic becomes `CubeError::Worker`.
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool
            .install(|| panic::catch_unwind(AssertUnwindSafe(f)))
            .map_err(|err| {
                let msg = if let Some(s) = err.downcast_ref::<&str>() {
                    format!("task panicked: {}", s)
                } else if let Some(s) = err.downcast_ref::<String>() {
                    format!("task panicked: {}", s)
                } else {
                    "task panicked with unknown payload".to_string()
                };
                CubeError::Worker(msg)
            })
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

//! Bounded parallel-for used for the per-architecture binary scan.
//!
//! Bounds how many binary-candidate scans run concurrently for a single
//! source package, so the source repository is never hammered with
//! unbounded concurrency while still hiding materialize latency.

use futures::{stream::FuturesUnordered, Future, StreamExt};

use crate::error::Result;

pub struct TaskRunner<F: Future<Output = Result<()>>> {
    futures: FuturesUnordered<F>,
    max_parallel: usize,
}

impl<F: Future<Output = Result<()>>> TaskRunner<F> {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            futures: FuturesUnordered::new(),
            max_parallel: max_parallel.max(1),
        }
    }

    pub async fn push_when_space_available(&mut self, future: F) -> Result<()> {
        while self.futures.len() >= self.max_parallel {
            if let Some(result) = self.futures.next().await {
                result?;
            }
        }
        self.futures.push(future);
        Ok(())
    }

    pub async fn wait_for_remaining(&mut self) -> Result<()> {
        while let Some(result) = self.futures.next().await {
            result?;
        }
        Ok(())
    }
}

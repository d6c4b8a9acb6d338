//! Worker Pool
//!
//! Named threads that run blocking filesystem work away from the primary
//! context. Jobs report back through their own channels.

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use crate::error::FileListError;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    jobs: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, threads: usize) -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(threads.max(1));

        for index in 0..threads.max(1) {
            let rx = rx.clone();
            let thread_name = format!("{name}-{index}");
            let handle = std::thread::Builder::new().name(thread_name.clone()).spawn(move || {
                while let Ok(job) = rx.recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("Job panicked on {}", thread_name);
                    }
                }
            })?;
            handles.push(handle);
        }

        tracing::debug!("Started worker pool '{}' with {} threads", name, handles.len());
        Ok(Self {
            name: name.to_string(),
            jobs: Some(tx),
            handles,
        })
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    pub fn execute<F>(&self, job: F) -> Result<(), FileListError>
    where
        F: FnOnce() + Send + 'static,
    {
        let jobs = self.jobs.as_ref().ok_or(FileListError::WorkerUnavailable)?;
        jobs.send(Box::new(job)).map_err(|_| FileListError::WorkerUnavailable)
    }

    /// Stop accepting jobs, finish queued ones and join the threads.
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread of '{}' did not shut down cleanly", self.name);
            }
        }
        tracing::debug!("Worker pool '{}' stopped", self.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

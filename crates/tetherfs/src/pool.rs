use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

/// A submitted unit of blocking work.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of worker threads draining an unbounded job queue.
///
/// Submission never runs a job inline on the caller's thread. There is no
/// backpressure signal: jobs queue while all workers are busy. Dropping
/// the pool closes the queue, lets already-queued jobs run to completion,
/// and joins every worker.
pub struct WorkerPool {
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool needs at least one thread");
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..size)
            .map(|i| {
                let rx = Arc::clone(&rx);
                thread::Builder::new()
                    .name(format!("tetherfs-worker-{i}"))
                    .spawn(move || worker_loop(&rx))
                    .expect("spawn worker thread")
            })
            .collect();
        diagnostics::log_info!("Worker pool started with {size} threads", size: size);
        WorkerPool {
            tx: Some(tx),
            workers,
        }
    }

    /// Enqueue a job. Once submitted it always runs, even if the pool is
    /// dropped immediately afterwards.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            // The receiver outlives the sender; send cannot fail here.
            let _ = tx.send(Box::new(job));
        }
    }
}

fn worker_loop(rx: &Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let guard = rx
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match guard.recv() {
                Ok(job) => job,
                Err(_) => break, // queue closed and drained
            }
        };
        // The dispatcher already converts operation panics into delivered
        // errors; this fence keeps anything that still unwinds from taking
        // the worker down with it.
        let _ = panic::catch_unwind(AssertUnwindSafe(job));
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tx.take();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The last owner of the pool can die inside a queued job, in
            // which case drop runs on a worker; that thread must not join
            // itself.
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
    }
}

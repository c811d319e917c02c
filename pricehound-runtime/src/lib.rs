//! Runtime plumbing for price lookups.
//!
//! A multi-threaded Tokio runtime shared by every lookup in a process, plus a
//! bounded fan-out so a batch of tickers never opens more browser sessions
//! than the configured worker count. Cancelling the shared token (Ctrl-C or
//! [`PricehoundRuntime::shutdown`]) lets in-flight lookups finish and skips
//! the ones that have not started.
use anyhow::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PricehoundHandle {
    inner: Handle,
    cancel: Arc<CancellationToken>,
}

pub struct PricehoundRuntime {
    runtime: Runtime,
    cancel: Arc<CancellationToken>,
}

impl PricehoundRuntime {
    /// Build the multi-threaded runtime. `workers` of `None` keeps Tokio's
    /// default of one worker per core.
    ///
    /// ```
    /// use pricehound_runtime::PricehoundRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PricehoundRuntime::build("pricehound-doc", Some(1)).unwrap();
    /// assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, workers: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);
        if let Some(workers) = workers {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    pub fn handle(&self) -> PricehoundHandle {
        PricehoundHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and give tasks `grace` to wind down.
    pub fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(grace);
    }
}

impl PricehoundHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Cancel the shared token on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        warn!("runtime.interrupted");
                        cancel.cancel();
                    }
                }
            }
        })
    }

    /// Run `f` over every item with at most `limit` futures in flight.
    ///
    /// Results come back in input order. Items that had not started when the
    /// shared token was cancelled yield `None`. A `limit` of zero is treated
    /// as one.
    ///
    /// ```
    /// use pricehound_runtime::PricehoundRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PricehoundRuntime::build("bounded-doc", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let out = runtime.block_on(handle.run_bounded(vec!["a", "bb"], 2, |s| async move { s.len() }));
    /// assert_eq!(out, vec![Some(1), Some(2)]);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub async fn run_bounded<I, T, F, Fut>(&self, items: I, limit: usize, f: F) -> Vec<Option<T>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        let permits = Arc::new(Semaphore::new(limit.max(1)));
        let cancel = &self.cancel;
        let tasks = items.into_iter().enumerate().map(|(idx, item)| {
            let permits = permits.clone();
            let fut = f(item);
            async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(idx, "runtime.bounded.skipped");
                        return None;
                    }
                    // The semaphore is never closed.
                    permit = permits.acquire() => permit.ok(),
                };
                debug!(idx, "runtime.bounded.start");
                Some(fut.await)
            }
        });
        join_all(tasks).await
    }
}

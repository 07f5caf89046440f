use std::future::Future;
use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};

static BACKGROUND_RUNTIME: LazyLock<Option<Runtime>> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("measurement-dispatch")
        .enable_all()
        .build()
        .map_err(|err| log::warn!("failed to build background tokio runtime: {err}"))
        .ok()
});

/// Spawns a task that runs in the background without being awaited.
///
/// Uses the caller's tokio runtime when there is one, and the shared background runtime
/// otherwise.
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        handle.spawn(future);
    } else {
        spawn_background(future);
    }
}

/// Spawns a task on the shared background runtime, independent of any runtime the caller is in.
///
/// Tasks that must outlive the caller's runtime (process-wide workers) go here.
pub fn spawn_background<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match BACKGROUND_RUNTIME.as_ref() {
        Some(runtime) => {
            runtime.spawn(future);
        }
        None => log::warn!("dropping background task: no runtime available"),
    }
}

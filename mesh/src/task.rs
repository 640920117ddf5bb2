use std::sync::mpsc;
use std::task::Poll;
use std::thread;

/// Handle to a computation running on a detached background thread.
///
/// The result is delivered once through a channel. Callers poll it without
/// blocking via [`poll_result`](Self::poll_result) or block with
/// [`recv`](Self::recv). Callers that sleep on their own primitive hook
/// [`spawn_notify`](Self::spawn_notify) to be woken once the result is
/// available.
///
/// # Example
///
/// ```
/// use redlilium_mesh::task::BuildHandle;
///
/// let handle = BuildHandle::spawn("sum", || (1..=10).sum::<u32>()).unwrap();
/// assert_eq!(handle.recv(), Some(55));
/// ```
pub struct BuildHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> BuildHandle<T> {
    /// Wrap an existing receiver.
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Checks for the result without blocking.
    ///
    /// `Ready(Some(T))` once the work finished, `Ready(None)` if the worker
    /// exited without sending (it panicked), `Pending` otherwise. The value is
    /// consumed; later calls see `Ready(None)`.
    pub fn poll_result(&self) -> Poll<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Poll::Ready(Some(value)),
            Err(mpsc::TryRecvError::Empty) => Poll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => Poll::Ready(None),
        }
    }

    /// Blocks until the work completes.
    ///
    /// Returns `None` if the worker exited without sending.
    pub fn recv(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl<T: Send + 'static> BuildHandle<T> {
    /// Run `work` on a new named thread.
    pub fn spawn<F>(name: &str, work: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_notify(name, work, || {})
    }

    /// Run `work` on a new named thread and call `notify` once its result
    /// has been sent, so [`poll_result`](Self::poll_result) already sees it.
    ///
    /// `notify` does not run if `work` panics.
    pub fn spawn_notify<F, N>(name: &str, work: F, notify: N) -> std::io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
        N: FnOnce() + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let thread_name = name.to_string();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                crate::set_thread_name!(&thread_name);
                // The receiver may be gone if the owner was dropped mid-build.
                let _ = sender.send(work());
                notify();
            })?;
        Ok(Self::new(receiver))
    }
}

impl<T> std::fmt::Debug for BuildHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildHandle").finish_non_exhaustive()
    }
}

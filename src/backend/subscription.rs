use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    Stream,
    stream::{BoxStream, StreamExt},
};

use super::BackendResult;

type CancelHook = Box<dyn FnOnce() + Send>;

/// Push channel handed out by a backend.
///
/// Items arrive until the backend closes the channel or [`Subscription::cancel`]
/// is called. Dropping the subscription cancels it as well.
pub struct Subscription<T> {
    stream: Option<BoxStream<'static, BackendResult<T>>>,
    on_cancel: Option<CancelHook>,
}

impl<T> Subscription<T> {
    /// Wrap a stream that needs no cleanup beyond being dropped.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = BackendResult<T>> + Send + 'static,
    {
        Self {
            stream: Some(stream.boxed()),
            on_cancel: None,
        }
    }

    /// Run `hook` once when the subscription is cancelled or dropped.
    pub fn with_cancel(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Stop receiving items. Idempotent.
    pub fn cancel(&mut self) {
        self.stream = None;
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
    }

    /// Whether [`Subscription::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.stream.is_none()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = BackendResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn cancel_ends_the_stream_and_runs_hook_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut subscription = Subscription::new(stream::iter(vec![Ok(1), Ok(2)]))
            .with_cancel(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        assert_eq!(subscription.next().await.map(Result::unwrap), Some(1));
        subscription.cancel();
        subscription.cancel();
        assert!(subscription.next().await.is_none());
        drop(subscription);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_cancels() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = Subscription::<u8>::new(stream::pending()).with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

//! The downstream side of the buffer.

use std::future::Future;

use async_trait::async_trait;

/// Sends one batch of items downstream.
///
/// On success the returned outcomes must correspond one-to-one, in order,
/// with `items`.
#[async_trait]
pub trait Flush<T>: Send + Sync + 'static {
    /// Per-item outcome.
    type Outcome: Send + Sync + 'static;

    /// Batch failure. Cloned to every producer of the failed batch.
    type Error: std::error::Error + Clone + Send + Sync + 'static;

    async fn flush(&self, items: Vec<T>) -> Result<Vec<Self::Outcome>, Self::Error>;
}

/// [`Flush`] implementation backed by an async closure. See [`flush_fn`].
#[derive(Debug, Clone)]
pub struct FlushFn<F>(F);

/// Wraps an async closure as a [`Flush`] implementation.
pub fn flush_fn<F>(f: F) -> FlushFn<F> {
    FlushFn(f)
}

#[async_trait]
impl<T, F, Fut, R, E> Flush<T> for FlushFn<F>
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, E>> + Send,
    R: Send + Sync + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    type Outcome = R;
    type Error = E;

    async fn flush(&self, items: Vec<T>) -> Result<Vec<R>, E> {
        (self.0)(items).await
    }
}

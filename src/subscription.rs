use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;

use crate::decode::{self, DecodeError};
use crate::error::{Error, SubscriptionError};
use crate::transport::RawStream;

/// Decodes the root field of one subscription item.
pub type ItemDecoder<T> = fn(&Value) -> Result<T, DecodeError>;

/// A lazy sequence of decoded subscription items.
///
/// Items are yielded in the order the server sends them, and the next raw item
/// is only pulled when the consumer polls again. The first transport or decode
/// failure is yielded as an error and ends the stream. Dropping the stream
/// closes the underlying connection.
pub struct SubscriptionStream<T> {
    name: &'static str,
    root: &'static str,
    decode: ItemDecoder<T>,
    inner: Option<RawStream>,
}

impl<T> SubscriptionStream<T> {
    /// Wraps a raw stream whose items carry the decoded entity under `root`.
    pub fn new(name: &'static str, root: &'static str, decode: ItemDecoder<T>, raw: RawStream) -> Self {
        Self {
            name,
            root,
            decode,
            inner: Some(raw),
        }
    }

    /// Name of the subscription.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` once the stream has ended or failed.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }

    /// Stops the subscription and releases its connection.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("Subscription {} released", self.name);
        }
    }

    fn decode_item(&self, data: &Value) -> Result<T, DecodeError> {
        let item = decode::required_root(data, self.root)?;
        (self.decode)(item)
    }
}

impl<T> Stream for SubscriptionStream<T> {
    type Item = Result<T, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let result = match inner.as_mut().poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {
                log::debug!("Subscription {} ended", self.name);
                self.inner = None;
                return Poll::Ready(None);
            }
            Poll::Ready(Some(Ok(data))) => {
                self.decode_item(&data)
                    .map_err(|source| SubscriptionError::Decode {
                        subscription: self.name,
                        source,
                    })
            }
            Poll::Ready(Some(Err(source))) => Err(SubscriptionError::Transport {
                subscription: self.name,
                source,
            }),
        };

        if let Err(e) = &result {
            log::warn!("Subscription {} terminated: {e}", self.name);
            self.release();
        }
        Poll::Ready(Some(result.map_err(Error::from)))
    }
}

impl<T> Drop for SubscriptionStream<T> {
    fn drop(&mut self) {
        self.release();
    }
}

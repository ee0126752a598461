//! Request body wrapper that reports when the upload is over.
//!
//! The response timeout must only start once the caller's body has been
//! handed to the upstream; a slow upload is not a slow upstream.

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves once the wrapped body has ended, failed, or been dropped.
pub type UploadDone = oneshot::Receiver<()>;

/// Passes frames through untouched and fires [`UploadDone`] at end of stream.
pub struct UploadBody {
    inner: Body,
    done: Option<oneshot::Sender<()>>,
}

impl UploadBody {
    pub fn wrap(inner: Body) -> (Body, UploadDone) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner,
            done: Some(tx),
        };
        // hyper never polls a body that is already at its end.
        if body.inner.is_end_stream() {
            body.finish();
        }
        (Body::new(body), rx)
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl HttpBody for UploadBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let poll = Pin::new(&mut self.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => self.finish(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.finish(),
            _ => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

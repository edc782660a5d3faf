use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use weft_protocol::{AgentEvent, ErrorKind, TurnStream};

use crate::Error;
use crate::io::Sse;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<AgentEvent>, Sse), Error>;

pin_project! {
    /// A live turn stream decoded from a server-sent event response.
    pub struct HttpTurnStream {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl HttpTurnStream {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        Self {
            next_event_fut: Some(Box::pin(next_event(sse))),
        }
    }
}

impl TurnStream for HttpTurnStream {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<AgentEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), sse)) => {
                // The body may still have more records, re-arm for the
                // next one.
                *this.next_event_fut = Some(Box::pin(next_event(sse)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, _)) => {
                *this.next_event_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_event_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_event(mut sse: Sse) -> NextEvent {
    loop {
        let record = match sse.next_event().await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok((None, sse)),
            Err(err) => {
                return Err(Error::new(
                    format!("reading event stream: {err:?}"),
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse record: {}", record.data);

        if record.name.as_deref() == Some("error") {
            return Err(Error::new(
                format!("server reported an error: {}", record.data),
                ErrorKind::Fatal,
            ));
        }

        match serde_json::from_str::<AgentEvent>(&record.data) {
            Ok(event) => return Ok((Some(event), sse)),
            Err(err) => {
                // A malformed payload is not fatal; skip the record and
                // keep reading.
                warn!("failed to decode agent event: {err}");
            }
        }
    }
}

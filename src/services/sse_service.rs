//! Bridges the store's per-match change feed onto SSE responses.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dao::match_store::events::ChangeEvent,
    dto::sse::{Handshake, ServerEvent},
};

/// Forward a change-feed receiver into an SSE response.
///
/// The handshake goes out first; a client must treat it as "subscription
/// live, perform your bulk fetch now" so no event slips between the two. A
/// lagged receiver gets a `resync` event instead of the dropped changes; the
/// feed keeps no replay buffer, so refetching is the only way to catch up.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ChangeEvent>,
    match_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(handshake) = handshake_event(match_id)
            && tx.send(Ok(handshake)).await.is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    let payload = match recv_result {
                        Ok(change) => match ServerEvent::change(&change) {
                            Ok(payload) => payload,
                            Err(err) => {
                                tracing::warn!(match_id = %match_id, error = %err, "dropping unserialisable change event");
                                continue;
                            }
                        },
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(match_id = %match_id, missed, "SSE receiver lagged; requesting resync");
                            ServerEvent {
                                event: Some("resync".to_string()),
                                data: "refetch".to_string(),
                            }
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(match_id = %match_id, "SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn handshake_event(match_id: Uuid) -> Option<Event> {
    let payload = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            match_id: match_id.to_string(),
            message: "subscribed; fetch the match snapshot now".to_string(),
        },
    )
    .ok()?;
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    Some(event)
}

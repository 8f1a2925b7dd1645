//! WebSocket transport
//!
//! Translates JSON frames into router operations. Responsibilities:
//! - accept TCP/WebSocket connections
//! - require an `auth` frame first and check it with the [`Authenticator`]
//! - wrap the connection in a [`Client`] and register it with the [`Router`]
//! - forward `subscribe`/`unsubscribe`/`publish`/`send` frames to the router
//! - unregister and close the client on disconnect

use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{Instrument, debug, info, info_span, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::client::Client;
use crate::router::{Message, Router, Subscriber, SubscriberHandle};
use crate::transport::message::{AuthRequest, ClientMessage, ServerMessage};
use crate::utils::error::{RouterError, TransportError};

/// Decides whether a connecting client may register.
pub type Authenticator = Arc<dyn Fn(&AuthRequest) -> bool + Send + Sync>;

/// Accepts a client iff its credential equals `secret`. `None` accepts everyone.
pub fn shared_secret(secret: Option<String>) -> Authenticator {
    Arc::new(move |request: &AuthRequest| {
        secret
            .as_deref()
            .is_none_or(|expected| expected == request.credential)
    })
}

pub async fn start_websocket_server(
    addr: &str,
    router: Arc<Router>,
    authenticator: Authenticator,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, router, authenticator).await
}

/// Serves connections from `listener` until accepting fails.
pub async fn serve(
    listener: TcpListener,
    router: Arc<Router>,
    authenticator: Authenticator,
) -> Result<(), TransportError> {
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let router = router.clone();
        let authenticator = authenticator.clone();
        let span = info_span!("connection", id = %Uuid::new_v4(), %peer);

        tokio::spawn(
            async move {
                if let Err(e) = handle_connection(stream, router, authenticator).await {
                    warn!("connection ended with error: {e}");
                }
            }
            .instrument(span),
        );
    }
}

async fn handle_connection(
    stream: TcpStream,
    router: Arc<Router>,
    authenticator: Authenticator,
) -> Result<(), TransportError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let Some(first) = ws_receiver.next().await else {
        return Ok(());
    };
    let first = first?;
    let (id, credential, topics) = match parse(&first) {
        Some(Ok(ClientMessage::Auth {
            id,
            credential,
            topics,
        })) => (id, credential, topics),
        _ => return reject(&mut ws_sender, "must authenticate first").await,
    };

    if !authenticator(&AuthRequest {
        id: id.clone(),
        credential,
    }) {
        info!(client = %id, "authentication failed");
        return reject(&mut ws_sender, "authentication failed").await;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Arc::new(Client::new(id.clone(), tx));
    let handle = SubscriberHandle::from(client.clone());

    // Queued ahead of registration so no routed message can overtake it. On
    // rejection the writer never starts and the frame is discarded.
    client.push(&ServerMessage::Authenticated { id: id.clone() });
    if let Err(e) = router.register(&handle, &topics) {
        return reject(&mut ws_sender, e.to_string()).await;
    }
    info!(client = %id, topics = topics.len(), "client connected");

    // Forward router -> client.
    let writer = {
        let id = id.clone();
        tokio::spawn(
            async move {
                while let Some(frame) = rx.recv().await {
                    let closing = frame.is_close();
                    if let Err(e) = ws_sender.send(frame).await {
                        debug!(client = %id, "failed to write frame: {e}");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
            }
            .in_current_span(),
        )
    };

    while let Some(frame) = ws_receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!(client = %id, "read error: {e}");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        match parse(&frame) {
            Some(Ok(request)) => {
                if let Err(RouterError::Closed) = dispatch(&router, &handle, &client, request).await {
                    break;
                }
            }
            Some(Err(err)) => {
                warn!(client = %id, "invalid client message: {err}");
                client.push(&ServerMessage::error(format!("invalid message: {err}")));
            }
            None => {}
        }
    }

    if let Err(e) = router.unregister_subscriber(&handle) {
        debug!(client = %id, "skipping unregister: {e}");
    }
    client.close();
    let _ = writer.await;
    info!(client = %id, "client disconnected");
    Ok(())
}

/// Applies one post-authentication frame. Registration errors are reported back
/// to the client; only `RouterError::Closed` is returned.
async fn dispatch(
    router: &Router,
    handle: &SubscriberHandle,
    client: &Client,
    request: ClientMessage,
) -> Result<(), RouterError> {
    let result = match request {
        ClientMessage::Auth { .. } => {
            client.push(&ServerMessage::error("already authenticated"));
            Ok(())
        }
        ClientMessage::Subscribe { topics } => {
            debug!(client = %client.id, ?topics, "subscribe");
            router.register(handle, &topics)
        }
        ClientMessage::Unsubscribe { topics } => {
            debug!(client = %client.id, ?topics, "unsubscribe");
            router.unregister(handle, &topics)
        }
        ClientMessage::Publish { topic, payload } => {
            router
                .publish(Message::broadcast(client.id.clone(), topic, payload))
                .await
        }
        ClientMessage::Send { to, payload } => {
            router
                .publish(Message::point_to_point(client.id.clone(), to, payload))
                .await
        }
    };

    match result {
        Err(RouterError::Closed) => Err(RouterError::Closed),
        Err(e) => {
            client.push(&ServerMessage::error(e.to_string()));
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Decodes a text frame. Non-text frames yield `None`.
fn parse(frame: &WsMessage) -> Option<Result<ClientMessage, serde_json::Error>> {
    let text = frame.to_text().ok().filter(|_| frame.is_text())?;
    Some(serde_json::from_str(text))
}

async fn reject<S>(sink: &mut S, message: impl Into<String>) -> Result<(), TransportError>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(&ServerMessage::error(message))?;
    sink.send(WsMessage::text(text)).await?;
    sink.close().await?;
    Ok(())
}

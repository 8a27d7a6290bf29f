use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, Message as ActixMessage,
    StreamHandler, WrapFuture,
};
use actix_web::{get, web, Error, HttpRequest, HttpResponse, ResponseError};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::middleware::auth::{authenticate, credential_from_request};
use crate::models::User;
use crate::services::delivery::DeliveryRouter;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WsOutboundEvent};
use crate::websocket::message_types::WsInboundEvent;
use crate::websocket::{ConnectionHandle, ConnectionId};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub authorization: Option<String>,
}

/// Frame pushed into this session from another connection task (a routed
/// message or a presence broadcast).
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundFrame(String);

/// Per-connection session actor.
///
/// States: authentication happens before the actor exists; `started` runs
/// registration, the online broadcast, and the mailbox flush; the stream
/// handler serves the active phase; `stopped` is teardown. A reconnect from
/// the same user starts a fresh actor, never resurrects this one.
struct WsSession {
    identity: User,
    connection_id: ConnectionId,
    state: AppState,
    hb: Instant,
}

impl WsSession {
    fn new(identity: User, state: AppState) -> Self {
        Self {
            identity,
            connection_id: ConnectionId::new(),
            state,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(Duration::from_secs(5), |act, ctx| {
            if Instant::now().duration_since(act.hb) > Duration::from_secs(30) {
                tracing::warn!(user = %act.identity.id, "websocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_frame(&self, ctx: &mut ws::WebsocketContext<Self>, event: &WsOutboundEvent) {
        match event.to_frame() {
            Ok(frame) => ctx.text(frame),
            Err(e) => tracing::error!(error = %e, "failed to encode outbound event"),
        }
    }

    /// Deliver all stored undelivered mail for this user, oldest first, then
    /// flip the delivered flags. Runs via `ctx.wait`, so no inbound frame is
    /// processed until the flush has gone out.
    fn flush_mailbox(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let messages = self.state.messages.clone();
        let user_id = self.identity.id;

        let flush = async move { messages.find_undelivered(user_id).await }
            .into_actor(self)
            .map(|res, act, ctx| match res {
                Ok(pending) => {
                    if pending.is_empty() {
                        return;
                    }
                    let ids: Vec<Uuid> = pending.iter().map(|m| m.id).collect();
                    for message in pending {
                        act.send_frame(ctx, &WsOutboundEvent::Message(message));
                    }

                    // Flags flip after the frames are queued; a crash in
                    // between re-delivers on the next connect (at-least-once).
                    let messages = act.state.messages.clone();
                    let user_id = act.identity.id;
                    actix::spawn(async move {
                        match messages.mark_delivered(&ids).await {
                            Ok(n) => {
                                tracing::debug!(user = %user_id, flushed = n, "mailbox flushed")
                            }
                            Err(e) => tracing::error!(
                                user = %user_id,
                                error = %e,
                                "failed to mark flushed mail delivered"
                            ),
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(user = %act.identity.id, error = %e, "mailbox fetch failed")
                }
            });

        ctx.wait(flush);
    }

    fn handle_private_message(
        &self,
        to: Uuid,
        content: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let accounts = self.state.accounts.clone();
        let messages = self.state.messages.clone();
        let registry = self.state.registry.clone();
        let sender = self.identity.clone();

        let routed = async move {
            DeliveryRouter::route(
                accounts.as_ref(),
                messages.as_ref(),
                &registry,
                &sender,
                to,
                &content,
            )
            .await
        }
        .into_actor(self)
        .map(|result, act, ctx| match result {
            Ok(outcome) => {
                // The sender always sees their own sent message.
                act.send_frame(ctx, &WsOutboundEvent::Message(outcome.message.clone()));
                if outcome.queued() {
                    act.send_frame(
                        ctx,
                        &WsOutboundEvent::ChatError {
                            message:
                                "Recipient is offline, message will be sent when they come online."
                                    .into(),
                        },
                    );
                }
            }
            Err(err) => {
                act.send_frame(
                    ctx,
                    &WsOutboundEvent::ChatError {
                        message: err.to_string(),
                    },
                );
            }
        });

        // Waiting keeps inbound frames from this connection in order;
        // routing for other connections proceeds concurrently.
        ctx.wait(routed);
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user = %self.identity.id,
            role = %self.identity.role,
            "websocket session started"
        );

        self.hb(ctx);

        // Register presence, then bridge registry pushes into this session's
        // outbound stream. The forwarding task ends when the handle is
        // dropped from the registry (disconnect or overwrite by a newer
        // connection).
        let (handle, mut rx) = ConnectionHandle::new();
        self.connection_id = handle.id();
        self.state.registry.register(self.identity.id, handle);

        let addr = ctx.address();
        actix::spawn(async move {
            while let Some(frame) = rx.recv().await {
                addr.do_send(OutboundFrame(frame));
            }
        });

        broadcast_event(
            &self.state.registry,
            &WsOutboundEvent::UserOnline {
                user_id: self.identity.id,
                name: self.identity.name.clone(),
                role: self.identity.role,
            },
        );

        self.flush_mailbox(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user = %self.identity.id, "websocket session stopped");

        // Only the connection that owns the registry entry announces the
        // user offline; a superseded connection's teardown is a no-op.
        if self
            .state
            .registry
            .unregister(self.identity.id, self.connection_id)
        {
            broadcast_event(
                &self.state.registry,
                &WsOutboundEvent::UserOffline {
                    user_id: self.identity.id,
                },
            );
        }
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(WsInboundEvent::PrivateMessage { to, message }) => {
                    self.handle_private_message(to, message, ctx);
                }
                Err(e) => {
                    tracing::warn!(
                        user = %self.identity.id,
                        error = %e,
                        "unparseable inbound frame"
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary frames not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(user = %self.identity.id, ?reason, "close frame received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// WebSocket entry point. Authentication failure rejects the upgrade
/// outright; no session state of any kind is created.
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let token = credential_from_request(&req, query.authorization.as_deref());

    let identity = match authenticate(state.accounts.as_ref(), &state.config, token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "websocket connection rejected");
            return Ok(e.error_response());
        }
    };

    let session = WsSession::new(identity, state.as_ref().clone());
    ws::start(session, &req, stream)
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `GET /api/runs/{id}/events?from_seq=N` (spec §6): the per-run event
//! WebSocket. One axum task per connection drives a [`Subscription`],
//! forwarding [`HubFrame`]s as [`ServerFrame`]s and enforcing a ping/pong
//! liveness deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use pm_core::RunId;
use pm_wire::{ClientFrame, EventEnvelope, ServerFrame};
use serde::Deserialize;
use tracing::debug;

use crate::kernel::{HubFrame, Subscription};

use super::auth::check_operator_auth;
use super::error::to_http;
use super::AppState;

/// How long the connection tolerates silence from the client before a
/// missing pong drops it (spec §4.9 "subscribers apply a ping/pong deadline").
const PING_INTERVAL: Duration = Duration::from_secs(15);
const PONG_DEADLINE: Duration = Duration::from_secs(45);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    from_seq: Option<String>,
}

pub async fn run_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<RunId>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(err) = check_operator_auth(&state, &headers) {
        return err.into_response();
    }

    let from_seq = pm_wire::parse_from_seq(query.from_seq.as_deref());
    let subscription = match state.facade.subscribe_events(run_id, from_seq).await {
        Ok(sub) => sub,
        Err(e) => return to_http(&e).into_response(),
    };
    // subscribe_events already checked the run exists, so this lookup cannot race ahead of it.
    let initial_state = match state.facade.get_run(run_id).await {
        Ok(run) => run.state,
        Err(e) => return to_http(&e).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, subscription, initial_state))
}

async fn handle_socket(mut socket: WebSocket, mut subscription: Subscription, initial_state: pm_core::RunState) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut awaiting_pong = false;

    // Spec §6: a `state` frame is sent "once on connect" in addition to on
    // every transition.
    if send_frame(&mut socket, &ServerFrame::State { state: initial_state }).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = subscription.rx.recv() => {
                let Some(frame) = frame else { break };
                let server_frame = match &frame {
                    HubFrame::Event(event) => ServerFrame::Event { event: EventEnvelope::from(event.as_ref()) },
                    HubFrame::State(state) => ServerFrame::State { state: *state },
                    HubFrame::Ping => ServerFrame::Ping,
                };
                if send_frame(&mut socket, &server_frame).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if awaiting_pong {
                    debug!(run_id = %subscription.run_id(), "no pong within deadline, closing");
                    break;
                }
                if send_frame(&mut socket, &ServerFrame::Ping).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
            incoming = tokio::time::timeout(PONG_DEADLINE, socket.recv()), if awaiting_pong => {
                match incoming {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if serde_json::from_str::<ClientFrame>(&text).is_ok() {
                            awaiting_pong = false;
                        }
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(_))) | Err(_) => break,
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_else(|_| r#"{"type":"ping"}"#.to_string());
    socket.send(Message::Text(text.into())).await
}

//! Per-game change feed. The server keeps one broadcast channel per game and streams it to
//! browsers over a WebSocket; the browser side parses the events and hands them to the view.

#[cfg(feature = "ssr")]
pub use server::*;

#[cfg(feature = "hydrate")]
pub use client::*;

#[cfg(feature = "ssr")]
mod server {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard};

    use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use tokio::sync::broadcast;
    use tokio::sync::broadcast::error::RecvError;

    use crate::model::GameEvent;
    use crate::DbPool;

    const DEFAULT_CAPACITY: usize = 256;

    /// Fan-out hub keyed by game id. Channels are created on first subscription.
    pub struct RealtimeHub {
        channels: Mutex<HashMap<i32, broadcast::Sender<GameEvent>>>,
        capacity: usize,
    }

    impl RealtimeHub {
        pub fn new(capacity: usize) -> Self {
            Self {
                channels: Mutex::new(HashMap::new()),
                capacity,
            }
        }

        fn channels(&self) -> MutexGuard<'_, HashMap<i32, broadcast::Sender<GameEvent>>> {
            // A panic while holding the lock cannot leave the map half-updated.
            self.channels.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn subscribe(&self, game_id: i32) -> broadcast::Receiver<GameEvent> {
            let capacity = self.capacity;
            self.channels()
                .entry(game_id)
                .or_insert_with(|| broadcast::channel(capacity).0)
                .subscribe()
        }

        /// Publishes to everyone watching `game_id` and returns how many receivers got it.
        /// Channels nobody listens to anymore are dropped.
        pub fn publish(&self, game_id: i32, event: GameEvent) -> usize {
            let mut channels = self.channels();
            let Some(sender) = channels.get(&game_id) else {
                return 0;
            };
            match sender.send(event) {
                Ok(receivers) => receivers,
                Err(_) => {
                    channels.remove(&game_id);
                    0
                }
            }
        }

        /// Drops the channel of `game_id` once its last receiver is gone.
        pub fn release(&self, game_id: i32) {
            let mut channels = self.channels();
            if channels
                .get(&game_id)
                .is_some_and(|sender| sender.receiver_count() == 0)
            {
                channels.remove(&game_id);
            }
        }

        pub fn channel_count(&self) -> usize {
            self.channels().len()
        }

        pub fn close(&self, game_id: i32) {
            self.channels().remove(&game_id);
        }

        pub fn watchers(&self, game_id: i32) -> usize {
            self.channels()
                .get(&game_id)
                .map_or(0, |sender| sender.receiver_count())
        }
    }

    impl Default for RealtimeHub {
        fn default() -> Self {
            Self::new(DEFAULT_CAPACITY)
        }
    }

    /// `GET /ws/games/{game_id}`: upgrades and streams that game's events as JSON text frames.
    /// Unknown games get a 404 instead of a channel.
    pub async fn game_feed_handler(
        ws: WebSocketUpgrade,
        Path(game_id): Path<i32>,
        Extension(hub): Extension<Arc<RealtimeHub>>,
        Extension(pool): Extension<DbPool>,
    ) -> Response {
        let lookup = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| e.to_string())?;
            crate::get_game(&mut conn, game_id).map_err(|e| e.to_string())
        })
        .await;
        match lookup {
            Ok(Ok(_)) => ws
                .on_upgrade(move |socket| stream_game_events(socket, game_id, hub))
                .into_response(),
            Ok(Err(e)) => {
                tracing::debug!(game_id, error = %e, "game feed refused");
                StatusCode::NOT_FOUND.into_response()
            }
            Err(e) => {
                tracing::error!(game_id, error = %e, "game feed lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    async fn stream_game_events(mut socket: WebSocket, game_id: i32, hub: Arc<RealtimeHub>) {
        let mut events = hub.subscribe(game_id);
        tracing::info!(game_id, "game feed connected");

        loop {
            tokio::select! {
                inbound = socket.recv() => match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(game_id, error = %e, "game feed receive error");
                        break;
                    }
                },
                outbound = events.recv() => match outbound {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::warn!(game_id, error = %e, "failed to encode game event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(game_id, skipped, "game feed lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        drop(events);
        hub.release(game_id);
        tracing::info!(game_id, "game feed disconnected");
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_publish_reaches_game_subscribers() {
            let hub = RealtimeHub::default();
            let mut rx1 = hub.subscribe(1);
            let mut rx2 = hub.subscribe(1);

            let delivered = hub.publish(1, GameEvent::PrizeUpdated { slot_number: 3 });
            assert_eq!(delivered, 2);

            assert_eq!(
                rx1.recv().await.expect("subscriber 1 should receive"),
                GameEvent::PrizeUpdated { slot_number: 3 }
            );
            assert_eq!(
                rx2.recv().await.expect("subscriber 2 should receive"),
                GameEvent::PrizeUpdated { slot_number: 3 }
            );
        }

        #[tokio::test]
        async fn test_games_are_isolated() {
            let hub = RealtimeHub::default();
            let mut rx_other = hub.subscribe(2);
            let _rx = hub.subscribe(1);

            hub.publish(1, GameEvent::GameReset);
            hub.publish(2, GameEvent::GameUpdated);

            assert_eq!(
                rx_other.recv().await.expect("should receive"),
                GameEvent::GameUpdated
            );
        }

        #[test]
        fn test_publish_without_watchers() {
            let hub = RealtimeHub::default();
            assert_eq!(hub.publish(9, GameEvent::GameReset), 0);

            let rx = hub.subscribe(9);
            assert_eq!(hub.watchers(9), 1);
            drop(rx);
            // The last receiver is gone, so the channel is pruned.
            assert_eq!(hub.publish(9, GameEvent::GameReset), 0);
            assert_eq!(hub.watchers(9), 0);
        }

        #[test]
        fn test_release_after_last_watcher_leaves() {
            let hub = RealtimeHub::default();
            for game_id in 1000..1100 {
                let rx = hub.subscribe(game_id);
                drop(rx);
                hub.release(game_id);
            }
            assert_eq!(hub.channel_count(), 0);

            let rx1 = hub.subscribe(5);
            let rx2 = hub.subscribe(5);
            drop(rx1);
            hub.release(5);
            // One watcher is still connected.
            assert_eq!(hub.watchers(5), 1);
            drop(rx2);
            hub.release(5);
            assert_eq!(hub.channel_count(), 0);
        }

        #[test]
        fn test_close_drops_channel() {
            let hub = RealtimeHub::default();
            let _rx = hub.subscribe(4);
            hub.close(4);
            assert_eq!(hub.watchers(4), 0);
        }
    }
}

#[cfg(feature = "hydrate")]
mod client {
    use leptos::logging::log;
    use leptos::prelude::*;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use web_sys::{MessageEvent, WebSocket};

    use crate::model::GameEvent;

    /// An open game feed. Dropping it detaches the handler and closes the socket.
    pub struct GameFeed {
        socket: WebSocket,
        _onmessage: Closure<dyn FnMut(MessageEvent)>,
    }

    impl Drop for GameFeed {
        fn drop(&mut self) {
            self.socket.set_onmessage(None);
            let _ = self.socket.close();
        }
    }

    /// Opens the game's feed and calls `on_event` for every decoded event.
    pub fn connect_game_feed(
        game_id: i32,
        on_event: impl Fn(GameEvent) + 'static,
    ) -> Option<GameFeed> {
        let location = web_sys::window()?.location();
        let scheme = match location.protocol().ok()?.as_str() {
            "https:" => "wss",
            _ => "ws",
        };
        let host = location.host().ok()?;
        let socket = WebSocket::new(&format!("{}://{}/ws/games/{}", scheme, host, game_id))
            .map_err(|e| log!("Failed to open game feed: {:?}", e))
            .ok()?;

        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            let Some(text) = ev.data().as_string() else {
                return;
            };
            match serde_json::from_str::<GameEvent>(&text) {
                Ok(event) => on_event(event),
                Err(e) => log!("Ignoring malformed game event: {}", e),
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        Some(GameFeed {
            socket,
            _onmessage: onmessage,
        })
    }

    /// Like [`connect_game_feed`], but the feed is closed when the current reactive owner is
    /// cleaned up (the component unmounts or the surrounding effect reruns).
    pub fn watch_game_feed(game_id: i32, on_event: impl Fn(GameEvent) + 'static) -> bool {
        let Some(feed) = connect_game_feed(game_id, on_event) else {
            return false;
        };
        let feed = StoredValue::new_local(Some(feed));
        on_cleanup(move || {
            feed.try_update_value(|feed| {
                feed.take();
            });
        });
        true
    }
}

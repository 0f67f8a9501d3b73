use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::events::PushEvent;
use crate::core::model::LinkState;

/// One item on the engine's inbox: a parsed wire frame, or the marker that
/// a fresh connection has come up. Markers are queued in order with the
/// frames around them; the channel loses neither.
#[derive(Debug)]
pub enum LinkEvent {
    Frame(PushEvent),
    Online,
}

/// Derive the push endpoint from the daemon's base URL.
pub fn ws_endpoint(base: &Url) -> anyhow::Result<Url> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("unsupported scheme for push channel: {other}"),
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot derive ws url from {base}"))?;
    url.set_path("/ws");
    Ok(url)
}

/// Receiving side of the daemon API. A single task owns one connection at a
/// time and retries forever on a fixed delay, so attempts can never overlap.
pub struct PushChannel {
    url: Url,
    retry_delay: Duration,
    connect_timeout: Duration,
}

impl PushChannel {
    pub fn new(url: Url, retry_delay: Duration, connect_timeout: Duration) -> Self {
        Self { url, retry_delay, connect_timeout }
    }

    /// Run until the engine side of `inbox` goes away. Parsed frames and
    /// connect markers go out on `inbox`; state transitions are published on
    /// `link` for display.
    pub async fn run(self, inbox: mpsc::Sender<LinkEvent>, link: watch::Sender<LinkState>) {
        loop {
            let _ = link.send(LinkState::Connecting);

            match timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
                Ok(Ok((mut ws, _))) => {
                    info!("push channel connected: {}", self.url);
                    let _ = link.send(LinkState::Connected);
                    // Ahead of any frame this connection produces.
                    if inbox.send(LinkEvent::Online).await.is_err() {
                        debug!("engine gone, push channel stopping");
                        return;
                    }

                    loop {
                        let msg = match ws.next().await {
                            Some(Ok(m)) => m,
                            Some(Err(e)) => {
                                warn!("push channel read error: {}", e);
                                break;
                            }
                            None => {
                                info!("push channel closed by daemon");
                                break;
                            }
                        };

                        match msg {
                            Message::Text(text) => match serde_json::from_str::<PushEvent>(&text) {
                                Ok(event) => {
                                    debug!("frame: {}", event.kind());
                                    if inbox.send(LinkEvent::Frame(event)).await.is_err() {
                                        debug!("engine gone, push channel stopping");
                                        return;
                                    }
                                }
                                Err(e) => warn!("dropping malformed frame: {}", e),
                            },
                            Message::Close(_) => {
                                info!("push channel closed by daemon");
                                break;
                            }
                            // The protocol is JSON text frames only.
                            _ => {}
                        }
                    }
                }
                Ok(Err(e)) => warn!("push channel connect failed: {}", e),
                Err(_) => warn!("push channel connect timed out after {:?}", self.connect_timeout),
            }

            let _ = link.send(LinkState::Disconnected);
            if inbox.is_closed() {
                debug!("engine gone, push channel stopping");
                return;
            }
            sleep(self.retry_delay).await;
        }
    }
}

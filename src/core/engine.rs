use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::events::{EngineEvent, PushEvent};
use crate::core::model::LinkState;
use crate::core::reducer::{reduce, Effect};
use crate::core::store::TorrentStore;
use crate::core::view::{build_view, DashboardView, TorrentQuery};
use crate::remote::push::{ws_endpoint, LinkEvent, PushChannel};
use crate::remote::rest::ApiClient;
use crate::remote::ServiceConfig;

#[derive(Debug)]
enum Command {
    SetQuery(TorrentQuery),
    Refresh,
}

/// Owns the store and is the only code that mutates it. Everything the
/// outside sees is a published immutable value: the dashboard view and the
/// link state on watch channels, one-shot notices on a broadcast channel.
pub struct SyncEngine {
    api: ApiClient,
    store: TorrentStore,
    query: TorrentQuery,
    view_tx: watch::Sender<DashboardView>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Start the engine task and the push channel task, and hand back the
    /// channels to watch them by.
    pub fn spawn(config: ServiceConfig, query: TorrentQuery) -> anyhow::Result<EngineHandle> {
        let api = ApiClient::new(&config).context("build api client")?;
        let push_url = ws_endpoint(&config.base_url)?;

        let (inbox_tx, inbox_rx) = mpsc::channel(256);
        let (link_tx, link_rx) = watch::channel(LinkState::Disconnected);
        let (view_tx, view_rx) = watch::channel(DashboardView::default());
        let (event_tx, _) = broadcast::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let push = PushChannel::new(
            push_url,
            Duration::from_millis(config.retry_delay_ms),
            Duration::from_secs(config.timeout_secs),
        );
        let push_task = tokio::spawn(push.run(inbox_tx, link_tx));

        let engine = SyncEngine {
            api,
            store: TorrentStore::new(),
            query,
            view_tx,
            event_tx: event_tx.clone(),
        };
        let engine_task = tokio::spawn(engine.run(inbox_rx, cmd_rx));

        Ok(EngineHandle {
            view: view_rx,
            link: link_rx,
            events: event_tx,
            commands: cmd_tx,
            tasks: vec![engine_task, push_task],
        })
    }

    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<LinkEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        // Startup snapshot. Items that queue up while it is in flight are
        // applied afterwards, in arrival order.
        let mut loaded = self.refresh().await;
        self.publish();

        let mut connects = 0u32;

        loop {
            tokio::select! {
                item = inbox.recv() => {
                    match item {
                        Some(LinkEvent::Frame(event)) => self.apply(event).await,
                        Some(LinkEvent::Online) => {
                            connects += 1;
                            // Events missed while the link was down are only
                            // recoverable through the snapshot. The startup
                            // fetch covers the first connect unless it
                            // failed.
                            if connects > 1 || !loaded {
                                info!("push channel up, reconciling");
                                if self.refresh().await {
                                    loaded = true;
                                    self.publish();
                                }
                            }
                        }
                        None => break,
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::SetQuery(query)) => {
                            self.query = query;
                            self.publish();
                        }
                        Some(Command::Refresh) => {
                            if self.refresh().await {
                                loaded = true;
                                self.publish();
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        debug!("sync engine stopped");
    }

    async fn apply(&mut self, event: PushEvent) {
        let reduction = reduce(&mut self.store, event);
        let mut dirty = reduction.changed;

        match reduction.effect {
            Some(Effect::Refresh) => {
                if self.refresh().await {
                    dirty = true;
                }
            }
            Some(Effect::NotifyCompleted { info_hash, name }) => {
                let _ = self.event_tx.send(EngineEvent::DownloadCompleted { info_hash, name });
            }
            Some(Effect::NotifyError { message }) => {
                let _ = self.event_tx.send(EngineEvent::RemoteError { message });
            }
            None => {}
        }

        if dirty {
            self.publish();
        }
    }

    /// Replace the store from the snapshot endpoint. Failure leaves the
    /// store untouched; whatever triggers next retries.
    async fn refresh(&mut self) -> bool {
        match self.api.fetch_snapshot().await {
            Ok(records) => {
                debug!("snapshot: {} torrents", records.len());
                self.store.replace_all(records);
                true
            }
            Err(e) => {
                warn!("snapshot fetch failed: {}", e);
                false
            }
        }
    }

    fn publish(&self) {
        let _ = self.view_tx.send(build_view(&self.store, &self.query));
    }
}

pub struct EngineHandle {
    view: watch::Receiver<DashboardView>,
    link: watch::Receiver<LinkState>,
    events: broadcast::Sender<EngineEvent>,
    commands: mpsc::Sender<Command>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Latest published view; await `changed()` on the clone to follow it.
    pub fn view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn link(&self) -> watch::Receiver<LinkState> {
        self.link.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Re-project the current store under new parameters.
    pub async fn set_query(&self, query: TorrentQuery) -> anyhow::Result<()> {
        self.commands
            .send(Command::SetQuery(query))
            .await
            .context("sync engine is gone")?;
        Ok(())
    }

    /// Ask for a snapshot reload.
    pub async fn refresh(&self) -> anyhow::Result<()> {
        self.commands.send(Command::Refresh).await.context("sync engine is gone")?;
        Ok(())
    }

    /// Stop both tasks. Aborting drops the socket and cancels any pending
    /// reconnect sleep.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

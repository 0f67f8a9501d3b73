use tracing::debug;

use crate::core::events::PushEvent;
use crate::core::model::{InfoHash, TorrentPatch, TorrentStatus};
use crate::core::store::TorrentStore;

/// Follow-up work a reduced event asks of the engine. The reducer itself
/// never performs I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Re-fetch the full snapshot.
    Refresh,
    /// Surface a completion notice.
    NotifyCompleted { info_hash: InfoHash, name: Option<String> },
    /// Surface a daemon-reported error.
    NotifyError { message: String },
}

#[derive(Debug, Default)]
pub struct Reduction {
    pub changed: bool,
    pub effect: Option<Effect>,
}

/// Apply one push event to the store.
///
/// Events scoped to an info hash the store does not know are no-ops; the
/// added event mutates nothing directly and instead requests a snapshot,
/// since its payload is only a stub.
pub fn reduce(store: &mut TorrentStore, event: PushEvent) -> Reduction {
    match event {
        PushEvent::TorrentAdded { torrent } => {
            if let Some(stub) = &torrent {
                debug!("torrent added upstream: {} ({})", stub.name, stub.info_hash);
            }
            Reduction { changed: false, effect: Some(Effect::Refresh) }
        }

        PushEvent::ProgressUpdate {
            info_hash,
            progress,
            downloaded_pieces,
            download_speed,
            upload_speed,
            peers_connected,
            status,
        } => {
            if store.get(&info_hash).is_none() {
                debug!("progress for unknown torrent {}, dropped", info_hash);
                return Reduction::default();
            }
            // Absent numerics overwrite with zero; an absent status leaves
            // the current one in place.
            store.upsert(
                &info_hash,
                TorrentPatch {
                    progress: Some(progress.unwrap_or(0.0)),
                    downloaded_pieces: Some(downloaded_pieces.unwrap_or(0)),
                    download_speed: Some(download_speed.unwrap_or(0.0)),
                    upload_speed: Some(upload_speed.unwrap_or(0.0)),
                    peers_connected: Some(peers_connected.unwrap_or(0)),
                    status,
                    ..Default::default()
                },
            );
            Reduction { changed: true, effect: None }
        }

        PushEvent::StatusUpdate { info_hash, status } => {
            let Some(status) = status else {
                return Reduction::default();
            };
            if store.get(&info_hash).is_none() {
                debug!("status for unknown torrent {}, dropped", info_hash);
                return Reduction::default();
            }
            store.upsert(&info_hash, TorrentPatch { status: Some(status), ..Default::default() });
            Reduction { changed: true, effect: None }
        }

        PushEvent::Completed { info_hash } => {
            let name = store.get(&info_hash).map(|t| t.name.clone());
            let changed = name.is_some();
            if changed {
                store.upsert(
                    &info_hash,
                    TorrentPatch {
                        status: Some(TorrentStatus::Completed),
                        progress: Some(100.0),
                        ..Default::default()
                    },
                );
            } else {
                debug!("completion for unknown torrent {}", info_hash);
            }
            // The notice fires even when the id is unknown.
            Reduction { changed, effect: Some(Effect::NotifyCompleted { info_hash, name }) }
        }

        PushEvent::TorrentRemoved { info_hash } => {
            Reduction { changed: store.remove(&info_hash), effect: None }
        }

        PushEvent::Error { message } => Reduction {
            changed: false,
            effect: Some(Effect::NotifyError {
                message: message.unwrap_or_else(|| "unknown error".to_string()),
            }),
        },

        PushEvent::Unknown => {
            debug!("unrecognized event kind, ignored");
            Reduction::default()
        }
    }
}

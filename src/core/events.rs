use serde::{Deserialize, Deserializer};

use crate::core::model::{InfoHash, TorrentStatus};

/// One frame off the daemon's push channel, tagged by `type` on the wire.
///
/// Fields the daemon may omit are `Option` here; what an absent field means
/// is the reducer's call, not the parser's.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// Carries only a stub; the full record arrives with the next snapshot.
    TorrentAdded {
        #[serde(default)]
        torrent: Option<AddedStub>,
    },
    ProgressUpdate {
        info_hash: InfoHash,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        downloaded_pieces: Option<u64>,
        #[serde(default)]
        download_speed: Option<f64>,
        #[serde(default)]
        upload_speed: Option<f64>,
        #[serde(default)]
        peers_connected: Option<u32>,
        #[serde(default, deserialize_with = "lenient_status")]
        status: Option<TorrentStatus>,
    },
    StatusUpdate {
        info_hash: InfoHash,
        #[serde(default, deserialize_with = "lenient_status")]
        status: Option<TorrentStatus>,
    },
    Completed {
        info_hash: InfoHash,
    },
    TorrentRemoved {
        info_hash: InfoHash,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any tag this build does not know. Ignored, never fatal.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddedStub {
    pub info_hash: InfoHash,
    #[serde(default)]
    pub name: String,
}

impl PushEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::TorrentAdded { .. } => "torrent_added",
            PushEvent::ProgressUpdate { .. } => "progress_update",
            PushEvent::StatusUpdate { .. } => "status_update",
            PushEvent::Completed { .. } => "completed",
            PushEvent::TorrentRemoved { .. } => "torrent_removed",
            PushEvent::Error { .. } => "error",
            PushEvent::Unknown => "unknown",
        }
    }
}

/// Unknown status strings parse to `None`; the frame around them still
/// applies.
fn lenient_status<'de, D>(de: D) -> Result<Option<TorrentStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.and_then(|s| {
        let parsed = TorrentStatus::parse(&s);
        if parsed.is_none() {
            tracing::debug!("ignoring unrecognized status {:?}", s);
        }
        parsed
    }))
}

/// Notices the sync engine broadcasts to whoever is rendering.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    DownloadCompleted { info_hash: InfoHash, name: Option<String> },
    RemoteError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> PushEvent {
        serde_json::from_str(raw).expect("frame should parse")
    }

    #[test]
    fn progress_update_parses_all_fields() {
        let event = parse(
            r#"{"type":"progress_update","info_hash":"aa","progress":45.5,
                "downloaded_pieces":12,"download_speed":2048.0,"upload_speed":10.0,
                "peers_connected":4,"status":"downloading"}"#,
        );
        match event {
            PushEvent::ProgressUpdate { info_hash, progress, downloaded_pieces, status, .. } => {
                assert_eq!(info_hash, "aa");
                assert_eq!(progress, Some(45.5));
                assert_eq!(downloaded_pieces, Some(12));
                assert_eq!(status, Some(TorrentStatus::Downloading));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn absent_fields_parse_as_none() {
        let event = parse(r#"{"type":"progress_update","info_hash":"aa"}"#);
        match event {
            PushEvent::ProgressUpdate { progress, download_speed, peers_connected, status, .. } => {
                assert_eq!(progress, None);
                assert_eq!(download_speed, None);
                assert_eq!(peers_connected, None);
                assert_eq!(status, None);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn bogus_status_degrades_to_none_without_losing_numerics() {
        let event = parse(
            r#"{"type":"progress_update","info_hash":"aa","progress":10.0,"status":"rewinding"}"#,
        );
        match event {
            PushEvent::ProgressUpdate { progress, status, .. } => {
                assert_eq!(progress, Some(10.0));
                assert_eq!(status, None);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_maps_to_unknown() {
        let event = parse(r#"{"type":"firmware_upgraded","info_hash":"aa"}"#);
        assert!(matches!(event, PushEvent::Unknown));
        assert_eq!(event.kind(), "unknown");
    }

    #[test]
    fn added_frame_carries_the_stub() {
        let event = parse(
            r#"{"type":"torrent_added","torrent":{"info_hash":"bb","name":"debian.iso"}}"#,
        );
        match event {
            PushEvent::TorrentAdded { torrent: Some(stub) } => {
                assert_eq!(stub.info_hash, "bb");
                assert_eq!(stub.name, "debian.iso");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn error_frame_message_is_optional() {
        assert!(matches!(
            parse(r#"{"type":"error"}"#),
            PushEvent::Error { message: None }
        ));
        match parse(r#"{"type":"error","message":"tracker down"}"#) {
            PushEvent::Error { message } => assert_eq!(message.as_deref(), Some("tracker down")),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn completed_frame_ignores_extra_fields() {
        let event = parse(r#"{"type":"completed","info_hash":"aa","status":"completed"}"#);
        match event {
            PushEvent::Completed { info_hash } => assert_eq!(info_hash, "aa"),
            other => panic!("wrong variant: {:?}", other),
        }
    }
}

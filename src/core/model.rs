use serde::Deserialize;

/// Hex identifier the daemon assigns to every torrent.
pub type InfoHash = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Error,
}

impl TorrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Queued => "queued",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Paused => "paused",
            TorrentStatus::Completed => "completed",
            TorrentStatus::Error => "error",
        }
    }

    /// Lenient form used for wire input: unknown strings become `None`
    /// instead of failing the whole frame.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TorrentStatus::Queued),
            "downloading" => Some(TorrentStatus::Downloading),
            "paused" => Some(TorrentStatus::Paused),
            "completed" => Some(TorrentStatus::Completed),
            "error" => Some(TorrentStatus::Error),
            _ => None,
        }
    }
}

/// One tracked torrent as the daemon reports it. The snapshot endpoint
/// omits the piece fields, so `piece_count` stays unknown until a richer
/// source fills it in.
#[derive(Debug, Clone, Deserialize)]
pub struct Torrent {
    pub info_hash: InfoHash,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default = "default_status")]
    pub status: TorrentStatus,
    #[serde(default)]
    pub downloaded_pieces: u64,
    #[serde(default)]
    pub piece_count: Option<u64>,
    #[serde(default)]
    pub download_speed: f64,
    #[serde(default)]
    pub upload_speed: f64,
    #[serde(default)]
    pub peers_connected: u32,
}

fn default_status() -> TorrentStatus {
    TorrentStatus::Queued
}

impl Torrent {
    pub fn new(info_hash: impl Into<InfoHash>) -> Self {
        Self {
            info_hash: info_hash.into(),
            name: String::new(),
            total_size: 0,
            progress: 0.0,
            status: TorrentStatus::Queued,
            downloaded_pieces: 0,
            piece_count: None,
            download_speed: 0.0,
            upload_speed: 0.0,
            peers_connected: 0,
        }
    }
}

/// Partial update merged onto a [`Torrent`]; only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct TorrentPatch {
    pub name: Option<String>,
    pub total_size: Option<u64>,
    pub progress: Option<f64>,
    pub status: Option<TorrentStatus>,
    pub downloaded_pieces: Option<u64>,
    pub piece_count: Option<u64>,
    pub download_speed: Option<f64>,
    pub upload_speed: Option<f64>,
    pub peers_connected: Option<u32>,
}

/// Externally visible state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        }
    }
}

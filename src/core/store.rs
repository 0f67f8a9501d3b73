use crate::core::model::{Torrent, TorrentPatch, TorrentStatus};

/// Authoritative map of info hash to torrent record.
///
/// Insertion order is preserved and is what the "newest" sort shows, so the
/// backing storage is an ordered vector with id lookup rather than a hash
/// map. Store sizes are dashboard scale; the linear scan is fine.
#[derive(Debug, Default)]
pub struct TorrentStore {
    records: Vec<Torrent>,
}

impl TorrentStore {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, info_hash: &str) -> Option<&Torrent> {
        self.records.iter().find(|t| t.info_hash == info_hash)
    }

    /// Iterate records oldest-first.
    pub fn values(&self) -> impl Iterator<Item = &Torrent> {
        self.records.iter()
    }

    /// Merge the `Some` fields of `patch` onto the record for `info_hash`,
    /// creating it in last position when absent.
    pub fn upsert(&mut self, info_hash: &str, patch: TorrentPatch) {
        match self.records.iter_mut().find(|t| t.info_hash == info_hash) {
            Some(t) => {
                apply(t, patch);
                normalize(t);
            }
            None => {
                let mut t = Torrent::new(info_hash);
                apply(&mut t, patch);
                normalize(&mut t);
                self.records.push(t);
            }
        }
    }

    /// Returns true when a record was actually dropped.
    pub fn remove(&mut self, info_hash: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|t| t.info_hash != info_hash);
        self.records.len() != before
    }

    /// Discard everything and adopt `records` wholesale. Duplicate ids within
    /// one batch collapse to a single record: the first occurrence keeps its
    /// position, the last occurrence wins its fields.
    pub fn replace_all(&mut self, records: Vec<Torrent>) {
        self.records.clear();
        for mut t in records {
            normalize(&mut t);
            match self.records.iter_mut().find(|e| e.info_hash == t.info_hash) {
                Some(slot) => *slot = t,
                None => self.records.push(t),
            }
        }
    }
}

fn apply(t: &mut Torrent, patch: TorrentPatch) {
    if let Some(v) = patch.name {
        t.name = v;
    }
    if let Some(v) = patch.total_size {
        t.total_size = v;
    }
    if let Some(v) = patch.progress {
        t.progress = v;
    }
    if let Some(v) = patch.status {
        t.status = v;
    }
    if let Some(v) = patch.downloaded_pieces {
        t.downloaded_pieces = v;
    }
    if let Some(v) = patch.piece_count {
        t.piece_count = Some(v);
    }
    if let Some(v) = patch.download_speed {
        t.download_speed = v;
    }
    if let Some(v) = patch.upload_speed {
        t.upload_speed = v;
    }
    if let Some(v) = patch.peers_connected {
        t.peers_connected = v;
    }
}

/// Invariant repair after any write: progress stays in [0, 100] and a
/// completed record always reads 100.
fn normalize(t: &mut Torrent) {
    t.progress = t.progress.clamp(0.0, 100.0);
    if t.status == TorrentStatus::Completed {
        t.progress = 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(info_hash: &str, name: &str) -> Torrent {
        let mut t = Torrent::new(info_hash);
        t.name = name.to_string();
        t
    }

    #[test]
    fn upsert_never_duplicates_ids() {
        let mut store = TorrentStore::new();
        for _ in 0..3 {
            store.upsert("aa", TorrentPatch { progress: Some(10.0), ..Default::default() });
        }
        store.upsert("bb", TorrentPatch::default());
        assert_eq!(store.len(), 2);
        assert_eq!(store.values().filter(|t| t.info_hash == "aa").count(), 1);
    }

    #[test]
    fn upsert_merges_only_present_fields() {
        let mut store = TorrentStore::new();
        store.replace_all(vec![rec("aa", "ubuntu.iso")]);
        store.upsert(
            "aa",
            TorrentPatch { progress: Some(42.0), download_speed: Some(1024.0), ..Default::default() },
        );

        let t = store.get("aa").unwrap();
        assert_eq!(t.name, "ubuntu.iso");
        assert_eq!(t.progress, 42.0);
        assert_eq!(t.download_speed, 1024.0);
        assert_eq!(t.status, TorrentStatus::Queued);
    }

    #[test]
    fn completed_status_forces_full_progress() {
        let mut store = TorrentStore::new();
        store.upsert(
            "aa",
            TorrentPatch {
                progress: Some(97.3),
                status: Some(TorrentStatus::Completed),
                ..Default::default()
            },
        );
        assert_eq!(store.get("aa").unwrap().progress, 100.0);

        // Also when the snapshot path writes the record.
        let mut done = rec("bb", "done");
        done.status = TorrentStatus::Completed;
        done.progress = 55.0;
        store.replace_all(vec![done]);
        assert_eq!(store.get("bb").unwrap().progress, 100.0);
    }

    #[test]
    fn progress_is_clamped() {
        let mut store = TorrentStore::new();
        store.upsert("aa", TorrentPatch { progress: Some(120.0), ..Default::default() });
        assert_eq!(store.get("aa").unwrap().progress, 100.0);
        store.upsert("aa", TorrentPatch { progress: Some(-3.0), ..Default::default() });
        assert_eq!(store.get("aa").unwrap().progress, 0.0);
    }

    #[test]
    fn upsert_keeps_insertion_position() {
        let mut store = TorrentStore::new();
        store.replace_all(vec![rec("aa", "first"), rec("bb", "second")]);
        store.upsert("aa", TorrentPatch { progress: Some(50.0), ..Default::default() });

        let order: Vec<&str> = store.values().map(|t| t.info_hash.as_str()).collect();
        assert_eq!(order, vec!["aa", "bb"]);
    }

    #[test]
    fn replace_all_collapses_duplicate_ids() {
        let mut store = TorrentStore::new();
        let mut newer = rec("aa", "renamed");
        newer.progress = 60.0;
        store.replace_all(vec![rec("aa", "old"), rec("bb", "other"), newer]);

        assert_eq!(store.len(), 2);
        let order: Vec<&str> = store.values().map(|t| t.name.as_str()).collect();
        assert_eq!(order, vec!["renamed", "other"]);
    }

    #[test]
    fn removed_record_leaves_no_trace() {
        let mut store = TorrentStore::new();
        store.replace_all(vec![rec("aa", "a"), rec("bb", "b")]);
        assert!(store.remove("aa"));
        assert!(!store.remove("aa"));
        assert!(store.get("aa").is_none());
        assert_eq!(store.len(), 1);
    }
}

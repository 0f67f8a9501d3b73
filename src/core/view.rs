use crate::core::model::{Torrent, TorrentStatus};
use crate::core::store::TorrentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Downloading,
    /// Completed status, or anything already at 100%.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Store order, no re-sort.
    #[default]
    Newest,
    Name,
    Size,
}

/// What subset of the store to show, and in what order.
#[derive(Debug, Clone, Default)]
pub struct TorrentQuery {
    pub search: String,
    pub filter: StatusFilter,
    pub sort: SortKey,
}

/// Filter, then search, then sort. Pure: same store and query always yield
/// the same list. Sorts are stable, so ties keep store order.
pub fn project<'a>(store: &'a TorrentStore, query: &TorrentQuery) -> Vec<&'a Torrent> {
    let needle = query.search.trim().to_lowercase();

    let mut rows: Vec<&Torrent> = store
        .values()
        .filter(|t| match query.filter {
            StatusFilter::All => true,
            StatusFilter::Downloading => t.status == TorrentStatus::Downloading,
            StatusFilter::Completed => {
                t.status == TorrentStatus::Completed || t.progress >= 100.0
            }
        })
        .filter(|t| needle.is_empty() || t.name.to_lowercase().contains(&needle))
        .collect();

    match query.sort {
        SortKey::Newest => {}
        SortKey::Name => rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        SortKey::Size => rows.sort_by(|a, b| b.total_size.cmp(&a.total_size)),
    }

    rows
}

/// Global throughput, counting actively downloading records only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferTotals {
    pub download_bps: f64,
    pub upload_bps: f64,
}

pub fn aggregate(store: &TorrentStore) -> TransferTotals {
    let mut totals = TransferTotals::default();
    for t in store.values() {
        if t.status == TorrentStatus::Downloading {
            totals.download_bps += t.download_speed;
            totals.upload_bps += t.upload_speed;
        }
    }
    totals
}

/// Immutable value the engine publishes after every store change.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub rows: Vec<Torrent>,
    pub totals: TransferTotals,
    /// Store size before filtering.
    pub total_count: usize,
}

pub fn build_view(store: &TorrentStore, query: &TorrentQuery) -> DashboardView {
    DashboardView {
        rows: project(store, query).into_iter().cloned().collect(),
        totals: aggregate(store),
        total_count: store.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent(info_hash: &str, name: &str, size: u64, status: TorrentStatus) -> Torrent {
        let mut t = Torrent::new(info_hash);
        t.name = name.to_string();
        t.total_size = size;
        t.status = status;
        t
    }

    fn store_of(records: Vec<Torrent>) -> TorrentStore {
        let mut store = TorrentStore::new();
        store.replace_all(records);
        store
    }

    fn names(rows: &[&Torrent]) -> Vec<String> {
        rows.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring_on_name() {
        let store = store_of(vec![
            torrent("a", "Foobar", 10, TorrentStatus::Queued),
            torrent("b", "Barfoo", 20, TorrentStatus::Queued),
            torrent("c", "Baz", 30, TorrentStatus::Queued),
        ]);
        let query = TorrentQuery {
            search: "foo".to_string(),
            filter: StatusFilter::All,
            sort: SortKey::Name,
        };
        assert_eq!(names(&project(&store, &query)), vec!["Barfoo", "Foobar"]);
    }

    #[test]
    fn search_needle_is_trimmed() {
        let store = store_of(vec![torrent("a", "Foobar", 10, TorrentStatus::Queued)]);
        let query = TorrentQuery { search: "  foo  ".to_string(), ..Default::default() };
        assert_eq!(project(&store, &query).len(), 1);
    }

    #[test]
    fn downloading_filter_keeps_only_active_status() {
        let store = store_of(vec![
            torrent("a", "active", 10, TorrentStatus::Downloading),
            torrent("b", "parked", 10, TorrentStatus::Paused),
            torrent("c", "queued", 10, TorrentStatus::Queued),
        ]);
        let query = TorrentQuery { filter: StatusFilter::Downloading, ..Default::default() };
        assert_eq!(names(&project(&store, &query)), vec!["active"]);
    }

    #[test]
    fn completed_filter_accepts_full_progress_regardless_of_status() {
        let mut stuck = torrent("b", "stuck at done", 10, TorrentStatus::Paused);
        stuck.progress = 100.0;
        let store = store_of(vec![
            torrent("a", "done", 10, TorrentStatus::Completed),
            stuck,
            torrent("c", "half", 10, TorrentStatus::Downloading),
        ]);
        let query = TorrentQuery { filter: StatusFilter::Completed, ..Default::default() };
        assert_eq!(names(&project(&store, &query)), vec!["done", "stuck at done"]);
    }

    #[test]
    fn newest_keeps_insertion_order() {
        let store = store_of(vec![
            torrent("a", "first", 30, TorrentStatus::Queued),
            torrent("b", "second", 10, TorrentStatus::Queued),
            torrent("c", "third", 20, TorrentStatus::Queued),
        ]);
        let query = TorrentQuery::default();
        assert_eq!(names(&project(&store, &query)), vec!["first", "second", "third"]);
    }

    #[test]
    fn size_sorts_descending_with_stable_ties() {
        let store = store_of(vec![
            torrent("a", "small", 10, TorrentStatus::Queued),
            torrent("b", "big", 900, TorrentStatus::Queued),
            torrent("c", "tie one", 50, TorrentStatus::Queued),
            torrent("d", "tie two", 50, TorrentStatus::Queued),
        ]);
        let query = TorrentQuery { sort: SortKey::Size, ..Default::default() };
        assert_eq!(names(&project(&store, &query)), vec!["big", "tie one", "tie two", "small"]);
    }

    #[test]
    fn sorted_projections_ignore_insertion_order() {
        let a = torrent("a", "alpha", 10, TorrentStatus::Queued);
        let b = torrent("b", "Bravo", 20, TorrentStatus::Queued);
        let c = torrent("c", "charlie", 30, TorrentStatus::Queued);

        let one = store_of(vec![a.clone(), b.clone(), c.clone()]);
        let two = store_of(vec![c, a, b]);

        for sort in [SortKey::Name, SortKey::Size] {
            let query = TorrentQuery { sort, ..Default::default() };
            assert_eq!(names(&project(&one, &query)), names(&project(&two, &query)));
        }
    }

    #[test]
    fn aggregate_counts_downloading_only() {
        let mut active = torrent("a", "active", 10, TorrentStatus::Downloading);
        active.download_speed = 100.0;
        active.upload_speed = 50.0;
        let mut parked = torrent("b", "parked", 10, TorrentStatus::Paused);
        parked.download_speed = 999.0;
        parked.upload_speed = 999.0;

        let store = store_of(vec![active, parked]);
        let totals = aggregate(&store);
        assert_eq!(totals.download_bps, 100.0);
        assert_eq!(totals.upload_bps, 50.0);
    }

    #[test]
    fn view_reports_unfiltered_count() {
        let store = store_of(vec![
            torrent("a", "Foobar", 10, TorrentStatus::Queued),
            torrent("b", "Baz", 20, TorrentStatus::Queued),
        ]);
        let query = TorrentQuery { search: "foo".to_string(), ..Default::default() };
        let view = build_view(&store, &query);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.total_count, 2);
    }
}

//! Client-side sync engine and console dashboard for a remote torrent
//! daemon. The daemon exposes a REST snapshot of its torrents plus a
//! websocket push channel; this crate keeps a live local replica of that
//! state and derives filtered, sorted, aggregated views from it.

pub mod core;
pub mod remote;

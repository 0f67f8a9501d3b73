use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use url::Url;

use torview::core::engine::SyncEngine;
use torview::core::events::EngineEvent;
use torview::core::model::{LinkState, Torrent};
use torview::core::store::TorrentStore;
use torview::core::view::{build_view, DashboardView, SortKey, StatusFilter, TorrentQuery};
use torview::remote::rest::ApiClient;
use torview::remote::ServiceConfig;

fn client_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("url")
            .long("url")
            .help("Daemon base URL")
            .default_value("http://localhost:8000")
            .num_args(1),
    )
}

fn query_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("search")
            .long("search")
            .help("Substring match on torrent names")
            .default_value("")
            .num_args(1),
    )
    .arg(
        Arg::new("show")
            .long("show")
            .help("Status filter: all | downloading | completed")
            .default_value("all")
            .num_args(1),
    )
    .arg(
        Arg::new("sort")
            .long("sort")
            .help("Sort order: newest | name | size")
            .default_value("newest")
            .num_args(1),
    )
}

fn build_cli() -> Command {
    let watch = client_args(query_args(
        Command::new("watch").about("Live dashboard of the daemon's torrents"),
    ))
    .arg(
        Arg::new("retry_ms")
            .long("retry-ms")
            .help("Reconnect delay for the push channel (ms)")
            .default_value("3000")
            .num_args(1),
    )
    .arg(
        Arg::new("timeout_secs")
            .long("timeout-secs")
            .help("HTTP and connect timeout (seconds)")
            .default_value("30")
            .num_args(1),
    );

    let list = client_args(query_args(
        Command::new("list").about("Fetch one snapshot and print the matching torrents"),
    ));

    let add = client_args(
        Command::new("add").about("Upload a .torrent file to the daemon").arg(
            Arg::new("file")
                .help(".torrent file to upload")
                .required(true)
                .num_args(1),
        ),
    );

    let start = client_args(
        Command::new("start").about("Start a torrent").arg(
            Arg::new("info_hash")
                .help("Torrent identifier")
                .required(true)
                .num_args(1),
        ),
    );

    let pause = client_args(
        Command::new("pause").about("Pause a torrent").arg(
            Arg::new("info_hash")
                .help("Torrent identifier")
                .required(true)
                .num_args(1),
        ),
    );

    let remove = client_args(
        Command::new("remove").about("Remove a torrent from the daemon").arg(
            Arg::new("info_hash")
                .help("Torrent identifier")
                .required(true)
                .num_args(1),
        ),
    );

    Command::new("torview")
        .about("Console dashboard for a remote torrent daemon")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(watch)
        .subcommand(list)
        .subcommand(add)
        .subcommand(start)
        .subcommand(pause)
        .subcommand(remove)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("torview=warn".parse()?),
        )
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("watch", m)) => watch_dashboard(m).await?,
        Some(("list", m)) => list_once(m).await?,
        Some(("add", m)) => {
            let api = ApiClient::new(&service_config(m)?)?;
            let path = PathBuf::from(m.get_one::<String>("file").unwrap());
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.torrent")
                .to_string();

            let outcome = api.add_torrent(&file_name, bytes).await.context("upload torrent")?;
            println!("added: {} ({})", outcome.name, outcome.info_hash);
        }
        Some(("start", m)) => {
            let api = ApiClient::new(&service_config(m)?)?;
            let info_hash = m.get_one::<String>("info_hash").unwrap();
            api.start(info_hash).await?;
            println!("started: {info_hash}");
        }
        Some(("pause", m)) => {
            let api = ApiClient::new(&service_config(m)?)?;
            let info_hash = m.get_one::<String>("info_hash").unwrap();
            api.pause(info_hash).await?;
            println!("paused: {info_hash}");
        }
        Some(("remove", m)) => {
            let api = ApiClient::new(&service_config(m)?)?;
            let info_hash = m.get_one::<String>("info_hash").unwrap();
            api.remove(info_hash).await?;
            println!("removed: {info_hash}");
        }
        _ => {}
    }

    Ok(())
}

fn service_config(m: &clap::ArgMatches) -> anyhow::Result<ServiceConfig> {
    let raw = m.get_one::<String>("url").unwrap();
    let base_url = Url::parse(raw).with_context(|| format!("invalid --url {raw}"))?;
    Ok(ServiceConfig { base_url, ..Default::default() })
}

fn query_from_matches(m: &clap::ArgMatches) -> anyhow::Result<TorrentQuery> {
    let search = m.get_one::<String>("search").unwrap().clone();
    let filter = match m.get_one::<String>("show").unwrap().as_str() {
        "all" => StatusFilter::All,
        "downloading" => StatusFilter::Downloading,
        "completed" => StatusFilter::Completed,
        other => anyhow::bail!("unknown --show value: {other}"),
    };
    let sort = match m.get_one::<String>("sort").unwrap().as_str() {
        "newest" => SortKey::Newest,
        "name" => SortKey::Name,
        "size" => SortKey::Size,
        other => anyhow::bail!("unknown --sort value: {other}"),
    };
    Ok(TorrentQuery { search, filter, sort })
}

async fn watch_dashboard(m: &clap::ArgMatches) -> anyhow::Result<()> {
    let mut config = service_config(m)?;
    config.retry_delay_ms = m.get_one::<String>("retry_ms").unwrap().parse().context("--retry-ms")?;
    config.timeout_secs =
        m.get_one::<String>("timeout_secs").unwrap().parse().context("--timeout-secs")?;
    let query = query_from_matches(m)?;

    let handle = SyncEngine::spawn(config, query)?;
    let mut view = handle.view();
    let mut link = handle.link();
    let mut notices = handle.subscribe();

    let mut board = Dashboard::new();
    let first = view.borrow().clone();
    board.redraw(&first, *link.borrow());

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                board.redraw(&snapshot, *link.borrow());
            }
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *link.borrow_and_update();
                let snapshot = view.borrow().clone();
                board.redraw(&snapshot, state);
            }
            notice = notices.recv() => {
                match notice {
                    Ok(EngineEvent::DownloadCompleted { info_hash, name }) => {
                        let label = name.filter(|n| !n.is_empty()).unwrap_or(info_hash);
                        board.println(format!("[DONE] {label}"));
                    }
                    Ok(EngineEvent::RemoteError { message }) => {
                        board.println(format!("[ERR] daemon: {message}"));
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

async fn list_once(m: &clap::ArgMatches) -> anyhow::Result<()> {
    let config = service_config(m)?;
    let query = query_from_matches(m)?;
    let api = ApiClient::new(&config)?;

    let mut store = TorrentStore::new();
    store.replace_all(api.fetch_snapshot().await.context("fetch torrent list")?);

    let view = build_view(&store, &query);
    if view.rows.is_empty() {
        println!("no torrents match your filter");
        return Ok(());
    }

    for t in &view.rows {
        println!(
            "{:<10} {:>6.1}%  {:>10}  {:>12}  {:<12} {}",
            short_hash(&t.info_hash),
            t.progress,
            fmt_bytes(t.total_size),
            fmt_speed(t.download_speed),
            t.status.as_str(),
            t.name,
        );
    }
    println!(
        "{} of {} torrents | ↓ {} ↑ {}",
        view.rows.len(),
        view.total_count,
        fmt_speed(view.totals.download_bps),
        fmt_speed(view.totals.upload_bps),
    );
    Ok(())
}

/// One progress bar per projected torrent plus a header line. Rows are
/// rebuilt whenever the projection's order changes so the terminal matches
/// it top to bottom.
struct Dashboard {
    mp: MultiProgress,
    header: ProgressBar,
    sty_row: ProgressStyle,
    bars: HashMap<String, ProgressBar>,
    order: Vec<String>,
}

impl Dashboard {
    fn new() -> Self {
        let sty_header = ProgressStyle::with_template("{spinner:.green} {wide_msg}")
            .unwrap()
            .tick_chars("|/-\\ ");
        let sty_row =
            ProgressStyle::with_template("{prefix} {bar:30.cyan/blue} {wide_msg}").unwrap();

        let mp = MultiProgress::new();
        let header = mp.add(ProgressBar::new_spinner());
        header.set_style(sty_header);
        header.enable_steady_tick(Duration::from_millis(120));

        Self { mp, header, sty_row, bars: HashMap::new(), order: Vec::new() }
    }

    fn redraw(&mut self, view: &DashboardView, link: LinkState) {
        self.header.set_message(format!(
            "link={} | showing {} of {} | ↓ {} ↑ {}",
            link.as_str(),
            view.rows.len(),
            view.total_count,
            fmt_speed(view.totals.download_bps),
            fmt_speed(view.totals.upload_bps),
        ));

        let order: Vec<String> = view.rows.iter().map(|t| t.info_hash.clone()).collect();
        if order != self.order {
            for (_, pb) in self.bars.drain() {
                pb.finish_and_clear();
                self.mp.remove(&pb);
            }
            for t in &view.rows {
                let pb = self.mp.add(ProgressBar::new(100));
                pb.set_style(self.sty_row.clone());
                self.bars.insert(t.info_hash.clone(), pb);
            }
            self.order = order;
        }

        for t in &view.rows {
            let pb = match self.bars.get(&t.info_hash) {
                Some(pb) => pb,
                None => continue,
            };
            pb.set_prefix(row_prefix(t));
            pb.set_position(t.progress.round() as u64);
            pb.set_message(row_line(t));
        }
    }

    fn println(&self, line: String) {
        let _ = self.mp.println(line);
    }
}

fn row_prefix(t: &Torrent) -> String {
    let label = if t.name.is_empty() { t.info_hash.as_str() } else { t.name.as_str() };
    let shown: String = label.chars().take(24).collect();
    format!("{:<24}", shown)
}

fn row_line(t: &Torrent) -> String {
    let pieces = match t.piece_count {
        Some(n) => format!("{}/{}", t.downloaded_pieces, n),
        None => format!("{}/?", t.downloaded_pieces),
    };
    format!(
        "{:>5.1}% | {} | ↓ {} ↑ {} | peers {} | pieces {} | {}",
        t.progress,
        fmt_bytes(t.total_size),
        fmt_speed(t.download_speed),
        fmt_speed(t.upload_speed),
        t.peers_connected,
        pieces,
        t.status.as_str(),
    )
}

fn short_hash(info_hash: &str) -> String {
    info_hash.chars().take(10).collect()
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}

fn fmt_speed(bps: f64) -> String {
    format!("{}/s", fmt_bytes(bps.max(0.0) as u64))
}

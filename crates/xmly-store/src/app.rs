//! App — line-oriented console over a `StoreHandle`.
//!
//! Reads one command per line, dispatches it, then redraws the current page.
//! Downloads run in the background; their completions arrive on a channel
//! and are printed between commands.

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use xmly_proto::state::ViewMode;

use crate::action::{Action, HELP};
use crate::download_manager::DownloadStatus;
use crate::handle::StoreHandle;
use crate::NavOutcome;

const PROMPT: &str = "> ";

pub struct App {
    store: StoreHandle,
    notice_tx: mpsc::Sender<String>,
    notice_rx: mpsc::Receiver<String>,
}

impl App {
    pub fn new(store: StoreHandle) -> Self {
        let (notice_tx, notice_rx) = mpsc::channel(64);
        Self {
            store,
            notice_tx,
            notice_rx,
        }
    }

    pub async fn run<R, W>(mut self, input: R, mut out: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        out.write_all(format!("{}\n{}", HELP, PROMPT).as_bytes()).await?;
        out.flush().await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let (reply, keep_going) = self.handle_line(&line).await;
                    out.write_all(reply.as_bytes()).await?;
                    if !keep_going {
                        break;
                    }
                    out.write_all(PROMPT.as_bytes()).await?;
                }
                Some(notice) = self.notice_rx.recv() => {
                    out.write_all(format!("\n{}\n{}", notice, PROMPT).as_bytes()).await?;
                }
            }
            out.flush().await?;
        }

        info!("console closed");
        Ok(())
    }

    /// Handle one input line; returns the text to print and whether to keep
    /// reading.
    pub async fn handle_line(&self, line: &str) -> (String, bool) {
        let action = match Action::parse(line) {
            Ok(action) => action,
            Err(msg) => return (format!("{}\n", msg), true),
        };

        let result = match action {
            Action::Noop => return (String::new(), true),
            Action::Quit => return (String::new(), false),
            Action::Help => return (format!("{}\n", HELP), true),
            Action::Status => return (self.render_status().await, true),
            Action::Show => Ok(NavOutcome::Applied),
            Action::Get(index) => {
                self.spawn_download(index);
                return (format!("downloading track {}...\n", index), true);
            }
            Action::Search(keyword) => self.store.search(&keyword, 1).await,
            Action::Open(index) => self.store.open_album(index, 1).await,
            Action::First => self.store.goto_first().await,
            Action::Prev => self.store.goto_prev().await,
            Action::Jump(page) => self.store.goto_jump(page).await,
            Action::Next => self.store.goto_next().await,
            Action::Last => self.store.goto_last().await,
        };

        match result {
            Ok(NavOutcome::Superseded) => ("(superseded by a newer request)\n".to_string(), true),
            Ok(_) => (self.render().await, true),
            Err(e) => {
                warn!("command {:?} failed: {}", line, e);
                (format!("error: {}\n", e), true)
            }
        }
    }

    fn spawn_download(&self, index: usize) {
        let store = self.store.clone();
        let notice_tx = self.notice_tx.clone();
        tokio::spawn(async move {
            let notice = match store.download_displayed(index).await {
                Ok(outcome) if outcome.fetched => format!("saved {}", outcome.path.display()),
                Ok(outcome) => format!("already present: {}", outcome.path.display()),
                Err(e) => format!("download of track {} failed: {}", index, e),
            };
            let _ = notice_tx.send(notice).await;
        });
    }

    /// Current mode, visible list and navigator line.
    pub async fn render(&self) -> String {
        let state = self.store.snapshot().await;
        let mut out = String::new();

        match state.mode {
            ViewMode::Empty => {
                out.push_str("nothing to show; try `search <keyword>`\n");
            }
            ViewMode::Albums => {
                let albums = self.store.albums().await;
                let _ = writeln!(out, "albums for {:?}:", state.keyword);
                if albums.is_empty() {
                    out.push_str("  (no results)\n");
                }
                for (i, album) in albums.iter().enumerate() {
                    let _ = writeln!(out, "  [{}] {} ({} tracks)", i, album.title, album.tracks_count);
                }
            }
            ViewMode::Tracks => {
                let title = self
                    .store
                    .current_album()
                    .await
                    .map(|album| album.title)
                    .unwrap_or_default();
                let _ = writeln!(out, "tracks of {:?}:", title);
                let tracks = self.store.tracks().await;
                if tracks.is_empty() {
                    out.push_str("  (no tracks)\n");
                }
                for (i, track) in tracks.iter().enumerate() {
                    let _ = writeln!(out, "  [{}] {}", i, track.name);
                }
            }
        }

        let nav = state.navigator();
        let page = if state.total_page == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", state.page_num, state.total_page)
        };
        let moves: Vec<&str> = [
            (nav.first, "first"),
            (nav.prev, "prev"),
            (nav.jump, "jump"),
            (nav.next, "next"),
            (nav.last, "last"),
        ]
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| *name)
        .collect();
        let _ = writeln!(out, "page {}  [{}]", page, moves.join(" "));
        out
    }

    async fn render_status(&self) -> String {
        let tracks = self.store.tracks().await;
        if tracks.is_empty() {
            return "no play list on display\n".to_string();
        }

        let mut out = String::new();
        for (i, track) in tracks.iter().enumerate() {
            let status = match self.store.download_status(track.id).await {
                DownloadStatus::NotDownloaded => "-".to_string(),
                DownloadStatus::Downloading => "downloading".to_string(),
                DownloadStatus::Downloaded(path) => format!("done ({})", path.display()),
                DownloadStatus::Failed(msg) => format!("failed: {}", msg),
            };
            let _ = writeln!(out, "  [{}] {}  {}", i, track.name, status);
        }
        out
    }
}

//! Navigation model: what the browser currently shows and which paging moves
//! are legal.  Everything here is plain data; the event loop in the store
//! crate is the only writer.

use serde::{Deserialize, Serialize};

/// What a cached page belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Album search results for a raw keyword (exact match, no normalisation).
    Albums { keyword: String },
    /// The play list of one album.
    Tracks { album_id: i64 },
}

/// Composite `(scope, page)` key naming one cache cell.  Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRef {
    pub scope: Scope,
    pub page: u32,
}

impl PageRef {
    pub fn albums(keyword: impl Into<String>, page: u32) -> Self {
        Self {
            scope: Scope::Albums {
                keyword: keyword.into(),
            },
            page,
        }
    }

    pub fn tracks(album_id: i64, page: u32) -> Self {
        Self {
            scope: Scope::Tracks { album_id },
            page,
        }
    }
}

/// Which list is on screen.  `Albums` and `Tracks` are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Nothing searched yet.
    #[default]
    Empty,
    Albums,
    Tracks,
}

/// A paging request relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    First,
    Prev,
    Jump(u32),
    Next,
    Last,
}

/// Enabled/disabled flags for the five paging affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Navigator {
    pub first: bool,
    pub prev: bool,
    pub jump: bool,
    pub next: bool,
    pub last: bool,
}

impl Navigator {
    /// Affordances are a pure function of the current page and page count.
    pub fn for_page(page_num: u32, total_page: u32) -> Self {
        if total_page <= 1 {
            return Self::default();
        }
        if page_num == 1 {
            Self {
                jump: true,
                next: true,
                last: true,
                ..Self::default()
            }
        } else if page_num == total_page {
            Self {
                first: true,
                prev: true,
                jump: true,
                ..Self::default()
            }
        } else {
            Self {
                first: true,
                prev: true,
                jump: true,
                next: true,
                last: true,
            }
        }
    }

    pub fn allows(&self, mv: PageMove) -> bool {
        match mv {
            PageMove::First => self.first,
            PageMove::Prev => self.prev,
            PageMove::Jump(_) => self.jump,
            PageMove::Next => self.next,
            PageMove::Last => self.last,
        }
    }
}

/// Number of play-list pages for an album: `ceil(tracks_count / page_size)`.
pub fn total_pages(tracks_count: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    tracks_count.div_ceil(page_size)
}

/// Snapshot of the browser's navigation state.
///
/// The displayed lists are not stored here; `album_page` / `track_page` name
/// the cache cells they live in.  `rev` increases on every committed change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    pub rev: u64,
    pub mode: ViewMode,
    pub keyword: String,
    pub album_index: usize,
    pub page_num: u32,
    pub total_page: u32,
    /// Album page the current album index points into.  Kept while tracks are
    /// shown so paging inside the album can re-resolve it.
    pub album_page: Option<PageRef>,
    pub track_page: Option<PageRef>,
}

impl NavigationState {
    pub fn navigator(&self) -> Navigator {
        Navigator::for_page(self.page_num, self.total_page)
    }

    /// Page number a move would land on.  `Prev` on page 1 yields 0, which
    /// callers reject through [`NavigationState::page_in_range`].
    pub fn target_page(&self, mv: PageMove) -> u32 {
        match mv {
            PageMove::First => 1,
            PageMove::Prev => self.page_num.saturating_sub(1),
            PageMove::Jump(page) => page,
            PageMove::Next => self.page_num.saturating_add(1),
            PageMove::Last => self.total_page,
        }
    }

    pub fn page_in_range(&self, page: u32) -> bool {
        page >= 1 && page <= self.total_page
    }

    pub fn commit_albums(&mut self, keyword: String, page: PageRef, page_num: u32, total_page: u32) {
        self.mode = ViewMode::Albums;
        self.keyword = keyword;
        self.album_page = Some(page);
        self.track_page = None;
        self.set_pages(page_num, total_page);
    }

    pub fn commit_tracks(&mut self, album_index: usize, page: PageRef, page_num: u32, total_page: u32) {
        self.mode = ViewMode::Tracks;
        self.album_index = album_index;
        self.track_page = Some(page);
        self.set_pages(page_num, total_page);
    }

    fn set_pages(&mut self, page_num: u32, total_page: u32) {
        // 0 <= page_num <= total_page; an empty result has no current page.
        self.total_page = total_page;
        self.page_num = if total_page == 0 {
            0
        } else {
            page_num.min(total_page)
        };
        self.rev += 1;
    }
}

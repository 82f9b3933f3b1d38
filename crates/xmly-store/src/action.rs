//! Action enum — console input parsed into user intents.

/// All actions the console can dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ── Browsing ─────────────────────────────────────────────────────────────
    Search(String), // raw keyword, passed through untouched
    Open(usize),    // album index on the displayed page

    // ── Paging ───────────────────────────────────────────────────────────────
    First,
    Prev,
    Jump(u32),
    Next,
    Last,

    // ── Downloads ────────────────────────────────────────────────────────────
    Get(usize), // track index on the displayed page
    Status,

    // ── System ───────────────────────────────────────────────────────────────
    Show,
    Help,
    Quit,
    Noop,
}

pub const HELP: &str = "\
commands:
  search <keyword>   search albums
  open <index>       show the play list of an album on this page
  first | prev | next | last
  jump <page>        go to a page
  get <index>        download a track on this page
  status             download status of the tracks on this page
  show               redraw the current page
  help | quit";

impl Action {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let action = match word {
            "" => Action::Noop,
            "search" | "s" => {
                if rest.is_empty() {
                    return Err("usage: search <keyword>".to_string());
                }
                Action::Search(rest.to_string())
            }
            "open" | "o" => Action::Open(parse_index(rest, "open <index>")?),
            "first" => Action::First,
            "prev" | "p" => Action::Prev,
            "next" | "n" => Action::Next,
            "last" => Action::Last,
            "jump" | "j" => Action::Jump(
                rest.parse()
                    .map_err(|_| format!("page must be a number, got {:?}", rest))?,
            ),
            "get" | "g" => Action::Get(parse_index(rest, "get <index>")?),
            "status" => Action::Status,
            "show" | "ls" => Action::Show,
            "help" | "?" => Action::Help,
            "quit" | "q" | "exit" => Action::Quit,
            other => return Err(format!("unknown command {:?}; try `help`", other)),
        };
        Ok(action)
    }
}

fn parse_index(arg: &str, usage: &str) -> Result<usize, String> {
    arg.parse().map_err(|_| format!("usage: {}", usage))
}

//! Command routing for inbound text.
//!
//! Matching is a flat ordered table of (prefix, category) pairs rather than
//! chained conditionals: the table is sorted longest-prefix-first at build
//! time, so when several configured lists share a prefix the most specific
//! command wins.

use crate::session::SessionMode;
use gemimg_common::config::CommandsConfig;

/// Handler category a matched command prefix maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Generate,
    Edit,
    Merge,
    Reverse,
    Enhance,
    Analyze,
}

impl CommandKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Edit => "edit",
            Self::Merge => "merge",
            Self::Reverse => "reverse",
            Self::Enhance => "enhance",
            Self::Analyze => "analyze",
        }
    }
}

/// Routing outcome for one inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A command prefix matched; `payload` is the trimmed remainder.
    Command {
        kind: CommandKind,
        matched: String,
        payload: String,
    },
    /// Exact match against an exit command.
    EndSession,
    /// A help command matched.
    Help,
    /// No prefix matched but the sender has an active session.
    Continue { mode: SessionMode },
    /// Not ours; pass through to the host.
    Unhandled,
}

enum Category {
    Command(CommandKind),
    Help,
}

/// Prefix-table router built from the configured command lists.
pub struct Router {
    /// (prefix, category), sorted by prefix length descending.
    table: Vec<(String, Category)>,
    exit_commands: Vec<String>,
}

impl Router {
    pub fn new(commands: &CommandsConfig) -> Self {
        let mut table: Vec<(String, Category)> = Vec::new();
        let mut add = |list: &[String], category: fn() -> Category| {
            for prefix in list {
                if !prefix.is_empty() {
                    table.push((prefix.clone(), category()));
                }
            }
        };

        add(&commands.generate, || Category::Command(CommandKind::Generate));
        add(&commands.edit, || Category::Command(CommandKind::Edit));
        add(&commands.merge, || Category::Command(CommandKind::Merge));
        add(&commands.reverse, || Category::Command(CommandKind::Reverse));
        add(&commands.enhance, || Category::Command(CommandKind::Enhance));
        add(&commands.analyze, || Category::Command(CommandKind::Analyze));
        add(&commands.help, || Category::Help);

        // Longest prefix first so overlapping commands resolve to the most
        // specific entry.
        table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            table,
            exit_commands: commands.exit.clone(),
        }
    }

    /// Classify `text` for a sender whose active session mode (if any) is
    /// `active_mode`.
    pub fn resolve(&self, text: &str, active_mode: Option<SessionMode>) -> Route {
        let text = text.trim();
        if text.is_empty() {
            return Route::Unhandled;
        }

        // Exit is an exact match and wins regardless of session state.
        if self.exit_commands.iter().any(|cmd| cmd == text) {
            return Route::EndSession;
        }

        for (prefix, category) in &self.table {
            if let Some(rest) = text.strip_prefix(prefix.as_str()) {
                return match category {
                    Category::Help => Route::Help,
                    Category::Command(kind) => Route::Command {
                        kind: *kind,
                        matched: prefix.clone(),
                        payload: rest.trim().to_string(),
                    },
                };
            }
        }

        match active_mode {
            Some(mode) => Route::Continue { mode },
            None => Route::Unhandled,
        }
    }
}

//! Whitelist command translation and response parsing
//!
//! Pure functions, no I/O. Response classification here is a best-effort
//! heuristic: the console protocol returns free text whose wording depends on
//! the server build and on which whitelist extension is installed, so the
//! failure markers are supplied per backend rather than assumed universal.

use regex::Regex;
use std::sync::LazyLock;
use whitelist_core::{GameId, ListMode};

/// Removal failure markers for vanilla `whitelist remove`
pub const NATIVE_REMOVAL_FAILURE_MARKERS: &[&str] = &[
    "is not whitelisted",
    "that player does not exist",
    "unknown or incomplete command",
];

/// Removal failure markers for the EasyWhitelist extension
pub const LEGACY_REMOVAL_FAILURE_MARKERS: &[&str] = &[
    "is not whitelisted",
    "not in the whitelist",
    "not on the whitelist",
    "unknown command",
];

/// Result of classifying a removal response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// Response carried a failure marker; holds the stripped response text
    Failed(String),
}

/// Parsed `list` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineStatus {
    pub online: u32,
    pub max: u32,
    pub players: Vec<String>,
}

/// Outcome of parsing a `list` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnlineList {
    Parsed(OnlineStatus),
    /// Template did not match; holds the stripped response text
    Unparseable(String),
}

/// Maps whitelist intents to console commands for one backend
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    mode: ListMode,
    removal_failure_markers: Vec<String>,
}

impl CommandTranslator {
    /// Translator with the default failure markers for `mode`
    pub fn new(mode: ListMode) -> Self {
        let defaults = match mode {
            ListMode::Legacy => LEGACY_REMOVAL_FAILURE_MARKERS,
            ListMode::Native => NATIVE_REMOVAL_FAILURE_MARKERS,
        };
        Self {
            mode,
            removal_failure_markers: defaults.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Override the failure markers (matched case-insensitively)
    pub fn with_removal_failure_markers(mut self, markers: Vec<String>) -> Self {
        self.removal_failure_markers = markers.into_iter().map(|m| m.to_lowercase()).collect();
        self
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn to_add_command(&self, game_id: &GameId) -> String {
        match self.mode {
            ListMode::Legacy => format!("easywl add {}", game_id),
            ListMode::Native => format!("whitelist add {}", game_id),
        }
    }

    pub fn to_remove_command(&self, game_id: &GameId) -> String {
        match self.mode {
            ListMode::Legacy => format!("easywl remove {}", game_id),
            ListMode::Native => format!("whitelist remove {}", game_id),
        }
    }

    /// Classify a removal response by substring search for failure markers
    pub fn parse_removal_response(&self, text: &str) -> RemovalOutcome {
        let cleaned = strip_formatting_codes(text);
        let lowered = cleaned.to_lowercase();
        if self
            .removal_failure_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
        {
            RemovalOutcome::Failed(cleaned.trim().to_string())
        } else {
            RemovalOutcome::Removed
        }
    }
}

/// Broadcast a chat line to everyone on the server
pub fn say_command(text: &str) -> String {
    format!("say {}", text)
}

/// Status command whose response feeds [`parse_online_list`]
pub const LIST_COMMAND: &str = "list";

static FORMATTING_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)§[0-9a-fk-or]").expect("valid formatting code regex"));

static ONLINE_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)There are (\d+) (?:of a max of|of a max|out of maximum) (\d+) players online[.:]?(.*)",
    )
    .expect("valid online list regex")
});

/// Remove `§`-prefixed color and style codes
///
/// Applied until nothing matches, so removing one code cannot expose another
/// (`§§aa` → `§a` → ``) and the transform is idempotent.
pub fn strip_formatting_codes(text: &str) -> String {
    let re = &*FORMATTING_CODE_RE;
    let mut current = text.to_string();
    while re.is_match(&current) {
        current = re.replace_all(&current, "").into_owned();
    }
    current
}

/// Extract player counts and names from a `list` response
pub fn parse_online_list(text: &str) -> OnlineList {
    let cleaned = strip_formatting_codes(text);
    let Some(caps) = ONLINE_LIST_RE.captures(&cleaned) else {
        return OnlineList::Unparseable(cleaned.trim().to_string());
    };

    let (Ok(online), Ok(max)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
        return OnlineList::Unparseable(cleaned.trim().to_string());
    };

    let players = caps
        .get(3)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    OnlineList::Parsed(OnlineStatus {
        online,
        max,
        players,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steve() -> GameId {
        GameId::parse("Steve").unwrap()
    }

    #[test]
    fn test_commands_per_mode() {
        let legacy = CommandTranslator::new(ListMode::Legacy);
        assert_eq!(legacy.to_add_command(&steve()), "easywl add Steve");
        assert_eq!(legacy.to_remove_command(&steve()), "easywl remove Steve");

        let native = CommandTranslator::new(ListMode::Native);
        assert_eq!(native.to_add_command(&steve()), "whitelist add Steve");
        assert_eq!(native.to_remove_command(&steve()), "whitelist remove Steve");
    }

    #[test]
    fn test_removal_classification() {
        let native = CommandTranslator::new(ListMode::Native);
        assert_eq!(
            native.parse_removal_response("Removed Steve from the whitelist"),
            RemovalOutcome::Removed
        );
        assert_eq!(
            native.parse_removal_response("§cPlayer is not whitelisted"),
            RemovalOutcome::Failed("Player is not whitelisted".into())
        );
        // Empty responses count as success
        assert_eq!(native.parse_removal_response(""), RemovalOutcome::Removed);
    }

    #[test]
    fn test_custom_markers_replace_defaults() {
        let translator = CommandTranslator::new(ListMode::Legacy)
            .with_removal_failure_markers(vec!["NOPE".into()]);
        assert!(matches!(
            translator.parse_removal_response("nope, never heard of them"),
            RemovalOutcome::Failed(_)
        ));
        assert_eq!(
            translator.parse_removal_response("Steve is not whitelisted"),
            RemovalOutcome::Removed
        );
    }

    #[test]
    fn test_strip_formatting_codes() {
        assert_eq!(strip_formatting_codes("§aGreen §lbold§r text"), "Green bold text");
        assert_eq!(strip_formatting_codes("§x stays"), "§x stays");
        assert_eq!(strip_formatting_codes("plain"), "plain");
        assert_eq!(strip_formatting_codes("trailing §"), "trailing §");
    }

    #[test]
    fn test_strip_is_idempotent() {
        for input in ["§§aa", "§§§ccc§r", "a§Kb§", "§z§9", "", "§§"] {
            let once = strip_formatting_codes(input);
            assert_eq!(strip_formatting_codes(&once), once, "{input:?}");
        }
    }

    #[test]
    fn test_parse_online_list() {
        let parsed = parse_online_list("There are 2 of a max of 20 players online: Steve, Alex");
        assert_eq!(
            parsed,
            OnlineList::Parsed(OnlineStatus {
                online: 2,
                max: 20,
                players: vec!["Steve".into(), "Alex".into()],
            })
        );

        let empty = parse_online_list("There are 0 out of maximum 20 players online.");
        assert_eq!(
            empty,
            OnlineList::Parsed(OnlineStatus {
                online: 0,
                max: 20,
                players: vec![],
            })
        );
    }

    #[test]
    fn test_parse_online_list_unrecognized() {
        assert_eq!(
            parse_online_list("§6Online: 3/20"),
            OnlineList::Unparseable("Online: 3/20".into())
        );
    }
}

//! Heuristic rule tables for page-content classification.
//!
//! Everything the detector and the submission chain match against lives
//! here as ordered, data-driven tables, decoupled from the state-machine
//! logic so rules can be swapped and tested without a live remote UI.
//! Markup is not a stable interface; these tables are the part expected
//! to churn.

/// URL schemes that always mark a tab as internal.
pub const INTERNAL_SCHEMES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-untrusted://",
    "devtools://",
    "edge://",
    "view-source:",
];

/// Phrase markers indicating the application is mid-task. Matched
/// case-insensitively against visible text.
pub const IN_PROGRESS_MARKERS: &[&str] = &[
    "thinking",
    "working on it",
    "browsing the web",
    "searching the web",
    "searching for",
    "reading results",
    "analyzing",
    "generating",
    "researching",
    "gathering information",
    "taking action",
    "running",
];

/// Markers indicating a step-based task has finished.
pub const FINISHED_MARKERS: &[&str] = &["finished", "task complete", "done browsing"];

/// UI-boundary phrases that terminate response extraction. The first of
/// these found after a completion marker ends the response slice.
pub const BOUNDARY_PHRASES: &[&str] = &[
    "ask a follow-up",
    "ask anything",
    "related questions",
    "suggested follow-ups",
    "sources",
    "new chat",
    "share",
    "copy link",
    "rewrite",
    "export",
];

/// Prefixes identifying navigation/UI chrome blocks that never qualify as
/// response content.
pub const CHROME_PREFIXES: &[&str] = &[
    "home",
    "library",
    "discover",
    "new tab",
    "settings",
    "upgrade",
    "sign in",
    "log in",
    "download the app",
    "skip to content",
    "cookie",
    "accept all",
    "we use cookies",
];

/// Boilerplate phrases stripped from extracted responses.
pub const BOILERPLATE_PHRASES: &[&str] = &[
    "copy to clipboard",
    "copy code",
    "was this helpful?",
    "regenerate response",
    "ask a follow-up",
    "share this response",
    "thumbs up",
    "thumbs down",
];

/// Ordered element-selection strategies for locating the prompt input.
/// Tried first to last; the first selector with a visible match wins.
pub const INPUT_SELECTORS: &[&str] = &[
    "div[contenteditable='true'][role='textbox']",
    "div.ProseMirror[contenteditable='true']",
    "textarea[placeholder]",
    "div[contenteditable='true']",
    "textarea",
    "input[type='text']",
];

/// Label substrings identifying controls near the input that must never be
/// mistaken for the submit control (mode pickers, attachments, voice, menus).
pub const EXCLUDED_CONTROL_LABELS: &[&str] = &[
    "mode",
    "model",
    "attach",
    "upload",
    "file",
    "voice",
    "dictat",
    "microphone",
    "audio",
    "menu",
    "settings",
    "plus",
];

/// Label substrings identifying an active stop/cancel affordance.
pub const STOP_CONTROL_LABELS: &[&str] = &["stop", "cancel", "halt"];

/// Returns true when visible text contains `thinking` used as a progress
/// marker, i.e. not the phrase "thinking about" that survives into
/// completed summaries.
pub fn thinking_in_progress(text: &str) -> bool {
    let lower = text.to_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("thinking") {
        let after = &lower[from + pos + "thinking".len()..];
        if !after.trim_start().starts_with("about") {
            return true;
        }
        from += pos + "thinking".len();
    }
    false
}

/// Returns the in-progress markers present in `text` (case-insensitive).
pub fn in_progress_hits(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    IN_PROGRESS_MARKERS
        .iter()
        .copied()
        .filter(|marker| lower.contains(marker))
        .collect()
}

/// Returns true when `block` starts with a known chrome prefix.
pub fn is_chrome_block(block: &str) -> bool {
    let lower = block.trim_start().to_lowercase();
    CHROME_PREFIXES.iter().any(|p| lower.starts_with(p))
}

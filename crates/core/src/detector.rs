//! Completion detection state machine.
//!
//! The remote application never announces that it is done; status has to be
//! inferred from whatever the page currently shows. Each poll feeds one
//! [`PageSignals`] read through [`CompletionDetector::observe`], which
//! classifies the task as idle/working/completed, extracts and sanitizes the
//! response text, and tracks text stability across polls.
//!
//! Stability is the ultimate fallback: when the same non-trivial response
//! text survives enough consecutive polls and no stop affordance is visible,
//! the task is considered complete even if no phrase marker ever fired. This
//! precedence over the marker rules is a heuristic, not a contract — it
//! rests on markup that is not a stable interface.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::probe::PageSignals;
use crate::rules::{
    self, BOILERPLATE_PHRASES, BOUNDARY_PHRASES, FINISHED_MARKERS,
};

/// Task status inferred from page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// No task in flight.
    Idle,
    /// The application is visibly working.
    Working,
    /// The task finished and a response is available.
    Completed,
}

/// One poll's view of the remote task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Inferred state.
    pub state: AgentState,
    /// Recent step descriptions, oldest to newest.
    pub steps: Vec<String>,
    /// The step currently in progress, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Sanitized response text; populated only when `state` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// A stop affordance is visible.
    pub stop_visible: bool,
    /// The extracted text has been stable across consecutive polls.
    pub stable: bool,
}

/// Tracks consecutive identical non-trivial reads.
#[derive(Debug, Default)]
struct StabilityTracker {
    baseline: Option<String>,
    count: u32,
}

impl StabilityTracker {
    /// Feeds one sanitized read; returns the updated consecutive-read count.
    ///
    /// Trivial reads (below the substantiality floor) clear the baseline so
    /// a short echo can never accumulate into a completion signal.
    fn observe(&mut self, text: Option<&str>, min_len: usize) -> u32 {
        match text {
            Some(t) if t.len() >= min_len => {
                if self.baseline.as_deref() == Some(t) {
                    self.count += 1;
                } else {
                    self.baseline = Some(t.to_string());
                    self.count = 1;
                }
            }
            _ => {
                self.baseline = None;
                self.count = 0;
            }
        }
        self.count
    }

    fn reset(&mut self) {
        self.baseline = None;
        self.count = 0;
    }
}

/// State machine classifying polls into idle/working/completed.
pub struct CompletionDetector {
    config: Config,
    stability: StabilityTracker,
    steps_completed: Regex,
    reviewed_sources: Regex,
}

impl CompletionDetector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stability: StabilityTracker::default(),
            steps_completed: Regex::new(r"(?i)\d+\s+steps?\s+completed").expect("static regex"),
            reviewed_sources: Regex::new(r"(?i)reviewed\s+\d+\s+sources?").expect("static regex"),
        }
    }

    /// Clears cross-poll state. Must be called at the start of every task.
    pub fn begin_task(&mut self) {
        self.stability.reset();
    }

    /// Classifies one poll's signals.
    pub fn observe(&mut self, signals: &PageSignals) -> AgentStatus {
        let extracted = self.extract_response(signals);
        let sanitized = extracted.map(|text| sanitize(&text, &self.config));

        let count = self
            .stability
            .observe(sanitized.as_deref(), self.config.min_substantial_len);
        let stable = count >= self.config.stability_threshold;

        let mut state = self.classify(signals, sanitized.as_deref());

        // Stability alone is enough once the stop affordance is gone, even
        // when no phrase marker ever fired.
        if stable && !signals.stop_control && state != AgentState::Completed {
            tracing::debug!(
                target = "pilot.detector",
                reads = count,
                "stable response text; promoting to completed"
            );
            state = AgentState::Completed;
        }

        let response = match state {
            AgentState::Completed => sanitized,
            _ => None,
        };

        AgentStatus {
            state,
            steps: signals.steps.clone(),
            current_step: signals.current_step.clone(),
            response,
            stop_visible: signals.stop_control,
            stable,
        }
    }

    /// Transition rule, evaluated in priority order.
    fn classify(&self, signals: &PageSignals, extracted: Option<&str>) -> AgentState {
        let tail = &signals.tail_text;
        let progress_hits = rules::in_progress_hits(tail);
        let steps_done = self.steps_completed.is_match(tail)
            || FINISHED_MARKERS
                .iter()
                .any(|m| tail.to_lowercase().contains(m));
        let sources_reviewed = self.reviewed_sources.is_match(tail);
        let substantial = extracted
            .map(|t| t.len() >= self.config.min_substantial_len)
            .unwrap_or(false);

        if signals.stop_control {
            return AgentState::Working;
        }
        if signals.loading || rules::thinking_in_progress(tail) {
            return AgentState::Working;
        }
        if !progress_hits.is_empty() && !signals.follow_up {
            return AgentState::Working;
        }
        if steps_done {
            return AgentState::Completed;
        }
        if sources_reviewed && progress_hits.is_empty() {
            return AgentState::Completed;
        }
        if signals.follow_up && substantial {
            return AgentState::Completed;
        }
        AgentState::Idle
    }

    /// Response extraction: first strategy yielding a substantial slice wins;
    /// the block-concatenation fallback returns whatever it finds.
    fn extract_response(&self, signals: &PageSignals) -> Option<String> {
        let min = self.config.min_substantial_len;

        for marker in [&self.steps_completed, &self.reviewed_sources] {
            if let Some(text) = self.after_last_match(marker, &signals.tail_text) {
                if text.len() >= min {
                    return Some(text);
                }
            }
        }

        let blocks: Vec<&String> = signals
            .blocks
            .iter()
            .filter(|b| !rules::is_chrome_block(b))
            .collect();
        if blocks.is_empty() {
            return None;
        }
        let start = blocks.len().saturating_sub(3);
        let joined = blocks[start..]
            .iter()
            .map(|b| b.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        if joined.is_empty() { None } else { Some(joined) }
    }

    /// Text following the last occurrence of `marker`, trimmed at the nearest
    /// known UI-boundary phrase.
    fn after_last_match(&self, marker: &Regex, text: &str) -> Option<String> {
        let last = marker.find_iter(text).last()?;
        let mut slice = &text[last.end()..];

        // ASCII lowering keeps byte offsets aligned with the original.
        let lower = slice.to_ascii_lowercase();
        if let Some(cut) = BOUNDARY_PHRASES
            .iter()
            .filter_map(|p| lower.find(p))
            .min()
        {
            slice = &slice[..cut];
        }
        let trimmed = slice
            .trim()
            .trim_start_matches(['.', ':', ',', '-'])
            .trim_start();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Cleans extracted text: boilerplate out, emoji stripped, blank runs
/// collapsed, length capped.
pub fn sanitize(text: &str, config: &Config) -> String {
    let mut cleaned = text.to_string();
    for phrase in BOILERPLATE_PHRASES {
        // ASCII lowering keeps byte offsets aligned with the original.
        while let Some(pos) = cleaned.to_ascii_lowercase().find(phrase) {
            cleaned.replace_range(pos..pos + phrase.len(), "");
        }
    }

    let cleaned: String = cleaned.chars().filter(|c| !is_emoji(*c)).collect();

    let mut collapsed = String::with_capacity(cleaned.len());
    let mut blank_run = 0usize;
    for line in cleaned.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        collapsed.push_str(line.trim_end());
        collapsed.push('\n');
    }

    let trimmed = collapsed.trim();
    trimmed.chars().take(config.response_cap).collect()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF  // pictographs, symbols, emoticons
        | 0x2600..=0x27BF  // misc symbols, dingbats
        | 0xFE00..=0xFE0F  // variation selectors
        | 0x200D           // zero-width joiner
        | 0x2B00..=0x2BFF  // arrows and symbols
    )
}

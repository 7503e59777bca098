//! Structured page reads.
//!
//! One probe evaluation per poll collects every raw DOM observation the
//! detector needs, as a single JSON payload. The probe reports *affordances*
//! (stop control, loading indicator, follow-up input) and *raw text*
//! (content blocks, visible tail); interpreting text against the phrase
//! tables in [`crate::rules`] happens on this side of the wire.

use pilot_protocol::EvalOutcome;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Raw signals produced by one structured content read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSignals {
    /// An active stop/cancel affordance is visible.
    pub stop_control: bool,
    /// A loading or progress indicator is visible.
    pub loading: bool,
    /// An enabled follow-up prompt affordance is present.
    pub follow_up: bool,
    /// Candidate content blocks, oldest to newest.
    pub blocks: Vec<String>,
    /// Tail of the visible body text, for marker scanning.
    pub tail_text: String,
    /// Recent step descriptions, oldest to newest.
    pub steps: Vec<String>,
    /// The step currently highlighted, if any.
    pub current_step: Option<String>,
}

/// JavaScript source of the status probe.
///
/// Returns a JSON string matching [`PageSignals`]. Kept dumb on purpose:
/// it reports what is on the page, not what it means.
pub fn status_probe_js() -> String {
    let stop_labels = serde_json::to_string(crate::rules::STOP_CONTROL_LABELS)
        .expect("static table serializes");
    format!(
        r#"(() => {{
            const visible = el => {{
                const r = el.getBoundingClientRect();
                return r.width > 0 && r.height > 0;
            }};
            const label = el =>
                ((el.getAttribute('aria-label') || '') + ' ' +
                 (el.getAttribute('title') || '') + ' ' +
                 (el.textContent || '')).toLowerCase();

            const stopLabels = {stop_labels};
            const buttons = Array.from(document.querySelectorAll('button, [role="button"]'));
            const stopControl = buttons.some(b =>
                visible(b) && !b.disabled && stopLabels.some(s => label(b).includes(s)));

            const loading = Array.from(document.querySelectorAll(
                '[role="progressbar"], [aria-busy="true"], .animate-spin, .animate-pulse'
            )).some(visible);

            const inputs = Array.from(document.querySelectorAll(
                'div[contenteditable="true"], textarea, input[type="text"]'
            )).filter(el => visible(el) && !el.disabled);
            const followUp = inputs.length > 0;

            const blockNodes = Array.from(document.querySelectorAll(
                '[data-message-author-role="assistant"], .prose, .markdown, article, main p'
            ));
            const blocks = blockNodes
                .map(el => (el.innerText || '').trim())
                .filter(t => t.length > 0)
                .slice(-8);

            const stepNodes = Array.from(document.querySelectorAll(
                '[class*="step"], [data-testid*="step"] li'
            ));
            const steps = stepNodes
                .map(el => (el.innerText || '').trim())
                .filter(t => t.length > 0 && t.length < 200)
                .slice(-10);
            const currentStep = steps.length > 0 ? steps[steps.length - 1] : null;

            const body = (document.body && document.body.innerText) || '';
            const tailText = body.slice(-4000);

            return JSON.stringify({{
                stopControl, loading, followUp, blocks, tailText, steps, currentStep
            }});
        }})()"#
    )
}

/// Decodes a probe evaluation into [`PageSignals`].
///
/// A page-side exception means the read itself failed and the poll treats
/// it like any other operation failure.
pub fn parse_signals(outcome: &EvalOutcome) -> Result<PageSignals> {
    if let Some(exception) = &outcome.exception {
        return Err(Error::Eval(exception.clone()));
    }
    let raw = outcome
        .value
        .as_str()
        .ok_or_else(|| Error::Eval("status probe returned a non-string value".to_string()))?;
    Ok(serde_json::from_str(raw)?)
}

//! Prompt submission with a fallback chain.
//!
//! Submission has no reliable acknowledgment: the page may accept the prompt
//! on the key commit, on a submit-control click, or only via a form submit.
//! Each step is verified by observing the page (input emptied, or a loading
//! indicator appeared) and the next fallback fires only when the prior
//! verification failed, with a short settling delay in between.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::clock::Clock;
use crate::debugger::{Debugger, Launcher};
use crate::error::{Error, Result};
use crate::rules::{EXCLUDED_CONTROL_LABELS, INPUT_SELECTORS};
use crate::session::Session;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InjectReport {
    found: bool,
    selector: Option<String>,
    length: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VerifyReport {
    empty: bool,
    loading: bool,
}

impl VerifyReport {
    fn accepted(&self) -> bool {
        self.empty || self.loading
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ClickReport {
    clicked: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FormReport {
    submitted: bool,
}

/// Types a prompt into the page and commits it, walking the fallback chain
/// until a submission is verified.
///
/// Fails with [`Error::InputNotFound`] when no eligible input surface exists
/// (not retried: the page needs navigating first) and with
/// [`Error::SubmissionVerification`] when every fallback ran without a
/// verifiable effect — in which case the prompt may still have been
/// accepted, so callers should poll status rather than give up.
pub async fn submit_prompt<D, L, C>(session: &Session<D, L, C>, prompt: &str) -> Result<()>
where
    D: Debugger,
    L: Launcher,
    C: Clock,
{
    let inject = inject_prompt_js(prompt);
    let report: InjectReport = eval_json(session, "submit.inject", &inject).await?;
    if !report.found {
        return Err(Error::InputNotFound(
            "no eligible prompt input on this page; navigate to the chat surface first".into(),
        ));
    }
    if report.length == 0 {
        return Err(Error::SubmissionVerification(
            "prompt text did not take in the input".into(),
        ));
    }
    let selector = report.selector.unwrap_or_default();
    debug!(target = "pilot.submit", %selector, chars = report.length, "prompt injected");

    let settle = session.config().submit_settle;

    eval_json::<_, _, _, serde_json::Value>(session, "submit.key", &key_commit_js(&selector))
        .await?;
    session.clock().sleep(settle).await;
    if verify(session, &selector).await?.accepted() {
        return Ok(());
    }

    debug!(target = "pilot.submit", "key commit unverified; trying submit control");
    let click: ClickReport =
        eval_json(session, "submit.control", &submit_control_js(&selector)).await?;
    if click.clicked {
        session.clock().sleep(settle).await;
        if verify(session, &selector).await?.accepted() {
            return Ok(());
        }
    }

    debug!(target = "pilot.submit", "submit control unverified; trying form submit");
    let form: FormReport = eval_json(session, "submit.form", &form_submit_js(&selector)).await?;
    if form.submitted {
        session.clock().sleep(settle).await;
        if verify(session, &selector).await?.accepted() {
            return Ok(());
        }
    }

    Err(Error::SubmissionVerification(
        "input still populated and no loading indicator after all fallbacks".into(),
    ))
}

async fn verify<D, L, C>(session: &Session<D, L, C>, selector: &str) -> Result<VerifyReport>
where
    D: Debugger,
    L: Launcher,
    C: Clock,
{
    eval_json(session, "submit.verify", &verify_js(selector)).await
}

/// Evaluates page-side JS through the retry wrapper and decodes the JSON
/// string payload it returns.
async fn eval_json<D, L, C, T>(session: &Session<D, L, C>, what: &str, js: &str) -> Result<T>
where
    D: Debugger,
    L: Launcher,
    C: Clock,
    T: DeserializeOwned,
{
    let outcome = session
        .with_retry(what, || session.debugger().evaluate(js))
        .await?;
    if let Some(exception) = outcome.exception {
        return Err(Error::Eval(exception));
    }
    let raw = outcome
        .value
        .as_str()
        .ok_or_else(|| Error::Eval(format!("{what} returned a non-string value")))?;
    Ok(serde_json::from_str(raw)?)
}

fn selector_list_js() -> String {
    serde_json::to_string(INPUT_SELECTORS).expect("static table serializes")
}

fn inject_prompt_js(prompt: &str) -> String {
    let text = serde_json::to_string(prompt).expect("string serializes");
    let selectors = selector_list_js();
    format!(
        r#"(() => {{
            const text = {text};
            const visible = el => {{
                const r = el.getBoundingClientRect();
                return r.width > 0 && r.height > 0;
            }};
            let input = null, used = null;
            for (const sel of {selectors}) {{
                const el = Array.from(document.querySelectorAll(sel))
                    .find(e => visible(e) && !e.disabled && !e.readOnly);
                if (el) {{ input = el; used = sel; break; }}
            }}
            if (!input) return JSON.stringify({{found: false}});

            input.focus();
            if (input.tagName === 'TEXTAREA' || input.tagName === 'INPUT') {{
                input.value = text;
            }} else {{
                input.innerText = text;
            }}
            input.dispatchEvent(new InputEvent('input', {{bubbles: true, data: text}}));
            const current = input.value !== undefined && input.tagName !== 'DIV'
                ? input.value : input.innerText;
            return JSON.stringify({{found: true, selector: used, length: current.length}});
        }})()"#
    )
}

fn key_commit_js(selector: &str) -> String {
    let sel = serde_json::to_string(selector).expect("string serializes");
    format!(
        r#"(() => {{
            const el = document.querySelector({sel}) || document.activeElement;
            if (!el) return JSON.stringify({{dispatched: false}});
            const opts = {{
                key: 'Enter', code: 'Enter', keyCode: 13, which: 13,
                bubbles: true, cancelable: true
            }};
            el.dispatchEvent(new KeyboardEvent('keydown', opts));
            el.dispatchEvent(new KeyboardEvent('keyup', opts));
            return JSON.stringify({{dispatched: true}});
        }})()"#
    )
}

fn verify_js(selector: &str) -> String {
    let sel = serde_json::to_string(selector).expect("string serializes");
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            const content = el
                ? (el.value !== undefined && el.tagName !== 'DIV' ? el.value : el.innerText)
                : '';
            const empty = content.trim().length === 0;
            const loading = Array.from(document.querySelectorAll(
                '[role="progressbar"], [aria-busy="true"], .animate-spin, .animate-pulse'
            )).some(n => {{
                const r = n.getBoundingClientRect();
                return r.width > 0 && r.height > 0;
            }});
            return JSON.stringify({{empty, loading}});
        }})()"#
    )
}

/// Proximity heuristic: the rightmost eligible, visible, enabled control
/// near the input, excluding controls recognized as mode/attachment/voice/
/// menu controls by label.
fn submit_control_js(selector: &str) -> String {
    let sel = serde_json::to_string(selector).expect("string serializes");
    let excluded =
        serde_json::to_string(EXCLUDED_CONTROL_LABELS).expect("static table serializes");
    format!(
        r#"(() => {{
            const input = document.querySelector({sel});
            if (!input) return JSON.stringify({{clicked: false}});
            const anchor = input.getBoundingClientRect();
            const excluded = {excluded};
            const label = el =>
                ((el.getAttribute('aria-label') || '') + ' ' +
                 (el.getAttribute('title') || '') + ' ' +
                 (el.textContent || '')).toLowerCase();

            const candidates = Array.from(document.querySelectorAll('button, [role="button"]'))
                .filter(b => {{
                    if (b.disabled) return false;
                    const r = b.getBoundingClientRect();
                    if (r.width === 0 || r.height === 0) return false;
                    if (Math.abs(r.top - anchor.top) > 120 &&
                        Math.abs(r.bottom - anchor.bottom) > 120) return false;
                    return !excluded.some(x => label(b).includes(x));
                }});
            if (candidates.length === 0) return JSON.stringify({{clicked: false}});

            candidates.sort((a, b) =>
                b.getBoundingClientRect().right - a.getBoundingClientRect().right);
            candidates[0].click();
            return JSON.stringify({{clicked: true}});
        }})()"#
    )
}

fn form_submit_js(selector: &str) -> String {
    let sel = serde_json::to_string(selector).expect("string serializes");
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            const form = el ? el.closest('form') : document.querySelector('form');
            if (!form) return JSON.stringify({{submitted: false}});
            form.requestSubmit ? form.requestSubmit() : form.submit();
            return JSON.stringify({{submitted: true}});
        }})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{FakeAction, FakeDebugger, FakeLauncher, ManualClock};
    use serde_json::json;

    fn session() -> Session<FakeDebugger, FakeLauncher, ManualClock> {
        Session::new(
            FakeDebugger::new(),
            FakeLauncher::new(),
            ManualClock::new(),
            Config::default(),
        )
    }

    fn eval_count(session: &Session<FakeDebugger, FakeLauncher, ManualClock>) -> usize {
        session
            .debugger()
            .actions()
            .iter()
            .filter(|a| matches!(a, FakeAction::Evaluate(e) if e != "1 + 1"))
            .count()
    }

    #[tokio::test]
    async fn key_commit_verified_on_first_try() {
        let session = session();
        let debugger = session.debugger();
        debugger.push_eval_payload(json!({"found": true, "selector": "textarea", "length": 11}));
        debugger.push_eval_payload(json!({"dispatched": true}));
        debugger.push_eval_payload(json!({"empty": true, "loading": false}));

        submit_prompt(&session, "hello there").await.unwrap();
        // inject + key + verify, no fallbacks
        assert_eq!(eval_count(&session), 3);
    }

    #[tokio::test]
    async fn missing_input_surfaces_without_fallbacks() {
        let session = session();
        session.debugger().push_eval_payload(json!({"found": false}));

        let err = submit_prompt(&session, "hello").await.unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
        assert_eq!(eval_count(&session), 1);
    }

    #[tokio::test]
    async fn falls_back_to_submit_control() {
        let session = session();
        let debugger = session.debugger();
        debugger.push_eval_payload(json!({"found": true, "selector": "textarea", "length": 5}));
        debugger.push_eval_payload(json!({"dispatched": true}));
        debugger.push_eval_payload(json!({"empty": false, "loading": false}));
        debugger.push_eval_payload(json!({"clicked": true}));
        debugger.push_eval_payload(json!({"empty": false, "loading": true}));

        submit_prompt(&session, "hello").await.unwrap();
        assert_eq!(eval_count(&session), 5);
        // Settling delays separated the steps.
        assert_eq!(session.clock().sleeps().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_fallbacks_surface_verification_failure() {
        let session = session();
        let debugger = session.debugger();
        debugger.push_eval_payload(json!({"found": true, "selector": "textarea", "length": 5}));
        debugger.push_eval_payload(json!({"dispatched": true}));
        debugger.push_eval_payload(json!({"empty": false, "loading": false}));
        debugger.push_eval_payload(json!({"clicked": false}));
        debugger.push_eval_payload(json!({"submitted": true}));
        debugger.push_eval_payload(json!({"empty": false, "loading": false}));

        let err = submit_prompt(&session, "hello").await.unwrap_err();
        assert!(matches!(err, Error::SubmissionVerification(_)));
    }

    #[tokio::test]
    async fn injection_js_escapes_prompt_text() {
        let js = inject_prompt_js("line1\n\"quoted\" 'single'");
        assert!(js.contains(r#"line1\n\"quoted\" 'single'"#));
    }
}

//! Tab classification registry.
//!
//! Tracks every external tab the host process has open, classifying each
//! target from a fresh listing as internal (application/system chrome) or
//! external. Internal tabs never enter the registry. The registry itself
//! never closes anything; it only supplies the counts the close-safety
//! contract is checked against.

use std::collections::HashMap;
use std::time::SystemTime;

use pilot_protocol::TargetInfo;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::rules::INTERNAL_SCHEMES;

/// Why an external tab exists, as far as we can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabPurpose {
    /// The main chat/application surface.
    Primary,
    /// A tab the remote application opened itself while working on a task.
    AutonomousBrowsing,
    /// A tab annotated by the orchestrator as research material.
    Research,
    /// Observed but not yet attributed.
    Unclassified,
}

/// Mutable context tracked for one external tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabContext {
    /// Target id, stable across refreshes.
    pub id: String,
    /// Last observed URL.
    pub url: String,
    /// Last observed title.
    pub title: String,
    /// Inferred or annotated purpose.
    pub purpose: TabPurpose,
    /// Host component of the URL.
    pub domain: String,
    /// When this tab last changed between refreshes.
    pub last_activity: SystemTime,
    /// Short description of the tab's content, set by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
    /// Task the tab is working for, set by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Registry of external tabs keyed by target id.
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<String, TabContext>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fresh target listing into the registry.
    ///
    /// Existing entries are updated in place; a tab whose domain changed
    /// since the last refresh was reused for navigation and gets its purpose
    /// re-derived. Entries absent from the listing are evicted. Returns the
    /// current external set, unordered.
    pub fn refresh(
        &mut self,
        targets: &[TargetInfo],
        config: &Config,
        now: SystemTime,
    ) -> Vec<TabContext> {
        let mut seen: Vec<&str> = Vec::with_capacity(targets.len());

        for target in targets {
            if is_internal(target, config) {
                continue;
            }
            seen.push(target.id.as_str());
            let domain = domain_of(&target.url);

            match self.tabs.get_mut(&target.id) {
                Some(tab) => {
                    if tab.domain != domain {
                        debug!(
                            target = "pilot.registry",
                            id = %target.id,
                            from = %tab.domain,
                            to = %domain,
                            "tab reused for a different site"
                        );
                        tab.purpose = TabPurpose::AutonomousBrowsing;
                        tab.content_summary = None;
                        tab.domain = domain;
                    }
                    if tab.url != target.url || tab.title != target.title {
                        tab.last_activity = now;
                    }
                    tab.url = target.url.clone();
                    tab.title = target.title.clone();
                }
                None => {
                    self.tabs.insert(
                        target.id.clone(),
                        TabContext {
                            id: target.id.clone(),
                            url: target.url.clone(),
                            title: target.title.clone(),
                            purpose: TabPurpose::AutonomousBrowsing,
                            domain,
                            last_activity: now,
                            content_summary: None,
                            task_id: None,
                        },
                    );
                }
            }
        }

        self.tabs.retain(|id, _| seen.iter().any(|s| *s == id.as_str()));
        self.tabs.values().cloned().collect()
    }

    /// Number of external tabs currently tracked.
    ///
    /// Callers of a destructive close are contractually required to check
    /// `external_count() > 1` first; the registry does not block the call
    /// because the close primitive belongs to the transport.
    pub fn external_count(&self) -> usize {
        self.tabs.len()
    }

    /// Looks up a tab by id.
    pub fn get(&self, id: &str) -> Option<&TabContext> {
        self.tabs.get(id)
    }

    /// Tabs whose URL host equals `domain`.
    pub fn find_by_domain(&self, domain: &str) -> Vec<&TabContext> {
        self.tabs.values().filter(|t| t.domain == domain).collect()
    }

    /// Tabs whose URL contains `pattern`.
    pub fn find_by_url_substring(&self, pattern: &str) -> Vec<&TabContext> {
        self.tabs
            .values()
            .filter(|t| t.url.contains(pattern))
            .collect()
    }

    /// Tabs with the given purpose.
    pub fn find_by_purpose(&self, purpose: TabPurpose) -> Vec<&TabContext> {
        self.tabs
            .values()
            .filter(|t| t.purpose == purpose)
            .collect()
    }

    /// Annotation hook for the orchestrator.
    pub fn set_purpose(&mut self, id: &str, purpose: TabPurpose, task_id: Option<String>) -> bool {
        match self.tabs.get_mut(id) {
            Some(tab) => {
                tab.purpose = purpose;
                if task_id.is_some() {
                    tab.task_id = task_id;
                }
                true
            }
            None => false,
        }
    }
}

/// Fixed classification rule: internal if the URL is a system scheme,
/// blank, or belongs to the primary application's own domain.
pub fn is_internal(target: &TargetInfo, config: &Config) -> bool {
    if !target.is_page() {
        return true;
    }
    if target.is_blank() {
        return true;
    }
    if INTERNAL_SCHEMES.iter().any(|s| target.url.starts_with(s)) {
        return true;
    }
    config.matches_primary(&target.url)
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_protocol::TargetKind;

    fn page(id: &str, url: &str) -> TargetInfo {
        TargetInfo {
            id: id.to_string(),
            kind: TargetKind::Page,
            url: url.to_string(),
            title: String::new(),
            web_socket_debugger_url: None,
        }
    }

    fn config() -> Config {
        Config {
            primary_url_patterns: vec!["app.example".into()],
            ..Config::default()
        }
    }

    #[test]
    fn internal_tabs_never_enter_the_registry() {
        let mut registry = TabRegistry::new();
        let targets = vec![
            page("A", "https://app.example/chat"),
            page("B", "chrome://settings"),
            page("C", "about:blank"),
            page("D", "https://shop.example/item"),
        ];
        let external = registry.refresh(&targets, &config(), SystemTime::UNIX_EPOCH);

        assert_eq!(external.len(), 1);
        assert_eq!(external[0].id, "D");
        assert!(registry.get("A").is_none());
        assert!(registry.get("B").is_none());
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn scenario_from_listing_to_guarded_count() {
        let mut registry = TabRegistry::new();
        let targets = vec![
            page("A", "https://app.example/chat"),
            page("B", "https://shop.example/item"),
        ];
        registry.refresh(&targets, &config(), SystemTime::UNIX_EPOCH);

        let tab = registry.get("B").unwrap();
        assert_eq!(tab.purpose, TabPurpose::AutonomousBrowsing);
        assert_eq!(tab.domain, "shop.example");
        assert_eq!(registry.external_count(), 1);
    }

    #[test]
    fn find_by_domain_returns_registered_tab() {
        let mut registry = TabRegistry::new();
        registry.refresh(
            &[page("B", "https://shop.example/item")],
            &config(),
            SystemTime::UNIX_EPOCH,
        );

        let found = registry.find_by_domain("shop.example");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "B");
        assert!(registry.find_by_domain("other.example").is_empty());
    }

    #[test]
    fn domain_change_reclassifies_purpose() {
        let mut registry = TabRegistry::new();
        let cfg = config();
        registry.refresh(
            &[page("B", "https://shop.example/item")],
            &cfg,
            SystemTime::UNIX_EPOCH,
        );
        registry.set_purpose("B", TabPurpose::Research, Some("task-1".into()));

        registry.refresh(
            &[page("B", "https://news.example/story")],
            &cfg,
            SystemTime::UNIX_EPOCH,
        );

        let tab = registry.get("B").unwrap();
        assert_eq!(tab.purpose, TabPurpose::AutonomousBrowsing);
        assert_eq!(tab.domain, "news.example");
    }

    #[test]
    fn absent_targets_are_evicted() {
        let mut registry = TabRegistry::new();
        let cfg = config();
        registry.refresh(
            &[
                page("B", "https://shop.example/item"),
                page("C", "https://news.example/story"),
            ],
            &cfg,
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(registry.external_count(), 2);

        registry.refresh(&[page("C", "https://news.example/story")], &cfg, SystemTime::UNIX_EPOCH);
        assert_eq!(registry.external_count(), 1);
        assert!(registry.get("B").is_none());
    }

    #[test]
    fn url_substring_and_purpose_queries() {
        let mut registry = TabRegistry::new();
        let cfg = config();
        registry.refresh(
            &[
                page("B", "https://shop.example/item/42"),
                page("C", "https://news.example/story"),
            ],
            &cfg,
            SystemTime::UNIX_EPOCH,
        );
        registry.set_purpose("C", TabPurpose::Research, None);

        assert_eq!(registry.find_by_url_substring("/item/").len(), 1);
        assert_eq!(registry.find_by_purpose(TabPurpose::Research).len(), 1);
        assert_eq!(
            registry.find_by_purpose(TabPurpose::AutonomousBrowsing).len(),
            1
        );
    }

    #[test]
    fn non_page_targets_are_internal() {
        let cfg = config();
        let worker = TargetInfo {
            id: "W".into(),
            kind: TargetKind::ServiceWorker,
            url: "https://shop.example/sw.js".into(),
            title: String::new(),
            web_socket_debugger_url: None,
        };
        assert!(is_internal(&worker, &cfg));
    }
}

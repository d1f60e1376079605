use crate::{
    errors::AppError,
    events::{EventBus, UiEvent},
    search::SearchIndex,
    store::{now_ms, Collection, Database, Link, LinkUpdate, SyncStatus},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use url::Url;

/// Browser-internal pages are never captured.
const PRIVILEGED_PREFIXES: &[&str] = &["chrome://", "chrome-extension://", "about:"];

pub const DEFAULT_COLLECTION_ID: &str = "others";
pub const DEFAULT_COLLECTION_NAME: &str = "Others";

const UNTITLED: &str = "Untitled";

/// The page a capture trigger points at.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOutcome {
    pub link_id: String,
    pub created: bool,
}

/// Canonical form used for storage and dedup: origin + path with one
/// trailing slash stripped + query, all lowercased. Unparseable input falls
/// back to a lowercased copy.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_lowercase();
    };

    let origin = parsed.origin().ascii_serialization();
    if origin == "null" {
        // opaque origin (non-special scheme), nothing to canonicalize
        return raw.to_lowercase();
    }

    let path = parsed.path();
    let path = path.strip_suffix('/').unwrap_or(path);

    let mut normalized = format!("{origin}{path}");
    if let Some(query) = parsed.query() {
        normalized.push('?');
        normalized.push_str(query);
    }

    normalized.to_lowercase()
}

fn is_privileged(url: &str) -> bool {
    let lower = url.to_lowercase();
    PRIVILEGED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Removes its key from the in-flight set when dropped, so a capture that
/// fails halfway never wedges its URL.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, key: &str) -> Option<Self> {
        let mut guard = set.lock().unwrap();
        if !guard.insert(key.to_string()) {
            return None;
        }
        Some(Self {
            set,
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.key);
    }
}

/// Turns a "save this page" trigger into a new or reused link.
///
/// Dedup is two-tier: exact normalized-URL match first (tolerating legacy
/// trailing slashes), then a case-insensitive title match on the same domain
/// which also self-heals the stored URL. A per-URL in-flight set keeps a
/// double-tap from creating two records.
pub struct CaptureEngine {
    db: Database,
    index: Arc<SearchIndex>,
    events: EventBus,
    in_flight: Mutex<HashSet<String>>,
}

impl CaptureEngine {
    pub fn new(db: Database, index: Arc<SearchIndex>, events: EventBus) -> Self {
        Self {
            db,
            index,
            events,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn capture(&self, tab: &TabInfo) -> Result<Option<CaptureOutcome>, AppError> {
        if tab.url.is_empty() || is_privileged(&tab.url) {
            return Ok(None);
        }

        let url = normalize_url(&tab.url);

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &url) else {
            log::debug!("capture already in flight for {url}");
            return Ok(None);
        };

        let domain = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        let with_slash = format!("{url}/");
        let without_slash = url.strip_suffix('/').unwrap_or(&url).to_string();
        let mut existing = self
            .db
            .query_links(|l| l.url == url || l.url == with_slash || l.url == without_slash)
            .into_iter()
            .next();

        if existing.is_none() {
            if let Some(title) = tab.title.as_deref().filter(|t| !t.is_empty()) {
                let needle = title.to_lowercase();
                existing = self
                    .db
                    .query_links(|l| {
                        l.domain == domain
                            && l.title
                                .as_deref()
                                .is_some_and(|t| t.to_lowercase() == needle)
                    })
                    .into_iter()
                    .next();

                if let Some(link) = &existing {
                    log::info!(
                        "dedup by title on {domain:?}, healing url of link {}",
                        link.id
                    );
                    self.db.update_link(
                        &link.id,
                        LinkUpdate {
                            url: Some(url.clone()),
                            ..Default::default()
                        },
                    )?;
                }
            }
        }

        let outcome = match existing {
            Some(link) => CaptureOutcome {
                link_id: link.id,
                created: false,
            },
            None => {
                let link_id = uuid::Uuid::new_v4().to_string();
                let link_url = url.clone();
                let title = tab
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNTITLED.to_string());
                let id = link_id.clone();

                self.db.transaction(move |t| {
                    // resolve the default collection, creating it on first use
                    // so the link never dangles
                    let resolved = t
                        .collection_by_name(DEFAULT_COLLECTION_NAME)
                        .map(|c| (c.id.clone(), c.name.clone()));
                    let (collection_id, collection_name) = match resolved {
                        Some(pair) => pair,
                        None => {
                            t.add_collection(Collection {
                                id: DEFAULT_COLLECTION_ID.to_string(),
                                name: DEFAULT_COLLECTION_NAME.to_string(),
                                updated_at: now_ms(),
                                sync_status: SyncStatus::Pending,
                                last_error: None,
                            })?;
                            (
                                DEFAULT_COLLECTION_ID.to_string(),
                                DEFAULT_COLLECTION_NAME.to_string(),
                            )
                        }
                    };

                    t.add_link(Link {
                        id,
                        url: link_url,
                        title: Some(title),
                        domain,
                        description: None,
                        screenshot_url: None,
                        meta_text: None,
                        collection_id,
                        collection_name,
                        updated_at: now_ms(),
                        sync_status: SyncStatus::Pending,
                        last_error: None,
                    })
                })?;

                self.index.refresh(&self.db);

                CaptureOutcome {
                    link_id,
                    created: true,
                }
            }
        };

        self.events.emit(UiEvent::ToggleDialog {
            tab_id: tab.id,
            link_id: outcome.link_id.clone(),
            active_url: tab.url.clone(),
            title: tab.title.clone(),
        });

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_case_and_slash_insensitive() {
        assert_eq!(
            normalize_url("HTTP://Example.com/page/"),
            normalize_url("http://example.com/page")
        );
        assert_eq!(
            normalize_url("https://example.com/a/"),
            "https://example.com/a"
        );
    }

    #[test]
    fn normalization_keeps_the_query_string() {
        assert_eq!(
            normalize_url("https://example.com/search/?Q=Rust"),
            "https://example.com/search?q=rust"
        );
    }

    #[test]
    fn normalization_strips_root_slash() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
    }

    #[test]
    fn unparseable_input_falls_back_to_lowercase() {
        assert_eq!(normalize_url("Not A Url"), "not a url");
    }

    #[test]
    fn privileged_pages_are_rejected() {
        assert!(is_privileged("chrome://settings"));
        assert!(is_privileged("About:blank"));
        assert!(is_privileged("chrome-extension://abcdef/popup.html"));
        assert!(!is_privileged("https://example.com"));
    }
}

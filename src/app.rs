use crate::{
    capture::{CaptureEngine, CaptureOutcome, TabInfo},
    collections::CollectionManager,
    config::Config,
    errors::AppError,
    events::{EventBus, UiEvent},
    search::SearchIndex,
    stats::{self, Statistics},
    store::{now_ms, Database, Link, LinkUpdate, SyncStatus},
};
use serde::Deserialize;
use std::sync::Arc;

/// Target collection reference as surfaces send it: the caller supplies both
/// halves of the denormalized pair.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRef {
    pub id: String,
    pub name: String,
}

/// Keyboard commands forwarded from the browser surface.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    OpenDialog,
    ToggleSearchMode,
}

/// Composition root: owns the store, the search index, the event bus and the
/// engines on top of them. Everything that used to be a process-wide global
/// (in-flight set, index slot) lives inside this struct, so tests can spin
/// up as many independent apps as they like.
pub struct App {
    db: Database,
    index: Arc<SearchIndex>,
    events: EventBus,
    capture: CaptureEngine,
    collections: CollectionManager,
    search_limit: usize,
}

impl App {
    pub fn open(config: &Config) -> Result<Self, AppError> {
        let db = Database::open(&config.base_path())?;
        let index = Arc::new(SearchIndex::new(config.search.threshold));
        let events = EventBus::new();

        let capture = CaptureEngine::new(db.clone(), index.clone(), events.clone());
        let collections = CollectionManager::new(db.clone(), index.clone());

        Ok(Self {
            db,
            index,
            events,
            capture,
            collections,
            search_limit: config.search.limit,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn capture(&self, tab: &TabInfo) -> Result<Option<CaptureOutcome>, AppError> {
        self.capture.capture(tab)
    }

    pub fn search(&self, query: &str) -> Vec<Link> {
        self.index.query(&self.db, query, self.search_limit)
    }

    pub fn search_with_limit(&self, query: &str, limit: Option<usize>) -> Vec<Link> {
        self.index
            .query(&self.db, query, limit.unwrap_or(self.search_limit))
    }

    pub fn get_link(&self, link_id: &str) -> Option<Link> {
        self.db.get_link(link_id)
    }

    /// Reassign a link, keeping the denormalized collection name in step.
    pub fn update_link_collection(
        &self,
        link_id: &str,
        collection: CollectionRef,
    ) -> Result<Link, AppError> {
        let link = self.db.update_link(
            link_id,
            LinkUpdate {
                collection_id: Some(collection.id),
                collection_name: Some(collection.name),
                updated_at: Some(now_ms()),
                sync_status: Some(SyncStatus::Pending),
                ..Default::default()
            },
        )?;
        self.index.refresh(&self.db);
        Ok(link)
    }

    pub fn delete_link(&self, link_id: &str) -> Result<(), AppError> {
        log::info!("deleting link {link_id}");
        self.db.delete_link(link_id)?;
        self.index.refresh(&self.db);
        Ok(())
    }

    pub fn statistics(&self) -> Statistics {
        stats::collect(&self.db, &self.index)
    }

    /// Keyboard-command entry point; `open-dialog` runs the capture workflow
    /// (which pushes the dialog event itself), `toggle-search-mode` just
    /// pokes the overlay.
    pub fn handle_command(&self, command: Command, tab: &TabInfo) -> Result<(), AppError> {
        match command {
            Command::OpenDialog => {
                let _ = self.capture(tab)?;
            }
            Command::ToggleSearchMode => {
                self.events.emit(UiEvent::ToggleSearchMode { tab_id: tab.id });
            }
        }
        Ok(())
    }
}

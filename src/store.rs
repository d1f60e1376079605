use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::Instant,
};

const COLLECTIONS_FILE: &str = "collections.csv";
const LINKS_FILE: &str = "links.csv";
const SYNC_INFO_FILE: &str = "syncinfo.json";

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("collection name already taken: {0}")]
    NameTaken(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt table file: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    #[default]
    Pending,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub updated_at: i64,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub screenshot_url: Option<String>,
    pub meta_text: Option<String>,
    pub collection_id: String,
    pub collection_name: String,
    pub updated_at: i64,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Singleton row recording when an external batch sync last applied changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub id: u32,
    pub last_synced_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub collection_id: Option<String>,
    pub collection_name: Option<String>,
    pub updated_at: Option<i64>,
    pub sync_status: Option<SyncStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub updated_at: Option<i64>,
    pub sync_status: Option<SyncStatus>,
}

/// The three tables, held in memory. All multi-step mutations go through
/// [`Database::transaction`] so readers never observe intermediate states.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub collections: Vec<Collection>,
    pub links: Vec<Link>,
    pub sync_info: Option<SyncInfo>,
}

impl Tables {
    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Name lookups are case-insensitive throughout.
    pub fn collection_by_name(&self, name: &str) -> Option<&Collection> {
        let needle = name.to_lowercase();
        self.collections
            .iter()
            .find(|c| c.name.to_lowercase() == needle)
    }

    pub fn add_collection(&mut self, collection: Collection) -> Result<(), StoreError> {
        if self.collection(&collection.id).is_some() {
            return Err(StoreError::DuplicateId(collection.id));
        }
        if self.collection_by_name(&collection.name).is_some() {
            return Err(StoreError::NameTaken(collection.name));
        }
        self.collections.push(collection);
        Ok(())
    }

    pub fn update_collection(
        &mut self,
        id: &str,
        update: CollectionUpdate,
    ) -> Result<Collection, StoreError> {
        if let Some(name) = &update.name {
            if self
                .collection_by_name(name)
                .is_some_and(|other| other.id != id)
            {
                return Err(StoreError::NameTaken(name.clone()));
            }
        }

        let collection = self
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CollectionNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            collection.name = name;
        }
        if let Some(updated_at) = update.updated_at {
            collection.updated_at = updated_at;
        }
        if let Some(sync_status) = update.sync_status {
            collection.sync_status = sync_status;
        }

        Ok(collection.clone())
    }

    pub fn delete_collection(&mut self, id: &str) -> Result<(), StoreError> {
        let idx = self
            .collections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::CollectionNotFound(id.to_string()))?;
        self.collections.remove(idx);
        Ok(())
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn add_link(&mut self, link: Link) -> Result<(), StoreError> {
        if self.link(&link.id).is_some() {
            return Err(StoreError::DuplicateId(link.id));
        }
        self.links.push(link);
        Ok(())
    }

    pub fn update_link(&mut self, id: &str, update: LinkUpdate) -> Result<Link, StoreError> {
        let link = self
            .links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::LinkNotFound(id.to_string()))?;

        if let Some(url) = update.url {
            link.url = url;
        }
        if let Some(title) = update.title {
            link.title = Some(title);
        }
        if let Some(description) = update.description {
            link.description = Some(description);
        }
        if let Some(collection_id) = update.collection_id {
            link.collection_id = collection_id;
        }
        if let Some(collection_name) = update.collection_name {
            link.collection_name = collection_name;
        }
        if let Some(updated_at) = update.updated_at {
            link.updated_at = updated_at;
        }
        if let Some(sync_status) = update.sync_status {
            link.sync_status = sync_status;
        }

        Ok(link.clone())
    }

    pub fn delete_link(&mut self, id: &str) -> Result<(), StoreError> {
        let idx = self
            .links
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| StoreError::LinkNotFound(id.to_string()))?;
        self.links.remove(idx);
        Ok(())
    }

    /// Delete every link referencing the collection. Returns how many went.
    pub fn delete_links_in_collection(&mut self, collection_id: &str) -> usize {
        let before = self.links.len();
        self.links.retain(|l| l.collection_id != collection_id);
        before - self.links.len()
    }

    /// Rewrite the denormalized collection name on every referencing link.
    pub fn rewrite_collection_name(&mut self, collection_id: &str, name: &str) -> usize {
        let mut touched = 0;
        for link in self
            .links
            .iter_mut()
            .filter(|l| l.collection_id == collection_id)
        {
            link.collection_name = name.to_string();
            touched += 1;
        }
        touched
    }

    pub fn bulk_add_collections(&mut self, collections: Vec<Collection>) -> Result<(), StoreError> {
        for collection in collections {
            self.add_collection(collection)?;
        }
        Ok(())
    }

    pub fn bulk_add_links(&mut self, links: Vec<Link>) -> Result<(), StoreError> {
        for link in links {
            self.add_link(link)?;
        }
        Ok(())
    }

    /// Upsert by id, batch sync style.
    #[allow(dead_code)]
    pub fn bulk_put_links(&mut self, links: Vec<Link>) {
        for link in links {
            match self.links.iter_mut().find(|l| l.id == link.id) {
                Some(existing) => *existing = link,
                None => self.links.push(link),
            }
        }
    }

    #[allow(dead_code)]
    pub fn bulk_put_collections(&mut self, collections: Vec<Collection>) {
        for collection in collections {
            match self.collections.iter_mut().find(|c| c.id == collection.id) {
                Some(existing) => *existing = collection,
                None => self.collections.push(collection),
            }
        }
    }

    #[allow(dead_code)]
    pub fn bulk_delete_links(&mut self, ids: &[String]) {
        self.links.retain(|l| !ids.contains(&l.id));
    }

    #[allow(dead_code)]
    pub fn bulk_delete_collections(&mut self, ids: &[String]) {
        self.collections.retain(|c| !ids.contains(&c.id));
    }

    pub fn clear(&mut self) {
        self.collections.clear();
        self.links.clear();
        self.sync_info = None;
    }
}

/// Durable store for the three tables. Links and collections live in CSV
/// files, the sync singleton in a small JSON file; every commit rewrites the
/// files through a temp-then-rename so a crash never leaves a torn table.
#[derive(Clone)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
    dir: PathBuf,
}

impl Database {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;

        let now = Instant::now();
        let tables = Tables {
            collections: load_table(&dir.join(COLLECTIONS_FILE))?,
            links: load_table(&dir.join(LINKS_FILE))?,
            sync_info: load_sync_info(&dir.join(SYNC_INFO_FILE))?,
        };
        log::debug!(
            "loaded {} collections / {} links in {}ms",
            tables.collections.len(),
            tables.links.len(),
            now.elapsed().as_micros() as f64 / 1000.0
        );

        let db = Database {
            tables: Arc::new(RwLock::new(tables)),
            dir: dir.to_path_buf(),
        };

        // materialize the table files so a fresh dir is immediately valid
        db.persist(&db.tables.read().unwrap())?;

        Ok(db)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `body` against a private copy of the tables. On `Ok` the copy is
    /// flushed to disk and swapped in; on `Err` it is discarded, so readers
    /// never see a partial mutation and rollback is total.
    pub fn transaction<T>(
        &self,
        body: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.tables.write().unwrap();
        let mut scratch = guard.clone();
        let out = body(&mut scratch)?;
        self.persist(&scratch)?;
        *guard = scratch;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        save_table(&self.dir.join(COLLECTIONS_FILE), &tables.collections)?;
        save_table(&self.dir.join(LINKS_FILE), &tables.links)?;
        save_sync_info(&self.dir.join(SYNC_INFO_FILE), tables.sync_info)?;
        Ok(())
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.tables.read().unwrap().collections.clone()
    }

    pub fn links(&self) -> Vec<Link> {
        self.tables.read().unwrap().links.clone()
    }

    pub fn sync_info(&self) -> Option<SyncInfo> {
        self.tables.read().unwrap().sync_info
    }

    pub fn counts(&self) -> (usize, usize) {
        let tables = self.tables.read().unwrap();
        (tables.links.len(), tables.collections.len())
    }

    pub fn get_link(&self, id: &str) -> Option<Link> {
        self.tables.read().unwrap().link(id).cloned()
    }

    pub fn get_collection(&self, id: &str) -> Option<Collection> {
        self.tables.read().unwrap().collection(id).cloned()
    }

    pub fn query_links(&self, predicate: impl Fn(&Link) -> bool) -> Vec<Link> {
        self.tables
            .read()
            .unwrap()
            .links
            .iter()
            .filter(|l| predicate(l))
            .cloned()
            .collect()
    }

    pub fn update_link(&self, id: &str, update: LinkUpdate) -> Result<Link, StoreError> {
        self.transaction(|t| t.update_link(id, update.clone()))
    }

    pub fn delete_link(&self, id: &str) -> Result<(), StoreError> {
        self.transaction(|t| t.delete_link(id))
    }

    pub fn add_collection(&self, collection: Collection) -> Result<(), StoreError> {
        self.transaction(|t| t.add_collection(collection.clone()))
    }
}

fn load_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, StoreError> {
    if std::fs::metadata(path).is_err() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

fn save_table<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let temp_path = temp_sibling(path);
    {
        let mut writer = csv::Writer::from_path(&temp_path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

fn load_sync_info(path: &Path) -> Result<Option<SyncInfo>, StoreError> {
    if std::fs::metadata(path).is_err() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt(err.to_string()))
}

fn save_sync_info(path: &Path, info: Option<SyncInfo>) -> Result<(), StoreError> {
    let temp_path = temp_sibling(path);
    let raw = match info {
        Some(info) => serde_json::to_string(&info)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        None => String::new(),
    };
    std::fs::write(&temp_path, raw)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str("-tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(id: &str, name: &str) -> Collection {
        Collection {
            id: id.to_string(),
            name: name.to_string(),
            updated_at: now_ms(),
            sync_status: SyncStatus::Pending,
            last_error: None,
        }
    }

    fn link(id: &str, url: &str, collection_id: &str) -> Link {
        Link {
            id: id.to_string(),
            url: url.to_string(),
            title: Some(format!("title {id}")),
            domain: Some("example.com".to_string()),
            description: None,
            screenshot_url: None,
            meta_text: None,
            collection_id: collection_id.to_string(),
            collection_name: "Others".to_string(),
            updated_at: now_ms(),
            sync_status: SyncStatus::Pending,
            last_error: None,
        }
    }

    #[test]
    fn save_load_roundtrip_preserves_tables() {
        let tmp = tempfile::tempdir().unwrap();

        {
            let db = Database::open(tmp.path()).unwrap();
            db.transaction(|t| {
                t.add_collection(collection("others", "Others"))?;
                t.add_link(link("a", "https://a.com/x", "others"))?;
                t.add_link(link("b", "https://b.com", "others"))?;
                t.sync_info = Some(SyncInfo {
                    id: 1,
                    last_synced_at: 42,
                });
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(tmp.path()).unwrap();
        assert_eq!(db.collections().len(), 1);
        let links = db.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].id, "a");
        assert_eq!(links[0].title.as_deref(), Some("title a"));
        assert_eq!(links[0].description, None);
        assert_eq!(db.sync_info(), Some(SyncInfo { id: 1, last_synced_at: 42 }));
    }

    #[test]
    fn failed_transaction_rolls_back_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        db.add_collection(collection("others", "Others")).unwrap();

        let result = db.transaction(|t| {
            t.add_link(link("a", "https://a.com", "others"))?;
            // second insert collides on the primary key and fails the body
            t.add_link(link("a", "https://a.com", "others"))?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
        assert!(db.links().is_empty());

        // the rollback also holds across a reload from disk
        let db = Database::open(tmp.path()).unwrap();
        assert!(db.links().is_empty());
    }

    #[test]
    fn collection_names_are_unique_case_insensitive() {
        let mut tables = Tables::default();
        tables.add_collection(collection("a", "Reading")).unwrap();

        let err = tables.add_collection(collection("b", "reading")).unwrap_err();
        assert!(matches!(err, StoreError::NameTaken(_)));

        tables.add_collection(collection("b", "Work")).unwrap();
        let err = tables
            .update_collection(
                "b",
                CollectionUpdate {
                    name: Some("READING".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NameTaken(_)));

        // renaming to a different casing of itself is allowed
        tables
            .update_collection(
                "a",
                CollectionUpdate {
                    name: Some("READING".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn update_missing_link_reports_not_found() {
        let mut tables = Tables::default();
        let err = tables
            .update_link("nope", LinkUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::LinkNotFound(_)));
    }

    #[test]
    fn bulk_put_upserts_by_id() {
        let mut tables = Tables::default();
        tables.add_collection(collection("others", "Others")).unwrap();
        tables.add_link(link("a", "https://a.com", "others")).unwrap();

        let mut replacement = link("a", "https://a.com/v2", "others");
        replacement.title = Some("fresh".to_string());
        tables.bulk_put_links(vec![replacement, link("b", "https://b.com", "others")]);

        assert_eq!(tables.links.len(), 2);
        assert_eq!(tables.link("a").unwrap().url, "https://a.com/v2");
        assert_eq!(tables.link("a").unwrap().title.as_deref(), Some("fresh"));

        tables.bulk_delete_links(&["a".to_string()]);
        assert!(tables.link("a").is_none());
        assert!(tables.link("b").is_some());
    }
}

use crate::{
    errors::AppError,
    search::SearchIndex,
    store::{now_ms, Collection, CollectionUpdate, Database, SyncStatus},
};
use std::sync::Arc;

/// Create/rename/delete of collections. Every operation is one store
/// transaction and ends with a search index refresh; rename carries the
/// denormalized `collection_name` on referencing links along in the same
/// transaction, delete cascades to them.
pub struct CollectionManager {
    db: Database,
    index: Arc<SearchIndex>,
}

impl CollectionManager {
    pub fn new(db: Database, index: Arc<SearchIndex>) -> Self {
        Self { db, index }
    }

    pub fn list(&self) -> Vec<Collection> {
        self.db.collections()
    }

    pub fn create(&self, id: &str, name: &str) -> Result<Collection, AppError> {
        let name = validated_name(name)?;
        if id.trim().is_empty() {
            return Err(AppError::Validation(
                "collection id must not be empty".to_string(),
            ));
        }

        let collection = Collection {
            id: id.to_string(),
            name,
            updated_at: now_ms(),
            sync_status: SyncStatus::Pending,
            last_error: None,
        };

        // the store's unique constraints are the authority on duplicates
        self.db.add_collection(collection.clone())?;
        self.index.refresh(&self.db);

        log::info!("created collection {id}");
        Ok(collection)
    }

    pub fn rename(&self, id: &str, new_name: &str) -> Result<Collection, AppError> {
        let new_name = validated_name(new_name)?;

        let (collection, touched) = self.db.transaction(|t| {
            let collection = t.update_collection(
                id,
                CollectionUpdate {
                    name: Some(new_name.clone()),
                    updated_at: Some(now_ms()),
                    sync_status: Some(SyncStatus::Pending),
                },
            )?;
            let touched = t.rewrite_collection_name(id, &new_name);
            Ok((collection, touched))
        })?;
        self.index.refresh(&self.db);

        log::info!("renamed collection {id}, rewrote {touched} links");
        Ok(collection)
    }

    /// Deletes the collection and every link in it. Returns how many links
    /// went with it.
    pub fn delete(&self, id: &str) -> Result<usize, AppError> {
        let removed = self.db.transaction(|t| {
            let removed = t.delete_links_in_collection(id);
            t.delete_collection(id)?;
            Ok(removed)
        })?;
        self.index.refresh(&self.db);

        log::info!("deleted collection {id} and {removed} links");
        Ok(removed)
    }
}

fn validated_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "collection name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

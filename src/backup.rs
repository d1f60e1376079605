use crate::{
    errors::AppError,
    search::SearchIndex,
    store::{Collection, Database, Link, SyncInfo},
};
use serde::{Deserialize, Serialize};

pub const EXPORT_VERSION: u32 = 1;

/// Versioned wholesale snapshot of the three tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub version: u32,
    pub exported_at: String,
    pub data: ExportTables,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTables {
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub sync_info: Vec<SyncInfo>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub collections: usize,
    pub links: usize,
}

pub fn export(db: &Database) -> ExportPayload {
    ExportPayload {
        version: EXPORT_VERSION,
        exported_at: chrono::Utc::now().to_rfc3339(),
        data: ExportTables {
            collections: db.collections(),
            links: db.links(),
            sync_info: db.sync_info().into_iter().collect(),
        },
    }
}

/// Replaces all three tables with the payload's contents in one transaction,
/// then refreshes the search index. A payload that fails its constraints
/// (duplicate ids, duplicate names) leaves the previous data untouched.
pub fn import(
    db: &Database,
    index: &SearchIndex,
    payload: ExportPayload,
) -> Result<ImportCounts, AppError> {
    let ExportTables {
        collections,
        links,
        sync_info,
    } = payload.data;

    let counts = ImportCounts {
        collections: collections.len(),
        links: links.len(),
    };

    db.transaction(move |t| {
        t.clear();
        t.bulk_add_collections(collections)?;
        t.bulk_add_links(links)?;
        t.sync_info = sync_info.first().copied();
        Ok(())
    })?;

    index.refresh(db);

    log::info!(
        "imported {} collections and {} links",
        counts.collections,
        counts.links
    );
    Ok(counts)
}

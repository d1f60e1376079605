use crate::{
    search::{SearchIndex, SearchMetrics},
    storage::{BackendLocal, StorageManager},
    store::Database,
};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDetails {
    pub data_size: usize,
    pub collections_size: usize,
    pub links_size: usize,
    /// Bytes the data directory occupies on disk, table files included.
    pub disk_usage: u64,
    pub average_per_link: f64,
    pub largest_link: usize,
    pub largest_link_field: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub links_count: usize,
    pub collections_count: usize,
    pub storage_details: StorageDetails,
    pub search_metrics: SearchMetrics,
}

pub fn collect(db: &Database, index: &SearchIndex) -> Statistics {
    let (links_count, collections_count) = db.counts();
    Statistics {
        links_count,
        collections_count,
        storage_details: storage_details(db),
        search_metrics: index.metrics(),
    }
}

pub fn storage_details(db: &Database) -> StorageDetails {
    match try_storage_details(db) {
        Ok(details) => details,
        Err(err) => {
            log::error!("failed to calculate storage details: {err}");
            StorageDetails {
                largest_link_field: "unknown".to_string(),
                ..Default::default()
            }
        }
    }
}

fn try_storage_details(db: &Database) -> Result<StorageDetails, serde_json::Error> {
    let collections = db.collections();
    let links = db.links();

    let collections_size = serde_json::to_string(&collections)?.len();
    let links_size = serde_json::to_string(&links)?.len();

    let mut largest_link = 0;
    let mut largest_link_field = String::new();
    for link in &links {
        let link_size = serde_json::to_string(link)?.len();
        if link_size > largest_link {
            largest_link = link_size;

            let screenshot = link.screenshot_url.as_deref().map_or(0, str::len);
            let meta_text = link.meta_text.as_deref().map_or(0, str::len);
            let description = link.description.as_deref().map_or(0, str::len);
            largest_link_field = if screenshot > meta_text && screenshot > description {
                "screenshot"
            } else if meta_text > description {
                "metaText"
            } else {
                "description"
            }
            .to_string();
        }
    }

    let disk_usage = match BackendLocal::new(db.dir()) {
        Ok(store) => store
            .list()
            .iter()
            .filter_map(|name| std::fs::metadata(db.dir().join(name)).ok())
            .map(|meta| meta.len())
            .sum(),
        Err(_) => 0,
    };

    Ok(StorageDetails {
        data_size: collections_size + links_size,
        collections_size,
        links_size,
        disk_usage,
        average_per_link: if links.is_empty() {
            0.0
        } else {
            links_size as f64 / links.len() as f64
        },
        largest_link,
        largest_link_field,
    })
}

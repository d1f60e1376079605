//! The single dispatch point between external surfaces and the engine.
//!
//! Requests arrive as `{action: TAG, ...fields}`; the tagged enum plus the
//! exhaustive match below is the action table. A tag the enum does not know
//! fails deserialization, and the router answers with nothing at all rather
//! than an error payload.

use crate::{
    app::{App, CollectionRef},
    backup::{self, ExportPayload, ImportCounts},
    errors::AppError,
    stats::Statistics,
    store::{Collection, Link},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    #[serde(rename = "SEARCH")]
    Search { query: String },

    #[serde(rename = "REFRESH_INDEX")]
    RefreshIndex,

    #[serde(rename = "GET_COLLECTIONS")]
    GetCollections,

    #[serde(rename = "GET_LINK", rename_all = "camelCase")]
    GetLink { link_id: String },

    #[serde(rename = "UPDATE_LINK_COLLECTION", rename_all = "camelCase")]
    UpdateLinkCollection {
        link_id: String,
        collection: CollectionRef,
    },

    #[serde(rename = "DELETE_LINK", rename_all = "camelCase")]
    DeleteLink { link_id: String },

    #[serde(rename = "CREATE_COLLECTION")]
    CreateCollection { id: String, name: String },

    #[serde(rename = "DELETE_COLLECTION")]
    DeleteCollection { id: String },

    #[serde(rename = "RENAME_COLLECTION")]
    RenameCollection { id: String, name: String },

    #[serde(rename = "GET_STATISTICS")]
    GetStatistics,

    #[serde(rename = "EXPORT_DATA")]
    ExportData,

    #[serde(rename = "IMPORT_DATA")]
    ImportData { data: Value },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Results {
        results: Vec<Link>,
    },
    Collections {
        collections: Vec<Collection>,
    },
    Link {
        link: Option<Link>,
    },
    Statistics(Box<Statistics>),
    Export {
        success: bool,
        data: Box<ExportPayload>,
    },
    Imported {
        success: bool,
        imported: ImportCounts,
    },
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

fn ack<T>(result: Result<T, AppError>) -> Response {
    match result {
        Ok(_) => Response::Ack {
            success: true,
            error: None,
        },
        Err(err) => {
            log::error!("operation failed: {err}");
            Response::Ack {
                success: false,
                error: Some(err.to_string()),
            }
        }
    }
}

impl App {
    pub fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Search { query } => Response::Results {
                results: self.search(&query),
            },

            Request::RefreshIndex => {
                self.index().refresh(self.db());
                ack::<()>(Ok(()))
            }

            Request::GetCollections => Response::Collections {
                collections: self.collections().list(),
            },

            Request::GetLink { link_id } => Response::Link {
                link: self.get_link(&link_id),
            },

            Request::UpdateLinkCollection {
                link_id,
                collection,
            } => ack(self.update_link_collection(&link_id, collection)),

            Request::DeleteLink { link_id } => ack(self.delete_link(&link_id)),

            Request::CreateCollection { id, name } => ack(self.collections().create(&id, &name)),

            Request::DeleteCollection { id } => ack(self.collections().delete(&id)),

            Request::RenameCollection { id, name } => ack(self.collections().rename(&id, &name)),

            Request::GetStatistics => Response::Statistics(Box::new(self.statistics())),

            Request::ExportData => Response::Export {
                success: true,
                data: Box::new(backup::export(self.db())),
            },

            Request::ImportData { data } => {
                // reject malformed payloads before any table is touched
                let payload: ExportPayload = match serde_json::from_value(data) {
                    Ok(payload) => payload,
                    Err(err) => {
                        log::warn!("rejected import payload: {err}");
                        return Response::Ack {
                            success: false,
                            error: Some("Invalid data format".to_string()),
                        };
                    }
                };

                match backup::import(self.db(), self.index(), payload) {
                    Ok(imported) => Response::Imported {
                        success: true,
                        imported,
                    },
                    Err(err) => ack::<()>(Err(err)),
                }
            }
        }
    }

    /// JSON-level entry point used by the daemon. Unknown or malformed
    /// actions produce `None`: the router will not respond.
    pub fn dispatch_value(&self, value: Value) -> Option<Value> {
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("unhandled message: {err}");
                return None;
            }
        };

        Some(serde_json::to_value(self.dispatch(request)).unwrap())
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start linkstash as a service.
    Daemon {},

    /// Save a page, deduplicating against what is already stored.
    Capture {
        /// Page url
        url: String,

        /// Page title
        #[clap(short, long)]
        title: Option<String>,

        /// Originating browser tab, forwarded to the save dialog event
        #[clap(long)]
        tab_id: Option<i64>,
    },

    /// Fuzzy search saved links.
    Search {
        query: String,

        /// Maximum results to print
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Manage collections.
    Collection {
        #[clap(subcommand)]
        action: CollectionAction,
    },

    /// Operate on a single link.
    Link {
        #[clap(subcommand)]
        action: LinkAction,
    },

    /// Print storage and search statistics.
    Stats {},

    /// Export collections, links and sync info as versioned JSON.
    Export {
        /// Write to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all data with the contents of an export file.
    Import {
        path: PathBuf,

        /// Skip the confirmation prompt
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Force a full search index rebuild.
    RefreshIndex {},
}

#[derive(Subcommand, Debug)]
pub enum CollectionAction {
    /// List all collections.
    List {},

    /// Create a collection.
    Create {
        name: String,

        /// Explicit id; a fresh one is generated when omitted
        #[clap(long)]
        id: Option<String>,
    },

    /// Rename a collection, updating every link in it.
    Rename { id: String, name: String },

    /// Delete a collection and every link in it.
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum LinkAction {
    /// Print a single link.
    Get { id: String },

    /// Move a link into another collection.
    Move { id: String, collection_id: String },

    /// Delete a link.
    Delete { id: String },
}

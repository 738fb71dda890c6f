pub mod auth;
pub mod cache;
pub mod comments;
pub mod config;
pub mod core;
pub mod follow;
pub mod forms;
pub mod groups;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pages;
pub mod posts;
pub mod static_server;
pub mod templates;
pub mod users;

use std::time::Duration;

use sqlx::SqlitePool;

use crate::cache::IndexCache;
use crate::config::{Config, INDEX_CACHE_CAPACITY};

/// Shared by every worker through `web::Data`.
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub index_cache: IndexCache,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        let index_cache = IndexCache::new(
            INDEX_CACHE_CAPACITY,
            Duration::from_secs(config.index_cache_seconds),
        );
        Self {
            db,
            config,
            index_cache,
        }
    }
}

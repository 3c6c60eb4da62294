use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{resolve_path, ServerConfig};
use crate::discovery::DiscoveryManager;
use crate::scan::ScanRegistry;
use common::{Source, SourceStatus};
use library::{ArtworkCache, Catalog, DbPool, Scanner};
use remote::Connector;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<ServerConfig>>,
    pub catalog: Catalog,
    pub scanner: Scanner,
    pub artwork_dir: PathBuf,
    pub connector: Arc<dyn Connector>,
    pub scans: ScanRegistry,
    pub discovery: DiscoveryManager,
}

impl AppState {
    pub fn new(
        config_path: &Path,
        config: ServerConfig,
        pool: DbPool,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let artwork_dir = resolve_path(config_path, &config.artwork_path);
        let catalog = Catalog::new(pool);
        let scanner = Scanner::new(catalog.clone(), ArtworkCache::new(artwork_dir.clone()));
        Self {
            config: Arc::new(RwLock::new(config)),
            catalog,
            scanner,
            artwork_dir,
            connector,
            scans: ScanRegistry::default(),
            discovery: DiscoveryManager::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ScanAllResponse {
    pub message: String,
    pub started: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct SourceResponse {
    #[serde(flatten)]
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SourceStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSourceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub share: Option<String>,
    pub base_path: Option<String>,
    pub enabled: Option<bool>,
}

/// Absent fields are left alone; `null` clears an optional field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSourceRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "double_option")]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub password: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub domain: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub share: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub base_path: Option<Option<String>>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EnumerateSharesRequest {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

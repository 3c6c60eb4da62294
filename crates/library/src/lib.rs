pub mod artwork;
pub mod catalog;
pub mod crawl;
pub mod db;
pub mod scan;

use remote::RemoteError;

pub use artwork::{ArtworkCache, ART_URL_PREFIX};
pub use catalog::{Catalog, NewSource, SourcePatch, TrackRecord};
pub use crawl::{crawl, CrawlEntry};
pub use db::{init_memory_pool, init_pool, DbPool};
pub use scan::{ProgressTracker, ScanOutcome, Scanner};

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Pool(r2d2::Error),
    Remote(RemoteError),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Db(err) => write!(f, "db error: {}", err),
            LibraryError::Pool(err) => write!(f, "db pool error: {}", err),
            LibraryError::Remote(err) => write!(f, "remote error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        LibraryError::Db(err)
    }
}

impl From<r2d2::Error> for LibraryError {
    fn from(err: r2d2::Error) -> Self {
        LibraryError::Pool(err)
    }
}

impl From<RemoteError> for LibraryError {
    fn from(err: RemoteError) -> Self {
        LibraryError::Remote(err)
    }
}

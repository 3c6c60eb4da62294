use std::fs;
use std::path::{Path, PathBuf};

use common::stable_id;
use metadata::CoverArt;
use uuid::Uuid;

use crate::LibraryError;

pub const ART_URL_PREFIX: &str = "/api/art/";

/// Album art extracted during scans, one file per (artist, album).
#[derive(Debug, Clone)]
pub struct ArtworkCache {
    dir: PathBuf,
    url_prefix: String,
}

impl ArtworkCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            url_prefix: ART_URL_PREFIX.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(artist: &str, album: &str, cover: &CoverArt) -> String {
        format!("{}.{}", stable_id(&format!("{}{}", artist, album)), cover.extension())
    }

    /// Writes the image unless this album already has one and returns its
    /// public URL.
    pub fn store(&self, artist: &str, album: &str, cover: &CoverArt) -> Result<String, LibraryError> {
        let name = Self::file_name(artist, album, cover);
        let path = self.dir.join(&name);
        if !path.exists() {
            fs::create_dir_all(&self.dir)?;
            let tmp = self.dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));
            fs::write(&tmp, &cover.data)?;
            if let Err(err) = fs::rename(&tmp, &path) {
                let _ = fs::remove_file(&tmp);
                return Err(err.into());
            }
        }
        Ok(format!("{}{}", self.url_prefix, name))
    }
}

use std::collections::BTreeMap;

use common::{
    folder_of, now_timestamp, Artist, Folder, ScanState, Source, SourceKind, SourceStatus,
    Track,
};
use metadata::TrackMetadata;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::db::{DbPool, PooledConnection};
use crate::LibraryError;

const SOURCE_COLS: &str = "id, name, type, host, port, username, password, domain, share, \
    base_path, enabled, created_at, updated_at";

const STATUS_COLS: &str =
    "source_id, status, progress, total_files, scanned_files, last_error, last_scan";

const TRACK_COLS: &str = "id, title, artist, album, duration, track_number, year, path, \
    folder_path, image_url, source_mtime, artists_display, source_id, album_id, artist_id, \
    created_at";

#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub kind: SourceKind,
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub share: Option<String>,
    pub base_path: Option<String>,
    pub enabled: bool,
}

/// Partial update. Outer `None` leaves a field alone; `Some(None)` clears
/// an optional one.
#[derive(Debug, Clone, Default)]
pub struct SourcePatch {
    pub name: Option<String>,
    pub kind: Option<SourceKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub domain: Option<Option<String>>,
    pub share: Option<Option<String>>,
    pub base_path: Option<Option<String>>,
    pub enabled: Option<bool>,
}

impl SourcePatch {
    fn apply(self, source: &mut Source) {
        if let Some(name) = self.name {
            source.name = name;
        }
        if let Some(kind) = self.kind {
            source.kind = kind;
        }
        if let Some(host) = self.host {
            source.host = host;
        }
        if let Some(port) = self.port {
            source.port = if port == 0 { source.kind.default_port() } else { port };
        }
        if let Some(username) = self.username {
            source.username = username;
        }
        if let Some(password) = self.password {
            source.password = password;
        }
        if let Some(domain) = self.domain {
            source.domain = domain;
        }
        if let Some(share) = self.share {
            source.share = share;
        }
        if let Some(base_path) = self.base_path {
            source.base_path = base_path;
        }
        if let Some(enabled) = self.enabled {
            source.enabled = enabled;
        }
    }
}

/// One file's worth of catalog facts.
pub struct TrackRecord<'a> {
    pub source_id: &'a str,
    pub path: &'a str,
    pub source_mtime: Option<String>,
    pub metadata: &'a TrackMetadata,
    pub image_url: Option<&'a str>,
}

#[derive(Clone)]
pub struct Catalog {
    pool: DbPool,
}

impl Catalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection, LibraryError> {
        Ok(self.pool.get()?)
    }

    /// Inserts the source together with its initial `starting` status row.
    pub fn create_source(&self, new: NewSource) -> Result<Source, LibraryError> {
        let now = now_timestamp();
        let source = Source {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            kind: new.kind,
            host: new.host,
            port: new.port.filter(|p| *p != 0).unwrap_or(new.kind.default_port()),
            username: new.username,
            password: new.password,
            domain: new.domain,
            share: new.share,
            base_path: new.base_path,
            enabled: new.enabled,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO sources (id, name, type, host, port, username, password, domain, share,
                base_path, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                source.id,
                source.name,
                source.kind.as_str(),
                source.host,
                source.port,
                source.username,
                source.password,
                source.domain,
                source.share,
                source.base_path,
                source.enabled,
                source.created_at,
                source.updated_at,
            ],
        )?;
        tx.execute(
            "INSERT INTO source_status (source_id, status, progress, total_files, scanned_files)
             VALUES (?1, ?2, 0, 0, 0)",
            params![source.id, ScanState::Starting.as_str()],
        )?;
        tx.commit()?;
        Ok(source)
    }

    pub fn list_sources(&self) -> Result<Vec<Source>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY created_at, name",
            SOURCE_COLS
        ))?;
        let rows = stmt.query_map([], source_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_sources_with_status(
        &self,
    ) -> Result<Vec<(Source, Option<SourceStatus>)>, LibraryError> {
        let sources = self.list_sources()?;
        let mut out = Vec::with_capacity(sources.len());
        for source in sources {
            let status = self.get_status(&source.id)?;
            out.push((source, status));
        }
        Ok(out)
    }

    pub fn get_source(&self, id: &str) -> Result<Option<Source>, LibraryError> {
        let conn = self.conn()?;
        let source = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLS),
                params![id],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    pub fn update_source(&self, id: &str, patch: SourcePatch) -> Result<Option<Source>, LibraryError> {
        let mut source = match self.get_source(id)? {
            Some(source) => source,
            None => return Ok(None),
        };
        patch.apply(&mut source);
        source.updated_at = now_timestamp();

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sources SET name = ?2, type = ?3, host = ?4, port = ?5, username = ?6,
                password = ?7, domain = ?8, share = ?9, base_path = ?10, enabled = ?11,
                updated_at = ?12
             WHERE id = ?1",
            params![
                source.id,
                source.name,
                source.kind.as_str(),
                source.host,
                source.port,
                source.username,
                source.password,
                source.domain,
                source.share,
                source.base_path,
                source.enabled,
                source.updated_at,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(source))
    }

    /// Removes a source; its status row and tracks go with it.
    pub fn delete_source(&self, id: &str) -> Result<bool, LibraryError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn get_status(&self, source_id: &str) -> Result<Option<SourceStatus>, LibraryError> {
        let conn = self.conn()?;
        let status = conn
            .query_row(
                &format!("SELECT {} FROM source_status WHERE source_id = ?1", STATUS_COLS),
                params![source_id],
                status_from_row,
            )
            .optional()?;
        Ok(status)
    }

    pub fn write_status(&self, status: &SourceStatus) -> Result<(), LibraryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO source_status (source_id, status, progress, total_files, scanned_files,
                last_error, last_scan)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                total_files = excluded.total_files,
                scanned_files = excluded.scanned_files,
                last_error = excluded.last_error,
                last_scan = excluded.last_scan",
            params![
                status.source_id,
                status.status.as_str(),
                status.progress,
                status.total_files as i64,
                status.scanned_files as i64,
                status.last_error,
                status.last_scan,
            ],
        )?;
        Ok(())
    }

    /// Artist, album and track in one transaction. Re-recording the same
    /// (path, source) keeps the track id and creation time.
    pub fn record_track(&self, record: &TrackRecord<'_>) -> Result<String, LibraryError> {
        let meta = record.metadata;
        let now = now_timestamp();
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT OR IGNORE INTO artists (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), meta.artist, now],
        )?;
        let artist_id: String = tx.query_row(
            "SELECT id FROM artists WHERE name = ?1",
            params![meta.artist],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT OR IGNORE INTO albums (id, name, artist_id, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![Uuid::new_v4().to_string(), meta.album, artist_id, record.image_url, now],
        )?;
        let album_id: String = tx.query_row(
            "SELECT id FROM albums WHERE name = ?1 AND artist_id = ?2",
            params![meta.album, artist_id],
            |row| row.get(0),
        )?;
        if let Some(url) = record.image_url {
            tx.execute(
                "UPDATE albums SET image_url = ?2
                 WHERE id = ?1 AND (image_url IS NULL OR image_url = '')",
                params![album_id, url],
            )?;
        }

        tx.execute(
            "INSERT INTO tracks (id, title, artist, album, duration, track_number, year, path,
                folder_path, image_url, source_mtime, artists_display, source_id, album_id,
                artist_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                COALESCE(?10, (SELECT image_url FROM albums WHERE id = ?14)),
                ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(path, source_id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration = excluded.duration,
                track_number = excluded.track_number,
                year = excluded.year,
                folder_path = excluded.folder_path,
                image_url = excluded.image_url,
                source_mtime = excluded.source_mtime,
                artists_display = excluded.artists_display,
                album_id = excluded.album_id,
                artist_id = excluded.artist_id",
            params![
                Uuid::new_v4().to_string(),
                meta.title,
                meta.artist,
                meta.album,
                meta.duration_secs,
                meta.track_number,
                meta.year,
                record.path,
                folder_of(record.path),
                record.image_url,
                record.source_mtime,
                meta.artists_display,
                record.source_id,
                album_id,
                artist_id,
                now,
            ],
        )?;
        let track_id: String = tx.query_row(
            "SELECT id FROM tracks WHERE path = ?1 AND source_id = ?2",
            params![record.path, record.source_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(track_id)
    }

    pub fn get_track(&self, id: &str) -> Result<Option<Track>, LibraryError> {
        let conn = self.conn()?;
        let track = conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLS),
                params![id],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    pub fn list_tracks(&self, source_id: &str) -> Result<Vec<Track>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracks WHERE source_id = ?1 ORDER BY path",
            TRACK_COLS
        ))?;
        let rows = stmt.query_map(params![source_id], track_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn track_count(&self, source_id: &str) -> Result<u64, LibraryError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Every track, newest first.
    pub fn list_all_tracks(&self) -> Result<Vec<Track>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracks ORDER BY created_at DESC, id",
            TRACK_COLS
        ))?;
        let rows = stmt.query_map([], track_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Distinct parent folders per source. Tracks at the root of a source
    /// have no folder and are not listed here.
    pub fn list_folders(&self) -> Result<Vec<Folder>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, folder_path, COUNT(*)
             FROM tracks
             WHERE folder_path IS NOT NULL
             GROUP BY source_id, folder_path
             ORDER BY folder_path, source_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(2)?;
            Ok(Folder {
                source_id: row.get(0)?,
                path: row.get(1)?,
                track_count: count as u64,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Tracks directly inside `folder`, optionally limited to one source.
    pub fn tracks_in_folder(
        &self,
        folder: &str,
        source_id: Option<&str>,
    ) -> Result<Vec<Track>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracks
             WHERE folder_path = ?1 AND (?2 IS NULL OR source_id = ?2)
             ORDER BY track_number IS NULL, track_number, path",
            TRACK_COLS
        ))?;
        let rows = stmt.query_map(params![folder, source_id], track_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Artists whose names differ only by surrounding whitespace or case are
    /// listed once, represented by the earliest-created row of the group.
    pub fn list_artists(&self) -> Result<Vec<Artist>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM artists ORDER BY created_at, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Artist {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut grouped: BTreeMap<String, Artist> = BTreeMap::new();
        for artist in rows {
            let mut artist = artist?;
            artist.name = artist.name.trim().to_string();
            grouped.entry(artist.name.to_lowercase()).or_insert(artist);
        }
        Ok(grouped.into_values().collect())
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    let kind: String = row.get(2)?;
    let kind = SourceKind::parse(&kind)
        .ok_or_else(|| conversion_error(2, format!("unknown source type {}", kind)))?;
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        kind,
        host: row.get(3)?,
        port: row.get(4)?,
        username: row.get(5)?,
        password: row.get(6)?,
        domain: row.get(7)?,
        share: row.get(8)?,
        base_path: row.get(9)?,
        enabled: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<SourceStatus> {
    let state: String = row.get(1)?;
    let status = ScanState::parse(&state)
        .ok_or_else(|| conversion_error(1, format!("unknown scan status {}", state)))?;
    let total: i64 = row.get(3)?;
    let scanned: i64 = row.get(4)?;
    Ok(SourceStatus {
        source_id: row.get(0)?,
        status,
        progress: row.get(2)?,
        total_files: total.max(0) as u64,
        scanned_files: scanned.max(0) as u64,
        last_error: row.get(5)?,
        last_scan: row.get(6)?,
    })
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        duration: row.get(4)?,
        track_number: row.get(5)?,
        year: row.get(6)?,
        path: row.get(7)?,
        folder_path: row.get(8)?,
        image_url: row.get(9)?,
        source_mtime: row.get(10)?,
        artists_display: row.get(11)?,
        source_id: row.get(12)?,
        album_id: row.get(13)?,
        artist_id: row.get(14)?,
        created_at: row.get(15)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    pub(crate) fn new_source(kind: SourceKind) -> NewSource {
        NewSource {
            name: "NAS".to_string(),
            kind,
            host: "nas.local".to_string(),
            port: None,
            username: Some("me".to_string()),
            password: Some("secret".to_string()),
            domain: None,
            share: Some("music".to_string()),
            base_path: None,
            enabled: true,
        }
    }

    fn meta(artist: &str, album: &str, title: &str) -> TrackMetadata {
        let mut meta = TrackMetadata::fallback(title, 1.5);
        meta.artist = artist.to_string();
        meta.artists_display = artist.to_string();
        meta.album = album.to_string();
        meta
    }

    #[test]
    fn create_source_writes_status_row() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        assert_eq!(source.port, 445);
        let status = catalog.get_status(&source.id).unwrap().unwrap();
        assert_eq!(status.status, ScanState::Starting);
        assert_eq!(status.progress, 0.0);

        let listed = catalog.list_sources_with_status().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].1.is_some());
        assert_eq!(listed[0].0.password.as_deref(), Some("secret"));
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();

        let patch = SourcePatch {
            name: Some("Renamed".to_string()),
            share: Some(None),
            ..SourcePatch::default()
        };
        let updated = catalog.update_source(&source.id, patch).unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.share, None);
        assert_eq!(updated.username.as_deref(), Some("me"));

        let stored = catalog.get_source(&source.id).unwrap().unwrap();
        assert_eq!(stored.share, None);
        assert_eq!(stored.name, "Renamed");
        assert!(catalog.update_source("missing", SourcePatch::default()).unwrap().is_none());
    }

    #[test]
    fn delete_cascades_to_status_and_tracks() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Ssh)).unwrap();
        let meta = meta("A", "B", "t.mp3");
        let track_id = catalog
            .record_track(&TrackRecord {
                source_id: &source.id,
                path: "/srv/t.mp3",
                source_mtime: None,
                metadata: &meta,
                image_url: None,
            })
            .unwrap();

        assert!(catalog.delete_source(&source.id).unwrap());
        assert!(catalog.get_status(&source.id).unwrap().is_none());
        assert!(catalog.get_track(&track_id).unwrap().is_none());
        assert!(!catalog.delete_source(&source.id).unwrap());
    }

    #[test]
    fn record_track_is_idempotent() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        let first_meta = meta("Artist", "Album", "01.mp3");
        let record = TrackRecord {
            source_id: &source.id,
            path: "Album/01.mp3",
            source_mtime: Some("2023-11-14T22:13:20Z".to_string()),
            metadata: &first_meta,
            image_url: None,
        };
        let first = catalog.record_track(&record).unwrap();
        let created = catalog.get_track(&first).unwrap().unwrap().created_at;

        let mut retitled = first_meta.clone();
        retitled.title = "Intro".to_string();
        let second = catalog
            .record_track(&TrackRecord {
                metadata: &retitled,
                image_url: Some("/api/art/x.jpg"),
                ..record
            })
            .unwrap();
        assert_eq!(first, second);

        let track = catalog.get_track(&second).unwrap().unwrap();
        assert_eq!(track.title, "Intro");
        assert_eq!(track.created_at, created);
        assert_eq!(track.folder_path.as_deref(), Some("Album"));
        assert_eq!(track.image_url.as_deref(), Some("/api/art/x.jpg"));
        assert_eq!(catalog.track_count(&source.id).unwrap(), 1);
        assert_eq!(catalog.list_artists().unwrap().len(), 1);
    }

    #[test]
    fn album_artwork_is_backfilled_once() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        let meta = meta("Artist", "Album", "x");
        for (path, url) in [("1.mp3", None), ("2.mp3", Some("/api/art/a.png")), ("3.mp3", Some("/api/art/b.png"))] {
            catalog
                .record_track(&TrackRecord {
                    source_id: &source.id,
                    path,
                    source_mtime: None,
                    metadata: &meta,
                    image_url: url,
                })
                .unwrap();
        }
        let conn = catalog.pool.get().unwrap();
        let image: Option<String> = conn
            .query_row("SELECT image_url FROM albums", [], |row| row.get(0))
            .unwrap();
        assert_eq!(image.as_deref(), Some("/api/art/a.png"));

        let tracks = catalog.list_tracks(&source.id).unwrap();
        assert_eq!(tracks[0].folder_path, None);
        assert_eq!(tracks[0].image_url, None);
    }

    #[test]
    fn artist_listing_groups_case_and_whitespace() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        for (path, artist) in [("1.mp3", "The Band"), ("2.mp3", "the band "), ("3.mp3", "Other")] {
            let meta = meta(artist, "Album", path);
            catalog
                .record_track(&TrackRecord {
                    source_id: &source.id,
                    path,
                    source_mtime: None,
                    metadata: &meta,
                    image_url: None,
                })
                .unwrap();
        }
        let artists = catalog.list_artists().unwrap();
        let names: Vec<String> = artists.iter().map(|a| a.name.to_lowercase()).collect();
        assert_eq!(names, vec!["other".to_string(), "the band".to_string()]);
    }

    #[test]
    fn artist_listing_keeps_one_whole_row_per_group() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let conn = catalog.pool.get().unwrap();
        for (id, name, created) in [
            ("z-first", "  Émile ", "2024-01-01T00:00:00Z"),
            ("a-later", "émile", "2024-02-01T00:00:00Z"),
            ("m-only", "Zoë", "2024-03-01T00:00:00Z"),
        ] {
            conn.execute(
                "INSERT INTO artists (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, created],
            )
            .unwrap();
        }
        drop(conn);

        let artists = catalog.list_artists().unwrap();
        assert_eq!(artists.len(), 2);
        assert_eq!(artists[0].id, "z-first");
        assert_eq!(artists[0].name, "Émile");
        assert_eq!(artists[0].created_at, "2024-01-01T00:00:00Z");
        assert_eq!(artists[1].id, "m-only");
    }

    #[test]
    fn folders_and_track_listings() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let smb = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        let ssh = catalog.create_source(new_source(SourceKind::Ssh)).unwrap();
        let meta = meta("Artist", "Album", "x");
        for (source_id, path) in [
            (&smb.id, "Rock/b.mp3"),
            (&smb.id, "Rock/a.mp3"),
            (&smb.id, "loose.mp3"),
            (&ssh.id, "Rock/c.mp3"),
            (&ssh.id, "Jazz/d.mp3"),
        ] {
            catalog
                .record_track(&TrackRecord {
                    source_id,
                    path,
                    source_mtime: None,
                    metadata: &meta,
                    image_url: None,
                })
                .unwrap();
        }

        assert_eq!(catalog.list_all_tracks().unwrap().len(), 5);

        let folders = catalog.list_folders().unwrap();
        let summary: Vec<(&str, &str, u64)> = folders
            .iter()
            .map(|f| (f.path.as_str(), f.source_id.as_str(), f.track_count))
            .collect();
        let mut expected_rock = vec![("Rock", smb.id.as_str(), 2), ("Rock", ssh.id.as_str(), 1)];
        expected_rock.sort_by(|a, b| a.1.cmp(b.1));
        let mut expected = vec![("Jazz", ssh.id.as_str(), 1)];
        expected.extend(expected_rock);
        assert_eq!(summary, expected);

        let rock = catalog.tracks_in_folder("Rock", None).unwrap();
        assert_eq!(rock.len(), 3);
        let rock_smb = catalog.tracks_in_folder("Rock", Some(&smb.id)).unwrap();
        let paths: Vec<&str> = rock_smb.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["Rock/a.mp3", "Rock/b.mp3"]);
        assert!(catalog.tracks_in_folder("Nowhere", None).unwrap().is_empty());
    }

    #[test]
    fn status_round_trips() {
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        let status = SourceStatus {
            source_id: source.id.clone(),
            status: ScanState::Error,
            progress: 0.0,
            total_files: 0,
            scanned_files: 0,
            last_error: Some("boom".to_string()),
            last_scan: None,
        };
        catalog.write_status(&status).unwrap();
        let stored = catalog.get_status(&source.id).unwrap().unwrap();
        assert_eq!(stored.status, ScanState::Error);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
    }
}

use common::{format_timestamp, now_timestamp, ScanState, Source, SourceStatus};
use metadata::extract;
use remote::{Connector, RemoteSession};
use tracing::{info, warn};

use crate::artwork::ArtworkCache;
use crate::catalog::{Catalog, TrackRecord};
use crate::crawl::{crawl, CrawlEntry};

const CRAWL_DONE_PROGRESS: f64 = 5.0;
const CHECKPOINT_EVERY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Complete {
        total: u64,
        recorded: u64,
        skipped: u64,
    },
    Failed(String),
}

/// Progress checkpoints for one run: 5 once the crawl is done, then up to
/// 100 as files are processed. Never moves backwards.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    last: f64,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            last: CRAWL_DONE_PROGRESS,
        }
    }

    /// Progress to publish after file `index` (0-based), if this file is a
    /// checkpoint.
    pub fn checkpoint(&mut self, index: usize) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let processed = index + 1;
        if index % CHECKPOINT_EVERY != 0 && processed != self.total {
            return None;
        }
        let value = CRAWL_DONE_PROGRESS
            + (processed as f64 / self.total as f64) * (100.0 - CRAWL_DONE_PROGRESS);
        self.last = self.last.max(value.min(100.0));
        Some(self.last)
    }
}

/// Runs the crawl → extract → catalog pipeline for one source.
#[derive(Clone)]
pub struct Scanner {
    catalog: Catalog,
    artwork: ArtworkCache,
}

impl Scanner {
    pub fn new(catalog: Catalog, artwork: ArtworkCache) -> Self {
        Self { catalog, artwork }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Blocking; callers run it on a worker thread. Every status transition
    /// is persisted as it happens.
    pub fn scan(&self, connector: &dyn Connector, source: &Source) -> ScanOutcome {
        info!("scan started for source {} ({})", source.name, source.id);
        self.publish(source, ScanState::Scanning, 0.0, 0, 0, None);

        let session = match connector.open(source) {
            Ok(session) => session,
            Err(err) => return self.fail(source, err.to_string()),
        };
        let files = match crawl(&session) {
            Ok(files) => files,
            Err(err) => return self.fail(source, err.to_string()),
        };

        let total = files.len();
        info!("found {} audio files in {}", total, source.name);
        if total == 0 {
            return self.complete(source, 0, 0, 0);
        }

        self.publish(source, ScanState::Scanning, CRAWL_DONE_PROGRESS, total as u64, 0, None);
        let mut progress = ProgressTracker::new(total);
        let mut recorded = 0u64;
        let mut skipped = 0u64;
        for (index, file) in files.iter().enumerate() {
            if self.process_file(&session, source, file) {
                recorded += 1;
            } else {
                skipped += 1;
            }
            if let Some(value) = progress.checkpoint(index) {
                self.publish(
                    source,
                    ScanState::Scanning,
                    value,
                    total as u64,
                    (index + 1) as u64,
                    None,
                );
            }
        }
        drop(session);

        self.complete(source, total as u64, recorded, skipped)
    }

    fn process_file(&self, session: &RemoteSession, source: &Source, file: &CrawlEntry) -> bool {
        let mut reader = match session.open_read(&file.path) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("skipping {}: {}", file.path, err);
                return false;
            }
        };
        let meta = extract(&mut reader, &file.path);
        drop(reader);

        let image_url = match &meta.cover {
            Some(cover) => match self.artwork.store(&meta.artist, &meta.album, cover) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!("artwork for {} not saved: {}", file.path, err);
                    None
                }
            },
            None => None,
        };

        let record = TrackRecord {
            source_id: &source.id,
            path: &file.path,
            source_mtime: file.modified.map(format_timestamp),
            metadata: &meta,
            image_url: image_url.as_deref(),
        };
        match self.catalog.record_track(&record) {
            Ok(_) => true,
            Err(err) => {
                warn!("catalog write failed for {}: {}", file.path, err);
                false
            }
        }
    }

    fn complete(&self, source: &Source, total: u64, recorded: u64, skipped: u64) -> ScanOutcome {
        let status = SourceStatus {
            source_id: source.id.clone(),
            status: ScanState::Complete,
            progress: 100.0,
            total_files: total,
            scanned_files: total,
            last_error: None,
            last_scan: Some(now_timestamp()),
        };
        if let Err(err) = self.catalog.write_status(&status) {
            warn!("status update failed for {}: {}", source.id, err);
        }
        info!(
            "scan complete for {}: {} files, {} recorded, {} skipped",
            source.name, total, recorded, skipped
        );
        ScanOutcome::Complete {
            total,
            recorded,
            skipped,
        }
    }

    fn fail(&self, source: &Source, message: String) -> ScanOutcome {
        warn!("scan failed for {}: {}", source.name, message);
        self.publish(source, ScanState::Error, 0.0, 0, 0, Some(message.clone()));
        ScanOutcome::Failed(message)
    }

    fn publish(
        &self,
        source: &Source,
        state: ScanState,
        progress: f64,
        total: u64,
        scanned: u64,
        error: Option<String>,
    ) {
        let last_scan = match self.catalog.get_status(&source.id) {
            Ok(Some(previous)) => previous.last_scan,
            _ => None,
        };
        let status = SourceStatus {
            source_id: source.id.clone(),
            status: state,
            progress,
            total_files: total,
            scanned_files: scanned,
            last_error: error,
            last_scan,
        };
        if let Err(err) = self.catalog.write_status(&status) {
            warn!("status update failed for {}: {}", source.id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::new_source;
    use crate::db::init_memory_pool;
    use common::SourceKind;
    use remote::memory::MemoryConnector;
    use remote::RemoteError;

    fn setup() -> (Scanner, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(init_memory_pool().unwrap());
        let scanner = Scanner::new(catalog, ArtworkCache::new(dir.path().join("art")));
        (scanner, dir)
    }

    fn ssh_source(scanner: &Scanner) -> Source {
        let mut new = new_source(SourceKind::Ssh);
        new.base_path = Some("/srv/music".to_string());
        scanner.catalog().create_source(new).unwrap()
    }

    #[test]
    fn rescan_keeps_track_identities() {
        let (scanner, _dir) = setup();
        let source = ssh_source(&scanner);
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/a/01.mp3", vec![0; 64]);
        connector.add_file("/srv/music/a/02.flac", vec![0; 64]);

        let first = scanner.scan(&connector, &source);
        assert_eq!(
            first,
            ScanOutcome::Complete {
                total: 2,
                recorded: 2,
                skipped: 0
            }
        );
        let before: Vec<String> = scanner
            .catalog()
            .list_tracks(&source.id)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();

        scanner.scan(&connector, &source);
        let after: Vec<String> = scanner
            .catalog()
            .list_tracks(&source.id)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(before, after);
        assert_eq!(after.len(), 2);

        let status = scanner.catalog().get_status(&source.id).unwrap().unwrap();
        assert_eq!(status.status, ScanState::Complete);
        assert_eq!(status.progress, 100.0);
        assert_eq!(status.scanned_files, 2);
        assert!(status.last_scan.is_some());
        assert_eq!(connector.open_sessions(), 0);
    }

    #[test]
    fn untagged_files_use_fallback_record() {
        let (scanner, _dir) = setup();
        let source = ssh_source(&scanner);
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/Some Song.ogg", b"not really ogg".to_vec());
        scanner.scan(&connector, &source);

        let tracks = scanner.catalog().list_tracks(&source.id).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Some Song.ogg");
        assert_eq!(tracks[0].artist, common::UNKNOWN_ARTIST);
        assert_eq!(tracks[0].album, common::UNKNOWN_ALBUM);
        assert_eq!(tracks[0].folder_path.as_deref(), Some("/srv/music"));
        assert!(tracks[0].source_mtime.is_some());
    }

    #[test]
    fn crawl_failure_marks_error_without_tracks() {
        let (scanner, _dir) = setup();
        let source = ssh_source(&scanner);
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/ok.mp3", vec![0; 8]);
        connector.add_file("/srv/music/locked/x.mp3", vec![0; 8]);
        connector.fail_dir("/srv/music/locked");

        let outcome = scanner.scan(&connector, &source);
        assert!(matches!(outcome, ScanOutcome::Failed(_)));
        let status = scanner.catalog().get_status(&source.id).unwrap().unwrap();
        assert_eq!(status.status, ScanState::Error);
        assert_eq!(status.progress, 0.0);
        assert!(!status.last_error.unwrap_or_default().is_empty());
        assert_eq!(scanner.catalog().track_count(&source.id).unwrap(), 0);
        assert_eq!(connector.open_sessions(), 0);
    }

    #[test]
    fn connect_failure_marks_error() {
        let (scanner, _dir) = setup();
        let source = ssh_source(&scanner);
        let connector = MemoryConnector::new();
        connector.fail_connect(Some(RemoteError::Auth("denied".to_string())));
        let outcome = scanner.scan(&connector, &source);
        match outcome {
            ScanOutcome::Failed(message) => assert!(message.contains("denied")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn empty_tree_completes_immediately() {
        let (scanner, _dir) = setup();
        let mut new = new_source(SourceKind::Smb);
        new.base_path = None;
        let source = scanner.catalog().create_source(new).unwrap();
        let connector = MemoryConnector::new();
        connector.add_file("readme.txt", vec![0]);

        let outcome = scanner.scan(&connector, &source);
        assert_eq!(
            outcome,
            ScanOutcome::Complete {
                total: 0,
                recorded: 0,
                skipped: 0
            }
        );
        let status = scanner.catalog().get_status(&source.id).unwrap().unwrap();
        assert_eq!(status.status, ScanState::Complete);
        assert_eq!(status.progress, 100.0);
    }

    #[test]
    fn unopenable_file_is_skipped_but_counted() {
        let (scanner, _dir) = setup();
        let source = ssh_source(&scanner);
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/a.mp3", vec![0; 8]);
        connector.add_file("/srv/music/b.mp3", vec![0; 8]);
        connector.fail_file("/srv/music/a.mp3");

        let outcome = scanner.scan(&connector, &source);
        assert_eq!(
            outcome,
            ScanOutcome::Complete {
                total: 2,
                recorded: 1,
                skipped: 1
            }
        );
        let status = scanner.catalog().get_status(&source.id).unwrap().unwrap();
        assert_eq!(status.scanned_files, 2);
        assert_eq!(connector.open_readers(), 0);
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let mut tracker = ProgressTracker::new(25);
        let mut seen = Vec::new();
        for index in 0..25 {
            if let Some(value) = tracker.checkpoint(index) {
                seen.push(value);
            }
        }
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(seen[0] > 5.0);
        assert_eq!(*seen.last().unwrap(), 100.0);
    }

    #[test]
    fn single_file_checkpoint_is_final() {
        let mut tracker = ProgressTracker::new(1);
        assert_eq!(tracker.checkpoint(0), Some(100.0));
        assert_eq!(ProgressTracker::new(0).checkpoint(0), None);
    }
}

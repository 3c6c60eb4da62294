//! In-process remote tree used by tests in place of real SMB/SFTP servers.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use common::Source;
use parking_lot::Mutex;

use crate::{
    filter_shares, Connector, PathStyle, ReadSeek, RemoteEntry, RemoteError, RemoteSession,
    RemoteSource, ShareQuery,
};

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, (Arc<Vec<u8>>, SystemTime)>,
    failing_dirs: HashSet<String>,
    failing_files: HashSet<String>,
    connect_error: Option<RemoteError>,
    shares: Vec<String>,
    connects: usize,
    disconnects: usize,
    open_readers: usize,
}

/// Shared handle onto one fake remote; clones observe the same tree and
/// counters.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file; SMB-style paths are relative, SFTP-style paths absolute.
    pub fn add_file(&self, path: &str, data: Vec<u8>) {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        self.state
            .lock()
            .files
            .insert(path.to_string(), (Arc::new(data), modified));
    }

    pub fn remove_file(&self, path: &str) {
        self.state.lock().files.remove(path);
    }

    pub fn fail_dir(&self, path: &str) {
        self.state.lock().failing_dirs.insert(path.to_string());
    }

    pub fn fail_file(&self, path: &str) {
        self.state.lock().failing_files.insert(path.to_string());
    }

    pub fn fail_connect(&self, error: Option<RemoteError>) {
        self.state.lock().connect_error = error;
    }

    pub fn set_shares(&self, shares: &[&str]) {
        self.state.lock().shares = shares.iter().map(|s| s.to_string()).collect();
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn open_sessions(&self) -> usize {
        let state = self.state.lock();
        state.connects - state.disconnects
    }

    pub fn open_readers(&self) -> usize {
        self.state.lock().open_readers
    }
}

impl Connector for MemoryConnector {
    fn open(&self, source: &Source) -> Result<RemoteSession, RemoteError> {
        let client = MemorySource {
            state: self.state.clone(),
            style: PathStyle::for_kind(source.kind),
            connected: false,
        };
        RemoteSession::connect(Box::new(client), source.base_path.as_deref())
    }

    fn enumerate_shares(&self, _query: &ShareQuery) -> Result<Vec<String>, RemoteError> {
        let state = self.state.lock();
        if let Some(err) = state.connect_error.clone() {
            return Err(err);
        }
        Ok(filter_shares(state.shares.clone()))
    }
}

pub struct MemorySource {
    state: Arc<Mutex<MemoryState>>,
    style: PathStyle,
    connected: bool,
}

impl RemoteSource for MemorySource {
    fn connect(&mut self) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if let Some(err) = state.connect_error.clone() {
            return Err(err);
        }
        state.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.state.lock().disconnects += 1;
        }
    }

    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        if !self.connected {
            return Err(RemoteError::NotConnected);
        }
        let state = self.state.lock();
        if state.failing_dirs.contains(path) {
            return Err(RemoteError::Io(format!("{}: permission denied", path)));
        }

        let prefix = if path.is_empty() || path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        let mut entries: Vec<RemoteEntry> = Vec::new();
        for (key, (_, modified)) in &state.files {
            if path.is_empty() && key.starts_with('/') {
                continue;
            }
            let rest = match key.strip_prefix(&prefix) {
                Some(rest) if !rest.is_empty() => rest,
                _ => continue,
            };
            let (name, is_dir) = match rest.find('/') {
                Some(idx) => (&rest[..idx], true),
                None => (rest, false),
            };
            if entries.iter().any(|entry| entry.name == name) {
                continue;
            }
            entries.push(RemoteEntry {
                name: name.to_string(),
                is_dir,
                modified: Some(*modified),
            });
        }

        if entries.is_empty() && path != self.style.root() {
            return Err(RemoteError::Io(format!("{}: no such directory", path)));
        }
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek + '_>, RemoteError> {
        if !self.connected {
            return Err(RemoteError::NotConnected);
        }
        let mut state = self.state.lock();
        if state.failing_files.contains(path) {
            return Err(RemoteError::Io(format!("{}: permission denied", path)));
        }
        let data = match state.files.get(path) {
            Some((data, _)) => data.clone(),
            None => return Err(RemoteError::Io(format!("{}: no such file", path))),
        };
        state.open_readers += 1;
        Ok(Box::new(TrackedReader {
            cursor: Cursor::new(data),
            state: self.state.clone(),
        }))
    }

    fn path_style(&self) -> PathStyle {
        self.style
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct TrackedReader {
    cursor: Cursor<Arc<Vec<u8>>>,
    state: Arc<Mutex<MemoryState>>,
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.cursor.position() as usize;
        let data = self.cursor.get_ref();
        if pos >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.cursor.set_position((pos + n) as u64);
        Ok(n)
    }
}

impl Seek for TrackedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.cursor.get_ref().len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.cursor.position() as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.cursor.set_position(target as u64);
        Ok(target as u64)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.state.lock().open_readers -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_children_once_in_order() {
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/b/2.mp3", vec![2]);
        connector.add_file("/srv/music/a.mp3", vec![1]);
        connector.add_file("/srv/music/b/1.mp3", vec![1]);
        connector.add_file("Music/x.mp3", vec![1]);

        let mut client = MemorySource {
            state: connector.state.clone(),
            style: PathStyle::Absolute,
            connected: false,
        };
        client.connect().unwrap();
        let names: Vec<(String, bool)> = client
            .list_dir("/srv/music")
            .unwrap()
            .into_iter()
            .map(|entry| (entry.name, entry.is_dir))
            .collect();
        assert_eq!(names, vec![("a.mp3".to_string(), false), ("b".to_string(), true)]);

        let root: Vec<String> = client.list_dir("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(root, vec!["srv".to_string()]);
        assert!(client.list_dir("/missing").is_err());
    }

    #[test]
    fn readers_are_tracked_and_seekable() {
        let connector = MemoryConnector::new();
        connector.add_file("a.mp3", (0u8..10).collect());
        let mut client = MemorySource {
            state: connector.state.clone(),
            style: PathStyle::ShareRelative,
            connected: false,
        };
        client.connect().unwrap();
        {
            let mut reader = client.open_read("a.mp3").unwrap();
            assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), 10);
            reader.seek(SeekFrom::Start(7)).unwrap();
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest).unwrap();
            assert_eq!(rest, vec![7, 8, 9]);
            assert_eq!(connector.open_readers(), 1);
        }
        assert_eq!(connector.open_readers(), 0);
        client.disconnect();
        client.disconnect();
        assert_eq!(connector.disconnects(), 1);
    }
}

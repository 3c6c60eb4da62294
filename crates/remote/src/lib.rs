//! Uniform access to remote file trees (SMB shares, SFTP servers).
//!
//! A backend is driven through [`RemoteSource`]; callers normally hold a
//! [`RemoteSession`], which is connected on creation and disconnected when
//! dropped. Sessions are never pooled: every scan, test and stream opens its
//! own.

use std::fmt;
use std::io::{Read, Seek};
use std::time::SystemTime;

use common::{Source, SourceKind};

pub mod path;

#[cfg(any(test, feature = "testing"))]
pub mod memory;
#[cfg(feature = "smb")]
pub mod smb;
#[cfg(feature = "sftp")]
pub mod ssh;

pub use path::PathStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Auth(String),
    Network(String),
    Io(String),
    Invalid(String),
    Unsupported(SourceKind),
    NotConnected,
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Auth(msg) => write!(f, "authentication failed: {}", msg),
            RemoteError::Network(msg) => write!(f, "connection failed: {}", msg),
            RemoteError::Io(msg) => write!(f, "remote io error: {}", msg),
            RemoteError::Invalid(msg) => write!(f, "{}", msg),
            RemoteError::Unsupported(kind) => {
                write!(f, "{} sources are not supported by this build", kind.as_str())
            }
            RemoteError::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Io(err.to_string())
    }
}

pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// One protocol client.
///
/// `disconnect` must release everything the session holds and be safe to
/// call more than once.
pub trait RemoteSource {
    fn connect(&mut self) -> Result<(), RemoteError>;
    fn disconnect(&mut self);
    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek + '_>, RemoteError>;
    fn path_style(&self) -> PathStyle;
}

/// A connected [`RemoteSource`] scoped to one operation.
pub struct RemoteSession {
    inner: Box<dyn RemoteSource>,
    base: String,
}

impl RemoteSession {
    pub fn connect(mut inner: Box<dyn RemoteSource>, base_path: Option<&str>) -> Result<Self, RemoteError> {
        if let Err(err) = inner.connect() {
            inner.disconnect();
            return Err(err);
        }
        let base = inner.path_style().base(base_path);
        Ok(RemoteSession { inner, base })
    }

    /// Configured base path in the backend's path style.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn path_style(&self) -> PathStyle {
        self.inner.path_style()
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.inner.list_dir(path)
    }

    pub fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek + '_>, RemoteError> {
        self.inner.open_read(path)
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShareQuery {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

/// Turns stored sources into live sessions.
pub trait Connector: Send + Sync {
    fn open(&self, source: &Source) -> Result<RemoteSession, RemoteError>;
    fn enumerate_shares(&self, query: &ShareQuery) -> Result<Vec<String>, RemoteError>;
}

/// Connector backed by the real protocol clients compiled into this build.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolConnector;

impl Connector for ProtocolConnector {
    fn open(&self, source: &Source) -> Result<RemoteSession, RemoteError> {
        match source.kind {
            #[cfg(feature = "smb")]
            SourceKind::Smb => {
                let client = smb::SmbSource::from_source(source)?;
                RemoteSession::connect(Box::new(client), source.base_path.as_deref())
            }
            #[cfg(feature = "sftp")]
            SourceKind::Ssh => {
                let client = ssh::SshSource::from_source(source);
                RemoteSession::connect(Box::new(client), source.base_path.as_deref())
            }
            #[allow(unreachable_patterns)]
            kind => Err(RemoteError::Unsupported(kind)),
        }
    }

    fn enumerate_shares(&self, query: &ShareQuery) -> Result<Vec<String>, RemoteError> {
        #[cfg(feature = "smb")]
        {
            smb::enumerate_shares(query)
        }
        #[cfg(not(feature = "smb"))]
        {
            let _ = query;
            Err(RemoteError::Unsupported(SourceKind::Smb))
        }
    }
}

/// Connects and lists the base path, the same check a scan starts with.
pub fn test_connection(connector: &dyn Connector, source: &Source) -> Result<usize, RemoteError> {
    if source.kind == SourceKind::Smb
        && source.share.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(RemoteError::Invalid("share name is required for SMB sources".to_string()));
    }
    let session = connector.open(source)?;
    let entries = session.list_dir(session.base())?;
    Ok(entries.len())
}

/// Drops administrative and hidden shares from a server listing.
pub fn filter_shares<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    const ADMIN_SHARES: &[&str] = &["IPC$", "print$", "ADMIN$", "C$", "D$"];
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| !name.is_empty())
        .filter(|name| !ADMIN_SHARES.contains(&name.as_str()) && !name.ends_with('$'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;

    fn source(kind: SourceKind, share: Option<&str>) -> Source {
        Source {
            id: "src".to_string(),
            name: "test".to_string(),
            kind,
            host: "nas.local".to_string(),
            port: kind.default_port(),
            username: None,
            password: None,
            domain: None,
            share: share.map(str::to_string),
            base_path: None,
            enabled: true,
            created_at: common::now_timestamp(),
            updated_at: common::now_timestamp(),
        }
    }

    #[test]
    fn admin_shares_are_filtered() {
        let shares = filter_shares(["music", "IPC$", "print$", "ADMIN$", "C$", "D$", "backup$", "video"]);
        assert_eq!(shares, vec!["music".to_string(), "video".to_string()]);
    }

    #[test]
    fn session_disconnects_on_drop() {
        let connector = MemoryConnector::new();
        connector.add_file("/srv/a.mp3", vec![1, 2, 3]);
        {
            let session = connector.open(&source(SourceKind::Ssh, None)).unwrap();
            assert_eq!(session.base(), "/");
            assert_eq!(connector.open_sessions(), 1);
        }
        assert_eq!(connector.open_sessions(), 0);
        assert_eq!(connector.disconnects(), 1);
    }

    #[test]
    fn failed_connect_is_released() {
        let connector = MemoryConnector::new();
        connector.fail_connect(Some(RemoteError::Auth("bad password".to_string())));
        let err = connector.open(&source(SourceKind::Ssh, None)).err().unwrap();
        assert!(err.is_auth());
        assert_eq!(connector.open_sessions(), 0);
    }

    #[test]
    fn smb_test_requires_share() {
        let connector = MemoryConnector::new();
        let err = test_connection(&connector, &source(SourceKind::Smb, None)).unwrap_err();
        assert!(matches!(err, RemoteError::Invalid(_)));

        connector.add_file("Music/a.mp3", vec![0]);
        let listed = test_connection(&connector, &source(SourceKind::Smb, Some("music"))).unwrap();
        assert_eq!(listed, 1);
    }
}

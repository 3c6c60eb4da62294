use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, SystemTime};

use common::Source;
use ssh2::{Session, Sftp};
use tracing::debug;

use crate::{PathStyle, ReadSeek, RemoteEntry, RemoteError, RemoteSource};

const DEFAULT_PORT: u16 = 22;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SshSource {
    host: String,
    port: u16,
    username: String,
    password: String,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl SshSource {
    pub fn from_source(source: &Source) -> Self {
        SshSource {
            host: source.host.trim().to_string(),
            port: if source.port == 0 { DEFAULT_PORT } else { source.port },
            username: source.username.clone().unwrap_or_default(),
            password: source.password.clone().unwrap_or_default(),
            session: None,
            sftp: None,
        }
    }

    fn sftp(&self) -> Result<&Sftp, RemoteError> {
        self.sftp.as_ref().ok_or(RemoteError::NotConnected)
    }

    fn dial(&self) -> Result<TcpStream, RemoteError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| RemoteError::Network(format!("{}: {}", self.host, err)))?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(RemoteError::Network(match last_err {
            Some(err) => format!("{}:{}: {}", self.host, self.port, err),
            None => format!("{}: no addresses", self.host),
        }))
    }
}

impl RemoteSource for SshSource {
    fn connect(&mut self) -> Result<(), RemoteError> {
        let tcp = self.dial()?;
        let mut session = Session::new().map_err(|err| RemoteError::Network(err.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
        session
            .handshake()
            .map_err(|err| RemoteError::Network(err.to_string()))?;
        // Host keys are not checked.
        session
            .userauth_password(&self.username, &self.password)
            .map_err(|err| RemoteError::Auth(err.to_string()))?;
        if !session.authenticated() {
            return Err(RemoteError::Auth("server rejected credentials".to_string()));
        }
        // Reads on an open stream may legitimately sit idle for a while.
        session.set_timeout(0);
        let sftp = session.sftp().map_err(|err| RemoteError::Network(err.to_string()))?;
        debug!("sftp session open on {}:{}", self.host, self.port);
        self.sftp = Some(sftp);
        self.session = Some(session);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sftp.take();
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "closing", None);
            debug!("sftp session closed on {}:{}", self.host, self.port);
        }
    }

    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let sftp = self.sftp()?;
        let listing = sftp
            .readdir(Path::new(path))
            .map_err(|err| RemoteError::Io(format!("{}: {}", path, err)))?;
        let entries = listing
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                Some(RemoteEntry {
                    name,
                    is_dir: stat.is_dir(),
                    modified: stat
                        .mtime
                        .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
                })
            })
            .collect();
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek + '_>, RemoteError> {
        let file = self
            .sftp()?
            .open(Path::new(path))
            .map_err(|err| RemoteError::Io(format!("{}: {}", path, err)))?;
        Ok(Box::new(file))
    }

    fn path_style(&self) -> PathStyle {
        PathStyle::Absolute
    }
}

impl Drop for SshSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SourceKind;

    #[test]
    fn zero_port_means_default() {
        let source = Source {
            id: "s".to_string(),
            name: "box".to_string(),
            kind: SourceKind::Ssh,
            host: " media.local ".to_string(),
            port: 0,
            username: Some("me".to_string()),
            password: None,
            domain: None,
            share: None,
            base_path: Some("/srv/music".to_string()),
            enabled: true,
            created_at: common::now_timestamp(),
            updated_at: common::now_timestamp(),
        };
        let client = SshSource::from_source(&source);
        assert_eq!(client.port, 22);
        assert_eq!(client.host, "media.local");
        assert!(matches!(client.list_dir("/"), Err(RemoteError::NotConnected)));
    }
}

use common::Source;
use pavao::{SmbClient, SmbCredentials, SmbDirentType, SmbOpenOptions, SmbOptions};
use tracing::debug;

use crate::{filter_shares, PathStyle, ReadSeek, RemoteEntry, RemoteError, RemoteSource, ShareQuery};

const DEFAULT_PORT: u16 = 445;

pub struct SmbSource {
    server: String,
    share: String,
    username: String,
    password: String,
    workgroup: String,
    client: Option<SmbClient>,
}

impl SmbSource {
    pub fn from_source(source: &Source) -> Result<Self, RemoteError> {
        let share = source
            .share
            .as_deref()
            .map(|s| s.trim().trim_matches(|c| c == '/' || c == '\\'))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RemoteError::Invalid("share name is required for SMB sources".to_string()))?;
        Ok(SmbSource {
            server: server_url(&source.host, source.port),
            share: format!("/{}", share),
            username: source.username.clone().unwrap_or_default(),
            password: source.password.clone().unwrap_or_default(),
            workgroup: source.domain.clone().unwrap_or_default(),
            client: None,
        })
    }

    fn client(&self) -> Result<&SmbClient, RemoteError> {
        self.client.as_ref().ok_or(RemoteError::NotConnected)
    }
}

impl RemoteSource for SmbSource {
    fn connect(&mut self) -> Result<(), RemoteError> {
        let client = new_client(&self.server, &self.share, &self.username, &self.password, &self.workgroup)?;
        // libsmbclient connects lazily; listing the share root forces the
        // dial, authentication and tree connect.
        client.list_dir("/").map_err(|err| classify(err.to_string()))?;
        debug!("smb session open on {}{}", self.server, self.share);
        self.client = Some(client);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            debug!("smb session closed on {}{}", self.server, self.share);
        }
    }

    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let client = self.client()?;
        let native = native_path(path);
        let dirents = client
            .list_dir(&native)
            .map_err(|err| RemoteError::Io(format!("{}: {}", path, err)))?;
        let mut entries = Vec::with_capacity(dirents.len());
        for dirent in dirents {
            let is_dir = match dirent.get_type() {
                SmbDirentType::Dir => true,
                SmbDirentType::File => false,
                _ => continue,
            };
            let name = dirent.name().to_string();
            let modified = if is_dir {
                None
            } else {
                let full = PathStyle::ShareRelative.join(path, &name);
                client.stat(native_path(&full)).ok().map(|stat| stat.modified)
            };
            entries.push(RemoteEntry { name, is_dir, modified });
        }
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek + '_>, RemoteError> {
        let client = self.client()?;
        let file = client
            .open_with(native_path(path), SmbOpenOptions::default().read(true))
            .map_err(|err| RemoteError::Io(format!("{}: {}", path, err)))?;
        Ok(Box::new(file))
    }

    fn path_style(&self) -> PathStyle {
        PathStyle::ShareRelative
    }
}

impl Drop for SmbSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Lists the shares a server exposes, without the administrative ones.
pub fn enumerate_shares(query: &ShareQuery) -> Result<Vec<String>, RemoteError> {
    let host = query.host.trim();
    if host.is_empty() {
        return Err(RemoteError::Invalid("host is required".to_string()));
    }
    let client = new_client(
        &server_url(host, DEFAULT_PORT),
        "",
        query.username.as_deref().unwrap_or_default(),
        query.password.as_deref().unwrap_or_default(),
        query.domain.as_deref().unwrap_or_default(),
    )?;
    let dirents = client.list_dir("").map_err(|err| classify(err.to_string()))?;
    let names = dirents
        .into_iter()
        .filter(|dirent| matches!(dirent.get_type(), SmbDirentType::FileShare))
        .map(|dirent| dirent.name().to_string());
    Ok(filter_shares(names))
}

fn new_client(
    server: &str,
    share: &str,
    username: &str,
    password: &str,
    workgroup: &str,
) -> Result<SmbClient, RemoteError> {
    let credentials = SmbCredentials::default()
        .server(server)
        .share(share)
        .username(username)
        .password(password)
        .workgroup(workgroup);
    SmbClient::new(credentials, SmbOptions::default().one_share_per_server(true))
        .map_err(|err| RemoteError::Network(err.to_string()))
}

fn server_url(host: &str, port: u16) -> String {
    let host = host.trim().trim_start_matches("smb://").trim_end_matches('/');
    if port == 0 || port == DEFAULT_PORT {
        format!("smb://{}", host)
    } else {
        format!("smb://{}:{}", host, port)
    }
}

fn native_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// libsmbclient only surfaces errno text, so credential problems are told
/// apart from transport ones by message.
fn classify(message: String) -> RemoteError {
    let lower = message.to_ascii_lowercase();
    let auth_markers = [
        "permission denied",
        "access denied",
        "logon failure",
        "operation not permitted",
        "authentication",
    ];
    if auth_markers.iter().any(|marker| lower.contains(marker)) {
        RemoteError::Auth(message)
    } else {
        RemoteError::Network(message)
    }
}

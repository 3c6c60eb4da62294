use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav", "aac"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Smb,
    Ssh,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Smb => "smb",
            SourceKind::Ssh => "ssh",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "smb" => Some(SourceKind::Smb),
            "ssh" | "sftp" => Some(SourceKind::Ssh),
            _ => None,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            SourceKind::Smb => 445,
            SourceKind::Ssh => 22,
        }
    }
}

/// A remote share registered in the catalog.
///
/// Credentials are kept in plaintext; the password is accepted from clients
/// but never serialized back out.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Starting,
    Scanning,
    Complete,
    Error,
}

impl ScanState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Starting => "starting",
            ScanState::Scanning => "scanning",
            ScanState::Complete => "complete",
            ScanState::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "starting" => Some(ScanState::Starting),
            "scanning" => Some(ScanState::Scanning),
            "complete" => Some(ScanState::Complete),
            "error" => Some(ScanState::Error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub source_id: String,
    pub status: ScanState,
    pub progress: f64,
    pub total_files: u64,
    pub scanned_files: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

/// A directory that directly contains catalogued tracks.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub path: String,
    pub source_id: String,
    pub track_count: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_mtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artists_display: Option<String>,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    pub created_at: String,
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(SystemTime::now())
}

pub fn format_timestamp(value: SystemTime) -> String {
    OffsetDateTime::from(value)
        .format(&Rfc3339)
        .unwrap_or_else(|_| unix_secs(value).to_string())
}

pub fn parse_timestamp(value: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .ok()
        .map(SystemTime::from)
}

fn unix_secs(value: SystemTime) -> u64 {
    value
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Last segment of a `/`-separated logical path.
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Parent directory of a logical path, `None` at the root of the tree.
pub fn folder_of(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}

pub fn extension_of(name: &str) -> Option<String> {
    let file = file_name_of(name);
    let idx = file.rfind('.')?;
    if idx + 1 >= file.len() {
        return None;
    }
    Some(file[idx + 1..].to_ascii_lowercase())
}

pub fn is_audio_file(name: &str) -> bool {
    extension_of(name)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        let first = stable_id("ArtistAlbum");
        let second = stable_id("ArtistAlbum");
        assert_eq!(first, second);
        assert_ne!(first, stable_id("ArtistAlbum2"));
    }

    #[test]
    fn audio_extension_is_case_insensitive() {
        assert!(is_audio_file("Music/track.MP3"));
        assert!(is_audio_file("a.flac"));
        assert!(!is_audio_file("cover.jpg"));
        assert!(!is_audio_file("mp3"));
        assert!(!is_audio_file("trailing."));
    }

    #[test]
    fn folder_and_name_of_logical_paths() {
        assert_eq!(folder_of("Music/Album/01.mp3").as_deref(), Some("Music/Album"));
        assert_eq!(folder_of("/srv/music/01.mp3").as_deref(), Some("/srv/music"));
        assert_eq!(folder_of("/01.mp3").as_deref(), Some("/"));
        assert_eq!(folder_of("01.mp3"), None);
        assert_eq!(file_name_of("Music/Album/01.mp3"), "01.mp3");
        assert_eq!(file_name_of("01.mp3"), "01.mp3");
    }

    #[test]
    fn timestamps_round_trip_through_rfc3339() {
        let now = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let text = format_timestamp(now);
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(parse_timestamp(&text), Some(now));
    }

    #[test]
    fn source_never_serializes_password() {
        let source = Source {
            id: "s1".to_string(),
            name: "NAS".to_string(),
            kind: SourceKind::Smb,
            host: "nas.local".to_string(),
            port: 445,
            username: Some("me".to_string()),
            password: Some("secret".to_string()),
            domain: None,
            share: Some("music".to_string()),
            base_path: None,
            enabled: true,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("domain").is_none());
        assert_eq!(json["type"], "smb");
        assert_eq!(json["share"], "music");
    }
}

use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use common::{extension_of, file_name_of, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use lofty::error::LoftyError;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;
use tracing::warn;

pub mod artists;
pub mod mp3;

pub use artists::{split_artists, ArtistCredit};

/// Raw tag values as found in the file, before any fallbacks are applied.
#[derive(Debug, Default, Clone)]
pub struct TagInfo {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track_no: Option<u32>,
    pub year: Option<i32>,
    pub duration_secs: Option<f64>,
    pub cover: Option<CoverArt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

impl CoverArt {
    /// File extension for the cached image: MIME type first, then magic
    /// bytes, `jpg` otherwise.
    pub fn extension(&self) -> &'static str {
        let from_mime = self.mime.as_deref().and_then(|mime| {
            match mime.trim().to_ascii_lowercase().as_str() {
                "image/jpeg" | "image/jpg" => Some("jpg"),
                "image/png" => Some("png"),
                "image/gif" => Some("gif"),
                "image/webp" => Some("webp"),
                "image/bmp" => Some("bmp"),
                _ => None,
            }
        });
        from_mime
            .or_else(|| guess_mime(&self.data).map(|(_, ext)| ext))
            .unwrap_or("jpg")
    }
}

/// Everything the catalog needs to know about one audio file.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub artists_display: String,
    pub album: String,
    pub track_number: Option<u32>,
    pub year: Option<i32>,
    pub duration_secs: f64,
    pub cover: Option<CoverArt>,
}

impl TrackMetadata {
    pub fn from_tags(info: TagInfo, path: &str, frame_duration: f64) -> Self {
        let credit = split_artists(info.artist.as_deref().unwrap_or_default());
        let title = non_empty(info.title).unwrap_or_else(|| file_name_of(path).to_string());
        let album = non_empty(info.album).unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        TrackMetadata {
            title,
            artist: credit.primary,
            artists_display: credit.display,
            album,
            track_number: info.track_no,
            year: info.year,
            duration_secs: pick_duration(frame_duration, info.duration_secs),
            cover: info.cover,
        }
    }

    /// Record used when the tags cannot be parsed at all.
    pub fn fallback(path: &str, duration_secs: f64) -> Self {
        TrackMetadata {
            title: file_name_of(path).to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            artists_display: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            track_number: None,
            year: None,
            duration_secs,
            cover: None,
        }
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Reads duration, tags and artwork from an open stream.
///
/// Never fails: unreadable tags produce [`TrackMetadata::fallback`] with
/// whatever duration could be computed. mp3 files are buffered once so the
/// packet walk and the tag reader share the same bytes.
pub fn extract<R: Read + Seek>(reader: &mut R, path: &str) -> TrackMetadata {
    if extension_of(path).as_deref() != Some("mp3") {
        return match read_tags(reader) {
            Ok(info) => TrackMetadata::from_tags(info, path, 0.0),
            Err(err) => {
                warn!("tag parse failed for {}: {}", path, err);
                TrackMetadata::fallback(path, 0.0)
            }
        };
    }

    let mut buf = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buf) {
        warn!("read failed for {}: {}", path, err);
        return TrackMetadata::fallback(path, 0.0);
    }
    let data: Arc<[u8]> = buf.into();
    let frame_duration = mp3::frame_duration(Cursor::new(Arc::clone(&data)));

    match read_tags(&mut Cursor::new(data)) {
        Ok(info) => TrackMetadata::from_tags(info, path, frame_duration),
        Err(err) => {
            warn!("tag parse failed for {}: {}", path, err);
            TrackMetadata::fallback(path, frame_duration)
        }
    }
}

pub fn read_tags<R: Read + Seek>(reader: &mut R) -> Result<TagInfo, MetadataError> {
    let tagged_file = Probe::new(reader).guess_file_type()?.read()?;
    let properties = tagged_file.properties();

    let mut info = TagInfo::default();
    let duration = properties.duration().as_secs_f64();
    if duration > 0.0 {
        info.duration_secs = Some(duration);
    }

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        info.title = tag.get_string(&ItemKey::TrackTitle).map(|v| v.to_string());
        info.album = tag.get_string(&ItemKey::AlbumTitle).map(|v| v.to_string());
        let track_artist = tag.get_string(&ItemKey::TrackArtist).map(|v| v.to_string());
        let album_artist = tag.get_string(&ItemKey::AlbumArtist).map(|v| v.to_string());
        info.artist = non_empty(track_artist).or_else(|| non_empty(album_artist));
        info.track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_number);
        info.year = tag
            .get_string(&ItemKey::Year)
            .and_then(parse_year)
            .or_else(|| tag.get_string(&ItemKey::RecordingDate).and_then(parse_year));
        info.cover = pick_picture(tag.pictures()).map(|picture| {
            let data = picture.data().to_vec();
            let mime = picture
                .mime_type()
                .map(|mime| mime.as_str().to_string())
                .or_else(|| guess_mime(&data).map(|(mime, _)| mime.to_string()));
            CoverArt { data, mime }
        });
    }

    Ok(info)
}

fn pick_duration(frame_duration: f64, container: Option<f64>) -> f64 {
    if frame_duration > 0.0 {
        frame_duration
    } else {
        container.unwrap_or(0.0)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(text: &str) -> Option<u32> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    pictures
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
}

fn guess_mime(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(("image/jpeg", "jpg"))
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some(("image/png", "png"))
    } else if bytes.starts_with(b"GIF8") {
        Some(("image/gif", "gif"))
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(("image/webp", "webp"))
    } else {
        None
    }
}

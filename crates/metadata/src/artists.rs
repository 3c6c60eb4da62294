use common::UNKNOWN_ARTIST;

/// Checked in order; the first one present in a credit decides the split.
const SEPARATORS: &[&str] = &[" / ", "/", "; ", ";", ", "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCredit {
    pub primary: String,
    pub display: String,
}

/// Splits a raw multi-artist credit into the primary artist and a
/// comma-joined display string.
pub fn split_artists(raw: &str) -> ArtistCredit {
    let raw = raw.trim();
    if raw.is_empty() {
        return ArtistCredit {
            primary: UNKNOWN_ARTIST.to_string(),
            display: UNKNOWN_ARTIST.to_string(),
        };
    }

    let primary = match SEPARATORS.iter().find(|sep| raw.contains(**sep)) {
        Some(sep) => raw
            .split(*sep)
            .map(str::trim)
            .find(|part| !part.is_empty())
            .unwrap_or(raw)
            .to_string(),
        None => raw.to_string(),
    };

    let mut display = raw.to_string();
    for sep in SEPARATORS {
        display = display.replace(sep, ", ");
    }

    ArtistCredit { primary, display }
}

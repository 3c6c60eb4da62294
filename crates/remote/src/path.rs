use common::SourceKind;

/// How a backend spells paths in its logical tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// Relative to a mounted share, root is the empty string (`Music/a.mp3`).
    ShareRelative,
    /// POSIX absolute, root is `/` (`/srv/music/a.mp3`).
    Absolute,
}

impl PathStyle {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Smb => PathStyle::ShareRelative,
            SourceKind::Ssh => PathStyle::Absolute,
        }
    }

    pub fn root(self) -> &'static str {
        match self {
            PathStyle::ShareRelative => "",
            PathStyle::Absolute => "/",
        }
    }

    /// Normalizes a configured base path into this style; blank means root.
    pub fn base(self, configured: Option<&str>) -> String {
        let raw = configured.map(str::trim).unwrap_or("").replace('\\', "/");
        match self {
            PathStyle::ShareRelative => {
                let trimmed = raw.trim_matches('/');
                if trimmed == "." {
                    String::new()
                } else {
                    trimmed.trim_start_matches("./").to_string()
                }
            }
            PathStyle::Absolute => {
                let trimmed = raw.trim_end_matches('/');
                if trimmed.is_empty() {
                    "/".to_string()
                } else if trimmed.starts_with('/') {
                    trimmed.to_string()
                } else {
                    format!("/{}", trimmed)
                }
            }
        }
    }

    pub fn join(self, dir: &str, name: &str) -> String {
        if dir.is_empty() {
            name.to_string()
        } else if dir.ends_with('/') {
            format!("{}{}", dir, name)
        } else {
            format!("{}/{}", dir, name)
        }
    }
}

use std::time::SystemTime;

use common::is_audio_file;
use remote::{RemoteError, RemoteSession};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlEntry {
    pub path: String,
    pub modified: Option<SystemTime>,
}

/// Walks the session's base path depth first and returns every audio file.
///
/// The whole list is built before anything is processed; a directory that
/// cannot be read fails the crawl.
pub fn crawl(session: &RemoteSession) -> Result<Vec<CrawlEntry>, RemoteError> {
    let mut files = Vec::new();
    walk(session, session.base(), &mut files)?;
    Ok(files)
}

fn walk(session: &RemoteSession, dir: &str, files: &mut Vec<CrawlEntry>) -> Result<(), RemoteError> {
    debug!("walking {:?}", dir);
    let style = session.path_style();
    for entry in session.list_dir(dir)? {
        if is_noise(&entry.name) {
            continue;
        }
        let path = style.join(dir, &entry.name);
        if entry.is_dir {
            walk(session, &path, files)?;
        } else if is_audio_file(&entry.name) {
            files.push(CrawlEntry {
                path,
                modified: entry.modified,
            });
        }
    }
    Ok(())
}

/// Self/parent links, AppleDouble resource forks and administrative shares.
pub fn is_noise(name: &str) -> bool {
    name.is_empty() || name == "." || name == ".." || name.starts_with("._") || name.starts_with('$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::new_source;
    use common::SourceKind;
    use remote::memory::MemoryConnector;
    use remote::Connector;

    fn tree() -> MemoryConnector {
        let connector = MemoryConnector::new();
        connector.add_file("/srv/music/._hidden.mp3", vec![0]);
        connector.add_file("/srv/music/$admin/inside.mp3", vec![0]);
        connector.add_file("/srv/music/cover.jpg", vec![0]);
        connector.add_file("/srv/music/sub/a.flac", vec![0]);
        connector.add_file("/srv/music/sub/deeper/b.ogg", vec![0]);
        connector.add_file("/srv/music/track.MP3", vec![0]);
        connector
    }

    fn ssh_source(base: &str) -> common::Source {
        let catalog = crate::Catalog::new(crate::db::init_memory_pool().unwrap());
        let mut new = new_source(SourceKind::Ssh);
        new.base_path = Some(base.to_string());
        catalog.create_source(new).unwrap()
    }

    #[test]
    fn filters_noise_and_keeps_audio_depth_first() {
        let connector = tree();
        let session = connector.open(&ssh_source("/srv/music")).unwrap();
        let paths: Vec<String> = crawl(&session).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "/srv/music/sub/a.flac".to_string(),
                "/srv/music/sub/deeper/b.ogg".to_string(),
                "/srv/music/track.MP3".to_string(),
            ]
        );
    }

    #[test]
    fn share_relative_paths_have_no_leading_slash() {
        let connector = MemoryConnector::new();
        connector.add_file("Music/a.mp3", vec![0]);
        connector.add_file("top.wav", vec![0]);
        let catalog = crate::Catalog::new(crate::db::init_memory_pool().unwrap());
        let source = catalog.create_source(new_source(SourceKind::Smb)).unwrap();
        let session = connector.open(&source).unwrap();
        let paths: Vec<String> = crawl(&session).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["Music/a.mp3".to_string(), "top.wav".to_string()]);
    }

    #[test]
    fn unreadable_directory_fails_whole_crawl() {
        let connector = tree();
        connector.fail_dir("/srv/music/sub/deeper");
        let session = connector.open(&ssh_source("/srv/music")).unwrap();
        assert!(matches!(crawl(&session), Err(RemoteError::Io(_))));
    }

    #[test]
    fn noise_names() {
        assert!(is_noise("."));
        assert!(is_noise(".."));
        assert!(is_noise("._track.mp3"));
        assert!(is_noise("$RECYCLE.BIN"));
        assert!(!is_noise(".hidden-but-real"));
        assert!(!is_noise("track.mp3"));
    }
}

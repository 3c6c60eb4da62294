use std::env;
use std::path::PathBuf;

use library::{init_pool, ArtworkCache, Catalog, ScanOutcome, Scanner};
use remote::ProtocolConnector;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let database_path = args
        .next()
        .or_else(|| env::var("CATALOG_DB").ok())
        .unwrap_or_else(|| "music.db".to_string());
    let source_id = args.next().ok_or("usage: scan_source <database> <source-id> [artwork-dir]")?;
    let artwork_dir = args.next().unwrap_or_else(|| "art".to_string());

    let catalog = Catalog::new(init_pool(&PathBuf::from(&database_path))?);
    let source = catalog
        .get_source(&source_id)?
        .ok_or_else(|| format!("no source with id {}", source_id))?;

    let scanner = Scanner::new(catalog.clone(), ArtworkCache::new(PathBuf::from(artwork_dir)));
    match scanner.scan(&ProtocolConnector, &source) {
        ScanOutcome::Complete { total, recorded, skipped } => {
            println!(
                "Scanned {}: {} files, {} recorded, {} skipped ({} tracks in catalog)",
                source.name,
                total,
                recorded,
                skipped,
                catalog.track_count(&source.id)?
            );
            Ok(())
        }
        ScanOutcome::Failed(message) => Err(format!("scan of {} failed: {}", source.name, message).into()),
    }
}

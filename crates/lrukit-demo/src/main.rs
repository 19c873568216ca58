//! lrukit demo - replays insert, overwrite and eviction against a small cache

use anyhow::{Context, Result};
use clap::Parser;
use lrukit::{EntryRef, LruCache, SharedLruCache, StatsSnapshot};
use tracing::{debug, info};

/// Inserts performed in order: the second insert of key 1 is an overwrite,
/// and with capacity 2 the insert of key 3 evicts key 2.
const INSERTS: [(i32, &str); 4] = [(1, "test1"), (2, "test2"), (1, "test1"), (3, "test3")];

const LOOKUPS: [i32; 3] = [1, 2, 3];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of items)
    #[arg(short, long, default_value_t = 2)]
    capacity: usize,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting lrukit demo v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);

    for line in run_scenario(args.capacity)? {
        println!("{}", line);
    }

    let stats = replay_shared(args.capacity)?;
    println!("stats: {}", stats);

    Ok(())
}

fn describe(cache: &LruCache<i32, String>, entry: Option<EntryRef>) -> String {
    match entry.map(|entry| cache.resolve(entry)) {
        Some(Ok(value)) => value.clone(),
        Some(Err(_)) | None => "expired".to_string(),
    }
}

/// Run the inserts, then report each lookup and every locator taken along the way.
fn run_scenario(capacity: usize) -> Result<Vec<String>> {
    let mut cache = LruCache::new(capacity).context("failed to create cache")?;
    let mut held = Vec::new();

    for (key, value) in INSERTS {
        if let Some((evicted, _)) = cache.insert(key, value.to_string()) {
            info!(key = evicted, "evicted least recently used entry");
        }
        debug!(key, len = cache.len(), "inserted");
        if let Some(entry) = cache.get_ref(&key) {
            held.push((key, entry));
        }
    }

    let mut lines = Vec::new();
    for key in LOOKUPS {
        let entry = cache.get_ref(&key);
        lines.push(format!("get({}): {}", key, describe(&cache, entry)));
    }
    for (key, entry) in held {
        lines.push(format!("held ref to {}: {}", key, describe(&cache, Some(entry))));
    }

    Ok(lines)
}

/// Same traffic through the lock-guarded cache, returning its counters.
fn replay_shared(capacity: usize) -> Result<StatsSnapshot> {
    let cache = SharedLruCache::new(capacity).context("failed to create shared cache")?;

    for (key, value) in INSERTS {
        cache.insert(key, value.to_string());
    }
    for key in LOOKUPS {
        cache.get(&key);
    }

    Ok(cache.stats().snapshot())
}

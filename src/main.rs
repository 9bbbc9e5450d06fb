use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use polysaver::clock::SystemClock;
use polysaver::config::Config;
use polysaver::settings::FileSettings;
use polysaver::{Dispatcher, WordCache, WordLookup};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("polysaver=info".parse()?),
        )
        .init();

    let words: Vec<String> = std::env::args().skip(1).collect();
    if words.is_empty() {
        eprintln!("usage: polysaver <word>...");
        std::process::exit(2);
    }

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("Failed to create {}", config.cache_dir.display()))?;

    let settings = Arc::new(FileSettings::open(&config.settings_file));
    config.seed_credentials(settings.as_ref());

    let cache = Arc::new(WordCache::open(&config.cache_dir, config.cache_config()));
    let removed = cache.clear_expired();
    info!(
        "Cache ready: {} words ({} expired removed)",
        cache.len(),
        removed
    );

    let dispatcher = Arc::new(Dispatcher::from_config(
        &config,
        settings,
        Arc::new(SystemClock),
    )?);
    info!("Preferred provider: {}", dispatcher.preferred_provider());

    let lookup = WordLookup::new(cache.clone(), dispatcher.clone());

    let found = if words.len() == 1 {
        match lookup.lookup(&words[0]).await {
            Ok(word) => vec![word],
            Err(e) => {
                warn!("Lookup failed for '{}': {}", words[0], e);
                Vec::new()
            }
        }
    } else {
        lookup.lookup_batch(&words).await.unwrap_or_else(|e| {
            warn!("Batch lookup failed: {}", e);
            Vec::new()
        })
    };

    for word in &found {
        println!("{} {}", word.head_word, word.phonetic());
        println!("    {}", word.translation_display());
        for sentence in word.sentences.iter().flatten() {
            println!("    - {} / {}", sentence.s_content, sentence.s_cn);
        }
    }

    for (provider, remaining) in dispatcher.check_all_quotas().await {
        match remaining {
            Some(n) => info!("{} quota remaining: {}", provider, n),
            None => info!("{} quota: unlimited", provider),
        }
    }

    // Persist synchronously before the runtime shuts down
    cache.save_snapshot()?;

    let stats = cache.stats();
    info!(
        "Done: {}/{} words translated, cache holds {} ({} bytes on disk)",
        found.len(),
        words.len(),
        stats.count,
        stats.disk_size_bytes
    );
    Ok(())
}

//! Hugging Face file cache for model weights and tokenizers.
//!
//! Files are fetched once from `https://huggingface.co/<repo>/resolve/main/<path>`
//! and stored under `$HOME/.cache/questionnaire-harness/models/<repo>/<path>`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

fn cache_dir() -> Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("questionnaire-harness")
        .join("models");
    std::fs::create_dir_all(&dir).map_err(|e| anyhow::anyhow!("Create cache dir: {}", e))?;
    Ok(dir)
}

/// Local path a repo file is cached at.
pub fn cached_path(repo: &str, path: &str) -> Result<PathBuf> {
    Ok(cache_dir()?.join(repo.replace('/', "--")).join(path))
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    info!(url = %url, "Downloading model file");
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?;
    let bytes = resp
        .bytes()
        .map_err(|e| anyhow::anyhow!("Read body: {}", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Create cache parent: {}", e))?;
    }
    std::fs::write(cache_path, &bytes).map_err(|e| anyhow::anyhow!("Write cache: {}", e))?;
    Ok(())
}

/// Ensure `repo/path` is in the cache and return its local path.
pub fn fetch(repo: &str, path: &str) -> Result<PathBuf> {
    let cache_path = cached_path(repo, path)?;
    download_to_cache(repo, path, &cache_path)?;
    Ok(cache_path)
}

/// Load a `tokenizer.json` from the cache, downloading it if needed.
pub fn load_tokenizer(repo: &str, path: &str) -> Result<tokenizers::Tokenizer> {
    let local = fetch(repo, path)?;
    tokenizers::Tokenizer::from_file(&local)
        .map_err(|e| anyhow::anyhow!("Load tokenizer {}: {}", local.display(), e))
}

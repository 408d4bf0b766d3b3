//! Hugging Face model file cache

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const HUB_URL: &str = "https://huggingface.co";

/// Local paths of an ONNX export and its tokenizer
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

/// Cache directory for one model repository
pub fn model_dir(cache_dir: &Path, repo: &str) -> PathBuf {
    cache_dir.join(repo.replace('/', "--"))
}

/// Make sure `model.onnx` and `tokenizer.json` for `repo` are cached,
/// downloading whatever is missing. Failures are reported through `err`.
pub async fn ensure_model_files(
    repo: &str,
    cache_dir: &Path,
    err: fn(String) -> Error,
) -> Result<ModelFiles> {
    let dir = model_dir(cache_dir, repo);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| err(format!("Failed to create cache directory {}: {}", dir.display(), e)))?;

    let files = ModelFiles {
        model: dir.join("model.onnx"),
        tokenizer: dir.join("tokenizer.json"),
    };

    if !files.model.exists() {
        let url = format!("{}/{}/resolve/main/onnx/model.onnx", HUB_URL, repo);
        download(&url, &files.model, err).await?;
    }
    if !files.tokenizer.exists() {
        let url = format!("{}/{}/resolve/main/tokenizer.json", HUB_URL, repo);
        download(&url, &files.tokenizer, err).await?;
    }

    Ok(files)
}

async fn download(url: &str, path: &Path, err: fn(String) -> Error) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| err(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(err(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| err(format!("Failed to read {}: {}", url, e)))?;

    // Rename into place only once the whole file is on disk
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|e| err(format!("Failed to save {}: {}", partial.display(), e)))?;
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| err(format!("Failed to save {}: {}", path.display(), e)))?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dir_is_flat() {
        let dir = model_dir(Path::new("/cache"), "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(
            dir,
            PathBuf::from("/cache/sentence-transformers--all-MiniLM-L6-v2")
        );
    }

    #[tokio::test]
    async fn test_cached_files_skip_download() {
        let cache = tempfile::tempdir().unwrap();
        let dir = model_dir(cache.path(), "org/model");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.onnx"), b"onnx").unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{}").unwrap();

        let files = ensure_model_files("org/model", cache.path(), Error::Embedding)
            .await
            .unwrap();
        assert_eq!(files.model, dir.join("model.onnx"));
        assert_eq!(files.tokenizer, dir.join("tokenizer.json"));
    }
}

use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::utils;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

pub const LISTS_SUBDIR: &str = "lists";
pub const OUTBOX_SUBDIR: &str = "outbox";

pub fn clean_filename<S: AsRef<str>>(name: S) -> String {
    let name_ref = name.as_ref().trim();
    if name_ref.is_empty() {
        return "invalid_empty_name".to_string();
    }

    let cleaned = config::FORBIDDEN_CHARS_RE.replace_all(name_ref, "_");
    let cleaned = config::WHITESPACE_RE.replace_all(&cleaned, "_");

    let cleaned = cleaned.trim_matches('_').to_lowercase();

    if cleaned.is_empty() {
        "invalid_or_empty_name".to_string()
    } else {
        cleaned
    }
}

pub async fn ensure_output_directories(base_dir: &Path) -> AppResult<()> {
    log(
        LogLevel::Info,
        &format!(
            "Ensuring base output directories exist under: {}",
            base_dir.display()
        ),
    );

    fs::create_dir_all(base_dir)
        .await
        .map_err(|e| map_io_error(e, base_dir))?;

    for subdir in [LISTS_SUBDIR, OUTBOX_SUBDIR] {
        let dir_path = base_dir.join(subdir);
        fs::create_dir_all(&dir_path)
            .await
            .map_err(|e| map_io_error(e, &dir_path))?;
    }
    Ok(())
}

fn map_io_error(error: std::io::Error, path: &Path) -> AppError {
    AppError::Io(format!("I/O error at path '{}': {}", path.display(), error))
}

async fn write_file_async(fpath: &Path, data: &[u8]) -> AppResult<()> {
    let mut file = File::create(fpath)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.write_all(data)
        .await
        .map_err(|e| map_io_error(e, fpath))?;
    file.flush().await.map_err(|e| map_io_error(e, fpath))?;

    Ok(())
}

fn staging_path(fpath: &Path) -> PathBuf {
    let mut name = fpath
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    fpath.with_file_name(name)
}

/// Serializes `data` and replaces `fpath` with it. The bytes go to a sibling
/// `.tmp` file that is renamed over `fpath`; a failed write removes only the
/// staged file, so the previous document stays readable.
pub async fn save_json<T>(fpath: PathBuf, data: T, log_ctx: String) -> AppResult<()>
where
    T: Serialize + Send + 'static,
{
    let json_bytes = match utils::to_pretty_json(data).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!(
                    "Save JSON ({}) FAIL - Serialize/Task Error: {}. File: '{}'",
                    log_ctx,
                    e,
                    fpath.display()
                ),
            );
            return Err(e);
        }
    };

    let staged = staging_path(&fpath);
    let written = match write_file_async(&staged, &json_bytes).await {
        Ok(()) => fs::rename(&staged, &fpath)
            .await
            .map_err(|e| map_io_error(e, &fpath)),
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        log(
            LogLevel::Error,
            &format!(
                "Save JSON ({}) FAIL - Write Error: {}. File: '{}'",
                log_ctx,
                e,
                fpath.display()
            ),
        );
        if fs::try_exists(&staged).await.unwrap_or(false) {
            let _ = fs::remove_file(&staged).await;
        }
        return Err(e);
    }
    Ok(())
}

/// Reads and parses a JSON file; `Ok(None)` when the file does not exist.
pub async fn read_json<T>(fpath: &Path) -> AppResult<Option<T>>
where
    T: DeserializeOwned,
{
    let content = match fs::read_to_string(fpath).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(map_io_error(e, fpath)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| AppError::SerdeParse(format!("{} ({})", e, fpath.display())))
}

/// All `*.json` files directly under `dir`, sorted by path.
pub async fn list_json_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(map_io_error(e, dir)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| map_io_error(e, dir))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

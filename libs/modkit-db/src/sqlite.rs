//! SQLite DSN helpers.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// File path part of `sqlite://path[?query]` / `sqlite:path`.
pub fn file_path(dsn: &str) -> Option<PathBuf> {
    if is_memory_dsn(dsn) {
        return None;
    }
    let rest = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with("file:") {
        return None;
    }
    Some(PathBuf::from(path))
}

pub fn create_parent_dirs(dsn: &str) -> std::io::Result<()> {
    if let Some(parent) = file_path(dsn).as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rewrite a relative `sqlite://` DSN so the file lives under `base_dir`.
/// In-memory DSNs are returned unchanged.
pub fn absolutize_dsn(dsn: &str, base_dir: &Path) -> String {
    if is_memory_dsn(dsn) {
        return dsn.to_string();
    }
    let Some(rest) = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
    else {
        return dsn.to_string();
    };
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    let p = Path::new(path);
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    };

    let mut out = String::from("sqlite://");
    out.push_str(&abs.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    out
}

/// Typed connect options: file creation, FK enforcement, WAL and busy timeout for files.
#[cfg(feature = "sqlite")]
pub fn connect_options(
    dsn: &str,
    busy_timeout: Option<Duration>,
) -> Result<sqlx::sqlite::SqliteConnectOptions, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

    let opts = SqliteConnectOptions::from_str(dsn)?
        .create_if_missing(true)
        .foreign_keys(true);
    if is_memory_dsn(dsn) {
        return Ok(opts);
    }
    Ok(opts
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT)))
}

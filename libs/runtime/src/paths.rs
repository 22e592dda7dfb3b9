use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Platform base directory used when `home_dir` is not configured.
/// Windows: %APPDATA%, everything else: $HOME.
fn platform_base() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir();

    base.ok_or_else(|| anyhow!("cannot determine the user home directory"))
}

/// Expand a leading `~` and make the path absolute against the current directory.
fn expand(raw: &str) -> Result<PathBuf> {
    let expanded = if raw == "~" {
        platform_base()?
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        platform_base()?.join(rest)
    } else {
        PathBuf::from(raw)
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().context("cannot read current directory")?;
    Ok(cwd.join(expanded))
}

/// Resolve the server home directory.
///
/// `configured` wins when present; otherwise `<platform base>/<default_subdir>` is used.
/// With `create` set the directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let path = match configured {
        Some(raw) => expand(raw.trim())?,
        None => platform_base()?.join(default_subdir),
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create home dir {}", path.display()))?;
    }
    Ok(path)
}

/// Join `rel` onto `base` unless it is already absolute.
pub fn resolve_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

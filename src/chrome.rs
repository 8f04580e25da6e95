//! Chrome/Chromium discovery and launch configuration
//!
//! The renderer never relies on implicit executable lookup: the path is
//! resolved up front (explicit config, then the `CHROME` environment
//! variable, then known install locations for the host OS) so a missing
//! browser fails fast with a clear message instead of deep inside the
//! launch machinery.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use headless_chrome::LaunchOptions;

use crate::error::{Error, Result};

/// Environment variable checked for an executable override
pub const CHROME_ENV: &str = "CHROME";

/// Resolve the browser executable to launch.
pub fn locate_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Launch(format!(
            "configured Chrome executable does not exist: {}",
            path.display()
        )));
    }

    if let Ok(from_env) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(from_env);
        if path.is_file() {
            return Ok(path);
        }
        log::warn!(
            "{CHROME_ENV} points at {} which does not exist; probing known locations",
            path.display()
        );
    }

    for candidate in candidate_paths() {
        if candidate.is_file() {
            log::debug!("using browser executable {}", candidate.display());
            return Ok(candidate);
        }
    }

    Err(Error::Launch(format!(
        "no Chrome or Chromium executable found; install one, set {CHROME_ENV}, \
         or pass an explicit path"
    )))
}

#[cfg(target_os = "linux")]
fn candidate_paths() -> Vec<PathBuf> {
    [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "macos")]
fn candidate_paths() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "windows")]
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for root in ["ProgramFiles", "ProgramFiles(x86)", "LocalAppData"] {
        if let Ok(base) = std::env::var(root) {
            candidates.push(
                PathBuf::from(&base).join("Google\\Chrome\\Application\\chrome.exe"),
            );
            candidates.push(PathBuf::from(&base).join("Chromium\\Application\\chrome.exe"));
        }
    }
    candidates
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn candidate_paths() -> Vec<PathBuf> {
    Vec::new()
}

/// Build launch options for a headless surface of the given size.
pub fn launch_options(
    executable: PathBuf,
    width: u32,
    height: u32,
) -> Result<LaunchOptions<'static>> {
    LaunchOptions::default_builder()
        .headless(true)
        .path(Some(executable))
        .window_size(Some((width, height)))
        .args(vec![
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--no-first-run"),
            OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| Error::Launch(format!("failed to build launch options: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_fails_fast() {
        let result = locate_chrome(Some(Path::new("/definitely/not/chrome")));
        assert!(matches!(result, Err(Error::Launch(_))));
    }

    #[test]
    fn launch_options_build() {
        let options = launch_options(PathBuf::from("/usr/bin/true"), 600, 800);
        assert!(options.is_ok());
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn candidates_cover_the_host_os() {
        assert!(!candidate_paths().is_empty());
    }
}

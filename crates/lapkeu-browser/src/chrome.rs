use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Locate the Chrome binary: explicit path, then PATH, then platform
/// defaults.
pub fn find(custom_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = custom_path {
        return validate(path);
    }

    for name in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    for path in default_paths() {
        if let Ok(valid) = validate(&path) {
            return Ok(valid);
        }
    }

    Err(Error::SessionCrash(format!(
        "Chrome not found. Checked: {}. Use --chrome-path to specify location.",
        default_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Platform-specific default Chrome paths.
fn default_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    return vec![
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
    ];

    #[cfg(target_os = "linux")]
    return vec![
        PathBuf::from("/usr/bin/google-chrome"),
        PathBuf::from("/usr/bin/chromium"),
        PathBuf::from("/usr/bin/chromium-browser"),
    ];

    #[cfg(target_os = "windows")]
    return vec![
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
    ];

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    return vec![];
}

fn validate(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::SessionCrash(format!(
            "Chrome not found at: {}",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path).map_err(Error::Io)?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::SessionCrash(format!(
                "Chrome binary not executable: {}",
                path.display()
            )));
        }
    }

    Ok(path.to_path_buf())
}

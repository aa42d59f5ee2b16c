//! Launch the platform handler for a URL or a filesystem path.

use std::path::Path;
use std::process::Command;

use url::Url;

use crate::error::BridgeError;

/// Open an http(s) or mailto URL in the default browser/handler.
pub fn open_url(raw: &str) -> Result<(), BridgeError> {
    let url = Url::parse(raw.trim()).map_err(|e| BridgeError::Open(format!("Invalid URL {raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https" | "mailto") {
        return Err(BridgeError::Open(format!(
            "Refusing to open URL with scheme '{}'",
            url.scheme()
        )));
    }
    launch(url.as_str()).map_err(|e| BridgeError::Open(format!("Failed to open URL: {e}")))
}

/// Reveal a local path in the platform file manager.
pub fn open_path(path: &str) -> Result<(), BridgeError> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(BridgeError::Open(format!("Path does not exist: {path}")));
    }
    launch(path).map_err(|e| BridgeError::Open(format!("Failed to open path: {e}")))
}

fn launch(target: &str) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    {
        Command::new("explorer").arg(target).spawn()?;
        return Ok(());
    }
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(target).spawn()?;
        return Ok(());
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open").arg(target).spawn()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_rejected_before_launch() {
        let err = open_path("/definitely/not/here/symphony").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path does not exist: /definitely/not/here/symphony"
        );
    }

    #[test]
    fn non_web_schemes_are_refused() {
        let err = open_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("scheme 'file'"));
        assert!(open_url("not a url").is_err());
    }
}

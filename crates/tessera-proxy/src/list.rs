//! Proxy list parsing.

use crate::error::{ProxyError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Read a proxy list file, one proxy per line.
///
/// # Errors
/// Returns error if the file can't be read.
pub fn load_proxies(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ProxyError::ReadError {
        path: path.display().to_string(),
        source,
    })?;

    let proxies = parse_proxy_list(&contents);
    info!(
        count = proxies.len(),
        path = %path.display(),
        "loaded proxies"
    );
    Ok(proxies)
}

/// Parse proxy list text.
///
/// Blank lines and `#` comments are skipped, `http://` is added when no
/// scheme is given, and entries without a port are dropped with a warning.
#[must_use]
pub fn parse_proxy_list(contents: &str) -> Vec<String> {
    let mut proxies = Vec::new();

    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let proxy = if line.starts_with("http://") || line.starts_with("https://") {
            line.to_string()
        } else {
            format!("http://{line}")
        };

        let has_port = proxy
            .split_once("://")
            .is_some_and(|(_, rest)| rest.contains(':'));

        if has_port {
            debug!(proxy = %proxy, "loaded proxy");
            proxies.push(proxy);
        } else {
            warn!(line = line_num + 1, entry = %line, "invalid proxy format");
        }
    }

    proxies
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_proxy_list() {
        let proxies = parse_proxy_list(
            "# upstream pool\n\n10.0.0.1:8080\nhttps://user:pw@10.0.0.2:3128\n  10.0.0.3:1080  \nno-port-host\nhttp://also-no-port\n",
        );

        assert_eq!(
            proxies,
            vec![
                "http://10.0.0.1:8080".to_string(),
                "https://user:pw@10.0.0.2:3128".to_string(),
                "http://10.0.0.3:1080".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_proxies_from_file() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("proxies.txt");
        std::fs::write(&path, "10.0.0.1:8080\n").expect("write proxy file");

        let proxies = load_proxies(&path).expect("load proxies");
        assert_eq!(proxies, vec!["http://10.0.0.1:8080".to_string()]);
    }

    #[test]
    fn test_load_proxies_missing_file() {
        let result = load_proxies(Path::new("/nonexistent/proxies.txt"));
        assert!(matches!(result, Err(ProxyError::ReadError { .. })));
    }
}

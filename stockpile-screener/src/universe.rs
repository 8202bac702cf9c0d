//! Ticker universe loading.

use std::collections::HashSet;
use std::path::PathBuf;
use stockpile_core::{ConfigError, StockpileResult};

/// Load and merge ticker universe files.
///
/// Each file is a JSON array of ticker strings. Files are merged in the
/// order given; symbols are trimmed, uppercased and deduplicated keeping
/// first-seen order, so overlapping lists are harmless.
pub fn load_universe(paths: &[PathBuf]) -> StockpileResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut universe = Vec::new();

    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let tickers: Vec<String> =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                reason: format!("{}: {}", path.display(), e),
            })?;

        let mut added = 0usize;
        for ticker in tickers {
            let normalized = ticker.trim().to_uppercase();
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized.clone()) {
                universe.push(normalized);
                added += 1;
            }
        }
        tracing::debug!(path = %path.display(), added, "Loaded universe file");
    }

    tracing::info!(
        files = paths.len(),
        symbols = universe.len(),
        "Universe assembled"
    );
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stockpile_core::StockpileError;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn merges_files_preserving_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.json", r#"["AAPL", "msft", "NVDA"]"#);
        let b = write_file(&dir, "b.json", r#"["MSFT", "amzn"]"#);

        let universe = load_universe(&[a, b]).unwrap();
        assert_eq!(universe, vec!["AAPL", "MSFT", "NVDA", "AMZN"]);
    }

    #[test]
    fn normalizes_whitespace_and_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "t.json", r#"[" aapl ", "", "AAPL"]"#);

        let universe = load_universe(&[path]).unwrap();
        assert_eq!(universe, vec!["AAPL"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = load_universe(&[missing]).unwrap_err();
        assert!(matches!(
            err,
            StockpileError::Config(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.json", r#"{"not": "an array"}"#);

        let err = load_universe(&[path]).unwrap_err();
        assert!(matches!(
            err,
            StockpileError::Config(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn empty_path_list_is_an_empty_universe() {
        assert!(load_universe(&[]).unwrap().is_empty());
    }
}

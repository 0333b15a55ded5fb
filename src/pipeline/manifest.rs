//! Manifest loading: turn `"<ordinal>. <source>"` lines into entries.
//!
//! A malformed line never aborts the load. It is skipped, recorded as a
//! [`ManifestWarning`] and logged, and every other line still becomes an
//! entry. Duplicate ordinals pass through untouched; the coordinator decides
//! which one wins.

use crate::error::{ManifestWarning, PagebindError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Literal separating the ordinal from the source.
pub const SEPARATOR: &str = ". ";

/// One well-formed manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Declared page position; sorts the final document.
    pub ordinal: u32,
    /// URL, data URI or local path.
    pub source: String,
    /// 0-based index among well-formed entries.
    pub position: usize,
    /// 1-based line number in the input.
    pub line: usize,
}

/// Parsed manifest: entries in input order plus skipped lines.
///
/// Every input line lands in exactly one of `entries`, `warnings` or
/// `ignored_lines`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    pub warnings: Vec<ManifestWarning>,
    /// Blank and `#` comment lines.
    #[serde(default)]
    pub ignored_lines: usize,
}

impl Manifest {
    /// Build a manifest from `(ordinal, source)` pairs supplied as data.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (ordinal, source))| ManifestEntry {
                ordinal,
                source: source.into(),
                position: i,
                line: i + 1,
            })
            .collect();
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse manifest text.
///
/// Blank lines and `#` comments are ignored without a warning.
pub fn parse_manifest(text: &str) -> Manifest {
    parse_manifest_bytes(text.as_bytes())
}

/// Parse raw manifest bytes, decoding each line on its own.
///
/// A line that is not valid UTF-8 becomes a
/// [`ManifestWarning::InvalidEncoding`]; the other lines are unaffected.
pub fn parse_manifest_bytes(bytes: &[u8]) -> Manifest {
    let mut manifest = Manifest::default();
    if bytes.is_empty() {
        return manifest;
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);

    for (idx, raw) in body.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = match std::str::from_utf8(raw) {
            Ok(text) => text.trim(),
            Err(_) => {
                let w = ManifestWarning::InvalidEncoding {
                    line: line_no,
                    raw: String::from_utf8_lossy(raw).trim().to_string(),
                };
                warn!("Skipping manifest {}", w);
                manifest.warnings.push(w);
                continue;
            }
        };
        if line.is_empty() || line.starts_with('#') {
            debug!("Ignoring manifest line {}", line_no);
            manifest.ignored_lines += 1;
            continue;
        }

        match parse_line(line, line_no) {
            Ok((ordinal, source)) => {
                let position = manifest.entries.len();
                manifest.entries.push(ManifestEntry {
                    ordinal,
                    source,
                    position,
                    line: line_no,
                });
            }
            Err(w) => {
                warn!("Skipping manifest {}", w);
                manifest.warnings.push(w);
            }
        }
    }

    debug!(
        "Parsed manifest: {} entries, {} skipped, {} ignored lines",
        manifest.entries.len(),
        manifest.warnings.len(),
        manifest.ignored_lines
    );
    manifest
}

/// Read and parse a manifest file.
pub async fn load_manifest(path: &Path) -> Result<Manifest, PagebindError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PagebindError::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(parse_manifest_bytes(&bytes))
}

fn parse_line(line: &str, line_no: usize) -> Result<(u32, String), ManifestWarning> {
    let (ordinal, source) =
        line.split_once(SEPARATOR)
            .ok_or_else(|| ManifestWarning::MissingSeparator {
                line: line_no,
                raw: line.to_string(),
            })?;

    let ordinal = ordinal.trim();
    let parsed = ordinal
        .parse::<u32>()
        .ok()
        .filter(|&n| n >= 1)
        .ok_or_else(|| ManifestWarning::InvalidOrdinal {
            line: line_no,
            ordinal: ordinal.to_string(),
            raw: line.to_string(),
        })?;

    let source = source.trim();
    if source.is_empty() {
        return Err(ManifestWarning::EmptySource {
            line: line_no,
            raw: line.to_string(),
        });
    }

    Ok((parsed, source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_lines() {
        let m = parse_manifest("1. https://a.example/1.png\n2. https://a.example/2.png\n");
        assert_eq!(m.entries.len(), 2);
        assert!(m.warnings.is_empty());
        assert_eq!(m.entries[0].ordinal, 1);
        assert_eq!(m.entries[1].source, "https://a.example/2.png");
        assert_eq!(m.entries[1].position, 1);
        assert_eq!(m.entries[1].line, 2);
    }

    #[test]
    fn malformed_line_is_skipped_with_warning() {
        let m = parse_manifest("1. urlA\n2. urlB\nbad line\n3. urlC\n");
        assert_eq!(m.entries.len(), 3);
        assert_eq!(
            m.warnings,
            vec![ManifestWarning::MissingSeparator {
                line: 3,
                raw: "bad line".into()
            }]
        );
        let ordinals: Vec<u32> = m.entries.iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(m.entries[2].position, 2);
        assert_eq!(m.entries[2].line, 4);
    }

    #[test]
    fn splits_on_first_separator_only() {
        let m = parse_manifest("7. https://x.example/a. b.png");
        assert_eq!(m.entries[0].ordinal, 7);
        assert_eq!(m.entries[0].source, "https://x.example/a. b.png");
    }

    #[test]
    fn bad_ordinals_are_warnings() {
        let m = parse_manifest("0. zero\n-1. neg\nabc. word\n4. ok");
        assert_eq!(m.entries.len(), 1);
        assert_eq!(m.warnings.len(), 3);
        assert!(m
            .warnings
            .iter()
            .all(|w| matches!(w, ManifestWarning::InvalidOrdinal { .. })));
    }

    #[test]
    fn empty_source_is_a_warning() {
        let m = parse_manifest("5.  \n5. x");
        // "5.  " trims to "5." which has no separator left.
        assert_eq!(m.entries.len(), 1);
        assert_eq!(m.warnings.len(), 1);
        let m = parse_manifest("5. \t");
        assert!(m.entries.is_empty());
    }

    #[test]
    fn empty_source_after_separator() {
        assert_eq!(
            parse_line("5.   ", 1),
            Err(ManifestWarning::EmptySource {
                line: 1,
                raw: "5.   ".into()
            })
        );
    }

    #[test]
    fn blank_and_comment_lines_are_silent() {
        let m = parse_manifest("\n# gallery\n   \n1. a\n");
        assert_eq!(m.entries.len(), 1);
        assert!(m.warnings.is_empty());
        assert_eq!(m.ignored_lines, 3);
    }

    #[test]
    fn every_line_is_accounted_for() {
        let text = "1. a\r\n\r\nbad\r\n# c\r\n2. b";
        let m = parse_manifest(text);
        assert_eq!(m.entries.len() + m.warnings.len() + m.ignored_lines, 5);
        assert_eq!(m.entries[1].line, 5);
        assert_eq!(m.entries[0].source, "a");
    }

    #[test]
    fn non_utf8_line_is_skipped_and_the_rest_kept() {
        let bytes = b"1. https://a.example/1.png\n2. https://a.example/caf\xE9.png\n3. https://a.example/3.png\n";
        let m = parse_manifest_bytes(bytes);
        let ordinals: Vec<u32> = m.entries.iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![1, 3]);
        assert_eq!(m.entries[1].line, 3);
        assert_eq!(m.warnings.len(), 1);
        match &m.warnings[0] {
            ManifestWarning::InvalidEncoding { line, raw } => {
                assert_eq!(*line, 2);
                assert!(raw.contains("caf\u{FFFD}.png"), "{raw}");
            }
            other => panic!("unexpected warning {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        tokio::fs::write(&path, b"1. a.png\n2. \xFF\xFE.png\n3. c.png\n")
            .await
            .unwrap();
        let m = load_manifest(&path).await.unwrap();
        assert_eq!(m.entries.len(), 2);
        assert!(matches!(m.warnings[0], ManifestWarning::InvalidEncoding { line: 2, .. }));
    }

    #[test]
    fn duplicates_pass_through() {
        let m = parse_manifest("2. a\n2. b\n");
        assert_eq!(m.entries.len(), 2);
        assert_eq!(m.entries[0].ordinal, m.entries[1].ordinal);
    }

    #[test]
    fn from_pairs_assigns_positions() {
        let m = Manifest::from_pairs([(3, "c"), (1, "a")]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.entries[1].position, 1);
        assert_eq!(m.entries[1].ordinal, 1);
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = load_manifest(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, PagebindError::ManifestRead { .. }));
    }
}

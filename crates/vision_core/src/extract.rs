//! Reading per-image scores out of a batch inference archive.
//!
//! The archive is a zip holding a `scores.csv` manifest next to optional
//! overlay images. Manifest column names vary between service versions,
//! so both the identifier and the score are resolved from an ordered list
//! of candidate headers.

use crate::error::{EvaluationError, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

/// Entry name of the score manifest inside a batch archive.
pub const MANIFEST_NAME: &str = "scores.csv";

/// Identifier headers, most preferred first.
pub const IDENTIFIER_COLUMNS: [&str; 5] =
    ["img_path", "filename", "image", "file_name", "image_name"];

/// Score headers, most preferred first.
pub const SCORE_COLUMNS: [&str; 3] = ["anomaly_score", "score", "anomaly"];

/// Base file name → anomaly score for one batch result.
pub type ScoreMap = HashMap<String, f64>;

/// Strip any directory prefix, accepting both `/` and `\` as separators.
pub fn base_name(identifier: &str) -> &str {
    identifier
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(identifier)
}

/// Parse a score manifest (comma separated, header row first).
///
/// Rows without an identifier are skipped. Scores that are missing become
/// `0.0`; scores that do not parse are logged and also become `0.0`.
/// Later rows overwrite earlier rows with the same base name.
pub fn parse_manifest<R: Read>(reader: R) -> Result<ScoreMap> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    tracing::debug!("manifest columns: {:?}", headers.iter().collect::<Vec<_>>());

    let id_columns = column_positions(&headers, &IDENTIFIER_COLUMNS);
    let score_columns = column_positions(&headers, &SCORE_COLUMNS);

    let mut scores = ScoreMap::new();
    for record in rdr.records() {
        let record = record?;
        let Some(identifier) = first_non_empty(&record, &id_columns) else {
            tracing::warn!("manifest row without image identifier skipped: {:?}", record);
            continue;
        };
        let score_text = first_non_empty(&record, &score_columns).unwrap_or("0");
        let score = match score_text.trim().parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "invalid score value '{}' for {}, using 0.0: {}",
                    score_text,
                    identifier,
                    e
                );
                0.0
            }
        };
        let name = base_name(identifier);
        tracing::debug!("file={}, score={}", name, score);
        scores.insert(name.to_string(), score);
    }
    Ok(scores)
}

/// Read the score manifest out of a zip archive.
pub fn extract_scores<R: Read + Seek>(reader: R) -> Result<ScoreMap> {
    let mut archive = ZipArchive::new(reader)?;
    let entries = entry_names(&mut archive);
    scores_from_archive(&mut archive, &entries)
}

/// Read the score manifest out of a zip archive on disk.
///
/// The file handle lives only for the duration of this call.
pub fn extract_scores_from_path(path: impl AsRef<Path>) -> Result<ScoreMap> {
    BatchArchive::open(path)?.scores()
}

/// A saved batch result, opened for inspection.
pub struct BatchArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
    entries: Vec<String>,
}

impl BatchArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut archive = ZipArchive::new(file)?;
        let entries = entry_names(&mut archive);
        tracing::debug!("archive {} entries: {:?}", path.display(), entries);
        Ok(Self {
            path,
            archive,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn has_manifest(&self) -> bool {
        self.entries.iter().any(|e| e == MANIFEST_NAME)
    }

    pub fn scores(&mut self) -> Result<ScoreMap> {
        scores_from_archive(&mut self.archive, &self.entries)
    }

    /// Write every non-manifest file entry (the per-image overlays) below
    /// `dest`, keeping their relative paths. Entries whose names would
    /// escape `dest` are skipped.
    pub fn extract_artifacts(&mut self, dest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        let mut written = Vec::new();
        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            if entry.is_dir() || entry.name() == MANIFEST_NAME {
                continue;
            }
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                tracing::warn!("skipping archive entry with unsafe name: {}", entry.name());
                continue;
            };
            let out_path = dest.join(relative);
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
            written.push(out_path);
        }
        tracing::info!("extracted {} artifacts to {}", written.len(), dest.display());
        Ok(written)
    }
}

fn entry_names<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.by_index_raw(i).ok().map(|f| f.name().to_string()))
        .collect()
}

fn scores_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entries: &[String],
) -> Result<ScoreMap> {
    let manifest = match archive.by_name(MANIFEST_NAME) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(EvaluationError::MissingManifest {
                manifest: MANIFEST_NAME.to_string(),
                entries: entries.to_vec(),
            });
        }
        Err(e) => return Err(EvaluationError::ManifestParse(e.to_string())),
    };
    let scores = parse_manifest(manifest)?;
    tracing::info!("extracted {} scores from {}", scores.len(), MANIFEST_NAME);
    Ok(scores)
}

fn column_positions(headers: &csv::StringRecord, candidates: &[&str]) -> Vec<usize> {
    candidates
        .iter()
        .filter_map(|name| headers.iter().position(|h| h == *name))
        .collect()
}

fn first_non_empty<'r>(record: &'r csv::StringRecord, columns: &[usize]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|&idx| record.get(idx))
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::io::{Cursor, Write};
    use zip::write::{FileOptions, ZipWriter};

    fn archive_with(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[rstest]
    #[case("bar.jpg", "bar.jpg")]
    #[case("foo/bar.jpg", "bar.jpg")]
    #[case("C:\\data\\normal\\Bar.JPG", "Bar.JPG")]
    #[case("/tmp/mixed\\dir/x.png", "x.png")]
    #[case("dir/", "")]
    fn base_name_strips_both_separators(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(base_name(input), expected);
    }

    #[rstest]
    #[case("img_path,anomaly_score\nimgs/a.jpg,0.9\n")]
    #[case("filename,score\na.jpg,0.9\n")]
    #[case("image,anomaly\na.jpg,0.9\n")]
    #[case("file_name,score\na.jpg,0.9\n")]
    #[case("image_name,anomaly_score\nsub/a.jpg,0.9\n")]
    fn parse_manifest_accepts_known_column_names(#[case] csv_text: &str) {
        let scores = parse_manifest(csv_text.as_bytes()).unwrap();
        assert_eq!(scores.len(), 1);
        assert_relative_eq!(scores["a.jpg"], 0.9);
    }

    #[test]
    fn invalid_score_defaults_to_zero() {
        let scores = parse_manifest("image_name,anomaly\nfoo/bar.jpg,abc\n".as_bytes()).unwrap();
        assert_eq!(scores.get("bar.jpg"), Some(&0.0));
    }

    #[test]
    fn missing_score_column_defaults_to_zero() {
        let scores = parse_manifest("img_path,label\na.jpg,ok\n".as_bytes()).unwrap();
        assert_eq!(scores.get("a.jpg"), Some(&0.0));
    }

    #[test]
    fn preferred_identifier_falls_through_when_empty() {
        let text = "img_path,filename,score\n,b.jpg,0.4\nc.jpg,ignored.jpg,0.6\n";
        let scores = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(scores.len(), 2);
        assert_relative_eq!(scores["b.jpg"], 0.4);
        assert_relative_eq!(scores["c.jpg"], 0.6);
    }

    #[test]
    fn preferred_score_column_wins() {
        let text = "filename,score,anomaly_score\na.jpg,0.1,0.8\nb.jpg,0.3,\n";
        let scores = parse_manifest(text.as_bytes()).unwrap();
        assert_relative_eq!(scores["a.jpg"], 0.8);
        assert_relative_eq!(scores["b.jpg"], 0.3);
    }

    #[test]
    fn rows_without_identifier_are_skipped() {
        let text = "img_path,anomaly_score\n,0.5\na.jpg,0.2\n";
        let scores = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key("a.jpg"));
    }

    #[test]
    fn duplicate_base_names_keep_last_row() {
        let text = "img_path,anomaly_score\nrun1/a.jpg,0.1\nrun2/a.jpg,0.7\n";
        let scores = parse_manifest(text.as_bytes()).unwrap();
        assert_relative_eq!(scores["a.jpg"], 0.7);
    }

    #[test]
    fn score_whitespace_is_tolerated() {
        let scores = parse_manifest("filename,score\na.jpg, 0.25 \n".as_bytes()).unwrap();
        assert_relative_eq!(scores["a.jpg"], 0.25);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let bytes: &[u8] = b"filename,score\n\xff\xfe.jpg,0.1\n";
        let err = parse_manifest(bytes).unwrap_err();
        assert!(matches!(err, EvaluationError::ManifestParse(_)));
    }

    #[test]
    fn extract_scores_reads_manifest_entry() {
        let archive = archive_with(&[
            ("overlays/a.png", "png"),
            ("scores.csv", "img_path,anomaly_score\n/srv/in/a.jpg,0.91\n"),
        ]);
        let scores = extract_scores(archive).unwrap();
        assert_relative_eq!(scores["a.jpg"], 0.91);
    }

    #[test]
    fn extract_scores_reports_entries_when_manifest_missing() {
        let archive = archive_with(&[("overlays/a.png", "png"), ("results.csv", "x")]);
        match extract_scores(archive) {
            Err(EvaluationError::MissingManifest { manifest, entries }) => {
                assert_eq!(manifest, "scores.csv");
                assert_eq!(entries, vec!["overlays/a.png", "results.csv"]);
            }
            other => panic!("expected MissingManifest, got {other:?}"),
        }
    }

    #[test]
    fn missing_manifest_lists_entries_with_unsupported_compression() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("odd.bin", stored).unwrap();
        writer.write_all(b"opaque").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        // Mark the entry as bzip2, which this build cannot decompress.
        for (signature, offset) in [(b"PK\x03\x04", 8), (b"PK\x01\x02", 10)] {
            let at = bytes.windows(4).position(|w| w == &signature[..]).unwrap();
            bytes[at + offset..at + offset + 2].copy_from_slice(&12u16.to_le_bytes());
        }

        match extract_scores(Cursor::new(bytes)) {
            Err(EvaluationError::MissingManifest { entries, .. }) => {
                assert_eq!(entries, vec!["odd.bin"]);
            }
            other => panic!("expected MissingManifest, got {other:?}"),
        }
    }

    #[test]
    fn nested_manifest_does_not_count() {
        let archive = archive_with(&[("out/scores.csv", "filename,score\na.jpg,1\n")]);
        assert!(matches!(
            extract_scores(archive),
            Err(EvaluationError::MissingManifest { .. })
        ));
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        let err = extract_scores(Cursor::new(b"not a zip".to_vec())).unwrap_err();
        assert!(matches!(err, EvaluationError::Archive(_)));
    }

    #[test]
    fn batch_archive_extracts_overlays_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let zip_path = dir.path().join("batch.zip");
        let bytes = archive_with(&[
            ("scores.csv", "filename,score\na.jpg,0.3\n"),
            ("overlays/a.png", "png-bytes"),
        ])
        .into_inner();
        fs::write(&zip_path, bytes)?;

        let mut archive = BatchArchive::open(&zip_path)?;
        assert!(archive.has_manifest());
        assert_eq!(archive.entries().len(), 2);
        assert_relative_eq!(archive.scores()?["a.jpg"], 0.3);

        let out = dir.path().join("out");
        let written = archive.extract_artifacts(&out)?;
        assert_eq!(written, vec![out.join("overlays").join("a.png")]);
        assert_eq!(fs::read(&written[0])?, b"png-bytes");
        assert!(!out.join("scores.csv").exists());
        Ok(())
    }
}

//! Byte-bounded sliced file output.
//!
//! Query results are written as sequentially numbered `part-NNNN.txt` files,
//! rolling over to a new file before a line that would push the current file
//! past the byte budget.

use encoding_rs::Encoding;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::warn;

#[derive(Debug, Error)]
pub enum SlicerError {
    #[error("failed to create output directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write output file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Output shaping options, derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SlicerOptions {
    pub encoding: &'static Encoding,
    pub max_file_bytes: u64,
    pub allow_oversize_single_line: bool,
}

/// What one sliced write produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceReport {
    pub parts: u32,
    pub lines: u64,
    pub bytes: u64,
}

/// Writes `lines` under `base_path` as numbered part files.
///
/// A file is closed and a new one opened when appending the next line would
/// exceed the byte budget and the current file is non-empty. A line whose
/// encoded length alone exceeds the budget is still written; the oversize
/// flag only controls whether that case is logged.
pub async fn write_sliced(
    base_path: &std::path::Path,
    lines: &[String],
    options: SlicerOptions,
) -> Result<SliceReport, SlicerError> {
    fs::create_dir_all(base_path)
        .await
        .map_err(|source| SlicerError::DirectoryCreationFailed {
            path: base_path.to_path_buf(),
            source,
        })?;

    let (newline, _, _) = options.encoding.encode("\n");
    let newline = newline.into_owned();
    let newline_len = newline.len() as u64;

    let mut part_index: u32 = 0;
    let mut current: Option<(PathBuf, BufWriter<File>)> = None;
    let mut current_bytes: u64 = 0;
    let mut total_bytes: u64 = 0;

    for line in lines {
        let (encoded, _, _) = options.encoding.encode(line);
        let total_for_line = encoded.len() as u64 + newline_len;

        if current_bytes + total_for_line > options.max_file_bytes && current_bytes > 0 {
            if let Some((path, mut writer)) = current.take() {
                writer
                    .flush()
                    .await
                    .map_err(|source| SlicerError::WriteFailed { path, source })?;
            }
            current_bytes = 0;
        }

        if current.is_none() {
            part_index += 1;
            let path = base_path.join(format!("part-{part_index:04}.txt"));
            let file = File::create(&path)
                .await
                .map_err(|source| SlicerError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
            current = Some((path, BufWriter::new(file)));
        }

        if total_for_line > options.max_file_bytes && !options.allow_oversize_single_line {
            warn!(
                line_bytes = total_for_line,
                budget = options.max_file_bytes,
                "line exceeds the per-file budget, writing it anyway"
            );
        }

        if let Some((path, writer)) = current.as_mut() {
            writer
                .write_all(&encoded)
                .await
                .map_err(|source| SlicerError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
            writer
                .write_all(&newline)
                .await
                .map_err(|source| SlicerError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
        }
        current_bytes += total_for_line;
        total_bytes += total_for_line;
    }

    if let Some((path, mut writer)) = current.take() {
        writer
            .flush()
            .await
            .map_err(|source| SlicerError::WriteFailed { path, source })?;
    }

    Ok(SliceReport {
        parts: part_index,
        lines: lines.len() as u64,
        bytes: total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use tempfile::TempDir;

    fn options(max_file_bytes: u64) -> SlicerOptions {
        SlicerOptions {
            encoding: UTF_8,
            max_file_bytes,
            allow_oversize_single_line: true,
        }
    }

    async fn read_part(dir: &std::path::Path, index: u32) -> String {
        let path = dir.join(format!("part-{index:04}.txt"));
        String::from_utf8(tokio::fs::read(path).await.unwrap()).unwrap()
    }

    async fn list_parts(dir: &std::path::Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_rollover_before_budget_overflow() {
        let tmp = TempDir::new().unwrap();
        let lines = vec!["x".repeat(40), "y".repeat(20), "z".repeat(20)];

        // 40 + 1 newline fits in 50; appending a 21-byte line would not,
        // so the second file starts and then accumulates both short lines.
        let report = write_sliced(tmp.path(), &lines, options(50)).await.unwrap();
        assert_eq!(
            report,
            SliceReport {
                parts: 2,
                lines: 3,
                bytes: 83,
            }
        );

        let parts = list_parts(tmp.path()).await;
        assert_eq!(parts, vec!["part-0001.txt", "part-0002.txt"]);
        assert_eq!(read_part(tmp.path(), 1).await, format!("{}\n", "x".repeat(40)));
        assert_eq!(
            read_part(tmp.path(), 2).await,
            format!("{}\n{}\n", "y".repeat(20), "z".repeat(20))
        );
    }

    #[tokio::test]
    async fn test_rollover_per_line_when_no_pair_fits() {
        let tmp = TempDir::new().unwrap();
        let lines: Vec<String> = (0..3).map(|_| "x".repeat(40)).collect();

        // Each 41-byte line fits alone, but no two fit together, so every
        // line after the first forces a new file.
        let report = write_sliced(tmp.path(), &lines, options(50)).await.unwrap();
        assert_eq!(
            report,
            SliceReport {
                parts: 3,
                lines: 3,
                bytes: 123,
            }
        );

        let parts = list_parts(tmp.path()).await;
        assert_eq!(parts, vec!["part-0001.txt", "part-0002.txt", "part-0003.txt"]);
        for index in 1..=3 {
            assert_eq!(
                read_part(tmp.path(), index).await,
                format!("{}\n", "x".repeat(40))
            );
        }
    }

    #[tokio::test]
    async fn test_all_lines_fit_in_one_file() {
        let tmp = TempDir::new().unwrap();
        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        write_sliced(tmp.path(), &lines, options(1024)).await.unwrap();

        let parts = list_parts(tmp.path()).await;
        assert_eq!(parts, vec!["part-0001.txt"]);
        assert_eq!(read_part(tmp.path(), 1).await, "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_oversize_single_line_is_written() {
        let tmp = TempDir::new().unwrap();
        let lines = vec!["y".repeat(100), "z".to_string()];

        write_sliced(tmp.path(), &lines, options(10)).await.unwrap();

        // The oversize line occupies its own file; the next line rolls over.
        let parts = list_parts(tmp.path()).await;
        assert_eq!(parts, vec!["part-0001.txt", "part-0002.txt"]);
        assert_eq!(read_part(tmp.path(), 1).await, format!("{}\n", "y".repeat(100)));
        assert_eq!(read_part(tmp.path(), 2).await, "z\n");
    }

    #[tokio::test]
    async fn test_oversize_line_written_even_when_disallowed() {
        let tmp = TempDir::new().unwrap();
        let lines = vec!["y".repeat(100)];
        let opts = SlicerOptions {
            allow_oversize_single_line: false,
            ..options(10)
        };

        write_sliced(tmp.path(), &lines, opts).await.unwrap();

        assert_eq!(read_part(tmp.path(), 1).await, format!("{}\n", "y".repeat(100)));
    }

    #[tokio::test]
    async fn test_creates_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("run").join("group").join("script");

        write_sliced(&nested, &["line".to_string()], options(1024))
            .await
            .unwrap();

        assert_eq!(read_part(&nested, 1).await, "line\n");
    }

    #[tokio::test]
    async fn test_empty_input_writes_no_files() {
        let tmp = TempDir::new().unwrap();
        let report = write_sliced(tmp.path(), &[], options(1024)).await.unwrap();
        assert_eq!(report, SliceReport::default());
        assert!(list_parts(tmp.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_encoded_length_drives_rollover() {
        let tmp = TempDir::new().unwrap();
        // Each é is 1 byte in windows-1252, 2 bytes in UTF-8.
        let lines: Vec<String> = (0..2).map(|_| "é".repeat(8)).collect();
        let opts = SlicerOptions {
            encoding: encoding_rs::WINDOWS_1252,
            max_file_bytes: 10,
            allow_oversize_single_line: true,
        };

        write_sliced(tmp.path(), &lines, opts).await.unwrap();

        // 8 + 1 bytes per line in windows-1252, so each line gets its own file.
        let parts = list_parts(tmp.path()).await;
        assert_eq!(parts.len(), 2);
    }
}

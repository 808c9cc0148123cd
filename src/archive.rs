//! Input enumeration and decompression.
//!
//! Batches arrive as zip archives of newline-delimited JSON members.
//! Plain `.json`/`.jsonl` files are accepted too, which keeps small
//! loads and tests out of the zip wrapper. Inputs and archive members
//! are visited in reverse-sorted order: newest-first processing means
//! fewer updates to already-hydrated author rows.

use crate::error::{LoadError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One loadable input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A zip archive of newline-delimited JSON members.
    Zip(PathBuf),
    /// A bare newline-delimited JSON file.
    Jsonl(PathBuf),
}

impl Input {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Zip(p) | Self::Jsonl(p) => p,
        }
    }
}

fn classify(path: &Path) -> Option<Input> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("zip") => Some(Input::Zip(path.to_path_buf())),
        Some("json" | "jsonl") => Some(Input::Jsonl(path.to_path_buf())),
        _ => None,
    }
}

/// Expand the given paths into concrete inputs.
///
/// Directories are walked recursively for archives and JSON files;
/// files are taken as-is. The result is sorted in reverse order.
///
/// # Errors
///
/// Returns [`LoadError::InputNotFound`] for a missing path or a file
/// with an unrecognized extension.
pub fn discover_inputs(paths: &[PathBuf]) -> Result<Vec<Input>> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(std::result::Result::ok) {
                if entry.file_type().is_file() {
                    if let Some(input) = classify(entry.path()) {
                        inputs.push(input);
                    }
                }
            }
        } else if path.is_file() {
            let input =
                classify(path).ok_or_else(|| LoadError::input_not_found(path.clone()))?;
            inputs.push(input);
        } else {
            return Err(LoadError::input_not_found(path.clone()));
        }
    }

    inputs.sort_by(|a, b| b.path().cmp(a.path()));
    Ok(inputs)
}

/// Visit every member of an input with a buffered line reader.
///
/// Zip members are visited in reverse-sorted name order; a bare JSON
/// file is a single member named after itself.
///
/// # Errors
///
/// Returns an error if the input cannot be opened or a member cannot
/// be read; the visitor's own errors propagate unchanged.
pub fn for_each_member(
    input: &Input,
    mut visit: impl FnMut(&str, &mut dyn BufRead) -> Result<()>,
) -> Result<()> {
    match input {
        Input::Jsonl(path) => {
            info!("Reading {}", path.display());
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("input")
                .to_string();
            let mut reader = BufReader::new(File::open(path)?);
            visit(&name, &mut reader)
        }
        Input::Zip(path) => {
            info!("Reading archive {}", path.display());
            let file = File::open(path)?;
            let mut archive = zip::ZipArchive::new(file).map_err(|source| LoadError::Archive {
                path: path.clone(),
                source,
            })?;

            let mut names: Vec<String> = archive.file_names().map(String::from).collect();
            names.sort_by(|a, b| b.cmp(a));

            for name in names {
                let member = archive.by_name(&name).map_err(|source| LoadError::Archive {
                    path: path.clone(),
                    source,
                })?;
                if member.is_dir() {
                    continue;
                }
                debug!("Reading member {name}");
                let mut reader = BufReader::new(member);
                visit(&name, &mut reader)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{discover_inputs, for_each_member, Input};
    use std::io::Write;

    #[test]
    fn discovers_and_reverse_sorts_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.zip", "b.zip", "notes.txt", "c.jsonl"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let inputs = discover_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|i| i.path().file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c.jsonl", "b.zip", "a.zip"]);
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = discover_inputs(&["/no/such/file.zip".into()]).unwrap_err();
        assert!(matches!(err, crate::error::LoadError::InputNotFound { .. }));
    }

    #[test]
    fn visits_zip_members_in_reverse_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("batch.zip");
        {
            let file = std::fs::File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            for name in ["part1.json", "part2.json"] {
                writer.start_file(name, options).unwrap();
                writer.write_all(b"{}\n").unwrap();
            }
            writer.finish().unwrap();
        }

        let mut seen = Vec::new();
        for_each_member(&Input::Zip(zip_path), |name, reader| {
            let mut content = String::new();
            std::io::Read::read_to_string(reader, &mut content)?;
            seen.push((name.to_string(), content));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "part2.json");
        assert_eq!(seen[1].0, "part1.json");
        assert_eq!(seen[0].1, "{}\n");
    }

    #[test]
    fn bare_jsonl_is_a_single_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"id\":1}\n").unwrap();

        let mut members = 0;
        for_each_member(&Input::Jsonl(path), |name, _| {
            assert_eq!(name, "records.jsonl");
            members += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(members, 1);
    }
}

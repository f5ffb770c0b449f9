//! Turn files on disk into [`Document`]s for the indexing pipeline.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Document;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Load every `.txt`/`.md` file under `root` (sorted by path) as a `files` document.
///
/// The document id is the path relative to `root` without extension;
/// `category` is the relative parent directory, or `misc` at the top level.
pub fn load_text_dir(root: &Path) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(Error::NotFound {
            what: format!("input directory {}", root.display()),
            hint: "pass an existing directory with --input".into(),
        });
    }
    let files = list_text_files(root);
    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let text = read_lossy(path)?;
        if text.trim().is_empty() {
            debug!(path = %path.display(), "skipping empty file");
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative.with_extension("").to_string_lossy().replace('\\', "/");
        let category = relative
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "misc".to_string());
        let doc_type = path.extension().and_then(|e| e.to_str()).unwrap_or("txt").to_string();
        let title = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        documents.push(
            Document::new(id, text)
                .with_meta("file_path", path.to_string_lossy().to_string())
                .with_meta("doc_type", doc_type)
                .with_meta("category", category)
                .with_meta("title", title),
        );
    }
    info!(files = files.len(), documents = documents.len(), root = %root.display(), "loaded text directory");
    Ok(documents)
}

/// Load one JSON document (`{id?, text, metadata?}`) per non-blank line.
pub fn load_jsonl(path: &Path) -> Result<Vec<Document>> {
    let file = fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            what: format!("input file {}", path.display()),
            hint: "pass an existing JSONL file with --input".into(),
        },
        _ => Error::persistence(format!("{}: {e}", path.display())),
    })?;
    let mut documents = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::persistence(format!("{}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line).map_err(|e| {
            Error::invalid_argument(format!("{}:{}: malformed document: {e}", path.display(), line_no + 1))
        })?;
        documents.push(doc);
    }
    info!(documents = documents.len(), path = %path.display(), "loaded jsonl documents");
    Ok(documents)
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => fs::read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
            .map_err(|e| Error::persistence(format!("{}: {e}", path.display()))),
    }
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext)))
        .collect();
    files.sort();
    files
}

use anyhow::{Result, Context, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// @module: File and directory utilities

static FORBIDDEN_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const MAX_FILENAME_CHARS: usize = 100;
const PROGRESS_SUFFIX: &str = ".progress.json";
const APP_DIRNAME: &str = "bookwai";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @returns: Sidecar state file next to the intended output
    pub fn progress_file_path<P: AsRef<Path>>(output: P) -> PathBuf {
        let mut name = output.as_ref().as_os_str().to_os_string();
        name.push(PROGRESS_SUFFIX);
        PathBuf::from(name)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Write through a temporary file in the same directory, then rename into place.
    ///
    /// Readers see either the previous content or the new content, never a
    /// truncated file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> std::io::Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    // @removes: File if present, missing files are not an error
    pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Default directory for log files
    pub fn default_log_dir() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(base_dir.join(APP_DIRNAME).join("logs"))
    }
}

/// Make a chapter title safe to use as a file name
pub fn sanitize_filename(name: &str) -> String {
    let replaced = FORBIDDEN_FILENAME_CHARS.replace_all(name.trim(), "_");
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, "_");
    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = truncated.trim_matches(|c| c == '_' || c == '.');

    if trimmed.is_empty() {
        "chapter".to_string()
    } else {
        trimmed.to_string()
    }
}

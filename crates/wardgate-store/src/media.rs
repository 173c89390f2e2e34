//! Photo directories.
//!
//! Patient photos are named `{fullname}_{phone}.png`, visitor photos
//! `{name}_{phone}_{YYYYmmddHHMMSS}.png`. A later registration with the same
//! name overwrites the earlier file.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PATIENTS_SUBDIR: &str = "patients";
const VISITORS_SUBDIR: &str = "visitors";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("create {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("list {path}: {source}")]
    List { path: PathBuf, source: std::io::Error },
}

/// The two image directories under one media root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    patients_dir: PathBuf,
    visitors_dir: PathBuf,
}

impl MediaStore {
    /// Use `root/patients` and `root/visitors`, creating them if missing.
    pub fn open(root: &Path) -> Result<Self, MediaError> {
        let store = Self {
            patients_dir: root.join(PATIENTS_SUBDIR),
            visitors_dir: root.join(VISITORS_SUBDIR),
        };
        for dir in [&store.patients_dir, &store.visitors_dir] {
            std::fs::create_dir_all(dir).map_err(|source| MediaError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(store)
    }

    pub fn patients_dir(&self) -> &Path {
        &self.patients_dir
    }

    pub fn visitors_dir(&self) -> &Path {
        &self.visitors_dir
    }

    /// Write a patient photo and return its path.
    pub async fn save_patient_image(&self, fullname: &str, phone: &str, bytes: &[u8]) -> Result<PathBuf, MediaError> {
        let filename = format!("{}_{}.png", file_component(fullname), file_component(phone));
        write_file(self.patients_dir.join(filename), bytes).await
    }

    /// Write a visitor photo stamped with `taken_at` and return its path.
    pub async fn save_visitor_image<Tz>(
        &self,
        name: &str,
        phone: &str,
        taken_at: &DateTime<Tz>,
        bytes: &[u8],
    ) -> Result<PathBuf, MediaError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let filename = format!(
            "{}_{}_{}.png",
            file_component(name),
            file_component(phone),
            taken_at.format("%Y%m%d%H%M%S")
        );
        write_file(self.visitors_dir.join(filename), bytes).await
    }

    /// Every regular file in the visitor directory, in directory order.
    ///
    /// Blocking; meant for the face engine thread.
    pub fn visitor_images(&self) -> Result<Vec<PathBuf>, MediaError> {
        let list_err = |source| MediaError::List {
            path: self.visitors_dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.visitors_dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            if entry.file_type().map_err(list_err)?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

async fn write_file(path: PathBuf, bytes: &[u8]) -> Result<PathBuf, MediaError> {
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "image written");
            Ok(path)
        }
        Err(source) => Err(MediaError::Write { path, source }),
    }
}

/// User text as a single path component: separators and NUL become `_`.
fn file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

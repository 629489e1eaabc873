use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::core::config::Settings;
use crate::core::time::unix_millis_now;
use crate::db::types::ExamType;

/// Logical prefix used in every stored relative path, independent of where
/// the physical root directory lives.
pub(crate) const STORAGE_PATH_PREFIX: &str = "storage";

pub(crate) const AUDIO_UPLOADS_DIR: &str = "audio_uploads";
pub(crate) const IMAGE_UPLOADS_DIR: &str = "image_uploads";

const PROTECTED_DIRS: [&str; 2] = [AUDIO_UPLOADS_DIR, IMAGE_UPLOADS_DIR];
const ACTIVE_MARKER_FILENAME: &str = ".active_exam.json";

#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    root: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredFile {
    pub(crate) filename: String,
    pub(crate) relative_path: String,
    pub(crate) absolute_path: PathBuf,
    pub(crate) size: i64,
    pub(crate) sha256: String,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredAsset {
    pub(crate) filename: String,
    pub(crate) relative_path: String,
}

/// Transient in-progress marker. Advisory only; never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ActiveExamMarker {
    pub(crate) exam_id: i64,
    pub(crate) exam_title: String,
    pub(crate) started_at: String,
    pub(crate) answers: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    pub(crate) fn dir(self) -> &'static str {
        match self {
            Self::Audio => AUDIO_UPLOADS_DIR,
            Self::Image => IMAGE_UPLOADS_DIR,
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(Self::Audio),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl StorageService {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self { root: PathBuf::from(&settings.storage().root) }
    }

    /// Creates the root and the two protected asset folders.
    pub(crate) async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        for dir in PROTECTED_DIRS {
            fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    pub(crate) fn folder_name(examinee_name: &str, examinee_id: &str) -> String {
        format!("{examinee_name}_{examinee_id}")
    }

    fn examinee_dir(&self, examinee_name: &str, examinee_id: &str) -> PathBuf {
        self.root.join(Self::folder_name(examinee_name, examinee_id))
    }

    fn exam_type_dir(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> PathBuf {
        self.examinee_dir(examinee_name, examinee_id).join(exam_type.as_str())
    }

    pub(crate) async fn ensure_examinee_folder(
        &self,
        examinee_name: &str,
        examinee_id: &str,
    ) -> io::Result<PathBuf> {
        let dir = self.examinee_dir(examinee_name, examinee_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub(crate) async fn ensure_exam_type_folder(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> io::Result<PathBuf> {
        let dir = self.exam_type_dir(examinee_name, examinee_id, exam_type);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Writes submission bytes under the examinee's exam-type folder with a
    /// collision-resistant filename and returns size plus SHA-256 of the
    /// stored content.
    pub(crate) async fn write_submission_file(
        &self,
        bytes: &[u8],
        exam_type: ExamType,
        examinee_name: &str,
        examinee_id: &str,
        exam_title: &str,
    ) -> io::Result<StoredFile> {
        let dir = self.ensure_exam_type_folder(examinee_name, examinee_id, exam_type).await?;

        let filename = format!("{}_{}.pdf", sanitized_title(exam_title), unix_millis_now());
        let absolute_path = dir.join(&filename);
        fs::write(&absolute_path, bytes).await?;

        let relative_path = format!(
            "{STORAGE_PATH_PREFIX}/{}/{}/{filename}",
            Self::folder_name(examinee_name, examinee_id),
            exam_type.as_str()
        );
        let sha256 = hex::encode(Sha256::digest(bytes));

        Ok(StoredFile {
            filename,
            relative_path,
            absolute_path,
            size: bytes.len() as i64,
            sha256,
        })
    }

    /// Resolves a stored relative path (always `storage/...`) against the
    /// physical root. Rejects anything that could escape it.
    fn resolve_relative(&self, relative_path: &str) -> Option<PathBuf> {
        let mut parts = relative_path.split('/');
        if parts.next()? != STORAGE_PATH_PREFIX {
            return None;
        }

        let mut path = self.root.clone();
        let mut depth = 0usize;
        for part in parts {
            if part.is_empty() || part == "." || part == ".." || part.contains('\\') {
                return None;
            }
            path.push(part);
            depth += 1;
        }

        if depth == 0 {
            return None;
        }
        Some(path)
    }

    pub(crate) async fn read_submission_file(
        &self,
        relative_path: &str,
    ) -> io::Result<Option<Vec<u8>>> {
        let Some(path) = self.resolve_relative(relative_path) else {
            return Err(invalid_path_error(relative_path));
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Deletes the file if present, then prunes now-empty parent directories
    /// up to the storage root. Returns false when the file was already gone.
    pub(crate) async fn delete_submission_file(&self, relative_path: &str) -> io::Result<bool> {
        let Some(path) = self.resolve_relative(relative_path) else {
            return Err(invalid_path_error(relative_path));
        };

        let existed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(err),
        };

        if let Some(parent) = path.parent() {
            self.prune_upward(parent).await?;
        }

        Ok(existed)
    }

    /// Removes empty directories walking from `dir` toward the root. Stops at
    /// the first non-empty directory, at the root itself, and never touches
    /// the protected asset folders.
    async fn prune_upward(&self, dir: &Path) -> io::Result<()> {
        let mut current = dir.to_path_buf();

        while current != self.root && current.starts_with(&self.root) {
            if is_protected_top_level(&self.root, &current) {
                break;
            }

            match fs::read_dir(&current).await {
                Ok(mut entries) => {
                    if entries.next_entry().await?.is_some() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => break,
                Err(err) => return Err(err),
            }

            fs::remove_dir(&current).await?;

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(())
    }

    pub(crate) async fn delete_examinee_tree(
        &self,
        examinee_name: &str,
        examinee_id: &str,
    ) -> io::Result<bool> {
        let dir = self.examinee_dir(examinee_name, examinee_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Removes every top-level directory except the protected asset folders.
    pub(crate) async fn delete_all_examinee_trees(&self) -> io::Result<usize> {
        let mut removed = 0usize;
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if PROTECTED_DIRS.iter().any(|protected| name == *protected) {
                continue;
            }
            fs::remove_dir_all(entry.path()).await?;
            removed += 1;
        }

        Ok(removed)
    }

    /// Scans top-level folder names for `{name}_{id}` entries matching the
    /// given examinee id. Split on the last underscore, per the on-disk
    /// contract.
    pub(crate) async fn resolve_examinee_names(
        &self,
        examinee_id: &str,
    ) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(err) => return Err(err),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let folder = entry.file_name();
            let Some(folder) = folder.to_str() else {
                continue;
            };
            if PROTECTED_DIRS.contains(&folder) {
                continue;
            }
            if let Some((name, id)) = folder.rsplit_once('_') {
                if id == examinee_id && !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    fn marker_path(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> PathBuf {
        self.exam_type_dir(examinee_name, examinee_id, exam_type).join(ACTIVE_MARKER_FILENAME)
    }

    pub(crate) async fn write_active_marker(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
        marker: &ActiveExamMarker,
    ) -> io::Result<()> {
        self.ensure_exam_type_folder(examinee_name, examinee_id, exam_type).await?;
        let bytes = serde_json::to_vec_pretty(marker)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(self.marker_path(examinee_name, examinee_id, exam_type), bytes).await
    }

    pub(crate) async fn read_active_marker(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> io::Result<Option<ActiveExamMarker>> {
        let path = self.marker_path(examinee_name, examinee_id, exam_type);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        match serde_json::from_slice(&bytes) {
            Ok(marker) => Ok(Some(marker)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Unreadable active exam marker");
                Ok(None)
            }
        }
    }

    /// Idempotent: returns false when no marker was present.
    pub(crate) async fn remove_active_marker(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> io::Result<bool> {
        match fs::remove_file(self.marker_path(examinee_name, examinee_id, exam_type)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Marker removal for abandoned sessions, followed by the same pruning
    /// rule as submission-file deletion.
    pub(crate) async fn remove_active_marker_and_prune(
        &self,
        examinee_name: &str,
        examinee_id: &str,
        exam_type: ExamType,
    ) -> io::Result<bool> {
        let removed = self.remove_active_marker(examinee_name, examinee_id, exam_type).await?;
        let dir = self.exam_type_dir(examinee_name, examinee_id, exam_type);
        self.prune_upward(&dir).await?;
        Ok(removed)
    }

    pub(crate) async fn store_asset(
        &self,
        kind: AssetKind,
        original_filename: &str,
        bytes: &[u8],
    ) -> io::Result<StoredAsset> {
        let dir = self.root.join(kind.dir());
        fs::create_dir_all(&dir).await?;

        let filename = format!("{}_{}", unix_millis_now(), sanitized_filename(original_filename));
        fs::write(dir.join(&filename), bytes).await?;

        Ok(StoredAsset {
            relative_path: format!("{STORAGE_PATH_PREFIX}/{}/{filename}", kind.dir()),
            filename,
        })
    }

    pub(crate) async fn read_asset(
        &self,
        kind: AssetKind,
        filename: &str,
    ) -> io::Result<Option<Vec<u8>>> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            return Err(invalid_path_error(filename));
        }

        match fs::read(self.root.join(kind.dir()).join(filename)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn is_protected_top_level(root: &Path, dir: &Path) -> bool {
    dir.parent() == Some(root)
        && dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| PROTECTED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn invalid_path_error(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid storage path: {path}"))
}

/// Filename stem used for submission PDFs: all non-alphanumeric characters
/// are stripped from the title.
pub(crate) fn sanitized_title(title: &str) -> String {
    let sanitized: String = title.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

    if sanitized.is_empty() {
        "submission".to_string()
    } else {
        sanitized
    }
}

pub(crate) fn sanitized_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect();

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

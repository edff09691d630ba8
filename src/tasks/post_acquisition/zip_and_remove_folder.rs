//! # Zip and Remove Folder
//!
//! Archives the content folder of the acquisition (`<folder>.zip`, next to the
//! folder) and, when it holds anything, the `downloads` folder, then removes
//! both folders. A content folder that was never produced is not an error.

use crate::constants::artifacts;
use crate::options::AcquisitionOptions;
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const TITLE_KEY: &str = "ZIP_AND_REMOVE_FOLDER";
const ZIP_ERROR_KEY: &str = "ZIP_AND_REMOVE_FOLDER_ERROR";
const DELETE_ERROR_KEY: &str = "DELETE_FOLDER_ERROR";

#[derive(Debug)]
enum ZipStageError {
    Archive(String),
    Delete(String),
}

/// `<folder>.zip` beside `folder`
pub fn archive_path(folder: &Path) -> PathBuf {
    let mut name = OsString::from(folder.as_os_str());
    name.push(".zip");
    PathBuf::from(name)
}

/// Deflate every file below `source` into `destination`, paths relative to
/// `source`. Returns the number of files stored.
pub fn zip_directory(source: &Path, destination: &Path) -> zip::result::ZipResult<usize> {
    let mut writer = ZipWriter::new(File::create(destination)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut stored = 0;

    let mut pending = vec![source.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.collect::<io::Result<_>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let relative = path
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type()?.is_dir() {
                writer.add_directory(format!("{name}/"), options)?;
                pending.push(path);
            } else {
                writer.start_file(name, options)?;
                io::copy(&mut File::open(&path)?, &mut writer)?;
                stored += 1;
            }
        }
    }

    writer.finish()?;
    Ok(stored)
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn zip_and_remove(options: &AcquisitionOptions) -> Result<Vec<PathBuf>, ZipStageError> {
    let mut archives = Vec::new();

    let content = options
        .acquisition_content_directory
        .as_deref()
        .filter(|dir| dir.is_dir());
    match content {
        Some(dir) => {
            let archive = archive_path(dir);
            let stored = zip_directory(dir, &archive)
                .map_err(|e| ZipStageError::Archive(format!("{}: {e}", dir.display())))?;
            debug!(folder = %dir.display(), files = stored, "Content folder archived");
            archives.push(archive);
        }
        None => debug!(
            folder = ?options.acquisition_content_directory,
            "No content folder to archive"
        ),
    }

    let downloads = options.artifact_path(artifacts::DOWNLOADS_DIR);
    if downloads.is_dir() && has_entries(&downloads) {
        let archive = archive_path(&downloads);
        let stored = zip_directory(&downloads, &archive)
            .map_err(|e| ZipStageError::Archive(format!("{}: {e}", downloads.display())))?;
        debug!(files = stored, "Downloads folder archived");
        archives.push(archive);
    }

    for folder in content.into_iter().chain(Some(downloads.as_path())) {
        if folder.is_dir() {
            std::fs::remove_dir_all(folder)
                .map_err(|e| ZipStageError::Delete(format!("Error: {} - {e}.", folder.display())))?;
        }
    }

    Ok(archives)
}

#[derive(Debug, Clone, Default)]
pub struct ZipAndRemoveFolderWorker;

#[async_trait]
impl TaskWorker for ZipAndRemoveFolderWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let options = ctx.shared_options();

        let archives = tokio::task::spawn_blocking(move || zip_and_remove(&options))
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ZIP_ERROR_KEY, e))?
            .map_err(|e| match e {
                ZipStageError::Archive(details) => ctx.failure(TITLE_KEY, ZIP_ERROR_KEY, details),
                ZipStageError::Delete(details) => ctx.failure(TITLE_KEY, DELETE_ERROR_KEY, details),
            })?;

        let names: Vec<String> = archives
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(WorkerOutcome::success_with(names.join(", ")))
    }
}

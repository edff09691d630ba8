//! # File Hashes
//!
//! MD5, SHA-1 and SHA-256 of every file at the top of the acquisition
//! directory, written to `acquisition.hash`. The hash report itself, the
//! acquisition log and any caller exclusions are skipped.

use crate::constants::artifacts;
use crate::logging::log_hash_record;
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const TITLE_KEY: &str = "HASHFILE";
const ERROR_KEY: &str = "CALCULATE_HASHFILE_ERROR";
const SEPARATOR: &str = "=========================================================";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub name: String,
    pub size: u64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

pub fn hash_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    let mut md5 = md5::Context::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut size = 0u64;
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.consume(&buf[..n]);
        sha1.update(&buf[..n]);
        sha256.update(&buf[..n]);
        size += n as u64;
    }

    Ok(FileDigest {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size,
        md5: format!("{:x}", md5.compute()),
        sha1: hex::encode(sha1.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}

/// Digests of the top-level files of `dir`, ordered by name
pub fn calculate_hashes(dir: &Path, exclusions: &[String]) -> io::Result<Vec<FileDigest>> {
    let mut digests = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == artifacts::HASH_REPORT
            || name == artifacts::ACQUISITION_LOG
            || exclusions.iter().any(|excluded| *excluded == name)
        {
            continue;
        }
        digests.push(hash_file(&entry.path())?);
    }
    digests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(digests)
}

pub fn render_hash_report(digests: &[FileDigest]) -> String {
    let mut report = String::new();
    for digest in digests {
        report.push_str(SEPARATOR);
        report.push('\n');
        report.push_str(&format!("Name: {}\n", digest.name));
        report.push_str(&format!("Size: {}\n", digest.size));
        report.push_str(&format!("MD5: {}\n", digest.md5));
        report.push_str(&format!("SHA-1: {}\n", digest.sha1));
        report.push_str(&format!("SHA-256: {}\n\n", digest.sha256));
    }
    report
}

#[derive(Debug, Clone, Default)]
pub struct HashWorker;

#[async_trait]
impl TaskWorker for HashWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let options = ctx.shared_options();

        let count = tokio::task::spawn_blocking(move || -> io::Result<usize> {
            let digests = calculate_hashes(
                &options.acquisition_directory,
                &options.exclude_from_hash_calculation,
            )?;
            for digest in &digests {
                log_hash_record(&digest.name, digest.size, &digest.md5, &digest.sha1, &digest.sha256);
            }
            std::fs::write(
                options.artifact_path(artifacts::HASH_REPORT),
                render_hash_report(&digests),
            )?;
            Ok(digests.len())
        })
        .await
        .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?
        .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;

        Ok(WorkerOutcome::success_with(format!("{count} files")))
    }
}

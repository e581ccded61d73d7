use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, VidriffError};

/// `result_{YYYYMMDD_HHMMSS_mmm}.zip`
pub fn archive_name() -> String {
    format!("result_{}.zip", Local::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Bundle `files` into a new timestamped zip in `dir`.
///
/// Each file is stored under its base name. The archive is written to a
/// temporary file and renamed into place, so a failure never leaves a partial
/// archive and never touches the bundled files. Existing archives are left
/// alone.
pub fn archive_files(files: &[PathBuf], dir: &Path) -> Result<PathBuf> {
    if files.is_empty() {
        return Err(VidriffError::InvalidInput(
            "nothing to archive".to_string(),
        ));
    }
    for file in files {
        if !file.is_file() {
            return Err(VidriffError::FileNotFound(file.display().to_string()));
        }
    }

    fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = ZipWriter::new(temp.as_file());
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for file in files {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    VidriffError::InvalidInput(format!(
                        "cannot archive {}: file name is not UTF-8",
                        file.display()
                    ))
                })?;
            debug!("Adding {} to archive", name);
            writer.start_file(name, options)?;
            let mut source = File::open(file)?;
            io::copy(&mut source, &mut writer)?;
        }

        writer.finish()?;
    }

    let path = persist_unique(temp, dir, &archive_name())?;

    info!(
        "Files have been archived into {} ({} files)",
        path.display(),
        files.len()
    );
    Ok(path)
}

/// Move `temp` to `dir/name`, falling back to `name_2`, `name_3`, ... when a
/// file already exists. Existing files are never overwritten.
fn persist_unique(mut temp: NamedTempFile, dir: &Path, name: &str) -> Result<PathBuf> {
    let stem = name.trim_end_matches(".zip");
    let mut attempt = 1;
    loop {
        let path = if attempt == 1 {
            dir.join(name)
        } else {
            dir.join(format!("{stem}_{attempt}.zip"))
        };
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next suffix", path.display());
                temp = e.file;
                attempt += 1;
            }
            Err(e) => return Err(VidriffError::Io(e.error)),
        }
    }
}

use crate::error::ScanError;
use crate::model::ScanResult;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes `result` as pretty JSON. The file is written next to `path` under a
/// temporary name and renamed into place, so readers never see a partial artifact.
pub fn write_results(path: &Path, result: &ScanResult) -> Result<(), ScanError> {
    let tmp_path = temp_path_for(path);

    let written = write_json(&tmp_path, result).and_then(|_| fs::rename(&tmp_path, path));
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(ScanError::Serialization {
            path: path.to_path_buf(),
            source,
        });
    }

    info!(
        "Results written to {} ({} transfers, {} contracts)",
        path.display(),
        result.transfers.len(),
        result.contracts.len()
    );
    Ok(())
}

fn write_json(path: &Path, result: &ScanResult) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "scan-results.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

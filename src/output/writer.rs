//! Dataset file writer
//!
//! Records are written to a temporary file inside the output directory and
//! only persisted under their final name once fully flushed.

use crate::indexers::Record;
use crate::output::{OutputError, OutputFormat, OutputResult};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Buffer size used for every dataset writer
pub const JSONL_BUFFER_CAPACITY: usize = 8 * 1024 * 1024;

/// Where a dataset ended up and how large it is
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenDataset {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: u64,
}

/// Writes `records` as one dataset file `dir/file_name`
///
/// The directory is created if missing. Serialization and file I/O run on the
/// blocking pool; newline-delimited output additionally encodes each chunk of
/// `chunk_size` records on the rayon pool. On any error the temporary file is
/// removed and nothing appears under the final name.
///
/// # Arguments
///
/// * `dir` - Output directory
/// * `file_name` - Final file name inside `dir`
/// * `format` - Whole-array or newline-delimited layout
/// * `records` - Records in output order
/// * `chunk_size` - Records per serialization chunk (newline-delimited only)
pub async fn write_dataset(
    dir: &Path,
    file_name: &str,
    format: OutputFormat,
    records: Vec<Record>,
    chunk_size: usize,
) -> OutputResult<WrittenDataset> {
    let dir = dir.to_path_buf();
    let file_name = file_name.to_string();

    tokio::task::spawn_blocking(move || {
        write_blocking(&dir, &file_name, format, &records, chunk_size)
    })
    .await
    .map_err(|e| OutputError::Worker(e.to_string()))?
}

fn write_blocking(
    dir: &Path,
    file_name: &str,
    format: OutputFormat,
    records: &[Record],
    chunk_size: usize,
) -> OutputResult<WrittenDataset> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);

    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::with_capacity(JSONL_BUFFER_CAPACITY, temp);

    match format {
        OutputFormat::JsonArray => write_array(&mut writer, records)?,
        OutputFormat::JsonLines => write_lines(&mut writer, records, chunk_size)?,
    }

    let temp = writer
        .into_inner()
        .map_err(|e| OutputError::Io(e.into_error()))?;
    temp.as_file().sync_all()?;
    let file = temp.persist(&path)?;
    let bytes = file.metadata()?.len();

    tracing::debug!(
        "Persisted {} records ({} bytes, {}) to {}",
        records.len(),
        bytes,
        format,
        path.display()
    );

    Ok(WrittenDataset {
        path,
        records: records.len(),
        bytes,
    })
}

fn write_array<W: Write>(writer: &mut W, records: &[Record]) -> OutputResult<()> {
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut *writer, formatter);
    records.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn write_lines<W: Write>(writer: &mut W, records: &[Record], chunk_size: usize) -> OutputResult<()> {
    for (index, chunk) in records.chunks(chunk_size.max(1)).enumerate() {
        let lines = chunk
            .par_iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<String>, _>>()?;

        for line in &lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        tracing::info!("Processed and wrote chunk {}", index + 1);
    }
    Ok(())
}

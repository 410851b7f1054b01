//! Flat text report: one detection per line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::detection::Detection;
use crate::error::{Error, Result};

/// Writes `detections` to `path`, one line each, replacing any existing file.
pub fn write(path: &Path, detections: &[Detection]) -> Result<()> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for detection in detections {
        writeln!(writer, "{detection}").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    tracing::info!(
        path = %path.display(),
        count = detections.len(),
        "Wrote detection report"
    );
    Ok(())
}

/// Reads a report produced by [`write`]. Blank lines are ignored.
pub fn read(path: &Path) -> Result<Vec<Detection>> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut detections = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let detection = line.parse().map_err(|source| Error::Report {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        detections.push(detection);
    }
    Ok(detections)
}

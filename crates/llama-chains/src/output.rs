//! CSV persistence for a cycle's rows.

use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::Row;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Column names, in file order.
pub const HEADER: [&str; 3] = ["Name", "Protocols", "TVL"];

/// `chrono` pattern for cycle file names: day-month-year_hour-minute.
pub const FILE_STAMP_FORMAT: &str = "%d-%m-%Y_%H-%M";

/// File name for a cycle completed at `at`, e.g. `17-10-2026_14-05.csv`.
pub fn cycle_file_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}.csv", at.format(FILE_STAMP_FORMAT))
}

/// Full path for a cycle completed at `at` inside `dir`.
pub fn cycle_path<Tz>(dir: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dir.join(cycle_file_name(at))
}

/// Write `rows` to `path` with a header line, replacing any existing file.
pub fn write_rows(path: &Path, rows: &[Row]) -> ScrapeResult<()> {
    let wrap = |source: csv::Error| ScrapeError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| wrap(e.into()))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
    writer.write_record(HEADER).map_err(wrap)?;
    for row in rows {
        writer
            .write_record([&row.name, &row.protocols, &row.tvl])
            .map_err(wrap)?;
    }
    writer.flush().map_err(|e| wrap(e.into()))?;
    Ok(())
}

/// Read back a file written by [`write_rows`].
pub fn read_rows(path: &Path) -> ScrapeResult<Vec<Row>> {
    let wrap = |source: csv::Error| ScrapeError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(wrap)?;
    let headers = reader.headers().map_err(wrap)?;
    if headers.iter().ne(HEADER) {
        return Err(ScrapeError::FileRead {
            path: path.to_path_buf(),
            source: csv::Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected header: {headers:?}"),
            )),
        });
    }

    reader
        .deserialize()
        .collect::<Result<Vec<Row>, _>>()
        .map_err(wrap)
}

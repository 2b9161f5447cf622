//! Per-day CSV logs
//!
//! One file per sensor group per calendar day, `<dir>/<prefix>_<YYYYMMDD>.csv`.
//! Rows have no header; columns are positional. Each append opens the file,
//! writes one `\r\n`-terminated row and closes it again.

use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::shared::{FILE_DATE, ROW_TIMESTAMP};

pub const AIR_PREFIX: &str = "inAir_logs";
pub const SOIL_PREFIX: &str = "inSoil_logs";
pub const CPU_PREFIX: &str = "cpu_logs";

/// Anything that can be written as one log row
pub trait Record {
    /// Local time of the reading; also picks the day file
    fn taken_at(&self) -> DateTime<Local>;

    /// Cells after the timestamp column
    fn fields(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct DayLog {
    dir: PathBuf,
    prefix: String,
}

impl DayLog {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, date.format(FILE_DATE)))
    }

    /// Append one row, returning the file written
    pub fn append<R: Record + ?Sized>(&self, record: &R) -> io::Result<PathBuf> {
        let taken_at = record.taken_at();
        let path = self.path_for(taken_at.date_naive());

        let mut line = escape_field(&taken_at.format(ROW_TIMESTAMP).to_string());
        for field in record.fields() {
            line.push(',');
            line.push_str(&escape_field(&field));
        }
        line.push_str("\r\n");

        let mut file = OpenOptions::new().append(true).create(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(path)
    }
}

/// Create the output directory if it does not exist yet
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        tracing::info!("Created log directory {:?}", dir);
    }
    Ok(())
}

fn escape_field(field: &str) -> String {
    if field.contains(&[',', '"', '\r', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use hdv::{
    io::text::{HdvTextWriter, HdvTextWriterOptions},
    serde::{HdvScheme, HdvSerialize},
};
use hdv_derive::HdvSerde;
use tracing::info;

/// CSV file with one row per record and a header line.
#[derive(Debug)]
pub struct CsvLogger<T> {
    writer: HdvTextWriter<File, T>,
}
impl<T> CsvLogger<T>
where
    T: HdvScheme + HdvSerialize,
{
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let options = HdvTextWriterOptions {
            is_csv_header: true,
        };
        let writer = HdvTextWriter::new(file, options);
        Ok(Self { writer })
    }

    pub fn write(&mut self, record: &T) -> io::Result<()> {
        self.writer.write(record)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug, Clone, HdvSerde)]
pub struct SampleRecord {
    pub msg_bytes: u64,
    pub msg_count: u64,
    pub sample: u64,
    /// Elapsed nanoseconds for RTT rows, bits per second for throughput rows
    pub metric: f64,
    /// 1 if the sample validated, else 0
    pub valid: u8,
}

/// Human-readable run log, appended to across runs.
#[derive(Debug)]
pub struct TextLogger {
    file: File,
}
impl TextLogger {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::options().append(true).create(true).open(path)?;
        Ok(Self { file })
    }

    pub fn line(&mut self, line: &str) -> io::Result<()> {
        info!("{line}");
        writeln!(self.file, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

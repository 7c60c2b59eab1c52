use std::{
    collections::{HashMap, hash_map::Entry},
    fs, io,
    path::{Path, PathBuf},
};

use common::{
    error::AnyError,
    log::{CsvLogger, SampleRecord, TextLogger},
};
use protocol::{
    session::TrialSink,
    trial::{MeasurementKind, Sample, TransportMode, TrialSpec},
};

/// Writes the run log and one CSV per measurement kind and transport mode.
#[derive(Debug)]
pub struct ReportSink {
    output_dir: PathBuf,
    log: TextLogger,
    tables: HashMap<(MeasurementKind, TransportMode), CsvLogger<SampleRecord>>,
}
impl ReportSink {
    pub fn create(log_file: &Path, output_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(output_dir)?;
        let log = TextLogger::open(log_file)?;
        Ok(Self {
            output_dir: output_dir.to_owned(),
            log,
            tables: HashMap::new(),
        })
    }

    pub fn csv_path(output_dir: &Path, kind: MeasurementKind, mode: TransportMode) -> PathBuf {
        output_dir.join(format!("{}_{}.csv", kind.label(), mode.label()))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for table in self.tables.values_mut() {
            table.flush()?;
        }
        self.log.flush()
    }

    fn table(&mut self, spec: &TrialSpec) -> io::Result<&mut CsvLogger<SampleRecord>> {
        let table = match self.tables.entry((spec.kind, spec.transport_mode)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = Self::csv_path(&self.output_dir, spec.kind, spec.transport_mode);
                entry.insert(CsvLogger::create(path)?)
            }
        };
        Ok(table)
    }
}
impl TrialSink for ReportSink {
    fn trial_started(&mut self, spec: &TrialSpec) -> Result<(), AnyError> {
        self.log.line(&spec.headline())?;
        Ok(())
    }

    fn trial_finished(&mut self, spec: &TrialSpec, samples: &[Sample]) -> Result<(), AnyError> {
        for sample in samples {
            let record = sample.record(spec);
            let line = match spec.kind {
                MeasurementKind::Rtt => format!("{:.0}", record.metric),
                MeasurementKind::Throughput => format!("{:.0} bits/s", record.metric),
            };
            if sample.valid {
                self.log.line(&line)?;
            } else {
                self.log.line(&format!("{line} (invalid)"))?;
            }
            self.table(spec)?.write(&record)?;
        }
        self.table(spec)?.flush()?;
        Ok(())
    }
}

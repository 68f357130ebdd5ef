//! CsvStore - append-only CSV file per device class

use contracts::{ContractError, DeviceKind, SampleStore, SensorSample};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Fixed header row written when the file is created
pub const CSV_HEADER: &str =
    "timestamp,acc_x,acc_y,acc_z,gyro_x,gyro_y,gyro_z,mag_x,mag_y,mag_z";

/// Store that appends samples as CSV rows
pub struct CsvStore {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl CsvStore {
    /// Create a store writing `<dir>/<file_stem>.csv`
    ///
    /// The directory is created eagerly, the file on first append.
    pub fn new(
        name: impl Into<String>,
        dir: impl AsRef<Path>,
        file_stem: &str,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;

        Ok(Self {
            name: name.into(),
            path: dir.as_ref().join(format!("{file_stem}.csv")),
            writer: None,
        })
    }

    /// One file per device class
    pub fn for_device_kind(dir: impl AsRef<Path>, kind: DeviceKind) -> std::io::Result<Self> {
        Self::new(format!("csv_{kind}"), dir, kind.as_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let needs_header = file.metadata()?.len() == 0;

            let mut writer = BufWriter::new(file);
            if needs_header {
                writeln!(writer, "{CSV_HEADER}")?;
                debug!(store = %self.name, path = %self.path.display(), "csv store created");
            }
            self.writer = Some(writer);
        }

        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(std::io::Error::other("csv writer unavailable")),
        }
    }

    fn write_rows(&mut self, samples: &[SensorSample]) -> std::io::Result<()> {
        let writer = self.writer()?;
        for s in samples {
            write!(
                writer,
                "{},{},{},{},{},{},{}",
                s.timestamp, s.acc.x, s.acc.y, s.acc.z, s.gyro.x, s.gyro.y, s.gyro.z
            )?;
            match s.mag {
                Some(m) => writeln!(writer, ",{},{},{}", m.x, m.y, m.z)?,
                None => writeln!(writer, ",,,")?,
            }
        }
        writer.flush()
    }

    fn persist(&mut self, samples: &[SensorSample]) -> Result<(), ContractError> {
        self.write_rows(samples).map_err(|e| {
            error!(store = %self.name, rows = samples.len(), error = %e, "Write failed");
            ContractError::store_write(&self.name, e.to_string())
        })
    }
}

impl SampleStore for CsvStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "csv_store_append",
        skip(self, samples),
        fields(store = %self.name, rows = samples.len())
    )]
    async fn append(&mut self, samples: &[SensorSample]) -> Result<(), ContractError> {
        self.persist(samples)
    }

    #[instrument(name = "csv_store_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    #[instrument(name = "csv_store_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(store = %self.name, "CsvStore closed");
        Ok(())
    }
}

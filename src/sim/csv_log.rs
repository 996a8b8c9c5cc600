use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use log::warn;

use crate::sim::event::Tick;

// All controller instances in the process share one CSV stream; it is
// opened (truncating) at first use and lives until process end.
pub const CSV_FILE_NAME: &str = "mlprefetch_stats.csv";

const CSV_HEADER: &str = "epoch,tick,state,miss_rate,delta_miss,ipc,delta_ipc,accuracy,action";

#[derive(Debug, Clone, Copy)]
pub struct EpochCsvRow {
    pub epoch: u64,
    pub tick: Tick,
    pub state: u64,
    pub miss_rate: f64,
    pub delta_miss: f64,
    pub ipc: f64,
    pub delta_ipc: f64,
    pub accuracy: f64,
    // Semantic action: -1 is OFF, otherwise a child index.
    pub action: i64,
}

pub struct CsvLog {
    writer: Mutex<BufWriter<File>>,
}

impl CsvLog {
    pub fn create(path: &Path) -> Option<Arc<CsvLog>> {
        let file = match File::create(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(
                    "could not open {}: {}; CSV logging disabled",
                    path.display(),
                    err
                );
                return None;
            }
        };
        let mut writer = BufWriter::new(file);
        let _ = writeln!(writer, "{CSV_HEADER}");
        Some(Arc::new(CsvLog {
            writer: Mutex::new(writer),
        }))
    }

    pub fn write_row(&self, row: &EpochCsvRow) {
        if let Ok(mut guard) = self.writer.lock() {
            let _ = writeln!(
                guard,
                "{},{},{},{},{},{},{},{},{}",
                row.epoch,
                row.tick,
                row.state,
                row.miss_rate,
                row.delta_miss,
                row.ipc,
                row.delta_ipc,
                row.accuracy,
                row.action
            );
            let _ = guard.flush();
        }
    }
}

static CSV_LOGGER: OnceLock<Option<Arc<CsvLog>>> = OnceLock::new();

pub fn global() -> Option<Arc<CsvLog>> {
    CSV_LOGGER
        .get_or_init(|| CsvLog::create(Path::new(CSV_FILE_NAME)))
        .clone()
}

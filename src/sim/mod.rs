pub mod config;
pub mod csv_log;
pub mod event;
pub mod top;

pub use config::{Config, TopConfig};
pub use csv_log::{CsvLog, EpochCsvRow};
pub use event::{EventQueue, Tick};
pub use top::SimTop;

extern crate serde;

pub mod analysis;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod io;
pub mod records;
pub mod stats;

pub use analysis::{analyze, Analysis};
pub use cleaner::{
    clean, coerce_types, drop_columns, duplicate_count, filter_invalid_age, load, rename_columns,
    CleanReport, Cleaned, TabularCleaner,
};
pub use config::{CleanerConfig, PatientIdSource};
pub use error::{CleanError, Step};
pub use records::AppointmentRecord;
pub use stats::{summarize, Stats};

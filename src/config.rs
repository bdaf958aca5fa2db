use std::path::PathBuf;

use clap::ValueEnum;
use lazy_static::lazy_static;
use serde::Serialize;

use crate::records::{
    ALCOHOLISM, APPOINTMENT_DAY, APPOINTMENT_ID, DIABETES, HANDICAP, HYPERTENSION, PATIENT_ID,
    SCHEDULED_DAY, SCHOLARSHIP, SMS_RECEIVED,
};

pub const DEFAULT_INPUT: &str = "noshowappointments-kagglev2-may-2016.csv";

lazy_static! {
    /// Spelling fixes applied before column names are lowercased.
    pub static ref RENAME_MAPPING: Vec<(String, String)> = vec![
        ("Hipertension".to_string(), "Hypertension".to_string()),
        ("Handcap".to_string(), "Handicap".to_string()),
        ("SMS_received".to_string(), "SMSReceived".to_string()),
        ("No-show".to_string(), "NoShow".to_string()),
    ];
}

/// Which source column `patientid` is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum PatientIdSource {
    /// The `PatientId` column, cast to an integer.
    #[default]
    Patient,
    /// A copy of `AppointmentID`, as the first published analysis did.
    Appointment,
}

/// Everything the cleaning pipeline needs besides the table itself.
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub input: PathBuf,
    pub rename: Vec<(String, String)>,
    pub date_columns: Vec<String>,
    pub flag_columns: Vec<String>,
    pub identifier_columns: Vec<String>,
    pub patient_id_source: PatientIdSource,
    pub drop_identifiers: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        CleanerConfig {
            input: PathBuf::from(DEFAULT_INPUT),
            rename: RENAME_MAPPING.clone(),
            date_columns: owned(&[SCHEDULED_DAY, APPOINTMENT_DAY]),
            flag_columns: owned(&[
                SCHOLARSHIP,
                HYPERTENSION,
                DIABETES,
                ALCOHOLISM,
                HANDICAP,
                SMS_RECEIVED,
            ]),
            identifier_columns: owned(&[PATIENT_ID, APPOINTMENT_ID]),
            patient_id_source: PatientIdSource::default(),
            drop_identifiers: true,
        }
    }
}

impl CleanerConfig {
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

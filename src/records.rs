use chrono::NaiveDate;
use polars::prelude::{DataFrame, DataType, Field, Schema, Series};
use serde::Serialize;

use crate::error::{CleanError, Step};

/// Header of the source file, in file order.
pub const SOURCE_COLUMNS: [&str; 14] = [
    "PatientId",
    "AppointmentID",
    "Gender",
    "ScheduledDay",
    "AppointmentDay",
    "Age",
    "Neighbourhood",
    "Scholarship",
    "Hipertension",
    "Diabetes",
    "Alcoholism",
    "Handcap",
    "SMS_received",
    "No-show",
];

pub const PATIENT_ID: &str = "patientid";
pub const APPOINTMENT_ID: &str = "appointmentid";
pub const GENDER: &str = "gender";
pub const SCHEDULED_DAY: &str = "scheduledday";
pub const APPOINTMENT_DAY: &str = "appointmentday";
pub const AGE: &str = "age";
pub const NEIGHBOURHOOD: &str = "neighbourhood";
pub const SCHOLARSHIP: &str = "scholarship";
pub const HYPERTENSION: &str = "hypertension";
pub const DIABETES: &str = "diabetes";
pub const ALCOHOLISM: &str = "alcoholism";
pub const HANDICAP: &str = "handicap";
pub const SMS_RECEIVED: &str = "smsreceived";
pub const NO_SHOW: &str = "noshow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Gender::Male),
            "f" | "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Target label: whether the patient missed the appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NoShow {
    Yes,
    No,
}

impl NoShow {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(NoShow::Yes),
            "no" => Some(NoShow::No),
            _ => None,
        }
    }

    /// Label used in the `noshow` column.
    pub fn label(self) -> &'static str {
        match self {
            NoShow::Yes => "Yes",
            NoShow::No => "No",
        }
    }
}

/// One cleaned appointment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentRecord {
    pub patient_id: Option<i64>,
    pub gender: Gender,
    pub scheduled_day: NaiveDate,
    pub appointment_day: NaiveDate,
    pub age: i64,
    pub neighbourhood: String,
    pub scholarship: String,
    pub hypertension: String,
    pub diabetes: String,
    pub alcoholism: String,
    pub handicap: String,
    pub sms_received: String,
    pub no_show: NoShow,
}

impl AppointmentRecord {
    /// Dtypes the source file is read with. Dates stay text until coercion.
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("PatientId", DataType::Float64),
            Field::new("AppointmentID", DataType::Int64),
            Field::new("Gender", DataType::Utf8),
            Field::new("ScheduledDay", DataType::Utf8),
            Field::new("AppointmentDay", DataType::Utf8),
            Field::new("Age", DataType::Int64),
            Field::new("Neighbourhood", DataType::Utf8),
            Field::new("Scholarship", DataType::Int64),
            Field::new("Hipertension", DataType::Int64),
            Field::new("Diabetes", DataType::Int64),
            Field::new("Alcoholism", DataType::Int64),
            Field::new("Handcap", DataType::Int64),
            Field::new("SMS_received", DataType::Int64),
            Field::new("No-show", DataType::Utf8),
        ])
    }

    /// Materialises typed records from a cleaned frame.
    ///
    /// `patient_id` is filled only while the `patientid` column is still present.
    pub fn from_frame(df: &DataFrame) -> Result<Vec<AppointmentRecord>, CleanError> {
        let patient_ids: Option<Vec<Option<i64>>> = match df.column(PATIENT_ID) {
            Ok(series) => Some(series.cast(&DataType::Int64)?.i64()?.into_iter().collect()),
            Err(_) => None,
        };

        let gender = text_column(df, GENDER)?;
        let scheduled = date_column(df, SCHEDULED_DAY)?;
        let appointment = date_column(df, APPOINTMENT_DAY)?;
        let age: Vec<Option<i64>> = column(df, AGE)?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect();
        let neighbourhood = text_column(df, NEIGHBOURHOOD)?;
        let scholarship = text_column(df, SCHOLARSHIP)?;
        let hypertension = text_column(df, HYPERTENSION)?;
        let diabetes = text_column(df, DIABETES)?;
        let alcoholism = text_column(df, ALCOHOLISM)?;
        let handicap = text_column(df, HANDICAP)?;
        let sms_received = text_column(df, SMS_RECEIVED)?;
        let no_show = text_column(df, NO_SHOW)?;

        let mut records = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let gender_value = required(GENDER, &gender[idx])?;
            let no_show_value = required(NO_SHOW, &no_show[idx])?;
            records.push(AppointmentRecord {
                patient_id: patient_ids.as_ref().and_then(|ids| ids[idx]),
                gender: Gender::parse(gender_value)
                    .ok_or_else(|| invalid(GENDER, gender_value))?,
                scheduled_day: required_date(SCHEDULED_DAY, scheduled[idx])?,
                appointment_day: required_date(APPOINTMENT_DAY, appointment[idx])?,
                age: age[idx].ok_or_else(|| invalid(AGE, "null"))?,
                neighbourhood: required(NEIGHBOURHOOD, &neighbourhood[idx])?.to_string(),
                scholarship: flag(SCHOLARSHIP, &scholarship[idx])?,
                hypertension: flag(HYPERTENSION, &hypertension[idx])?,
                diabetes: flag(DIABETES, &diabetes[idx])?,
                alcoholism: flag(ALCOHOLISM, &alcoholism[idx])?,
                handicap: flag(HANDICAP, &handicap[idx])?,
                sms_received: flag(SMS_RECEIVED, &sms_received[idx])?,
                no_show: NoShow::parse(no_show_value)
                    .ok_or_else(|| invalid(NO_SHOW, no_show_value))?,
            });
        }
        Ok(records)
    }
}

/// Every value of a column as text, casting categoricals and numbers first.
pub fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, CleanError> {
    let series = column(df, name)?.cast(&DataType::Utf8)?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn date_column(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>, CleanError> {
    let series = column(df, name)?;
    if series.dtype() != &DataType::Date {
        return Err(CleanError::InvalidValue {
            step: Step::Extract,
            column: name.to_string(),
            value: format!("dtype {}", series.dtype()),
        });
    }
    let dates = series.date()?.as_date_iter().collect();
    Ok(dates)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series, CleanError> {
    df.column(name).map_err(|_| CleanError::Schema {
        step: Step::Extract,
        column: name.to_string(),
    })
}

fn required<'a>(column: &str, value: &'a Option<String>) -> Result<&'a str, CleanError> {
    value.as_deref().ok_or_else(|| invalid(column, "null"))
}

/// Flag values are small non-negative integers; `handicap` goes up to 4.
fn flag(column: &str, value: &Option<String>) -> Result<String, CleanError> {
    let value = required(column, value)?;
    match value.trim().parse::<u8>() {
        Ok(_) => Ok(value.trim().to_string()),
        Err(_) => Err(invalid(column, value)),
    }
}

fn required_date(column: &str, value: Option<NaiveDate>) -> Result<NaiveDate, CleanError> {
    value.ok_or_else(|| invalid(column, "null"))
}

fn invalid(column: &str, value: &str) -> CleanError {
    CleanError::InvalidValue {
        step: Step::Extract,
        column: column.to_string(),
        value: value.to_string(),
    }
}

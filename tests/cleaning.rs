use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use noshow_appointments::analysis::analyze;
use noshow_appointments::io::{export, WriteFormat};
use noshow_appointments::records::{Gender, NoShow};
use noshow_appointments::{
    clean, drop_columns, filter_invalid_age, load, rename_columns, summarize, AppointmentRecord,
    CleanError, CleanerConfig, PatientIdSource, Step, TabularCleaner,
};
use polars::prelude::*;

fn sample_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/appointments_sample.csv")
}

fn sample_header() -> String {
    fs::read_to_string(sample_path())
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string()
}

fn cleaner(config: CleanerConfig) -> TabularCleaner {
    TabularCleaner::new(config.with_input(sample_path()))
}

#[test]
fn load_reads_every_row_with_raw_dtypes() {
    let df = load(sample_path()).unwrap();
    assert_eq!(df.shape(), (12, 14));
    assert_eq!(df.column("PatientId").unwrap().dtype(), &DataType::Float64);
    assert_eq!(df.column("Age").unwrap().dtype(), &DataType::Int64);
    assert_eq!(df.column("ScheduledDay").unwrap().dtype(), &DataType::Utf8);
}

#[test]
fn load_reports_missing_file_as_parse_error() {
    let err = load("does/not/exist.csv").unwrap_err();
    assert!(matches!(err, CleanError::Parse { .. }));
}

#[test]
fn load_reports_missing_header_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_handcap.csv");
    let header = sample_header().replace("Handcap,", "");
    fs::write(
        &path,
        format!(
            "{}\n1,2,F,2016-04-29T18:38:08Z,2016-04-29T00:00:00Z,62,CENTRO,0,1,0,0,0,No\n",
            header
        ),
    )
    .unwrap();

    let err = load(&path).unwrap_err();
    assert!(matches!(
        err,
        CleanError::Schema { step: Step::Load, ref column } if column == "Handcap"
    ));
}

#[test]
fn load_reports_malformed_age() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_age.csv");
    fs::write(
        &path,
        format!(
            "{}\n1,2,F,2016-04-29T18:38:08Z,2016-04-29T00:00:00Z,sixty,CENTRO,0,1,0,0,0,0,No\n",
            sample_header()
        ),
    )
    .unwrap();

    let err = load(&path).unwrap_err();
    assert!(matches!(err, CleanError::Parse { .. }));
}

#[test]
fn pipeline_cleans_sample() {
    let cleaned = cleaner(CleanerConfig::default()).run().unwrap();
    let report = &cleaned.report;

    assert_eq!(report.rows_loaded, 12);
    assert_eq!(report.columns_loaded, 14);
    assert_eq!(report.duplicate_rows, 0);
    assert_eq!(report.invalid_age_rows, 1);
    assert_eq!(report.duplicates_without_identifiers, Some(0));
    assert_eq!(report.rows_cleaned, 11);
    assert_eq!(
        report.columns,
        vec![
            "gender",
            "scheduledday",
            "appointmentday",
            "age",
            "neighbourhood",
            "scholarship",
            "hypertension",
            "diabetes",
            "alcoholism",
            "handicap",
            "smsreceived",
            "noshow",
        ]
    );
    assert_eq!(cleaned.frame.shape(), (11, 12));
}

#[test]
fn clean_matches_configured_cleaner() {
    let cleaned = clean(sample_path(), CleanerConfig::default()).unwrap();
    let expected = cleaner(CleanerConfig::default()).run().unwrap();
    assert_eq!(cleaned.report, expected.report);
    assert!(clean("does/not/exist.csv", CleanerConfig::default()).is_err());
}

#[test]
fn cleaned_age_summary_has_no_negative_minimum() {
    let cleaned = cleaner(CleanerConfig::default()).run().unwrap();
    let stats = summarize(&cleaned.frame, "age").unwrap();
    assert_eq!(stats.count, 11);
    assert_eq!(stats.min, 0.0);
    assert_eq!(stats.max, 115.0);
    assert_eq!(stats.median, 56.0);
    assert!((stats.mean - 518.0 / 11.0).abs() < 1e-9);
}

#[test]
fn renamed_columns_drop_misspellings() {
    let raw = load(sample_path()).unwrap();
    let renamed = rename_columns(&raw, &CleanerConfig::default().rename).unwrap();
    let names: Vec<&str> = renamed.get_column_names();
    for misspelled in ["Hipertension", "Handcap", "SMS_received", "No-show"] {
        assert!(!names.contains(&misspelled));
        assert!(!names.contains(&misspelled.to_lowercase().as_str()));
    }
}

#[test]
fn records_are_typed() {
    let cleaned = cleaner(CleanerConfig::default()).run().unwrap();
    let records = cleaned.records().unwrap();
    assert_eq!(records.len(), 11);

    let first = &records[0];
    assert_eq!(first.patient_id, None);
    assert_eq!(first.gender, Gender::Female);
    assert_eq!(first.scheduled_day, NaiveDate::from_ymd_opt(2016, 4, 29).unwrap());
    assert_eq!(first.appointment_day, NaiveDate::from_ymd_opt(2016, 4, 29).unwrap());
    assert_eq!(first.age, 62);
    assert_eq!(first.hypertension, "1");
    assert_eq!(first.no_show, NoShow::No);

    let oldest = records.iter().max_by_key(|r| r.age).unwrap();
    assert_eq!(oldest.age, 115);
    assert_eq!(oldest.gender, Gender::Male);
    assert_eq!(oldest.handicap, "4");
    assert_eq!(oldest.neighbourhood, "SÃO JOSÉ");
    assert_eq!(oldest.no_show, NoShow::Yes);
    assert!(records.iter().all(|r| r.age >= 0));
}

#[test]
fn identifiers_follow_configured_source() {
    let kept = CleanerConfig {
        drop_identifiers: false,
        ..CleanerConfig::default()
    };
    let records = cleaner(kept.clone()).run().unwrap().records().unwrap();
    assert_eq!(records[0].patient_id, Some(29872499824296));

    let legacy = CleanerConfig {
        patient_id_source: PatientIdSource::Appointment,
        ..kept
    };
    let records = cleaner(legacy).run().unwrap().records().unwrap();
    assert_eq!(records[0].patient_id, Some(5642903));
}

#[test]
fn dropping_identifiers_is_order_independent() {
    let kept = CleanerConfig {
        drop_identifiers: false,
        ..CleanerConfig::default()
    };
    let frame = cleaner(kept).run().unwrap().frame;

    let (together, _) = drop_columns(&frame, &["patientid", "appointmentid"]).unwrap();
    let (patient, _) = drop_columns(&frame, &["patientid"]).unwrap();
    let (patient_then_appointment, _) = drop_columns(&patient, &["appointmentid"]).unwrap();
    let (appointment, _) = drop_columns(&frame, &["appointmentid"]).unwrap();
    let (appointment_then_patient, _) = drop_columns(&appointment, &["patientid"]).unwrap();

    assert!(together.frame_equal(&patient_then_appointment));
    assert!(together.frame_equal(&appointment_then_patient));
}

#[test]
fn reference_sized_table_loses_exactly_one_row() {
    let mut ages: Vec<i64> = (0..110_527).map(|i| i % 116).collect();
    ages[99_832] = -1;
    let df = df!("age" => ages).unwrap();

    let (filtered, removed) = filter_invalid_age(&df).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(filtered.height(), 110_526);
    assert_eq!(summarize(&filtered, "age").unwrap().min, 0.0);
}

#[test]
fn analysis_matches_sample() {
    let config = CleanerConfig::default();
    let cleaned = cleaner(config.clone()).run().unwrap();
    let analysis = analyze(&cleaned.frame, &config.flag_columns).unwrap();

    assert_eq!(analysis.distinct_values["gender"], vec!["F", "M"]);
    assert_eq!(analysis.distinct_values["handicap"], vec!["0", "4"]);
    assert_eq!(analysis.neighbourhood_count, 8);
    assert_eq!(
        analysis.neighbourhoods,
        vec![
            "ANDORINHAS",
            "CONQUISTA",
            "GOIABEIRAS",
            "JARDIM DA PENHA",
            "MATA DA PRAIA",
            "PONTAL DE CAMBURI",
            "REPÚBLICA",
            "SÃO JOSÉ",
        ]
    );
    let ages: Vec<(&str, usize)> = analysis
        .age_counts
        .iter()
        .map(|c| (c.value.as_str(), c.count))
        .collect();
    assert_eq!(
        ages,
        vec![
            ("0", 1),
            ("8", 1),
            ("21", 1),
            ("23", 1),
            ("39", 1),
            ("56", 2),
            ("62", 2),
            ("76", 1),
            ("115", 1),
        ]
    );
    assert_eq!(analysis.gender_distribution[0].value, "F");
    assert_eq!(analysis.gender_distribution[0].count, 9);
    assert_eq!(analysis.mean_age.no_show, Some(59.0));
    assert_eq!(analysis.mean_age.show, Some(42.625));

    let scholarship_no_show: usize = analysis
        .no_show_by_scholarship
        .iter()
        .filter(|c| c.row == "1")
        .map(|c| c.count)
        .sum();
    assert_eq!(scholarship_no_show, 1);
}

#[test]
fn export_writes_csv_and_parquet() {
    let cleaned = cleaner(CleanerConfig::default()).run().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("clean.csv");
    assert_eq!(export(&csv_path, None, &cleaned.frame).unwrap(), WriteFormat::Csv);
    let written = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(written.lines().count(), 12);
    assert!(written.starts_with("gender,scheduledday,appointmentday,age"));

    let parquet_path = dir.path().join("clean.parquet");
    assert_eq!(
        export(&parquet_path, None, &cleaned.frame).unwrap(),
        WriteFormat::Parquet
    );
    assert!(fs::metadata(&parquet_path).unwrap().len() > 0);

    let forced = dir.path().join("clean.out");
    assert_eq!(
        export(&forced, Some(WriteFormat::Csv), &cleaned.frame).unwrap(),
        WriteFormat::Csv
    );
}

#[test]
fn typed_records_survive_json() {
    let cleaned = cleaner(CleanerConfig::default()).run().unwrap();
    let records: Vec<AppointmentRecord> = cleaned.records().unwrap();
    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["scheduled_day"], "2016-04-29");
    assert_eq!(json["gender"], "Female");
    assert_eq!(json["no_show"], "No");
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{ArgAction, Parser};
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use serde::Serialize;
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

use noshow_appointments::analysis::{analyze, Analysis, CrossCount};
use noshow_appointments::config::{CleanerConfig, PatientIdSource, DEFAULT_INPUT};
use noshow_appointments::io::{export, WriteFormat};
use noshow_appointments::{AppointmentRecord, CleanError, CleanReport, Cleaned, TabularCleaner};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(default_value = DEFAULT_INPUT, help = "Appointment CSV to clean")]
    input: PathBuf,
    #[arg(short, long, help = "Write the cleaned table to this path")]
    output: Option<PathBuf>,
    #[arg(short, long, value_enum, help = "Output format, inferred from the extension if absent")]
    format: Option<WriteFormat>,
    #[arg(long, value_enum, default_value_t = PatientIdSource::Patient,
    help = "Column the patientid values are taken from")]
    patient_id_source: PatientIdSource,
    #[arg(long, help = "Keep patientid and appointmentid in the cleaned table")]
    keep_identifiers: bool,
    #[arg(long, default_value_t = 5, help = "Number of cleaned rows to show")]
    head: usize,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Verbose level")]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> CleanerConfig {
        CleanerConfig {
            patient_id_source: self.patient_id_source,
            drop_identifiers: !self.keep_identifiers,
            ..CleanerConfig::default()
        }
        .with_input(&self.input)
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    report: &'a CleanReport,
    head: Vec<AppointmentRecord>,
    analysis: &'a Analysis,
}

fn monitor_memory() -> u64 {
    let mut sys = System::new();
    match get_current_pid() {
        Ok(pid) => {
            sys.refresh_process(pid);
            sys.process(pid).map(|process| process.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("NOSHOW_LOG");
    Builder::new()
        .filter(Some("noshow_appointments"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    let start_time = Instant::now();
    let start_memory = monitor_memory();

    if let Err(err) = run(&cli) {
        eprintln!("error: {}", err);
        return ExitCode::FAILURE;
    }

    let end_memory = monitor_memory();
    info!("time elapsed: {:?}", start_time.elapsed());
    info!(
        "memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );
    ExitCode::SUCCESS
}

fn run(cli: &Cli) -> Result<(), CleanError> {
    let cleaner = TabularCleaner::new(cli.config());
    let cleaned = cleaner.run()?;
    let analysis = analyze(&cleaned.frame, &cleaner.config().flag_columns)?;

    if let Some(output) = &cli.output {
        export(output, cli.format, &cleaned.frame)?;
    }

    if cli.json {
        let summary = Summary {
            report: &cleaned.report,
            head: AppointmentRecord::from_frame(&cleaned.frame.head(Some(cli.head)))?,
            analysis: &analysis,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&cleaned, &analysis, cli.head);
    }
    Ok(())
}

fn print_report(cleaned: &Cleaned, analysis: &Analysis, head: usize) {
    let report = &cleaned.report;
    println!("{}", cleaned.frame.head(Some(head)));
    println!(
        "Loaded {} rows x {} columns; {} duplicated rows",
        report.rows_loaded, report.columns_loaded, report.duplicate_rows
    );
    println!("Removed {} rows with negative age", report.invalid_age_rows);
    if let Some(duplicates) = report.duplicates_without_identifiers {
        println!("Duplicated rows without identifiers: {}", duplicates);
    }
    println!(
        "Cleaned table: {} rows, columns {:?}",
        report.rows_cleaned, report.columns
    );

    for (column, values) in &analysis.distinct_values {
        println!("Unique values in {} column are {:?}", column, values);
    }
    println!(
        "{} neighbourhoods: {:?}",
        analysis.neighbourhood_count, analysis.neighbourhoods
    );
    println!("Patients per age:");
    for count in &analysis.age_counts {
        println!("  {:<8} {}", count.value, count.count);
    }

    println!("Gender distribution:");
    for count in &analysis.gender_distribution {
        println!("  {:<8} {}", count.value, count.count);
    }
    print_crosstab("Show/NoShow by gender", &analysis.no_show_by_gender);

    let age = &analysis.age;
    println!("Age:");
    println!("  Mean: {}", age.mean);
    println!("  Standard deviation: {}", age.std);
    println!("  Minimum: {}", age.min);
    println!("  Maximum: {}", age.max);
    println!("  Median: {}", age.median);
    if let Some(mean) = analysis.mean_age.show {
        println!("Mean age of patients who showed up: {}", mean);
    }
    if let Some(mean) = analysis.mean_age.no_show {
        println!("Mean age of patients who did not show up: {}", mean);
    }

    print_crosstab("Show/NoShow by scholarship", &analysis.no_show_by_scholarship);
    print_crosstab("Scholarship by gender", &analysis.scholarship_by_gender);
}

fn print_crosstab(title: &str, counts: &[CrossCount]) {
    println!("{}:", title);
    for count in counts {
        println!("  {:<8} {:<8} {}", count.row, count.column, count.count);
    }
}

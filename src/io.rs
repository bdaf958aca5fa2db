use std::fs::File;
use std::path::Path;

use clap::ValueEnum;
use log::info;
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;

use crate::error::CleanError;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, ValueEnum)]
pub enum WriteFormat {
    Csv,
    Parquet,
}

impl WriteFormat {
    /// Picks the format from the file extension.
    pub fn infer(path: &Path) -> Result<WriteFormat, CleanError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(WriteFormat::Csv),
            Some("parquet") | Some("pq") => Ok(WriteFormat::Parquet),
            _ => Err(CleanError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Writes the cleaned frame in `format`, or in the format implied by `path`.
pub fn export(
    path: &Path,
    format: Option<WriteFormat>,
    df: &DataFrame,
) -> Result<WriteFormat, CleanError> {
    let format = match format {
        Some(format) => format,
        None => WriteFormat::infer(path)?,
    };
    let mut df = df.clone();
    match format {
        WriteFormat::Csv => write_csv(path, &mut df)?,
        WriteFormat::Parquet => write_parquet(path, &mut df)?,
    }
    info!("wrote {} rows to {} as {:?}", df.height(), path.display(), format);
    Ok(format)
}

pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<(), CleanError> {
    let mut file = File::create(path)?;
    let mut plain = categories_as_text(df)?;

    CsvWriter::new(&mut file).finish(&mut plain)?;

    Ok(())
}

pub fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<(), CleanError> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

fn categories_as_text(df: &DataFrame) -> Result<DataFrame, CleanError> {
    let mut out = df.clone();
    for series in df.get_columns() {
        if matches!(series.dtype(), DataType::Categorical(_)) {
            out.replace_or_add(series.name(), series.cast(&DataType::Utf8)?)?;
        }
    }
    Ok(out)
}

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use gameinsights_core::{format_calendar_date, Field, FieldValue};

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

/// Row view of a command result for `--format csv`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn render(
    result: &CommandResult,
    format: OutputFormat,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write(&mut writer, result, format, pretty)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write(&mut writer, result, format, pretty)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn write<W: Write>(
    writer: &mut W,
    result: &CommandResult,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            if pretty {
                serde_json::to_writer_pretty(&mut *writer, &result.envelope)?;
            } else {
                serde_json::to_writer(&mut *writer, &result.envelope)?;
            }
            writeln!(writer)?;
        }
        OutputFormat::Csv => write_csv(writer, &result.table)?,
    }
    Ok(())
}

fn write_csv<W: Write>(writer: &mut W, table: &Table) -> Result<(), CliError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.headers)?;
    for row in &table.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Text form of one canonical value; unknown is an empty cell.
pub fn cell(field: Field, value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Unknown) => String::new(),
        Some(FieldValue::Text(text)) => text.clone(),
        Some(FieldValue::Integer(value)) => value.to_string(),
        Some(FieldValue::Float(value)) => value.to_string(),
        Some(FieldValue::Date(date)) => format_calendar_date(*date),
        Some(FieldValue::Flag(flag)) => flag.to_string(),
        Some(FieldValue::TextList(items)) => items.join(";"),
        Some(value @ (FieldValue::Series(_) | FieldValue::Table(_))) => {
            value.to_json(field.kind()).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use gameinsights_core::{Envelope, EnvelopeMeta, SeriesPoint, SourceId};
    use serde_json::{json, Value};

    use super::*;

    fn result() -> CommandResult {
        let meta = EnvelopeMeta::new("request-0001", "v1.0.0", vec![SourceId::SteamSpy], 5)
            .expect("valid meta");
        CommandResult {
            envelope: Envelope::success(meta, json!([{ "name": "Dota 2" }])),
            table: Table {
                headers: vec![String::from("steam_appid"), String::from("name")],
                rows: vec![vec![String::from("570"), String::from("Dota, 2")]],
            },
            has_failures: false,
        }
    }

    #[test]
    fn writes_csv_to_output_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.csv");

        render(&result(), OutputFormat::Csv, false, Some(&path)).expect("render");

        let written = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(written, "steam_appid,name\n570,\"Dota, 2\"\n");
    }

    #[test]
    fn writes_envelope_json_to_output_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.json");

        render(&result(), OutputFormat::Json, true, Some(&path)).expect("render");

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read back"))
                .expect("valid json");
        assert_eq!(written["meta"]["request_id"], "request-0001");
        assert_eq!(written["data"][0]["name"], "Dota 2");
    }

    #[test]
    fn cells_follow_csv_conventions() {
        assert_eq!(cell(Field::Name, Some(&FieldValue::Unknown)), "");
        assert_eq!(cell(Field::Tags, None), "");
        assert_eq!(
            cell(
                Field::Tags,
                Some(&FieldValue::TextList(vec![String::from("MOBA"), String::from("Free to Play")]))
            ),
            "MOBA;Free to Play"
        );
        assert_eq!(cell(Field::IsFree, Some(&FieldValue::Flag(true))), "true");

        let series = FieldValue::Series(vec![SeriesPoint {
            month: String::from("2024-01"),
            average_players: Some(10.5),
            gain: None,
            percentage_gain: None,
            peak_players: Some(12),
        }]);
        assert_eq!(
            cell(Field::MonthlyActivePlayer, Some(&series)),
            r#"[{"month":"2024-01","average_players":10.5,"gain":null,"percentage_gain":null,"peak_players":12}]"#
        );
    }
}

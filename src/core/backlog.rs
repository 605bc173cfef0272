//! Pending-delivery backlog: how late each undelivered shipment is at the
//! close of the previous day.

use crate::core::table::{cell, ColumnSpec, Table};
use crate::utils::error::{EtlError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

pub const BACKLOG_ID: ColumnSpec = ColumnSpec::new("Exp", &["Exp"]);
pub const BACKLOG_ARRIVAL: ColumnSpec = ColumnSpec::new("F.Llegada", &["F.Llegada", "Fecha llegada"]);
pub const BACKLOG_ZONE: ColumnSpec = ColumnSpec::new("Z.Rep", &["Z.Rep"]);
pub const BACKLOG_CONSIGNEE: ColumnSpec = ColumnSpec::new("Consignatario", &["Consignatario"]);
pub const BACKLOG_TOWN: ColumnSpec = ColumnSpec::new("Población", &["Población"]);
pub const BACKLOG_ADDRESS: ColumnSpec = ColumnSpec::new("Dir. entrega", &["Dir. entrega", "Dir.Entrega"]);
pub const BACKLOG_POSTAL_CODE: ColumnSpec = ColumnSpec::new("C.P.", &["C.P.", "CP", "Codigo postal"]);

pub const BACKLOG_HEADERS: [&str; 9] = [
    "Exp",
    "F.Llegada",
    "Z.Rep",
    "Consignatario",
    "Población",
    "Dir.Entrega",
    "C.P.",
    "Días de atraso",
    "Tramo",
];

// Two-digit years first: `%Y` would read "25" as year 25.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
    "%d-%m-%y %H:%M:%S",
    "%d-%m-%y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklogEntry {
    pub id: String,
    pub arrival: Option<NaiveDateTime>,
    pub zone: String,
    pub consignee: String,
    pub town: String,
    pub address: String,
    pub postal_code: String,
    pub days_late: Option<i64>,
    pub bucket: &'static str,
}

/// 23:59:59 of the day before `today`.
pub fn cutoff_for(today: NaiveDate) -> NaiveDateTime {
    let yesterday = today.pred_opt().unwrap_or(today);
    yesterday.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

/// Day-first parsing; a bare date is midnight.
pub fn parse_arrival(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

pub fn delay_bucket(hours: f64) -> &'static str {
    if hours <= 24.0 {
        "24"
    } else if hours <= 48.0 {
        "48h"
    } else {
        "+ de 48"
    }
}

/// Builds backlog entries sorted by days late, most late first; rows with no
/// usable arrival date go last in input order.
pub fn build_backlog(table: &Table, today: NaiveDate) -> Result<Vec<BacklogEntry>> {
    let id = table.require(&BACKLOG_ID)?;
    let arrival = table.require(&BACKLOG_ARRIVAL)?;
    let zone = table.require(&BACKLOG_ZONE)?;
    let consignee = table.require(&BACKLOG_CONSIGNEE)?;
    let town = table.require(&BACKLOG_TOWN)?;
    let address = table.require(&BACKLOG_ADDRESS)?;
    let postal_code = table.require(&BACKLOG_POSTAL_CODE)?;

    let cutoff = cutoff_for(today);

    let mut entries: Vec<BacklogEntry> = table
        .rows
        .iter()
        .map(|row| {
            let arrived = parse_arrival(cell(row, Some(arrival)));
            let hours = arrived.map(|a| (cutoff - a).num_seconds() as f64 / 3600.0);

            BacklogEntry {
                id: cell(row, Some(id)).to_string(),
                arrival: arrived,
                zone: cell(row, Some(zone)).to_string(),
                consignee: cell(row, Some(consignee)).to_string(),
                town: cell(row, Some(town)).to_string(),
                address: cell(row, Some(address)).to_string(),
                postal_code: cell(row, Some(postal_code)).to_string(),
                days_late: hours.map(|h| (h / 24.0).round_ties_even() as i64),
                bucket: hours.map(delay_bucket).unwrap_or(""),
            }
        })
        .collect();

    let undated = entries.iter().filter(|e| e.arrival.is_none()).count();
    if undated > 0 {
        tracing::warn!("⚠️ {} pending shipments have no parsable arrival date", undated);
    }

    entries.sort_by_key(|e| match e.days_late {
        Some(days) => (0, std::cmp::Reverse(days)),
        None => (1, std::cmp::Reverse(0)),
    });

    Ok(entries)
}

pub fn backlog_filename(today: NaiveDate) -> String {
    format!("atrasos_{}.csv", today.format("%Y-%m-%d"))
}

pub fn render_backlog(entries: &[BacklogEntry], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(BACKLOG_HEADERS)?;

    for e in entries {
        let arrival = e
            .arrival
            .map(|a| a.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default();
        let days = e.days_late.map(|d| d.to_string()).unwrap_or_default();

        writer.write_record([
            e.id.as_str(),
            arrival.as_str(),
            e.zone.as_str(),
            e.consignee.as_str(),
            e.town.as_str(),
            e.address.as_str(),
            e.postal_code.as_str(),
            days.as_str(),
            e.bucket,
        ])?;
    }

    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush backlog CSV: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn test_cutoff_is_end_of_yesterday() {
        let cutoff = cutoff_for(today());
        assert_eq!(cutoff.to_string(), "2025-03-09 23:59:59");
    }

    #[test]
    fn test_parse_arrival_day_first() {
        let parsed = parse_arrival("03/02/2025 14:30").unwrap();
        assert_eq!(parsed.to_string(), "2025-02-03 14:30:00");
        assert_eq!(parse_arrival("03-02-2025").unwrap().to_string(), "2025-02-03 00:00:00");
        assert_eq!(parse_arrival("2025-02-03").unwrap().to_string(), "2025-02-03 00:00:00");
        assert!(parse_arrival("").is_none());
        assert!(parse_arrival("ayer").is_none());
    }

    #[test]
    fn test_parse_arrival_two_digit_year() {
        assert_eq!(parse_arrival("03/02/25 14:30").unwrap().to_string(), "2025-02-03 14:30:00");
        assert_eq!(parse_arrival("03-02-25 14:30:15").unwrap().to_string(), "2025-02-03 14:30:15");
        assert_eq!(parse_arrival("03-02-25").unwrap().to_string(), "2025-02-03 00:00:00");
        assert_eq!(parse_arrival("03/02/2025 14:30:15").unwrap().to_string(), "2025-02-03 14:30:15");
    }

    #[test]
    fn test_delay_bucket_edges() {
        assert_eq!(delay_bucket(-3.0), "24");
        assert_eq!(delay_bucket(24.0), "24");
        assert_eq!(delay_bucket(24.5), "48h");
        assert_eq!(delay_bucket(48.0), "48h");
        assert_eq!(delay_bucket(48.1), "+ de 48");
    }

    #[test]
    fn test_build_backlog_sorts_by_delay() {
        let data = "Exp;F.Llegada;Z.Rep;Consignatario;Población;Dir. entrega;C.P.\n\
            A;09/03/2025 10:00;01;Ana;Onda;Calle 1;12200\n\
            B;;02;Luis;Nules;Calle 2;12520\n\
            C;01/03/2025 08:00;01;Eva;Onda;Calle 3;12200\n\
            D;08/03/2025 00:00;03;Pau;Betxi;Calle 4;12549\n";
        let table = Table::parse("pending", data.as_bytes(), ";").unwrap();

        let entries = build_backlog(&table, today()).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "D", "A", "B"]);

        assert_eq!(entries[0].days_late, Some(9));
        assert_eq!(entries[0].bucket, "+ de 48");
        assert_eq!(entries[1].bucket, "48h");
        assert_eq!(entries[2].days_late, Some(1));
        assert_eq!(entries[2].bucket, "24");
        assert_eq!(entries[3].days_late, None);
        assert_eq!(entries[3].bucket, "");
    }

    #[test]
    fn test_missing_column_is_structural() {
        let table = Table::parse("pending", b"Exp;Z.Rep\nA;01\n", ";").unwrap();
        let err = build_backlog(&table, today()).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumnError { ref column, .. } if column == "F.Llegada"));
    }

    #[test]
    fn test_render_backlog() {
        let table = Table::parse(
            "pending",
            "Exp;F.Llegada;Z.Rep;Consignatario;Población;Dir. entrega;C.P.\nA;07/03/2025 23:59;01;Ana;Onda;Calle 1;12200\n"
                .as_bytes(),
            ";",
        )
        .unwrap();
        let entries = build_backlog(&table, today()).unwrap();
        let text = String::from_utf8(render_backlog(&entries, b';').unwrap()).unwrap();

        assert!(text.starts_with("Exp;F.Llegada;Z.Rep"));
        assert!(text.contains("A;07/03/2025 23:59;01;Ana;Onda;Calle 1;12200;2;+ de 48"));
        assert_eq!(backlog_filename(today()), "atrasos_2025-03-10.csv");
    }
}

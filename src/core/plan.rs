//! Daily plan: a subset of the route sheets of a previous run, picked by index.

use crate::core::report::ROUTE_DIR;
use crate::core::table::Table;
use crate::utils::error::{EtlError, Result};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub const DEFAULT_EXCLUDE_TOKENS: &[&str] = &["VINAROZ", "MORELLA", "RESUMEN"];
pub const PLAN_SUMMARY_FILE: &str = "RESUMEN_PLAN.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSheet {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub sheets: Vec<PlanSheet>,
    pub bundle: Vec<u8>,
}

/// Route names not containing any exclusion token, case-insensitive, in
/// their original order.
pub fn eligible_routes(names: &[String], exclude_tokens: &[String]) -> Vec<String> {
    let tokens: Vec<String> = exclude_tokens.iter().map(|t| t.to_uppercase()).collect();
    names
        .iter()
        .filter(|name| {
            let upper = name.to_uppercase();
            !tokens.iter().any(|t| !t.is_empty() && upper.contains(t.as_str()))
        })
        .cloned()
        .collect()
}

fn selection_error(message: impl Into<String>) -> EtlError {
    EtlError::SelectionError {
        message: message.into(),
    }
}

/// Parses `all`, `*`, or indices and inclusive ranges such as `0,1,3-5`.
/// Reversed ranges are accepted. Returns sorted, de-duplicated indices.
pub fn parse_selection(selection: &str, available: usize) -> Result<Vec<usize>> {
    let selection = selection.trim().to_lowercase();
    if selection == "all" || selection == "*" {
        return Ok((0..available).collect());
    }
    if selection.is_empty() {
        return Err(selection_error("empty selection, use \"0\" or \"all\""));
    }

    let parse_index = |text: &str, whole: &str| -> Result<usize> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(selection_error(format!("invalid index: {}", whole)));
        }
        text.parse::<usize>()
            .map_err(|_| selection_error(format!("invalid index: {}", whole)))
    };

    let mut picked = BTreeSet::new();
    // Ranges are clamped before expansion; only their upper end is reported.
    let mut out_of_range = Vec::new();
    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (
                    parse_index(a, part).map_err(|_| selection_error(format!("invalid range: {}", part)))?,
                    parse_index(b, part).map_err(|_| selection_error(format!("invalid range: {}", part)))?,
                );
                let (low, high) = (a.min(b), a.max(b));
                if high >= available {
                    out_of_range.push(high);
                }
                picked.extend(low..=high.min(available.saturating_sub(1)));
            }
            None => {
                let index = parse_index(part, part)?;
                if index >= available {
                    out_of_range.push(index);
                } else {
                    picked.insert(index);
                }
            }
        }
    }

    if !out_of_range.is_empty() {
        out_of_range.sort_unstable();
        out_of_range.dedup();
        return Err(selection_error(format!(
            "indices out of range: {:?}, valid range is 0..{}",
            out_of_range,
            available.saturating_sub(1)
        )));
    }

    Ok(picked.into_iter().collect())
}

/// Route sheet names (file stems under `rutas/`) of a bundle, in bundle order.
pub fn bundle_routes(bundle: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let prefix = format!("{}/", ROUTE_DIR);

    let mut routes = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if let Some(stem) = entry
            .name()
            .strip_prefix(prefix.as_str())
            .and_then(|name| name.strip_suffix(".csv"))
        {
            routes.push(stem.to_string());
        }
    }

    Ok(routes)
}

pub fn build_plan(bundle: &[u8], selection: &str, exclude_tokens: &[String]) -> Result<PlanOutput> {
    let routes = eligible_routes(&bundle_routes(bundle)?, exclude_tokens);
    if routes.is_empty() {
        return Err(selection_error(format!(
            "no eligible routes, all excluded by {}",
            exclude_tokens.join("/")
        )));
    }

    let indices = parse_selection(selection, routes.len())?;
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut sheets = Vec::with_capacity(indices.len());

    for index in indices {
        let name = &routes[index];
        let entry_name = format!("{}/{}.csv", ROUTE_DIR, name);

        let mut content = Vec::new();
        archive.by_name(&entry_name)?.read_to_end(&mut content)?;

        let table = Table::parse(name, &content, "auto")?;
        sheets.push(PlanSheet {
            name: name.clone(),
            rows: table.len(),
            columns: table.headers.len(),
        });

        writer.start_file::<_, ()>(entry_name, FileOptions::default())?;
        writer.write_all(&content)?;
    }

    let mut summary = csv::WriterBuilder::new().delimiter(b';').from_writer(Vec::new());
    summary.write_record(["Hoja", "Filas", "Columnas"])?;
    for sheet in &sheets {
        summary.write_record([
            sheet.name.as_str(),
            sheet.rows.to_string().as_str(),
            sheet.columns.to_string().as_str(),
        ])?;
    }
    let summary = summary.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush plan summary: {}", e),
    })?;

    writer.start_file::<_, ()>(PLAN_SUMMARY_FILE, FileOptions::default())?;
    writer.write_all(&summary)?;
    let bundle = writer.finish()?.into_inner();

    Ok(PlanOutput { sheets, bundle })
}

pub fn default_plan_name(now: chrono::NaiveDateTime) -> String {
    format!("PLAN_{}.zip", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn defaults() -> Vec<String> {
        DEFAULT_EXCLUDE_TOKENS.iter().map(|s| s.to_string()).collect()
    }

    fn bundle_with(routes: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in routes {
            writer
                .start_file::<_, ()>(format!("rutas/{}.csv", name), FileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.start_file::<_, ()>("resumen_rutas.csv", FileOptions::default()).unwrap();
        writer.write_all(b"Ruta\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("all", 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_selection(" * ", 2).unwrap(), vec![0, 1]);
        assert_eq!(parse_selection("0,1,3-5", 6).unwrap(), vec![0, 1, 3, 4, 5]);
        assert_eq!(parse_selection("4-2, 3", 6).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_parse_selection_errors() {
        assert!(parse_selection("", 3).is_err());
        assert!(parse_selection("a", 3).is_err());
        assert!(parse_selection("1-x", 3).is_err());
        assert!(parse_selection("-1", 3).is_err());

        let err = parse_selection("1,7", 3).unwrap_err();
        assert!(err.to_string().contains("[7]"));
    }

    #[test]
    fn test_huge_ranges_fail_without_expanding() {
        let err = parse_selection("0-30000000", 3).unwrap_err();
        assert!(err.to_string().contains("[30000000]"));

        let err = parse_selection(&format!("0-{}", usize::MAX), 3).unwrap_err();
        assert!(matches!(err, EtlError::SelectionError { .. }));

        let err = parse_selection("5-1,9", 3).unwrap_err();
        assert!(err.to_string().contains("[5, 9]"));
        assert_eq!(parse_selection("2-0", 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_eligible_routes_excludes_tokens() {
        let routes = names(&["ZREP_01", "ZREP_VINAROZ", "Morella Norte", "HOSP", "RESUMEN_X"]);
        assert_eq!(eligible_routes(&routes, &defaults()), names(&["ZREP_01", "HOSP"]));
    }

    #[test]
    fn test_build_plan_copies_selected_sheets() {
        let bundle = bundle_with(&[
            ("ZREP_01", "Parada;Exp\n1;A\n2;B\n"),
            ("ZREP_VINAROZ", "Parada;Exp\n1;C\n"),
            ("HOSP", "Parada;Exp\n1;D\n"),
        ]);

        assert_eq!(bundle_routes(&bundle).unwrap(), names(&["ZREP_01", "ZREP_VINAROZ", "HOSP"]));

        let plan = build_plan(&bundle, "1", &defaults()).unwrap();
        assert_eq!(
            plan.sheets,
            vec![PlanSheet {
                name: "HOSP".to_string(),
                rows: 1,
                columns: 2
            }]
        );

        let mut archive = ZipArchive::new(Cursor::new(plan.bundle)).unwrap();
        let mut summary = String::new();
        archive
            .by_name(PLAN_SUMMARY_FILE)
            .unwrap()
            .read_to_string(&mut summary)
            .unwrap();
        assert_eq!(summary, "Hoja;Filas;Columnas\nHOSP;1;2\n");
        assert!(archive.by_name("rutas/HOSP.csv").is_ok());
        assert!(archive.by_name("rutas/ZREP_01.csv").is_err());
    }

    #[test]
    fn test_default_plan_name() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();
        assert_eq!(default_plan_name(now), "PLAN_20250310_070500.zip");
    }
}

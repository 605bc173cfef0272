use crate::domain::model::{CategorySummary, RouteSummary, SequencedRoute};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

pub const ROUTE_DIR: &str = "rutas";
pub const ROUTE_SUMMARY_FILE: &str = "resumen_rutas.csv";
pub const CATEGORY_SUMMARY_FILE: &str = "resumen_categorias.csv";
pub const JSON_SUMMARY_FILE: &str = "resumen.json";

pub const ROUTE_HEADERS: [&str; 11] = [
    "Parada",
    "Exp",
    "Consignatario",
    "Dirección",
    "Población",
    "Kgs",
    "Bultos",
    "Z.Rep",
    "N_servicio",
    "Ruta",
    "Categoria",
];

/// File-safe stem for a route label: path separators and control characters
/// become `_`.
pub fn route_file_stem(label: &str) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

/// One file name per label, in label order. Labels whose stems clash, even
/// only by case, get `_2`, `_3`, ... appended so no route sheet replaces
/// another.
pub fn route_file_names<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    labels
        .into_iter()
        .map(|label| {
            let stem = route_file_stem(label);
            let mut candidate = stem.clone();
            let mut suffix = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{}_{}", stem, suffix);
                suffix += 1;
            }
            format!("{}/{}.csv", ROUTE_DIR, candidate)
        })
        .collect()
}

fn format_weight(weight: f64) -> String {
    format!("{:.2}", weight)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })
}

pub fn render_route(route: &SequencedRoute, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(ROUTE_HEADERS)?;

    for stop in &route.stops {
        let s = &stop.shipment;
        writer.write_record([
            stop.stop_number.to_string().as_str(),
            s.id.as_str(),
            s.consignee.as_str(),
            s.raw_address.as_str(),
            s.town.as_str(),
            format_weight(s.weight).as_str(),
            s.package_count.to_string().as_str(),
            s.zone.as_deref().unwrap_or(""),
            s.service_reference.as_deref().unwrap_or(""),
            s.route_label.as_str(),
            s.category.as_str(),
        ])?;
    }

    finish(writer)
}

pub fn render_route_summary(summaries: &[RouteSummary], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(["Ruta", "Categoria", "Paradas", "Envios", "Bultos", "Kgs"])?;

    for s in summaries {
        writer.write_record([
            s.label.as_str(),
            s.category.as_str(),
            s.stops.to_string().as_str(),
            s.shipments.to_string().as_str(),
            s.packages.to_string().as_str(),
            format_weight(s.weight).as_str(),
        ])?;
    }

    finish(writer)
}

pub fn render_category_summary(summaries: &[CategorySummary], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(["Categoria", "Rutas", "Paradas", "Envios", "Bultos", "Kgs"])?;

    for s in summaries {
        writer.write_record([
            s.category.as_str(),
            s.routes.to_string().as_str(),
            s.stops.to_string().as_str(),
            s.shipments.to_string().as_str(),
            s.packages.to_string().as_str(),
            format_weight(s.weight).as_str(),
        ])?;
    }

    finish(writer)
}

use crate::core::coordinates::CoordinateRow;
use crate::core::normalize::normalize;
use crate::core::table::{cell, optional_cell, parse_number, ColumnSpec, Table};
use crate::domain::model::{MatchRule, RuleSource, Shipment};
use crate::utils::error::Result;

pub const SHIPMENT_ID: ColumnSpec = ColumnSpec::new("Exp", &["Exp", "Expedicion", "Envio"]);
pub const SHIPMENT_WEIGHT: ColumnSpec = ColumnSpec::new("Kgs", &["Kgs", "Kg", "Peso"]);
pub const SHIPMENT_PACKAGES: ColumnSpec = ColumnSpec::new("Bultos", &["Bultos", "Bulto"]);
pub const SHIPMENT_CONSIGNEE: ColumnSpec = ColumnSpec::new("Consignatario", &["Consignatario"]);
pub const SHIPMENT_ADDRESS: ColumnSpec =
    ColumnSpec::new("Dirección", &["Dirección", "Dir. entrega", "Dir.Entrega", "Direccion entrega"]);
pub const SHIPMENT_TOWN: ColumnSpec = ColumnSpec::new("Población", &["Población", "Poblacion", "Pueblo"]);
pub const SHIPMENT_ZONE: ColumnSpec = ColumnSpec::new("Z.Rep", &["Z.Rep", "Zona", "Zona reparto"]);
pub const SHIPMENT_SERVICE: ColumnSpec = ColumnSpec::new("N_servicio", &["N_servicio", "N. servicio", "Servicio"]);

pub const RULE_PATTERN: ColumnSpec = ColumnSpec::new("Patron", &["Patron", "Patrón", "Pattern"]);
pub const RULE_LABEL: ColumnSpec = ColumnSpec::new("Ruta", &["Ruta", "Destino", "Label"]);
pub const RULE_SCOPE: ColumnSpec = ColumnSpec::new("Población", &["Población", "Poblacion", "Ambito"]);
pub const RULE_ACTIVE: ColumnSpec = ColumnSpec::new("Activo", &["Activo", "Activa", "Active"]);

pub const COORD_TOWN: ColumnSpec = ColumnSpec::new("PUEBLO", &["Pueblo", "Población", "Poblacion"]);
pub const COORD_LATITUDE: ColumnSpec = ColumnSpec::new("LATITUD", &["Latitud", "Lat"]);
pub const COORD_LONGITUDE: ColumnSpec = ColumnSpec::new("LONGITUD", &["Longitud", "Lon", "Lng"]);

/// Converts a shipments table. Required columns are checked before any row
/// is read; malformed weights and package counts become zero.
pub fn shipments_from_table(table: &Table) -> Result<Vec<Shipment>> {
    let id = table.require(&SHIPMENT_ID)?;
    let weight = table.require(&SHIPMENT_WEIGHT)?;
    let packages = table.require(&SHIPMENT_PACKAGES)?;
    let consignee = table.require(&SHIPMENT_CONSIGNEE)?;
    let address = table.require(&SHIPMENT_ADDRESS)?;
    let town = table.require(&SHIPMENT_TOWN)?;
    let zone = table.column(&SHIPMENT_ZONE);
    let service = table.column(&SHIPMENT_SERVICE);

    let mut coerced = 0usize;
    let shipments = table
        .rows
        .iter()
        .map(|row| {
            let raw_weight = cell(row, Some(weight));
            let parsed_weight = parse_number(raw_weight).filter(|w| *w >= 0.0);
            let raw_packages = cell(row, Some(packages));
            let parsed_packages = parse_number(raw_packages)
                .filter(|p| *p >= 0.0)
                .map(|p| p.round().min(u32::MAX as f64) as u32);

            if (parsed_weight.is_none() && !raw_weight.is_empty())
                || (parsed_packages.is_none() && !raw_packages.is_empty())
            {
                coerced += 1;
                tracing::debug!(
                    "Shipment {}: malformed weight '{}' or packages '{}', using 0",
                    cell(row, Some(id)),
                    raw_weight,
                    raw_packages
                );
            }

            Shipment {
                id: cell(row, Some(id)).to_string(),
                weight: parsed_weight.unwrap_or(0.0),
                package_count: parsed_packages.unwrap_or(0),
                consignee: cell(row, Some(consignee)).to_string(),
                raw_address: cell(row, Some(address)).to_string(),
                town: cell(row, Some(town)).to_string(),
                zone: optional_cell(row, zone),
                service_reference: optional_cell(row, service),
                route_label: String::new(),
                category: Default::default(),
            }
        })
        .collect();

    if coerced > 0 {
        tracing::warn!("⚠️ {} shipments had malformed numeric fields, coerced to 0", coerced);
    }

    Ok(shipments)
}

/// `0`, `NO`, `N` and `FALSE` disable a rule; anything else, blank included,
/// keeps it active.
pub fn is_active_flag(text: &str) -> bool {
    !matches!(normalize(text).as_str(), "0" | "NO" | "N" | "FALSE")
}

pub fn rules_from_table(table: &Table, source: RuleSource) -> Result<Vec<MatchRule>> {
    let pattern = table.require(&RULE_PATTERN)?;
    let label = table.require(&RULE_LABEL)?;
    let scope = table.column(&RULE_SCOPE);
    let active = table.column(&RULE_ACTIVE);

    Ok(table
        .rows
        .iter()
        .filter(|row| is_active_flag(cell(row, active)))
        .map(|row| {
            MatchRule::new(
                cell(row, Some(pattern)),
                cell(row, Some(label)),
                optional_cell(row, scope).as_deref(),
                source,
            )
        })
        .collect())
}

pub fn coordinates_from_table(table: &Table) -> Result<Vec<CoordinateRow>> {
    let town = table.require(&COORD_TOWN)?;
    let latitude = table.require(&COORD_LATITUDE)?;
    let longitude = table.require(&COORD_LONGITUDE)?;

    Ok(table
        .rows
        .iter()
        .map(|row| CoordinateRow {
            town: optional_cell(row, Some(town)),
            latitude: parse_number(cell(row, Some(latitude))),
            longitude: parse_number(cell(row, Some(longitude))),
        })
        .collect())
}

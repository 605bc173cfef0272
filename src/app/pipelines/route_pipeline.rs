use crate::core::assembler::sequence_route;
use crate::core::classifier::{check_reserved_labels, classify};
use crate::core::coordinates::{CoordinateIndex, CoordinateRow};
use crate::core::fetch::fetch_table;
use crate::core::matcher::RuleSet;
use crate::core::normalize::normalize;
use crate::core::records::{coordinates_from_table, rules_from_table, shipments_from_table};
use crate::core::report::{
    render_category_summary, render_route, render_route_summary, route_file_names,
    CATEGORY_SUMMARY_FILE, JSON_SUMMARY_FILE, ROUTE_SUMMARY_FILE,
};
use crate::core::{ConfigProvider, Pipeline, RoutePlan, Shipment, Storage};
use crate::domain::model::MatchRule;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const OUTPUT_DELIMITER: u8 = b';';

/// Input tables after schema checks, before any classification.
#[derive(Debug, Clone, Default)]
pub struct RouteBatch {
    pub shipments: Vec<Shipment>,
    pub rules: Vec<MatchRule>,
    pub coordinates: Vec<CoordinateRow>,
}

#[derive(Debug, Serialize)]
struct JsonSummary<'a> {
    total_shipments: usize,
    unmatched_shipments: usize,
    unresolved_towns: &'a [String],
    routes: &'a [crate::domain::model::RouteSummary],
    categories: &'a [crate::domain::model::CategorySummary],
    town_order: BTreeMap<&'a str, &'a [String]>,
}

/// 分類、排序並輸出每條路線的派送清單
pub struct RoutePipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
}

impl<S: Storage, C: ConfigProvider> RoutePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    fn wants(&self, format: &str) -> bool {
        self.config.output_formats().iter().any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Output files as (relative path, bytes), in write order.
    pub fn render_outputs(&self, plan: &RoutePlan) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = Vec::new();

        if self.wants("csv") {
            let names = route_file_names(plan.routes.iter().map(|r| r.label.as_str()));
            for (name, route) in names.into_iter().zip(&plan.routes) {
                files.push((name, render_route(route, OUTPUT_DELIMITER)?));
            }
            files.push((
                ROUTE_SUMMARY_FILE.to_string(),
                render_route_summary(&plan.per_route, OUTPUT_DELIMITER)?,
            ));
            files.push((
                CATEGORY_SUMMARY_FILE.to_string(),
                render_category_summary(&plan.per_category, OUTPUT_DELIMITER)?,
            ));
        }

        if self.wants("json") {
            let summary = JsonSummary {
                total_shipments: plan.total_shipments(),
                unmatched_shipments: plan.unmatched_shipments,
                unresolved_towns: &plan.unresolved_towns,
                routes: &plan.per_route,
                categories: &plan.per_category,
                town_order: plan
                    .routes
                    .iter()
                    .map(|r| (r.label.as_str(), r.town_order.as_slice()))
                    .collect(),
            };
            files.push((JSON_SUMMARY_FILE.to_string(), serde_json::to_vec_pretty(&summary)?));
        }

        Ok(files)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RoutePipeline<S, C> {
    type Extracted = RouteBatch;
    type Transformed = RoutePlan;

    async fn extract(&self) -> Result<RouteBatch> {
        let delimiter = self.config.delimiter();
        let timeout = self.config.request_timeout_seconds();

        let table = fetch_table(
            &self.client,
            "shipments",
            self.config.shipments_location(),
            delimiter,
            timeout,
        )
        .await?;
        let shipments = shipments_from_table(&table)?;

        let mut rules = Vec::new();
        for source in self.config.rule_tables() {
            let name = format!("rules_{:?}", source.source).to_lowercase();
            let table = fetch_table(&self.client, &name, &source.location, delimiter, timeout).await?;
            let loaded = rules_from_table(&table, source.source)?;
            tracing::debug!("Loaded {} active rules from {}", loaded.len(), source.location);
            rules.extend(loaded);
        }

        let coordinates = match self.config.coordinates_location() {
            Some(location) => {
                let table = fetch_table(&self.client, "coordinates", location, delimiter, timeout).await?;
                coordinates_from_table(&table)?
            }
            None => {
                tracing::warn!("⚠️ No coordinates table configured, routes keep input order");
                Vec::new()
            }
        };

        tracing::info!(
            "📋 Extracted {} shipments, {} rules, {} coordinate rows",
            shipments.len(),
            rules.len(),
            coordinates.len()
        );

        Ok(RouteBatch {
            shipments,
            rules,
            coordinates,
        })
    }

    async fn transform(&self, batch: RouteBatch) -> Result<RoutePlan> {
        let options = self.config.routing();
        let rules = RuleSet::new(batch.rules);
        check_reserved_labels(&rules, &options)?;
        let classification = classify(batch.shipments, &rules, &options);

        let index = CoordinateIndex::build(batch.coordinates);
        if index.is_empty() {
            tracing::warn!("⚠️ Coordinate index is empty, every route keeps its input order");
        }

        let unresolved_towns: Vec<String> = classification
            .shipments
            .iter()
            .map(|s| normalize(&s.town))
            .filter(|town| index.lookup(town).is_none())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unresolved_towns.is_empty() {
            tracing::warn!(
                "⚠️ {} towns have no coordinates and go last in their routes: {}",
                unresolved_towns.len(),
                unresolved_towns.join(", ")
            );
        }

        let routes: Vec<_> = classification
            .routes()
            .into_iter()
            .map(|route| sequence_route(route, &index, options.depot))
            .collect();

        tracing::info!(
            "🔄 Classified into {} routes, {} shipments unmatched",
            routes.len(),
            classification.unmatched
        );

        Ok(RoutePlan {
            routes,
            per_route: classification.per_route,
            per_category: classification.per_category,
            unmatched_shipments: classification.unmatched,
            unresolved_towns,
        })
    }

    async fn load(&self, plan: RoutePlan) -> Result<String> {
        let files = self.render_outputs(&plan)?;
        if files.is_empty() {
            return Err(EtlError::ProcessingError {
                message: "No output format selected".to_string(),
            });
        }

        match self.config.bundle_filename() {
            Some(bundle_name) => {
                let zip_data = {
                    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                    for (name, data) in &files {
                        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                        zip.write_all(data)?;
                    }
                    zip.finish()?.into_inner()
                };

                tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
                self.storage.write_file(&bundle_name, &zip_data).await?;
                Ok(format!("{}/{}", self.config.output_path(), bundle_name))
            }
            None => {
                for (name, data) in &files {
                    self.storage.write_file(name, data).await?;
                }
                tracing::debug!("Wrote {} loose files", files.len());
                Ok(self.config.output_path().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::TomlConfig;
    use crate::domain::model::Category;
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.lock().await.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn write_inputs(dir: &TempDir) -> (String, String, String) {
        let shipments = dir.path().join("envios.csv");
        std::fs::write(
            &shipments,
            "Exp;Kgs;Bultos;Consignatario;Dirección;Población;Z.Rep\n\
             E1;2;1;Hospital General;Av Hospital 1;Castellón;\n\
             E2;1;1;Ana;Calle Sol 4;Alcora;07\n\
             E3;1;2;Luis;Calle Sol 9;Alcora;07\n",
        )
        .unwrap();

        let rules = dir.path().join("reglas.csv");
        std::fs::write(&rules, "Patron;Ruta\nHOSPITAL;HOSP\n").unwrap();

        let coordinates = dir.path().join("pueblos.csv");
        std::fs::write(
            &coordinates,
            "PUEBLO;LATITUD;LONGITUD\nCastellón;39,986;-0,051\nAlcora;40,07;-0,21\n",
        )
        .unwrap();

        let path = |p: std::path::PathBuf| p.to_string_lossy().replace('\\', "/");
        (path(shipments), path(rules), path(coordinates))
    }

    fn config_for(dir: &TempDir, extra_load: &str) -> TomlConfig {
        let (shipments, rules, coordinates) = write_inputs(dir);
        toml_config(&shipments, &coordinates, &rules, extra_load)
    }

    fn toml_config(shipments: &str, coordinates: &str, rules: &str, extra_load: &str) -> TomlConfig {
        TomlConfig::from_toml_str(&format!(
            r#"
[pipeline]
name = "reparto-test"
description = "Route pipeline test"
version = "1.0"

[source]
shipments = "{}"
coordinates = "{}"

[[source.rules]]
path = "{}"
category = "A"

[load]
output_path = "./test-output"
output_formats = ["csv", "json"]
{}
"#,
            shipments, coordinates, rules, extra_load
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_route_pipeline_classifies_and_sequences() {
        let dir = TempDir::new().unwrap();
        let pipeline = RoutePipeline::new(MockStorage::default(), config_for(&dir, ""));

        let batch = pipeline.extract().await.unwrap();
        assert_eq!(batch.shipments.len(), 3);
        assert_eq!(batch.rules.len(), 1);

        let plan = pipeline.transform(batch).await.unwrap();
        let hosp = plan.route("HOSP").unwrap();
        assert_eq!(hosp.category, Category::SpecialA);
        assert_eq!(hosp.stops.len(), 1);

        let zone = plan.route("ZREP_07").unwrap();
        let numbers: Vec<usize> = zone.stops.iter().map(|s| s.stop_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(plan.unmatched_shipments, 2);
        assert!(plan.unresolved_towns.is_empty());
    }

    #[tokio::test]
    async fn test_route_pipeline_writes_zip_bundle() {
        let dir = TempDir::new().unwrap();
        let storage = MockStorage::default();
        let pipeline = RoutePipeline::new(storage.clone(), config_for(&dir, ""));

        let batch = pipeline.extract().await.unwrap();
        let plan = pipeline.transform(batch).await.unwrap();
        let output = pipeline.load(plan).await.unwrap();
        assert_eq!(output, "./test-output/reparto_output.zip");

        let bytes = storage.get_file("reparto_output.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut hosp = String::new();
        archive
            .by_name("rutas/HOSP.csv")
            .unwrap()
            .read_to_string(&mut hosp)
            .unwrap();
        assert!(hosp.lines().nth(1).unwrap().starts_with("1;E1;Hospital General"));
        assert!(archive.by_name("resumen.json").is_ok());
        assert!(archive.by_name("resumen_categorias.csv").is_ok());
    }

    #[tokio::test]
    async fn test_route_pipeline_loose_files_when_compression_disabled() {
        let dir = TempDir::new().unwrap();
        let storage = MockStorage::default();
        let config = config_for(
            &dir,
            "\n[load.compression]\nenabled = false\nfilename = \"unused.zip\"\n",
        );
        let pipeline = RoutePipeline::new(storage.clone(), config);

        let batch = pipeline.extract().await.unwrap();
        let plan = pipeline.transform(batch).await.unwrap();
        assert_eq!(pipeline.load(plan).await.unwrap(), "./test-output");

        assert!(storage.get_file("rutas/ZREP_07.csv").await.is_some());
        assert!(storage.get_file("resumen_rutas.csv").await.is_some());
        assert!(storage.get_file("unused.zip").await.is_none());
    }

    fn clashing_labels_config(dir: &TempDir, extra_load: &str) -> TomlConfig {
        let (shipments, _, coordinates) = write_inputs(dir);
        let rules = dir.path().join("reglas_clash.csv");
        std::fs::write(&rules, "Patron;Ruta\nHOSPITAL;HOSP/CS\nCALLE SOL 4;HOSP_CS\n").unwrap();
        let rules = rules.to_string_lossy().replace('\\', "/");
        toml_config(&shipments, &coordinates, &rules, extra_load)
    }

    #[tokio::test]
    async fn test_labels_with_same_file_stem_keep_separate_sheets() {
        let dir = TempDir::new().unwrap();
        let storage = MockStorage::default();
        let pipeline = RoutePipeline::new(storage.clone(), clashing_labels_config(&dir, ""));

        let batch = pipeline.extract().await.unwrap();
        let plan = pipeline.transform(batch).await.unwrap();
        let labels: Vec<&str> = plan.routes.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["HOSP/CS", "HOSP_CS", "ZREP_07"]);

        pipeline.load(plan).await.unwrap();
        let bytes = storage.get_file("reparto_output.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

        let mut first = String::new();
        archive
            .by_name("rutas/HOSP_CS.csv")
            .unwrap()
            .read_to_string(&mut first)
            .unwrap();
        let mut second = String::new();
        archive
            .by_name("rutas/HOSP_CS_2.csv")
            .unwrap()
            .read_to_string(&mut second)
            .unwrap();
        assert!(first.lines().nth(1).unwrap().contains(";E1;"));
        assert!(second.lines().nth(1).unwrap().contains(";E2;"));
    }

    #[tokio::test]
    async fn test_labels_with_same_file_stem_as_loose_files() {
        let dir = TempDir::new().unwrap();
        let storage = MockStorage::default();
        let config = clashing_labels_config(&dir, "\n[load.compression]\nenabled = false\nfilename = \"unused.zip\"\n");
        let pipeline = RoutePipeline::new(storage.clone(), config);

        let batch = pipeline.extract().await.unwrap();
        let plan = pipeline.transform(batch).await.unwrap();
        pipeline.load(plan).await.unwrap();

        let first = storage.get_file("rutas/HOSP_CS.csv").await.unwrap();
        let second = storage.get_file("rutas/HOSP_CS_2.csv").await.unwrap();
        assert_eq!(String::from_utf8(first).unwrap().lines().count(), 2);
        assert_eq!(String::from_utf8(second).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_rule_label_equal_to_default_route_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (shipments, _, coordinates) = write_inputs(&dir);
        let rules = dir.path().join("reglas_reserved.csv");
        std::fs::write(&rules, "Patron;Ruta\nHOSPITAL;RUTA NO ASIGNADA\n").unwrap();
        let rules = rules.to_string_lossy().replace('\\', "/");

        let storage = MockStorage::default();
        let pipeline = RoutePipeline::new(storage.clone(), toml_config(&shipments, &coordinates, &rules, ""));

        let batch = pipeline.extract().await.unwrap();
        let err = pipeline.transform(batch).await.unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfigValueError { ref field, .. } if field == "rules"));
    }
}

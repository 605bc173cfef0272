pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::model::{
    Coordinate, RoutingOptions, RuleSource, DEFAULT_ROUTE_LABEL, DEPOT_LATITUDE, DEPOT_LONGITUDE,
};
#[cfg(feature = "cli")]
use crate::domain::ports::{ConfigProvider, RuleTableSource};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub const OUTPUT_FORMATS: [&str; 2] = ["csv", "json"];

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "reparto")]
#[command(about = "Classify shipments into delivery routes and sequence their stops")]
pub struct CliConfig {
    /// Shipments table (path or http(s) URL)
    #[arg(long)]
    pub shipments: String,

    /// Category A rule tables
    #[arg(long, value_delimiter = ',')]
    pub rules_a: Vec<String>,

    /// Category B rule tables
    #[arg(long, value_delimiter = ',')]
    pub rules_b: Vec<String>,

    /// Town coordinates table
    #[arg(long)]
    pub coordinates: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value_t = DEPOT_LATITUDE, allow_negative_numbers = true)]
    pub depot_lat: f64,

    #[arg(long, default_value_t = DEPOT_LONGITUDE, allow_negative_numbers = true)]
    pub depot_lon: f64,

    #[arg(long, default_value = DEFAULT_ROUTE_LABEL)]
    pub default_label: String,

    /// auto, ';', ',', '|' or tab
    #[arg(long, default_value = "auto")]
    pub delimiter: String,

    /// Send unmatched shipments to the default route even when they carry a zone
    #[arg(long)]
    pub no_zone_fallback: bool,

    #[arg(long, value_delimiter = ',', default_value = "csv,json")]
    pub formats: Vec<String>,

    /// Write loose files instead of a zip bundle
    #[arg(long)]
    pub no_zip: bool,

    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn shipments_location(&self) -> &str {
        &self.shipments
    }

    fn rule_tables(&self) -> Vec<RuleTableSource> {
        let tables = |paths: &[String], source: RuleSource| {
            paths
                .iter()
                .map(|location| RuleTableSource {
                    location: location.clone(),
                    source,
                })
                .collect::<Vec<_>>()
        };

        let mut sources = tables(&self.rules_a, RuleSource::A);
        sources.extend(tables(&self.rules_b, RuleSource::B));
        sources
    }

    fn coordinates_location(&self) -> Option<&str> {
        self.coordinates.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn routing(&self) -> RoutingOptions {
        RoutingOptions {
            depot: Coordinate::new(self.depot_lat, self.depot_lon),
            default_label: self.default_label.clone(),
            zone_fallback: !self.no_zone_fallback,
        }
    }

    fn output_formats(&self) -> Vec<String> {
        self.formats.clone()
    }

    fn bundle_filename(&self) -> Option<String> {
        (!self.no_zip).then(|| "reparto_output.zip".to_string())
    }

    fn request_timeout_seconds(&self) -> Option<u64> {
        self.timeout
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_location("shipments", &self.shipments)?;
        for location in self.rules_a.iter().chain(&self.rules_b) {
            validation::validate_location("rules", location)?;
        }
        if let Some(coordinates) = &self.coordinates {
            validation::validate_location("coordinates", coordinates)?;
        }
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_range("depot_lat", self.depot_lat, -90.0, 90.0)?;
        validation::validate_range("depot_lon", self.depot_lon, -180.0, 180.0)?;
        validation::validate_non_empty_string("default_label", &self.default_label)?;
        validation::validate_delimiter("delimiter", &self.delimiter)?;
        validation::validate_allowed_values("formats", &self.formats, &OUTPUT_FORMATS)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "backlog-etl")]
#[command(about = "Report how late each pending shipment is")]
pub struct BacklogConfig {
    /// Pending shipments table (path or http(s) URL)
    #[arg(long)]
    pub pending: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Reference day as YYYY-MM-DD, defaults to today
    #[arg(long)]
    pub today: Option<chrono::NaiveDate>,

    #[arg(long, default_value = "auto")]
    pub delimiter: String,

    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl Validate for BacklogConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_location("pending", &self.pending)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_delimiter("delimiter", &self.delimiter)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "plan-etl")]
#[command(about = "Pick the routes to deliver today from a route bundle")]
pub struct PlanConfig {
    /// Route bundle written by `reparto` (path or http(s) URL)
    #[arg(long)]
    pub bundle: String,

    /// `all`, `*` or indices such as "0,1,3-5"
    #[arg(long)]
    pub select: Option<String>,

    /// Route name fragments to leave out of the listing
    #[arg(long, value_delimiter = ',', default_value = "VINAROZ,MORELLA,RESUMEN")]
    pub exclude: Vec<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Output name, defaults to PLAN_<timestamp>.zip
    #[arg(long)]
    pub name: Option<String>,

    /// List eligible routes with their index and exit
    #[arg(long)]
    pub list: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl Validate for PlanConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_location("bundle", &self.bundle)?;
        validation::validate_path("output_path", &self.output_path)?;
        if let Some(name) = &self.name {
            validation::validate_non_empty_string("name", name)?;
        }
        if !self.list && self.select.is_none() {
            return Err(crate::utils::error::EtlError::MissingConfigError {
                field: "select".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_defaults() {
        let config = CliConfig::parse_from(["reparto", "--shipments", "envios.csv"]);

        assert_eq!(config.output_path, "./output");
        assert_eq!(config.delimiter, "auto");
        assert_eq!(config.formats, vec!["csv", "json"]);
        assert!(config.validate().is_ok());

        let routing = config.routing();
        assert_eq!(routing.depot, Coordinate::new(DEPOT_LATITUDE, DEPOT_LONGITUDE));
        assert_eq!(routing.default_label, "RUTA NO ASIGNADA");
        assert!(routing.zone_fallback);
        assert_eq!(config.bundle_filename().as_deref(), Some("reparto_output.zip"));
    }

    #[test]
    fn test_cli_rule_tables_keep_category() {
        let config = CliConfig::parse_from([
            "reparto",
            "--shipments",
            "envios.csv",
            "--rules-a",
            "a1.csv,a2.csv",
            "--rules-b",
            "https://example.com/b.csv",
            "--depot-lon",
            "-0.5",
            "--no-zip",
        ]);

        let sources: Vec<(String, RuleSource)> = config
            .rule_tables()
            .into_iter()
            .map(|t| (t.location, t.source))
            .collect();
        assert_eq!(
            sources,
            vec![
                ("a1.csv".to_string(), RuleSource::A),
                ("a2.csv".to_string(), RuleSource::A),
                ("https://example.com/b.csv".to_string(), RuleSource::B),
            ]
        );
        assert_eq!(config.depot_lon, -0.5);
        assert_eq!(config.bundle_filename(), None);
    }

    #[test]
    fn test_cli_config_validation() {
        let config = CliConfig::parse_from(["reparto", "--shipments", "envios.csv", "--depot-lat", "91"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["reparto", "--shipments", "envios.csv", "--formats", "xlsx"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["reparto", "--shipments", "envios.csv", "--delimiter", "#"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plan_config_requires_selection_unless_listing() {
        let config = PlanConfig::parse_from(["plan-etl", "--bundle", "out.zip"]);
        assert!(config.validate().is_err());
        assert_eq!(config.exclude, vec!["VINAROZ", "MORELLA", "RESUMEN"]);

        let config = PlanConfig::parse_from(["plan-etl", "--bundle", "out.zip", "--list"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backlog_config_parses_today() {
        let config = BacklogConfig::parse_from(["backlog-etl", "--pending", "p.csv", "--today", "2025-03-10"]);
        assert_eq!(config.today, chrono::NaiveDate::from_ymd_opt(2025, 3, 10));
        assert!(config.validate().is_ok());
    }
}

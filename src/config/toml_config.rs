use crate::config::OUTPUT_FORMATS;
use crate::core::ConfigProvider;
use crate::domain::model::{Coordinate, RoutingOptions, RuleSource, DEFAULT_ROUTE_LABEL, DEPOT_LATITUDE, DEPOT_LONGITUDE};
use crate::domain::ports::RuleTableSource;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_BUNDLE_NAME: &str = "reparto_output.zip";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub shipments: String,
    pub coordinates: Option<String>,
    pub delimiter: Option<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub rules: Vec<RuleTableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTableConfig {
    pub path: String,
    pub category: RuleSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_depot_lat")]
    pub depot_lat: f64,
    #[serde(default = "default_depot_lon")]
    pub depot_lon: f64,
    #[serde(default = "default_label")]
    pub default_label: String,
    #[serde(default = "default_true")]
    pub zone_fallback: bool,
}

fn default_depot_lat() -> f64 {
    DEPOT_LATITUDE
}

fn default_depot_lon() -> f64 {
    DEPOT_LONGITUDE
}

fn default_label() -> String {
    DEFAULT_ROUTE_LABEL.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            depot_lat: DEPOT_LATITUDE,
            depot_lon: DEPOT_LONGITUDE,
            default_label: default_label(),
            zone_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        // 驗證資料來源
        validation::validate_location("source.shipments", &self.source.shipments)?;
        if let Some(coordinates) = &self.source.coordinates {
            validation::validate_location("source.coordinates", coordinates)?;
        }
        for rule in &self.source.rules {
            validation::validate_location("source.rules.path", &rule.path)?;
        }
        validation::validate_delimiter("source.delimiter", self.delimiter())?;

        // 驗證倉庫座標
        validation::validate_range("routing.depot_lat", self.routing.depot_lat, -90.0, 90.0)?;
        validation::validate_range("routing.depot_lon", self.routing.depot_lon, -180.0, 180.0)?;
        validation::validate_non_empty_string("routing.default_label", &self.routing.default_label)?;

        // 驗證輸出
        validation::validate_path("load.output_path", &self.load.output_path)?;
        if self.load.output_formats.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "load.output_formats".to_string(),
            });
        }
        validation::validate_allowed_values("load.output_formats", &self.load.output_formats, &OUTPUT_FORMATS)?;
        if let Some(compression) = self.load.compression.as_ref().filter(|c| c.enabled) {
            validation::validate_non_empty_string("load.compression.filename", &compression.filename)?;
        }

        Ok(())
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn shipments_location(&self) -> &str {
        &self.source.shipments
    }

    fn rule_tables(&self) -> Vec<RuleTableSource> {
        self.source
            .rules
            .iter()
            .map(|rule| RuleTableSource {
                location: rule.path.clone(),
                source: rule.category,
            })
            .collect()
    }

    fn coordinates_location(&self) -> Option<&str> {
        self.source.coordinates.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn delimiter(&self) -> &str {
        self.source.delimiter.as_deref().unwrap_or("auto")
    }

    fn routing(&self) -> RoutingOptions {
        RoutingOptions {
            depot: Coordinate::new(self.routing.depot_lat, self.routing.depot_lon),
            default_label: self.routing.default_label.clone(),
            zone_fallback: self.routing.zone_fallback,
        }
    }

    fn output_formats(&self) -> Vec<String> {
        self.load.output_formats.clone()
    }

    fn bundle_filename(&self) -> Option<String> {
        match &self.load.compression {
            Some(compression) if !compression.enabled => None,
            Some(compression) => Some(compression.filename.clone()),
            None => Some(DEFAULT_BUNDLE_NAME.to_string()),
        }
    }

    fn request_timeout_seconds(&self) -> Option<u64> {
        self.source.timeout_seconds
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

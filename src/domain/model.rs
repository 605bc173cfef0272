use serde::{Deserialize, Serialize};

pub const DEFAULT_ROUTE_LABEL: &str = "RUTA NO ASIGNADA";
pub const ZONE_ROUTE_PREFIX: &str = "ZREP_";
pub const DEPOT_LATITUDE: f64 = 39.804106;
pub const DEPOT_LONGITUDE: f64 = -0.217351;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    None,
    SpecialA,
    SpecialB,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::None => "NONE",
            Category::SpecialA => "SPECIAL_A",
            Category::SpecialB => "SPECIAL_B",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule table a rule was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSource {
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
}

impl RuleSource {
    pub fn category(&self) -> Category {
        match self {
            RuleSource::A => Category::SpecialA,
            RuleSource::B => Category::SpecialB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub weight: f64,
    pub package_count: u32,
    pub consignee: String,
    pub raw_address: String,
    pub town: String,
    pub zone: Option<String>,
    pub service_reference: Option<String>,
    pub route_label: String,
    pub category: Category,
}

impl Shipment {
    pub fn new(id: impl Into<String>, raw_address: impl Into<String>, town: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            weight: 0.0,
            package_count: 0,
            consignee: String::new(),
            raw_address: raw_address.into(),
            town: town.into(),
            zone: None,
            service_reference: None,
            route_label: String::new(),
            category: Category::None,
        }
    }
}

/// A pattern rule, already normalized. `scope_location` restricts the rule to
/// shipments whose town contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub pattern: String,
    pub target_label: String,
    pub scope_location: Option<String>,
    pub source: RuleSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Shipments grouped under one route label, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub label: String,
    pub category: Category,
    pub shipments: Vec<Shipment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop {
    /// "Parada": 1-based, contiguous within the route.
    pub stop_number: usize,
    pub shipment: Shipment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedRoute {
    pub label: String,
    pub category: Category,
    /// Normalized town keys in visiting order.
    pub town_order: Vec<String>,
    pub stops: Vec<RouteStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub label: String,
    pub category: Category,
    pub stops: usize,
    pub shipments: usize,
    pub packages: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub routes: usize,
    pub stops: usize,
    pub shipments: usize,
    pub packages: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingOptions {
    pub depot: Coordinate,
    pub default_label: String,
    /// Route unmatched shipments by their pre-assigned zone when they have one.
    pub zone_fallback: bool,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            depot: Coordinate::new(DEPOT_LATITUDE, DEPOT_LONGITUDE),
            default_label: DEFAULT_ROUTE_LABEL.to_string(),
            zone_fallback: true,
        }
    }
}

/// Everything the route pipeline produces for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub routes: Vec<SequencedRoute>,
    pub per_route: Vec<RouteSummary>,
    pub per_category: Vec<CategorySummary>,
    pub unmatched_shipments: usize,
    pub unresolved_towns: Vec<String>,
}

impl RoutePlan {
    pub fn total_shipments(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }

    pub fn route(&self, label: &str) -> Option<&SequencedRoute> {
        self.routes.iter().find(|r| r.label == label)
    }
}

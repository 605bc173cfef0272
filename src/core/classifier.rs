use crate::core::matcher::RuleSet;
use crate::core::normalize::normalize;
use crate::domain::model::{
    Category, CategorySummary, Route, RouteSummary, RoutingOptions, Shipment, ZONE_ROUTE_PREFIX,
};
use crate::utils::error::{EtlError, Result};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub shipments: Vec<Shipment>,
    pub per_route: Vec<RouteSummary>,
    pub per_category: Vec<CategorySummary>,
    pub unmatched: usize,
}

impl Classification {
    /// Groups the classified shipments by route label. Routes come out in
    /// label order; shipments keep their input order.
    pub fn routes(&self) -> Vec<Route> {
        group_routes(&self.shipments)
    }
}

/// Assigns `route_label` and `category` to every shipment. Unmatched shipments
/// go to `ZREP_<zone>` when zone fallback is on and a zone is present, else to
/// the default label.
pub fn classify(shipments: Vec<Shipment>, rules: &RuleSet, options: &RoutingOptions) -> Classification {
    if rules.is_empty() {
        tracing::warn!(
            "⚠️ Rule set is empty, every shipment goes to the fallback route"
        );
    }

    let mut unmatched = 0;
    let shipments: Vec<Shipment> = shipments
        .into_iter()
        .map(|mut shipment| {
            let address = normalize(&shipment.raw_address);
            let town = normalize(&shipment.town);

            match rules.find(&address, &town) {
                Some(rule) => {
                    shipment.route_label = rule.target_label.clone();
                    shipment.category = rule.source.category();
                }
                None => {
                    unmatched += 1;
                    shipment.route_label = fallback_label(&shipment, options);
                    shipment.category = Category::None;
                    tracing::debug!(
                        "Shipment {} unmatched, routed to {}",
                        shipment.id,
                        shipment.route_label
                    );
                }
            }

            shipment
        })
        .collect();

    let routes = group_routes(&shipments);
    let per_route = summarize_routes(&routes);
    let per_category = summarize_categories(&shipments);

    tracing::info!(
        "🏷️ Classified {} shipments into {} routes ({} unmatched)",
        shipments.len(),
        per_route.len(),
        unmatched
    );

    Classification {
        shipments,
        per_route,
        per_category,
        unmatched,
    }
}

/// Rule labels must stay apart from the labels given to unmatched shipments:
/// the default label, and `ZREP_*` while zone fallback is on.
pub fn check_reserved_labels(rules: &RuleSet, options: &RoutingOptions) -> Result<()> {
    let default_label = options.default_label.trim();
    let clash = rules.rules().iter().find(|rule| {
        rule.target_label == default_label
            || (options.zone_fallback && rule.target_label.starts_with(ZONE_ROUTE_PREFIX))
    });

    match clash {
        Some(rule) => Err(EtlError::InvalidConfigValueError {
            field: "rules".to_string(),
            value: rule.target_label.clone(),
            reason: format!(
                "route label is reserved for unmatched shipments (pattern '{}')",
                rule.pattern
            ),
        }),
        None => Ok(()),
    }
}

fn fallback_label(shipment: &Shipment, options: &RoutingOptions) -> String {
    if options.zone_fallback {
        if let Some(zone) = shipment.zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
            return format!("{}{}", ZONE_ROUTE_PREFIX, zone);
        }
    }
    options.default_label.clone()
}

pub fn group_routes(shipments: &[Shipment]) -> Vec<Route> {
    let mut grouped: BTreeMap<&str, Vec<Shipment>> = BTreeMap::new();
    for shipment in shipments {
        grouped
            .entry(shipment.route_label.as_str())
            .or_default()
            .push(shipment.clone());
    }

    grouped
        .into_iter()
        .map(|(label, shipments)| Route {
            label: label.to_string(),
            category: shipments.first().map(|s| s.category).unwrap_or_default(),
            shipments,
        })
        .collect()
}

#[derive(Default)]
struct Totals<'a> {
    stops: HashSet<(String, String)>,
    ids: HashSet<&'a str>,
    packages: u64,
    weight: f64,
}

impl<'a> Totals<'a> {
    fn add(&mut self, shipment: &'a Shipment) {
        self.stops
            .insert((normalize(&shipment.town), normalize(&shipment.raw_address)));
        self.ids.insert(shipment.id.as_str());
        self.packages += u64::from(shipment.package_count);
        if shipment.weight.is_finite() {
            self.weight += shipment.weight;
        }
    }
}

pub fn summarize_routes(routes: &[Route]) -> Vec<RouteSummary> {
    routes
        .iter()
        .map(|route| {
            let mut totals = Totals::default();
            route.shipments.iter().for_each(|s| totals.add(s));

            RouteSummary {
                label: route.label.clone(),
                category: route.category,
                stops: totals.stops.len(),
                shipments: totals.ids.len(),
                packages: totals.packages,
                weight: totals.weight,
            }
        })
        .collect()
}

pub fn summarize_categories(shipments: &[Shipment]) -> Vec<CategorySummary> {
    let mut grouped: BTreeMap<Category, (Totals, HashSet<&str>)> = BTreeMap::new();
    for shipment in shipments {
        let (totals, labels) = grouped.entry(shipment.category).or_default();
        totals.add(shipment);
        labels.insert(shipment.route_label.as_str());
    }

    grouped
        .into_iter()
        .map(|(category, (totals, labels))| CategorySummary {
            category,
            routes: labels.len(),
            stops: totals.stops.len(),
            shipments: totals.ids.len(),
            packages: totals.packages,
            weight: totals.weight,
        })
        .collect()
}

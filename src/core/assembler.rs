use crate::core::coordinates::CoordinateIndex;
use crate::core::normalize::normalize;
use crate::core::sequencer::sequence;
use crate::domain::model::{Coordinate, Route, RouteStop, SequencedRoute, Shipment};
use std::collections::{HashMap, HashSet};

/// Normalized town keys of a route, in order of first appearance.
pub fn distinct_towns(shipments: &[Shipment]) -> Vec<String> {
    let mut seen = HashSet::new();
    shipments
        .iter()
        .map(|s| normalize(&s.town))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Reorders the route's shipments by the rank of their town in `town_order`
/// and numbers them from 1. The sort is stable: shipments of the same town keep
/// their relative order, and towns absent from `town_order` go last.
pub fn assemble(route: Route, town_order: Vec<String>) -> SequencedRoute {
    let rank: HashMap<&str, usize> = town_order
        .iter()
        .enumerate()
        .map(|(i, town)| (town.as_str(), i))
        .collect();

    let mut keyed: Vec<(usize, Shipment)> = route
        .shipments
        .into_iter()
        .map(|s| {
            let r = rank.get(normalize(&s.town).as_str()).copied().unwrap_or(usize::MAX);
            (r, s)
        })
        .collect();
    keyed.sort_by_key(|(r, _)| *r);

    let stops = keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, shipment))| RouteStop {
            stop_number: i + 1,
            shipment,
        })
        .collect();

    SequencedRoute {
        label: route.label,
        category: route.category,
        town_order,
        stops,
    }
}

/// Sequences the route's towns from `depot` and assembles the stop list.
pub fn sequence_route(route: Route, index: &CoordinateIndex, depot: Coordinate) -> SequencedRoute {
    let towns = distinct_towns(&route.shipments);
    let order = sequence(&towns, index, depot);
    tracing::debug!("Route {}: {} towns, order {:?}", route.label, towns.len(), order);
    assemble(route, order)
}

//! Stop ordering by greedy nearest-neighbor over town coordinates.
//!
//! This is a heuristic: from the depot it always moves to the closest
//! unvisited town. It does not search for the optimal tour, and callers rely
//! on the greedy order exactly as produced here.
//!
//! # Complexity
//!
//! O(n²) in the number of distinct towns of a route.

use crate::core::coordinates::CoordinateIndex;
use crate::core::normalize::normalize;
use crate::domain::model::Coordinate;
use std::cmp::Ordering;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

struct Candidate<'a> {
    position: usize,
    town: &'a str,
    coordinate: Coordinate,
}

/// Orders `towns` for a route starting at `depot`.
///
/// Towns with a coordinate are visited nearest-first from the current
/// position; equal distances fall back to town name, then input position.
/// Towns without a coordinate follow in their input order. The result is
/// always a permutation of `towns`.
///
/// # Examples
///
/// ```
/// use reparto::core::coordinates::{CoordinateIndex, CoordinateRow};
/// use reparto::core::sequencer::sequence;
/// use reparto::domain::model::Coordinate;
///
/// let index = CoordinateIndex::build(vec![
///     CoordinateRow::new("A", 0.0, 1.0),
///     CoordinateRow::new("B", 0.0, 10.0),
///     CoordinateRow::new("C", 0.0, 2.0),
/// ]);
/// let towns = vec!["A".to_string(), "B".to_string(), "C".to_string()];
///
/// assert_eq!(sequence(&towns, &index, Coordinate::new(0.0, 0.0)), ["A", "C", "B"]);
/// ```
pub fn sequence(towns: &[String], index: &CoordinateIndex, depot: Coordinate) -> Vec<String> {
    let mut resolvable = Vec::new();
    let mut unresolvable = Vec::new();

    for (position, town) in towns.iter().enumerate() {
        match index.lookup(&normalize(town)) {
            Some(coordinate) => resolvable.push(Candidate {
                position,
                town: town.as_str(),
                coordinate,
            }),
            None => unresolvable.push(town.clone()),
        }
    }

    if !unresolvable.is_empty() {
        tracing::debug!(
            "{} towns without coordinates appended at the end: {:?}",
            unresolvable.len(),
            unresolvable
        );
    }

    let mut ordered = Vec::with_capacity(towns.len());
    let mut visited = vec![false; resolvable.len()];
    let mut current = depot;

    for _ in 0..resolvable.len() {
        let mut best: Option<(usize, f64)> = None;

        for (i, candidate) in resolvable.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let distance = haversine_km(current, candidate.coordinate);

            let closer = match best {
                None => true,
                Some((b, best_distance)) => match distance.total_cmp(&best_distance) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        let incumbent = &resolvable[b];
                        (candidate.town, candidate.position) < (incumbent.town, incumbent.position)
                    }
                },
            };

            if closer {
                best = Some((i, distance));
            }
        }

        let Some((next, _)) = best else { break };
        visited[next] = true;
        current = resolvable[next].coordinate;
        ordered.push(resolvable[next].town.to_string());
    }

    ordered.extend(unresolvable);
    ordered
}

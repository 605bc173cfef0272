use crate::core::normalize::normalize;
use crate::domain::model::Coordinate;
use std::collections::BTreeMap;

/// One row of a town/coordinate table as read, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinateRow {
    pub town: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CoordinateRow {
    pub fn new(town: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            town: Some(town.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

/// Town -> coordinate lookup keyed by normalized town name. Read-only once
/// built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateIndex {
    entries: BTreeMap<String, Coordinate>,
}

impl CoordinateIndex {
    /// Duplicate towns are averaged. Rows missing a town, latitude or longitude
    /// are skipped.
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CoordinateRow>,
    {
        let mut sums: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
        let mut skipped = 0usize;

        for row in rows {
            let key = row.town.as_deref().map(normalize).unwrap_or_default();
            let (Some(lat), Some(lon)) = (row.latitude, row.longitude) else {
                skipped += 1;
                continue;
            };
            if key.is_empty() || !lat.is_finite() || !lon.is_finite() {
                skipped += 1;
                continue;
            }

            let entry = sums.entry(key).or_insert((0.0, 0.0, 0));
            entry.0 += lat;
            entry.1 += lon;
            entry.2 += 1;
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} incomplete coordinate rows", skipped);
        }

        let entries = sums
            .into_iter()
            .map(|(key, (lat, lon, n))| (key, Coordinate::new(lat / n as f64, lon / n as f64)))
            .collect();

        Self { entries }
    }

    /// Exact lookup on an already-normalized key.
    pub fn lookup(&self, town_key: &str) -> Option<Coordinate> {
        self.entries.get(town_key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CoordinateRow> for CoordinateIndex {
    fn from_iter<I: IntoIterator<Item = CoordinateRow>>(iter: I) -> Self {
        Self::build(iter)
    }
}

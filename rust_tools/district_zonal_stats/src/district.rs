use std::collections::BTreeSet;

use crate::error::{Result, ZonalStatsError};
use crate::vector::{DistrictRecord, NULL_DISTRICT_CODE};
use geo::{BooleanOps, MultiPolygon};
use log::debug;

/// One district's boundary records dissolved into a single geometry.
#[derive(Debug, Clone)]
pub struct SelectedDistrict {
    pub code: i32,
    pub geometry: MultiPolygon<f64>,
    /// Number of boundary records merged into `geometry`
    pub parts: usize,
}

/// Distinct district codes in ascending order, without the null marker.
pub fn unique_codes(records: &[DistrictRecord]) -> Vec<i32> {
    records
        .iter()
        .map(|r| r.code)
        .filter(|&code| code != NULL_DISTRICT_CODE)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn select_district(records: &[DistrictRecord], code: i32) -> Result<SelectedDistrict> {
    let matching: Vec<&MultiPolygon<f64>> = records
        .iter()
        .filter(|r| r.code == code)
        .map(|r| &r.geometry)
        .collect();

    if matching.is_empty() {
        return Err(ZonalStatsError::DistrictNotFound(code));
    }

    debug!("District {}: dissolving {} records", code, matching.len());

    Ok(SelectedDistrict {
        code,
        parts: matching.len(),
        geometry: dissolve(&matching),
    })
}

/// Union of all geometries.
pub fn dissolve(geometries: &[&MultiPolygon<f64>]) -> MultiPolygon<f64> {
    match geometries {
        [] => MultiPolygon::new(Vec::new()),
        [single] => (*single).clone(),
        [first, rest @ ..] => rest
            .iter()
            .fold((*first).clone(), |acc, next| acc.union(*next)),
    }
}

use std::fmt;

use crate::error::{Result, ZonalStatsError};
use gdal::spatial_ref::SpatialRef;
use log::{debug, info, warn};

/// Coordinate reference system of a dataset, detached from GDAL so it can be
/// compared and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    /// Authority identifier such as `EPSG:3857`, when GDAL can name one
    pub authority: Option<String>,
    pub wkt: String,
}

impl Crs {
    pub fn new(authority: Option<String>, wkt: impl Into<String>) -> Self {
        Self {
            authority,
            wkt: wkt.into(),
        }
    }

    pub fn from_spatial_ref(spatial_ref: &SpatialRef) -> Result<Self> {
        let wkt = spatial_ref.to_wkt()?;
        let authority = match (spatial_ref.auth_name(), spatial_ref.auth_code()) {
            (Ok(name), Ok(code)) => Some(format!("{}:{}", name, code)),
            _ => None,
        };

        if spatial_ref.is_projected() {
            debug!(
                "Projected CRS {} (linear units={:.6})",
                authority.as_deref().unwrap_or("<custom>"),
                spatial_ref.linear_units()
            );
        } else if spatial_ref.is_geographic() {
            debug!(
                "Geographic CRS {}",
                authority.as_deref().unwrap_or("<custom>")
            );
        }

        Ok(Self { authority, wkt })
    }

    /// Two CRS match when they share an authority code, or, when either lacks
    /// one, when GDAL considers the definitions the same.
    pub fn matches(&self, other: &Crs) -> bool {
        match (&self.authority, &other.authority) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => same_definition(&self.wkt, &other.wkt),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.authority {
            Some(authority) => write!(f, "{}", authority),
            None => write!(f, "custom CRS ({} chars of WKT)", self.wkt.len()),
        }
    }
}

fn same_definition(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (SpatialRef::from_wkt(a), SpatialRef::from_wkt(b)) {
        (Ok(sa), Ok(sb)) => sa == sb,
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to parse CRS definition, treating as mismatch: {}", e);
            false
        }
    }
}

/// Abort unless both layers are in the same reference system.
pub fn check_compatible(districts: &Crs, footprints: &Crs) -> Result<()> {
    info!("=== CRS Check ===");
    info!("Districts CRS: {}", districts);
    info!("Footprints CRS: {}", footprints);

    if !districts.matches(footprints) {
        return Err(ZonalStatsError::CrsMismatch {
            districts: districts.to_string(),
            footprints: footprints.to_string(),
        });
    }

    info!("CRS match: true");
    Ok(())
}

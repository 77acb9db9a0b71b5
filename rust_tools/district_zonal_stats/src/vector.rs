use std::path::Path;

use crate::crs::Crs;
use crate::error::{Result, ZonalStatsError};
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use geo::{Geometry, MultiPolygon};
use log::{debug, info, warn};

/// Code given to boundary records whose district code is null.
pub const NULL_DISTRICT_CODE: i32 = -1;

#[derive(Debug, Clone)]
pub struct DistrictRecord {
    pub code: i32,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
pub struct FootprintRecord {
    /// Path of the footprint file as stored in the index
    pub source: String,
    pub geometry: MultiPolygon<f64>,
}

/// Records of the first layer of a vector dataset, with the layer's CRS.
#[derive(Debug, Clone)]
pub struct VectorLayer<T> {
    pub crs: Crs,
    pub records: Vec<T>,
}

/// Read district boundaries, normalizing null codes to [`NULL_DISTRICT_CODE`].
pub fn read_districts(path: &Path, code_field: &str) -> Result<VectorLayer<DistrictRecord>> {
    read_layer(path, code_field, |value, geometry| {
        Ok(DistrictRecord {
            code: field_to_code(value),
            geometry,
        })
    })
}

pub fn read_footprints(path: &Path, source_field: &str) -> Result<VectorLayer<FootprintRecord>> {
    read_layer(path, source_field, |value, geometry| {
        let source = match value {
            Some(FieldValue::StringValue(s)) => s,
            other => {
                return Err(ZonalStatsError::InvalidInput(format!(
                    "footprint field '{}' is not a string: {:?}",
                    source_field, other
                )))
            }
        };
        Ok(FootprintRecord { source, geometry })
    })
}

fn read_layer<T, F>(path: &Path, field: &str, mut build: F) -> Result<VectorLayer<T>>
where
    F: FnMut(Option<FieldValue>, MultiPolygon<f64>) -> Result<T>,
{
    info!("Opening vector dataset: {}", path.display());
    let dataset = Dataset::open(path)?;
    let mut layer = dataset.layer(0)?;

    let spatial_ref = layer
        .spatial_ref()
        .ok_or_else(|| ZonalStatsError::MissingCrs(path.to_path_buf()))?;
    let crs = Crs::from_spatial_ref(&spatial_ref)?;

    let has_field = layer.defn().fields().any(|f| f.name() == field);
    if !has_field {
        return Err(ZonalStatsError::MissingField {
            path: path.to_path_buf(),
            field: field.to_string(),
        });
    }

    debug!(
        "Layer '{}' has {} features",
        layer.name(),
        layer.feature_count()
    );

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for feature in layer.features() {
        let Some(geometry) = feature.geometry() else {
            skipped += 1;
            continue;
        };
        let geometry = to_multipolygon(geometry.to_geo()?)?;
        if geometry.0.is_empty() {
            skipped += 1;
            continue;
        }
        let value = feature.field(field)?;
        records.push(build(value, geometry)?);
    }

    if skipped > 0 {
        warn!(
            "Skipped {} features without geometry in {}",
            skipped,
            path.display()
        );
    }
    info!("Loaded {} features from {}", records.len(), path.display());

    Ok(VectorLayer { crs, records })
}

/// Flatten polygonal geometry into a single `MultiPolygon`.
pub fn to_multipolygon(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for g in gc.0 {
                polygons.extend(to_multipolygon(g)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(ZonalStatsError::UnsupportedGeometry(
            geometry_type_name(&other).to_string(),
        )),
    }
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Convert a district code field to an integer; nulls and unparseable values
/// become [`NULL_DISTRICT_CODE`].
pub fn field_to_code(value: Option<FieldValue>) -> i32 {
    match value {
        Some(FieldValue::IntegerValue(v)) => v,
        Some(FieldValue::Integer64Value(v)) => {
            i32::try_from(v).unwrap_or(NULL_DISTRICT_CODE)
        }
        Some(FieldValue::RealValue(v)) if v.is_finite() => v as i32,
        Some(FieldValue::StringValue(s)) => s.trim().parse().unwrap_or(NULL_DISTRICT_CODE),
        _ => NULL_DISTRICT_CODE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Rect};

    #[test]
    fn test_field_to_code() {
        assert_eq!(field_to_code(Some(FieldValue::IntegerValue(532))), 532);
        assert_eq!(field_to_code(Some(FieldValue::Integer64Value(17))), 17);
        assert_eq!(field_to_code(Some(FieldValue::RealValue(532.0))), 532);
        assert_eq!(
            field_to_code(Some(FieldValue::StringValue(" 12 ".to_string()))),
            12
        );
        assert_eq!(field_to_code(None), NULL_DISTRICT_CODE);
        assert_eq!(field_to_code(Some(FieldValue::RealValue(f64::NAN))), NULL_DISTRICT_CODE);
    }

    #[test]
    fn test_to_multipolygon_accepts_polygonal() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let mp = to_multipolygon(Geometry::Polygon(p.clone())).unwrap();
        assert_eq!(mp.0.len(), 1);

        let rect = Rect::new((0.0, 0.0), (2.0, 2.0));
        let mp = to_multipolygon(Geometry::Rect(rect)).unwrap();
        assert_eq!(mp.0.len(), 1);

        let gc = geo::GeometryCollection::new_from(vec![
            Geometry::Polygon(p.clone()),
            Geometry::MultiPolygon(MultiPolygon::new(vec![p.clone(), p])),
        ]);
        let mp = to_multipolygon(Geometry::GeometryCollection(gc)).unwrap();
        assert_eq!(mp.0.len(), 3);
    }

    #[test]
    fn test_to_multipolygon_rejects_points() {
        let result = to_multipolygon(Geometry::Point(point!(x: 1.0, y: 2.0)));
        assert!(matches!(
            result,
            Err(ZonalStatsError::UnsupportedGeometry(ref t)) if t == "Point"
        ));
    }
}

use std::path::{Path, PathBuf};

use crate::error::{Result, ZonalStatsError};
use crate::vector::FootprintRecord;
use geo::{BoundingRect, Intersects, MultiPolygon, Rect};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

const FOOTPRINT_SUFFIX: &str = "_footprint.gpkg";
const TILE_SUFFIX: &str = ".tif";

/// Bounding box of a footprint in the R-tree, keyed by its index.
#[derive(Debug, Clone)]
struct FootprintEnvelope {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for FootprintEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Spatial index over the raster footprints.
pub struct FootprintIndex<'a> {
    footprints: &'a [FootprintRecord],
    rtree: RTree<FootprintEnvelope>,
}

impl<'a> FootprintIndex<'a> {
    pub fn new(footprints: &'a [FootprintRecord]) -> Self {
        let envelopes = footprints
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| {
                f.geometry
                    .bounding_rect()
                    .map(|bbox| FootprintEnvelope { idx, bbox })
            })
            .collect();

        Self {
            footprints,
            rtree: RTree::bulk_load(envelopes),
        }
    }

    /// Footprints whose geometry intersects `geometry`, in index order.
    pub fn intersecting(&self, geometry: &MultiPolygon<f64>) -> Vec<&'a FootprintRecord> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let search = AABB::from_corners(rect.min().into(), rect.max().into());

        let mut hits: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&search)
            .map(|candidate| candidate.idx)
            .filter(|&idx| self.footprints[idx].geometry.intersects(geometry))
            .collect();
        hits.sort_unstable();

        debug!(
            "{} footprints intersect the district ({} in index)",
            hits.len(),
            self.footprints.len()
        );

        hits.into_iter().map(|idx| &self.footprints[idx]).collect()
    }
}

/// Map a footprint source path to the raster tile it describes:
/// `.../<name>_footprint.gpkg` becomes `<embeddings_dir>/<name>.tif`.
pub fn tile_path(embeddings_dir: &Path, source: &str) -> PathBuf {
    let file_name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    embeddings_dir.join(file_name.replace(FOOTPRINT_SUFFIX, TILE_SUFFIX))
}

/// Resolve tile paths for the footprints, failing on the first missing file.
pub fn resolve_tiles(embeddings_dir: &Path, footprints: &[&FootprintRecord]) -> Result<Vec<PathBuf>> {
    footprints
        .iter()
        .map(|f| {
            let path = tile_path(embeddings_dir, &f.source);
            if path.is_file() {
                Ok(path)
            } else {
                Err(ZonalStatsError::MissingTile(path))
            }
        })
        .collect()
}

/// Bounding box covering every footprint.
pub fn union_extent(footprints: &[&FootprintRecord]) -> Option<Rect<f64>> {
    footprints
        .iter()
        .filter_map(|f| f.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn footprint(source: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> FootprintRecord {
        let rect = Rect::new((x0, y0), (x1, y1));
        FootprintRecord {
            source: source.to_string(),
            geometry: MultiPolygon::new(vec![rect.to_polygon()]),
        }
    }

    fn index_fixture() -> Vec<FootprintRecord> {
        vec![
            footprint("/fp/a_footprint.gpkg", 0.0, 0.0, 10.0, 10.0),
            footprint("/fp/b_footprint.gpkg", 10.0, 0.0, 20.0, 10.0),
            footprint("/fp/c_footprint.gpkg", 100.0, 100.0, 110.0, 110.0),
            // Bounding box overlaps the district, geometry does not
            FootprintRecord {
                source: "/fp/d_footprint.gpkg".to_string(),
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 20.0, y: 20.0),
                    (x: 40.0, y: 20.0),
                    (x: 40.0, y: 0.0),
                    (x: 39.0, y: 19.0),
                ]]),
            },
        ]
    }

    #[test]
    fn test_intersecting_uses_exact_predicate() {
        let footprints = index_fixture();
        let index = FootprintIndex::new(&footprints);
        let district = MultiPolygon::new(vec![Rect::new((5.0, 2.0), (25.0, 8.0)).to_polygon()]);

        let sources: Vec<&str> = index
            .intersecting(&district)
            .iter()
            .map(|f| f.source.as_str())
            .collect();
        assert_eq!(sources, vec!["/fp/a_footprint.gpkg", "/fp/b_footprint.gpkg"]);
    }

    #[test]
    fn test_intersecting_returns_empty_when_disjoint() {
        let footprints = index_fixture();
        let index = FootprintIndex::new(&footprints);
        let district =
            MultiPolygon::new(vec![Rect::new((-50.0, -50.0), (-40.0, -40.0)).to_polygon()]);
        assert!(index.intersecting(&district).is_empty());
    }

    #[test]
    fn test_tile_path_mapping() {
        let dir = Path::new("/data/embeddings");
        assert_eq!(
            tile_path(dir, "/some/where/tile_0042_footprint.gpkg"),
            PathBuf::from("/data/embeddings/tile_0042.tif")
        );
        assert_eq!(
            tile_path(dir, "C:\\fp\\x_footprint.gpkg"),
            PathBuf::from("/data/embeddings/x.tif")
        );
        assert_eq!(
            tile_path(dir, "bare_footprint.gpkg"),
            PathBuf::from("/data/embeddings/bare.tif")
        );
    }

    #[test]
    fn test_resolve_tiles_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tif"), b"").unwrap();

        let present = footprint("x/a_footprint.gpkg", 0.0, 0.0, 1.0, 1.0);
        let absent = footprint("x/b_footprint.gpkg", 0.0, 0.0, 1.0, 1.0);

        let paths = resolve_tiles(dir.path(), &[&present]).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.tif")]);

        let result = resolve_tiles(dir.path(), &[&present, &absent]);
        assert!(matches!(result, Err(ZonalStatsError::MissingTile(p)) if p == dir.path().join("b.tif")));
    }

    #[test]
    fn test_union_extent() {
        let footprints = index_fixture();
        let refs: Vec<&FootprintRecord> = footprints.iter().take(2).collect();
        let extent = union_extent(&refs).unwrap();
        assert_eq!(extent.min().x, 0.0);
        assert_eq!(extent.max().x, 20.0);
        assert_eq!(extent.max().y, 10.0);
        assert!(union_extent(&[]).is_none());
    }
}

//! Tile selection by bounding box or polygons
//!
//! A bbox keeps every tile that is not strictly outside it. Polygons keep
//! every tile whose extent intersects at least one polygon (touching counts).
//! Only outer rings are used; holes are ignored.

use std::fs;
use std::path::Path;

use butterfly_common::{Error, IoResultExt, Result};
use geo::{BoundingRect, Intersects, LineString, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use tracing::{debug, info};

use crate::source::TileResolver;
use crate::tile_id::{decode_path, BoundingBox};

/// How tiles are picked from the source
#[derive(Debug, Clone)]
pub enum Selection {
    /// Every enumerated tile
    All,
    BoundingBox(BoundingBox),
    Polygons(Vec<Polygon<f64>>),
}

impl Selection {
    /// Build a selection from the optional bbox string and polygon directory.
    /// Validation happens here, before anything is written.
    pub fn from_args(bbox: Option<&str>, polygons: Option<&Path>) -> Result<Self> {
        match (bbox, polygons) {
            (Some(_), Some(_)) => Err(Error::validation(
                "--bbox and --polygons are mutually exclusive",
            )),
            (Some(bbox), None) => Ok(Selection::BoundingBox(parse_bbox(bbox)?)),
            (None, Some(dir)) => Ok(Selection::Polygons(load_polygons(dir)?)),
            (None, None) => Ok(Selection::All),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Fill the resolver's matches. Returns the number of matches pushed,
    /// which may include the same tile more than once in polygon mode.
    pub fn apply(&self, resolver: &mut TileResolver) -> Result<usize> {
        let matched = match self {
            Selection::All => {
                resolver.match_all();
                resolver.matched().len()
            }
            Selection::BoundingBox(query) => {
                let mut hits = Vec::new();
                for path in resolver.paths() {
                    let tile = decode_path(path)?.bounding_box()?;
                    if !query.is_disjoint(&tile) {
                        hits.push(path.clone());
                    }
                }
                let count = hits.len();
                hits.into_iter().for_each(|p| resolver.push_match(p));
                count
            }
            Selection::Polygons(polygons) => {
                let hits = match_polygons(resolver.paths(), polygons)?;
                let count = hits.len();
                hits.into_iter().for_each(|p| resolver.push_match(p));
                count
            }
        };

        info!(
            candidates = resolver.paths().len(),
            matched,
            "selected tiles"
        );
        Ok(matched)
    }
}

/// Parse and validate `"minx,miny,maxx,maxy"`
pub fn parse_bbox(input: &str) -> Result<BoundingBox> {
    let values = input
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::validation(format!("bbox '{input}' is not numeric: {e}")))?;

    let [min_x, min_y, max_x, max_y] = values[..] else {
        return Err(Error::validation(format!(
            "bbox '{input}' must have 4 values: minx,miny,maxx,maxy"
        )));
    };

    let bbox = BoundingBox::new(min_x, min_y, max_x, max_y);
    validate_bbox(&bbox)?;
    Ok(bbox)
}

pub fn validate_bbox(bbox: &BoundingBox) -> Result<()> {
    let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
    let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);

    if !(lon_ok(bbox.min_x) && lon_ok(bbox.max_x)) {
        return Err(Error::validation(format!(
            "bbox longitudes must be within [-180, 180], got {} and {}",
            bbox.min_x, bbox.max_x
        )));
    }
    if !(lat_ok(bbox.min_y) && lat_ok(bbox.max_y)) {
        return Err(Error::validation(format!(
            "bbox latitudes must be within [-90, 90], got {} and {}",
            bbox.min_y, bbox.max_y
        )));
    }
    if bbox.min_x >= bbox.max_x || bbox.min_y >= bbox.max_y {
        return Err(Error::validation(format!(
            "bbox minimum must be below maximum on both axes, got {},{},{},{}",
            bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
        )));
    }
    Ok(())
}

/// Tile extent keyed by its position in the enumeration
struct TileBox {
    idx: usize,
    bbox: BoundingBox,
}

impl RTreeObject for TileBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

/// One pass per polygon, in polygon order; a tile hit by several polygons is
/// pushed once per polygon. Hits within a pass follow enumeration order.
fn match_polygons(paths: &[String], polygons: &[Polygon<f64>]) -> Result<Vec<String>> {
    let mut boxes = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        let bbox = decode_path(path)?.bounding_box()?;
        boxes.push(TileBox { idx, bbox });
    }
    let tree = RTree::bulk_load(boxes);

    let mut hits = Vec::new();
    for polygon in polygons {
        let Some(envelope) = polygon.bounding_rect() else {
            continue;
        };
        let query = AABB::from_corners(
            [envelope.min().x, envelope.min().y],
            [envelope.max().x, envelope.max().y],
        );

        let mut tiles: Vec<usize> = tree
            .locate_in_envelope_intersecting(&query)
            .filter(|tile| polygon.intersects(&tile.bbox.to_rect()))
            .map(|tile| tile.idx)
            .collect();
        tiles.sort_unstable();
        hits.extend(tiles.into_iter().map(|i| paths[i].clone()));
    }
    Ok(hits)
}

/// GeoJSON objects we care about; everything else is skipped
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection {
        features: Vec<GeoJson>,
    },
    Feature {
        geometry: Option<Box<GeoJson>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJson>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Other,
}

impl GeoJson {
    fn collect_outer_rings(self, out: &mut Vec<Polygon<f64>>) -> std::result::Result<(), String> {
        match self {
            GeoJson::FeatureCollection { features } => {
                for feature in features {
                    feature.collect_outer_rings(out)?;
                }
            }
            GeoJson::Feature { geometry } => {
                if let Some(geometry) = geometry {
                    (*geometry).collect_outer_rings(out)?;
                }
            }
            GeoJson::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.collect_outer_rings(out)?;
                }
            }
            GeoJson::Polygon { coordinates } => out.push(outer_ring(&coordinates)?),
            GeoJson::MultiPolygon { coordinates } => {
                for rings in &coordinates {
                    out.push(outer_ring(rings)?);
                }
            }
            GeoJson::Other => {}
        }
        Ok(())
    }
}

fn outer_ring(rings: &[Vec<Vec<f64>>]) -> std::result::Result<Polygon<f64>, String> {
    let ring = rings.first().ok_or("polygon without rings")?;
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(format!("position {position:?} needs at least 2 values")),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(LineString::from(coords), vec![]))
}

/// Parse the outer rings of one GeoJSON document
pub fn parse_polygons(json: &str) -> std::result::Result<Vec<Polygon<f64>>, String> {
    let document: GeoJson = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let mut polygons = Vec::new();
    document.collect_outer_rings(&mut polygons)?;
    Ok(polygons)
}

/// Load every polygon from the GeoJSON files in `dir`, in file name order
pub fn load_polygons(dir: &Path) -> Result<Vec<Polygon<f64>>> {
    if !dir.is_dir() {
        return Err(Error::validation(format!(
            "polygon directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let path = entry.with_path(dir)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut polygons = Vec::new();
    for file in &files {
        let json = fs::read_to_string(file).with_path(file)?;
        let parsed = parse_polygons(&json).map_err(|reason| {
            Error::validation(format!("{} is not usable GeoJSON: {reason}", file.display()))
        })?;
        debug!(file = %file.display(), polygons = parsed.len(), "loaded polygons");
        polygons.extend(parsed);
    }

    if polygons.is_empty() {
        return Err(Error::validation(format!(
            "no polygons found in {}",
            dir.display()
        )));
    }
    info!(files = files.len(), polygons = polygons.len(), "loaded selection polygons");
    Ok(polygons)
}

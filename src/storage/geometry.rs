use crate::primitives::bytes::{buf::Cursor, le};
use crate::types::{Result, StoreError};

/// One coordinate; `ele` is present exactly when the graph is 3-D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Elevation in meters.
    pub ele: Option<f64>,
}

impl Point {
    /// 2-D point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
        }
    }

    /// 3-D point.
    pub fn with_ele(lat: f64, lon: f64, ele: f64) -> Self {
        Self {
            lat,
            lon,
            ele: Some(ele),
        }
    }
}

/// Ordered polyline of intermediate ("pillar") points of an edge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointList {
    points: Vec<Point>,
}

impl PointList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a 2-D list from flat `lat, lon` pairs.
    pub fn from_2d(coords: &[f64]) -> Self {
        Self {
            points: coords
                .chunks_exact(2)
                .map(|c| Point::new(c[0], c[1]))
                .collect(),
        }
    }

    /// Builds a 3-D list from flat `lat, lon, ele` triples.
    pub fn from_3d(coords: &[f64]) -> Self {
        Self {
            points: coords
                .chunks_exact(3)
                .map(|c| Point::with_ele(c[0], c[1], c[2]))
                .collect(),
        }
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Points in order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the list has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reverses the point order in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub(crate) fn encode(&self, three_d: bool) -> Result<Vec<u8>> {
        let width = point_width(three_d);
        let mut out = vec![0u8; self.points.len() * width];
        for (chunk, p) in out.chunks_exact_mut(width).zip(self.points.iter()) {
            le::put_f64(&mut chunk[0..8], p.lat);
            le::put_f64(&mut chunk[8..16], p.lon);
            match (three_d, p.ele) {
                (true, Some(ele)) => le::put_f64(&mut chunk[16..24], ele),
                (true, None) => {
                    return Err(StoreError::Invalid("3-D geometry point without elevation"))
                }
                (false, Some(_)) => {
                    return Err(StoreError::Invalid("elevation on a 2-D graph"))
                }
                (false, None) => {}
            }
        }
        Ok(out)
    }

    pub(crate) fn decode(bytes: &[u8], three_d: bool) -> Result<Self> {
        let width = point_width(three_d);
        if bytes.len() % width != 0 {
            return Err(StoreError::Corruption("geometry blob not point aligned"));
        }
        let mut cur = Cursor::new(bytes);
        let mut points = Vec::with_capacity(bytes.len() / width);
        while cur.remaining() > 0 {
            let lat = cur.f64()?;
            let lon = cur.f64()?;
            let ele = if three_d { Some(cur.f64()?) } else { None };
            points.push(Point { lat, lon, ele });
        }
        Ok(Self { points })
    }
}

impl FromIterator<Point> for PointList {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

fn point_width(three_d: bool) -> usize {
    if three_d {
        24
    } else {
        16
    }
}

/// Which points a geometry read returns, relative to the viewed orientation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchMode {
    /// Only the stored intermediate points.
    PillarOnly,
    /// Base node followed by the pillars.
    BaseAndPillar,
    /// Pillars followed by the adjacent node.
    PillarAndAdj,
    /// Base node, pillars, adjacent node.
    All,
}

impl FetchMode {
    pub(crate) fn includes_base(self) -> bool {
        matches!(self, FetchMode::BaseAndPillar | FetchMode::All)
    }

    pub(crate) fn includes_adj(self) -> bool {
        matches!(self, FetchMode::PillarAndAdj | FetchMode::All)
    }
}

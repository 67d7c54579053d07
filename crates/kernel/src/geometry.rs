//! Wall geometry: a flat substrate or a five-segment rectangular cavity.
//!
//! Each wall segment carries its own static contact angle. The segment set is
//! iterated generically by the adhesion and repulsion stages, so the force
//! code never branches on which wall it is looking at.
//!
//! Cavity layout (ledges at y = 0, cavity opening between the walls):
//!
//! ```text
//!   left ledge         right ledge
//!  ____________        ____________   y = 0
//!              |      |
//!    left wall |      | right wall
//!              |______|               y = y_bottom
//!               bottom
//!           x_left   x_right
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::neighbor::NeighborGrid;
use crate::particle::SolidParticles;

/// Horizontal offset below which a particle counts as sitting on a symmetry
/// line and receives no adhesion push.
pub const CENTERLINE_TOLERANCE: f64 = 1.0e-10;

/// Relative tolerance when checking that a coordinate is a multiple of dx.
const ALIGNMENT_TOLERANCE: f64 = 1.0e-6;

/// Errors raised while validating or tiling the wall geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A segment boundary does not fall on the particle lattice.
    #[error("{segment} position {value:e} m is not a multiple of the particle spacing {dx:e} m")]
    Misaligned {
        /// Offending segment boundary.
        segment: &'static str,
        /// Its coordinate.
        value: f64,
        /// Particle spacing.
        dx: f64,
    },
    /// A wall or its boundary layers do not fit inside the domain.
    #[error("{segment} does not fit inside the domain [0, {width:e}] m with {layers} boundary layers")]
    OutsideDomain {
        /// Offending segment.
        segment: &'static str,
        /// Domain width.
        width: f64,
        /// Number of solid layers requested.
        layers: usize,
    },
    /// The cavity walls are not ordered left to right.
    #[error("cavity left wall x={left:e} m must be left of right wall x={right:e} m")]
    InvertedWalls {
        /// Left wall x.
        left: f64,
        /// Right wall x.
        right: f64,
    },
    /// The cavity bottom is not below the ledges.
    #[error("cavity bottom y={0:e} m must lie below the ledges at y=0")]
    BottomAboveLedge(f64),
    /// Two boundary particles sit closer than half a spacing.
    #[error("boundary particles overlap near ({x:e}, {y:e})")]
    Overlap {
        /// Location of the overlap.
        x: f64,
        /// Location of the overlap.
        y: f64,
    },
    /// A stretch of wall has no boundary particle behind it.
    #[error("{segment} has no boundary particle behind ({x:e}, {y:e})")]
    Gap {
        /// Segment with the hole.
        segment: &'static str,
        /// Location of the hole.
        x: f64,
        /// Location of the hole.
        y: f64,
    },
}

/// Shape and placement of a single wall segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Infinite horizontal substrate at height `y`.
    FlatSubstrate {
        /// Substrate height (m).
        y: f64,
        /// Droplet centre line; adhesion pushes away from it.
        x_center: f64,
    },
    /// Horizontal cavity floor between the two walls.
    Bottom {
        /// Left wall x (m).
        x_left: f64,
        /// Right wall x (m).
        x_right: f64,
        /// Floor height (m).
        y: f64,
    },
    /// Vertical wall bounding the cavity on the left; fluid lies to its right.
    LeftWall {
        /// Wall x (m).
        x: f64,
        /// Cavity floor (m).
        y_bottom: f64,
        /// Ledge height (m).
        y_top: f64,
    },
    /// Vertical wall bounding the cavity on the right; fluid lies to its left.
    RightWall {
        /// Wall x (m).
        x: f64,
        /// Cavity floor (m).
        y_bottom: f64,
        /// Ledge height (m).
        y_top: f64,
    },
    /// Horizontal platform left of the cavity.
    LeftLedge {
        /// Where the ledge meets the left wall (m).
        x_end: f64,
        /// Ledge height (m).
        y: f64,
    },
    /// Horizontal platform right of the cavity.
    RightLedge {
        /// Where the ledge meets the right wall (m).
        x_start: f64,
        /// Ledge height (m).
        y: f64,
    },
}

/// A wall segment with its static contact angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    /// Placement.
    pub kind: SegmentKind,
    /// Static contact angle in degrees.
    pub contact_angle_deg: f64,
}

impl WallSegment {
    /// Human-readable segment name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self.kind {
            SegmentKind::FlatSubstrate { .. } => "substrate",
            SegmentKind::Bottom { .. } => "cavity bottom",
            SegmentKind::LeftWall { .. } => "left wall",
            SegmentKind::RightWall { .. } => "right wall",
            SegmentKind::LeftLedge { .. } => "left ledge",
            SegmentKind::RightLedge { .. } => "right ledge",
        }
    }

    /// Cosine of the contact angle. Positive means hydrophilic.
    #[inline]
    pub fn cos_theta(&self) -> f64 {
        self.contact_angle_deg.to_radians().cos()
    }

    /// Signed distance from the wall surface into the fluid side, or `None`
    /// when `(x, y)` lies outside the span the segment covers.
    pub fn distance(&self, x: f64, y: f64) -> Option<f64> {
        match self.kind {
            SegmentKind::FlatSubstrate { y: yw, .. } => Some(y - yw),
            SegmentKind::Bottom { x_left, x_right, y: yb } => {
                (x > x_left && x < x_right).then_some(y - yb)
            }
            SegmentKind::LeftWall { x: xw, y_bottom, y_top } => {
                (y > y_bottom && y < y_top).then_some(x - xw)
            }
            SegmentKind::RightWall { x: xw, y_bottom, y_top } => {
                (y > y_bottom && y < y_top).then_some(xw - x)
            }
            SegmentKind::LeftLedge { x_end, y: yl } => (x < x_end).then_some(y - yl),
            SegmentKind::RightLedge { x_start, y: yl } => (x > x_start).then_some(y - yl),
        }
    }

    /// Unit normal pointing from the wall into the fluid.
    pub fn wall_normal(&self) -> [f64; 2] {
        match self.kind {
            SegmentKind::LeftWall { .. } => [1.0, 0.0],
            SegmentKind::RightWall { .. } => [-1.0, 0.0],
            _ => [0.0, 1.0],
        }
    }

    /// Unit direction of the hydrophilic adhesion push at `(x, y)`.
    ///
    /// Along the floor and the substrate the push is outward from the centre
    /// line; along the walls it is away from the wall mid-height; the ledges
    /// push away from the cavity. Particles on a symmetry line get zero.
    pub fn adhesion_direction(&self, x: f64, y: f64) -> [f64; 2] {
        let outward = |offset: f64| {
            if offset.abs() < CENTERLINE_TOLERANCE {
                0.0
            } else {
                offset.signum()
            }
        };
        match self.kind {
            SegmentKind::FlatSubstrate { x_center, .. } => [outward(x - x_center), 0.0],
            SegmentKind::Bottom { x_left, x_right, .. } => {
                [outward(x - 0.5 * (x_left + x_right)), 0.0]
            }
            SegmentKind::LeftWall { y_bottom, y_top, .. }
            | SegmentKind::RightWall { y_bottom, y_top, .. } => {
                [0.0, outward(y - 0.5 * (y_bottom + y_top))]
            }
            SegmentKind::LeftLedge { .. } => [-1.0, 0.0],
            SegmentKind::RightLedge { .. } => [1.0, 0.0],
        }
    }
}

/// Cavity placement (m). The ledges always sit at y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CavityDims {
    /// Left wall x.
    pub x_wall_left: f64,
    /// Right wall x.
    pub x_wall_right: f64,
    /// Cavity floor (negative).
    pub y_bottom: f64,
}

impl Default for CavityDims {
    fn default() -> Self {
        Self {
            x_wall_left: 0.4e-3,
            x_wall_right: 1.2e-3,
            y_bottom: -0.13e-3,
        }
    }
}

/// Per-segment contact angles of a cavity (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CavityAngles {
    /// Cavity floor.
    pub bottom: f64,
    /// Left wall.
    pub left_wall: f64,
    /// Right wall.
    pub right_wall: f64,
    /// Left ledge.
    pub left_ledge: f64,
    /// Right ledge.
    pub right_ledge: f64,
}

impl Default for CavityAngles {
    fn default() -> Self {
        Self {
            bottom: 30.0,
            left_wall: 45.0,
            right_wall: 90.0,
            left_ledge: 41.0,
            right_ledge: 90.0,
        }
    }
}

/// The complete wall set of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WallGeometry {
    /// One flat substrate at y = 0.
    Flat(WallSegment),
    /// Five-segment cavity, ordered bottom, left wall, right wall, left
    /// ledge, right ledge.
    Cavity {
        /// Placement.
        dims: CavityDims,
        /// Segments with their angles.
        segments: [WallSegment; 5],
    },
}

impl WallGeometry {
    /// Flat substrate at y = 0 with a single contact angle.
    pub fn flat(contact_angle_deg: f64, x_center: f64) -> Self {
        Self::Flat(WallSegment {
            kind: SegmentKind::FlatSubstrate { y: 0.0, x_center },
            contact_angle_deg,
        })
    }

    /// Five-segment cavity.
    pub fn cavity(dims: CavityDims, angles: CavityAngles) -> Self {
        let CavityDims {
            x_wall_left,
            x_wall_right,
            y_bottom,
        } = dims;
        let segment = |kind, contact_angle_deg| WallSegment {
            kind,
            contact_angle_deg,
        };
        Self::Cavity {
            dims,
            segments: [
                segment(
                    SegmentKind::Bottom {
                        x_left: x_wall_left,
                        x_right: x_wall_right,
                        y: y_bottom,
                    },
                    angles.bottom,
                ),
                segment(
                    SegmentKind::LeftWall {
                        x: x_wall_left,
                        y_bottom,
                        y_top: 0.0,
                    },
                    angles.left_wall,
                ),
                segment(
                    SegmentKind::RightWall {
                        x: x_wall_right,
                        y_bottom,
                        y_top: 0.0,
                    },
                    angles.right_wall,
                ),
                segment(
                    SegmentKind::LeftLedge {
                        x_end: x_wall_left,
                        y: 0.0,
                    },
                    angles.left_ledge,
                ),
                segment(
                    SegmentKind::RightLedge {
                        x_start: x_wall_right,
                        y: 0.0,
                    },
                    angles.right_ledge,
                ),
            ],
        }
    }

    /// All segments, in a fixed order.
    pub fn segments(&self) -> &[WallSegment] {
        match self {
            Self::Flat(segment) => std::slice::from_ref(segment),
            Self::Cavity { segments, .. } => segments,
        }
    }

    /// Cavity placement, if any.
    pub fn cavity_dims(&self) -> Option<CavityDims> {
        match self {
            Self::Flat(_) => None,
            Self::Cavity { dims, .. } => Some(*dims),
        }
    }

    /// The segment whose surface is closest to `(x, y)` among those whose
    /// span covers the point, with that distance.
    pub fn nearest(&self, x: f64, y: f64) -> Option<(f64, &WallSegment)> {
        self.segments()
            .iter()
            .filter_map(|s| s.distance(x, y).map(|d| (d, s)))
            .min_by(|a, b| a.0.abs().total_cmp(&b.0.abs()))
    }

    /// Height of the lowest wall surface.
    pub fn lowest_y(&self) -> f64 {
        match self {
            Self::Flat(WallSegment {
                kind: SegmentKind::FlatSubstrate { y, .. },
                ..
            }) => *y,
            Self::Flat(_) => 0.0,
            Self::Cavity { dims, .. } => dims.y_bottom,
        }
    }

    /// Check that the geometry can be tiled on a lattice of spacing `dx`
    /// inside a domain of width `width` with `layers` solid layers.
    pub fn validate(&self, dx: f64, width: f64, layers: usize) -> Result<(), GeometryError> {
        let Self::Cavity { dims, .. } = self else {
            return Ok(());
        };
        for (segment, value) in [
            ("left wall", dims.x_wall_left),
            ("right wall", dims.x_wall_right),
            ("cavity bottom", dims.y_bottom),
        ] {
            lattice_index(value, dx).ok_or(GeometryError::Misaligned { segment, value, dx })?;
        }
        if dims.x_wall_left >= dims.x_wall_right {
            return Err(GeometryError::InvertedWalls {
                left: dims.x_wall_left,
                right: dims.x_wall_right,
            });
        }
        if dims.y_bottom >= 0.0 {
            return Err(GeometryError::BottomAboveLedge(dims.y_bottom));
        }
        let margin = layers as f64 * dx;
        if dims.x_wall_left - margin < -ALIGNMENT_TOLERANCE * dx {
            return Err(GeometryError::OutsideDomain {
                segment: "left wall",
                width,
                layers,
            });
        }
        if dims.x_wall_right + margin > width + ALIGNMENT_TOLERANCE * dx {
            return Err(GeometryError::OutsideDomain {
                segment: "right wall",
                width,
                layers,
            });
        }
        Ok(())
    }

    /// Generate boundary particles behind every segment.
    ///
    /// Particles sit on the dx lattice offset by dx/2, `layers` deep. In a
    /// cavity the wall columns run from the ledge surface down through the
    /// floor thickness, so the corners are filled exactly once. The result is
    /// checked for overlaps and for uncovered wall stretches.
    pub fn build_solid(
        &self,
        dx: f64,
        layers: usize,
        width: f64,
        rho0: f64,
    ) -> Result<SolidParticles, GeometryError> {
        self.validate(dx, width, layers)?;
        let mass = rho0 * dx * dx;
        let columns = ((width - 0.5 * dx) / dx).ceil().max(0.0) as i64;
        let cell = |i: i64| (i as f64 + 0.5) * dx;
        let mut solid = SolidParticles::new();
        let depth = layers as i64;

        match self {
            Self::Flat(segment) => {
                let y0 = match segment.kind {
                    SegmentKind::FlatSubstrate { y, .. } => y,
                    _ => 0.0,
                };
                for l in 0..depth {
                    for i in 0..columns {
                        solid.push(cell(i), y0 - cell(l), mass, rho0, 0);
                    }
                }
            }
            Self::Cavity { dims, .. } => {
                let iwl = lattice_index(dims.x_wall_left, dx).unwrap_or(0);
                let iwr = lattice_index(dims.x_wall_right, dx).unwrap_or(0);
                let jb = lattice_index(-dims.y_bottom, dx).unwrap_or(0);

                // Segment order matches `segments()`.
                for l in 0..depth {
                    for i in iwl..iwr {
                        solid.push(cell(i), dims.y_bottom - cell(l), mass, rho0, 0);
                    }
                }
                for l in 0..depth {
                    for k in 0..jb + depth {
                        solid.push(cell(iwl - 1 - l), -cell(k), mass, rho0, 1);
                        solid.push(cell(iwr + l), -cell(k), mass, rho0, 2);
                    }
                }
                for l in 0..depth {
                    for i in 0..iwl - depth {
                        solid.push(cell(i), -cell(l), mass, rho0, 3);
                    }
                    for i in iwr + depth..columns {
                        solid.push(cell(i), -cell(l), mass, rho0, 4);
                    }
                }
            }
        }

        self.check_tiling(&solid, dx, width)?;
        Ok(solid)
    }

    /// Verify that no two boundary particles overlap and that every wall
    /// stretch has a particle directly behind it.
    fn check_tiling(&self, solid: &SolidParticles, dx: f64, width: f64) -> Result<(), GeometryError> {
        if solid.is_empty() {
            return Ok(());
        }
        let mut grid = NeighborGrid::covering(dx, &[(&solid.x, &solid.y)], dx);
        grid.update(&solid.x, &solid.y);

        let min_sep = 0.5 * dx;
        for i in 0..solid.len() {
            let mut clash = false;
            grid.for_each_neighbor(i, &solid.x, &solid.y, min_sep, |_| clash = true);
            if clash {
                return Err(GeometryError::Overlap {
                    x: solid.x[i],
                    y: solid.y[i],
                });
            }
        }

        let reach = 0.75 * dx;
        for segment in self.segments() {
            for [px, py] in surface_samples(segment, dx, width) {
                let n = segment.wall_normal();
                let bx = px - 0.5 * dx * n[0];
                let by = py - 0.5 * dx * n[1];
                let mut covered = false;
                grid.for_each_near_point(bx, by, &solid.x, &solid.y, reach, |_| covered = true);
                if !covered {
                    return Err(GeometryError::Gap {
                        segment: segment.name(),
                        x: px,
                        y: py,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Integer lattice index of `value` on spacing `dx`, if it is aligned.
fn lattice_index(value: f64, dx: f64) -> Option<i64> {
    let k = value / dx;
    ((k - k.round()).abs() < ALIGNMENT_TOLERANCE).then(|| k.round() as i64)
}

/// Points on the wall surface, one per lattice cell along the segment span.
fn surface_samples(segment: &WallSegment, dx: f64, width: f64) -> Vec<[f64; 2]> {
    let along = |from: f64, to: f64| {
        let n = ((to - from) / dx).round().max(0.0) as usize;
        (0..n).map(move |k| from + (k as f64 + 0.5) * dx)
    };
    match segment.kind {
        SegmentKind::FlatSubstrate { y, .. } => along(0.0, width).map(|x| [x, y]).collect(),
        SegmentKind::Bottom { x_left, x_right, y } => {
            along(x_left, x_right).map(|x| [x, y]).collect()
        }
        SegmentKind::LeftWall { x, y_bottom, y_top }
        | SegmentKind::RightWall { x, y_bottom, y_top } => {
            along(y_bottom, y_top).map(|y| [x, y]).collect()
        }
        SegmentKind::LeftLedge { x_end, y } => along(0.0, x_end).map(|x| [x, y]).collect(),
        SegmentKind::RightLedge { x_start, y } => along(x_start, width).map(|x| [x, y]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DX: f64 = 1.0e-5;
    const WIDTH: f64 = 1.6e-3;

    fn default_cavity() -> WallGeometry {
        WallGeometry::cavity(CavityDims::default(), CavityAngles::default())
    }

    #[test]
    fn segment_distances_respect_spans() {
        let geom = default_cavity();
        let s = geom.segments();
        // Inside the cavity, halfway down
        assert!((s[0].distance(0.8e-3, -0.1e-3).unwrap() - 0.03e-3).abs() < 1.0e-12);
        assert!((s[1].distance(0.45e-3, -0.05e-3).unwrap() - 0.05e-3).abs() < 1.0e-12);
        assert!((s[2].distance(1.1e-3, -0.05e-3).unwrap() - 0.1e-3).abs() < 1.0e-12);
        // Above the ledges the walls do not apply
        assert!(s[1].distance(0.45e-3, 0.01e-3).is_none());
        // Ledges only cover outside the cavity
        assert!(s[3].distance(0.8e-3, 0.01e-3).is_none());
        assert!(s[4].distance(1.3e-3, 0.01e-3).is_some());
    }

    #[test]
    fn nearest_picks_closest_covering_segment() {
        let geom = default_cavity();
        let (d, seg) = geom.nearest(0.41e-3, -0.10e-3).unwrap();
        assert_eq!(seg.name(), "left wall");
        assert!((d - 0.01e-3).abs() < 1.0e-12);
        // Above the opening only the floor span covers the point
        let (d, seg) = geom.nearest(0.8e-3, 0.1e-3).unwrap();
        assert_eq!(seg.name(), "cavity bottom");
        assert!((d - 0.23e-3).abs() < 1.0e-12);
    }

    #[test]
    fn adhesion_directions_follow_segment_rules() {
        let geom = default_cavity();
        let s = geom.segments();
        assert_eq!(s[0].adhesion_direction(0.9e-3, -0.12e-3), [1.0, 0.0]);
        assert_eq!(s[0].adhesion_direction(0.7e-3, -0.12e-3), [-1.0, 0.0]);
        assert_eq!(s[0].adhesion_direction(0.8e-3, -0.12e-3), [0.0, 0.0]);
        assert_eq!(s[1].adhesion_direction(0.41e-3, -0.02e-3), [0.0, 1.0]);
        assert_eq!(s[2].adhesion_direction(1.19e-3, -0.1e-3), [0.0, -1.0]);
        assert_eq!(s[3].adhesion_direction(0.2e-3, 0.01e-3), [-1.0, 0.0]);
        assert_eq!(s[4].adhesion_direction(1.4e-3, 0.01e-3), [1.0, 0.0]);

        let flat = WallGeometry::flat(45.0, 0.8e-3);
        assert_eq!(flat.segments()[0].adhesion_direction(0.7e-3, 0.0), [-1.0, 0.0]);
        assert_eq!(flat.lowest_y(), 0.0);
    }

    #[test]
    fn wall_normals_point_into_fluid() {
        let geom = default_cavity();
        let s = geom.segments();
        assert_eq!(s[0].wall_normal(), [0.0, 1.0]);
        assert_eq!(s[1].wall_normal(), [1.0, 0.0]);
        assert_eq!(s[2].wall_normal(), [-1.0, 0.0]);
        assert_eq!(s[3].wall_normal(), [0.0, 1.0]);
    }

    #[test]
    fn flat_substrate_tiles_full_width() {
        let geom = WallGeometry::flat(45.0, 0.8e-3);
        let solid = geom.build_solid(DX, 3, WIDTH, 3000.0).unwrap();
        assert_eq!(solid.len(), 3 * 160);
        let ymax = solid.y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((ymax + 0.5 * DX).abs() < 1.0e-15);
        assert!((solid.mass[0] - 3000.0 * DX * DX).abs() < 1.0e-18);
    }

    #[test]
    fn cavity_tiling_has_no_overlaps_or_gaps() {
        let geom = default_cavity();
        let solid = geom.build_solid(DX, 3, WIDTH, 3000.0).unwrap();
        // Floor 80 wide, two wall blocks 3 x (13 + 3), ledges (40 - 3) and (40 - 3)
        let expected = 3 * 80 + 2 * 3 * 16 + 3 * 37 * 2;
        assert_eq!(solid.len(), expected);
        assert!(solid.y.iter().all(|&y| y < 0.0));
        assert_eq!(solid.segment.iter().filter(|&&s| s == 1).count(), 48);
        let lowest = solid.y.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((lowest - (geom.lowest_y() - 2.5 * DX)).abs() < 1.0e-12);
    }

    #[test]
    fn misaligned_cavity_is_rejected() {
        let dims = CavityDims {
            x_wall_left: 0.4e-3 + 0.3 * DX,
            ..CavityDims::default()
        };
        let geom = WallGeometry::cavity(dims, CavityAngles::default());
        let err = geom.validate(DX, WIDTH, 3).unwrap_err();
        assert!(matches!(err, GeometryError::Misaligned { segment: "left wall", .. }));
    }

    #[test]
    fn walls_outside_domain_are_rejected() {
        let dims = CavityDims {
            x_wall_right: 1.59e-3,
            ..CavityDims::default()
        };
        let geom = WallGeometry::cavity(dims, CavityAngles::default());
        assert!(matches!(
            geom.validate(DX, WIDTH, 3),
            Err(GeometryError::OutsideDomain { segment: "right wall", .. })
        ));

        let inverted = WallGeometry::cavity(
            CavityDims {
                x_wall_left: 1.2e-3,
                x_wall_right: 0.4e-3,
                y_bottom: -0.13e-3,
            },
            CavityAngles::default(),
        );
        assert!(matches!(
            inverted.validate(DX, WIDTH, 3),
            Err(GeometryError::InvertedWalls { .. })
        ));
    }

    #[test]
    fn cos_theta_sign_matches_wettability() {
        let geom = default_cavity();
        let s = geom.segments();
        assert!(s[0].cos_theta() > 0.8);
        assert!(s[2].cos_theta().abs() < 1.0e-12);
    }
}

//! Spatial vectors, tag-value parsing, and gantry tilt classification.
//!
//! Positions and orientations arrive as backslash-separated numeric strings
//! (three components for a position, six for the right/up orientation
//! basis). All geometric reasoning in the block sorter goes through the
//! types in this module.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Shifts smaller than this (in millimeters) are treated as zero when
/// classifying shear, so encoding noise does not register as tilt.
pub const SHEAR_PRECISION_MM: f64 = 0.001;

/// A 3D vector in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// x component
    pub x: f64,
    /// y component
    pub y: f64,
    /// z component
    pub z: f64,
}

impl Vec3 {
    /// Creates a vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[must_use]
    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns this vector scaled to unit length, or `None` for a
    /// zero-length vector.
    #[must_use]
    pub fn normalized(&self) -> Option<Vec3> {
        let n = self.norm();
        if n == 0.0 { None } else { Some(*self * (1.0 / n)) }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Parses a backslash-separated triple (e.g. `"12.5\\-30.2\\4"`) into a
/// position vector. Returns `None` for anything but exactly three numeric
/// components.
#[must_use]
pub fn parse_vec3(raw: &str) -> Option<Vec3> {
    let mut components = raw.split('\\').map(|c| c.trim().parse::<f64>());
    let x = components.next()?.ok()?;
    let y = components.next()?.ok()?;
    let z = components.next()?.ok()?;
    if components.next().is_some() {
        return None;
    }
    Some(Vec3::new(x, y, z))
}

/// Parses a six-component orientation value into the (right, up) basis
/// pair. Returns `None` unless exactly six numeric components are present.
#[must_use]
pub fn parse_orientation(raw: &str) -> Option<(Vec3, Vec3)> {
    let components: Vec<f64> =
        raw.split('\\').map(|c| c.trim().parse::<f64>().ok()).collect::<Option<Vec<_>>>()?;
    if components.len() != 6 {
        return None;
    }
    let right = Vec3::new(components[0], components[1], components[2]);
    let up = Vec3::new(components[3], components[4], components[5]);
    Some((right, up))
}

/// Geometric summary of the shear between slice orientation and the
/// inter-slice displacement.
///
/// Computed from exactly two origins and the orientation basis of the first
/// slice, with the number of inter-slice steps between the two origins. The
/// displacement is decomposed along the (normalized) right, up, and normal
/// directions; per-step shifts along right or up mean the stack is sheared.
/// A shear confined to the up direction with a single consistent angle is a
/// regular gantry tilt and can still be reconstructed; anything else is
/// arbitrary skew.
///
/// For a completed block the summary is recomputed from the first and last
/// members, which averages encoding jitter over the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GantryTiltInfo {
    shift_right: f64,
    shift_up: f64,
    shift_normal: f64,
    number_of_steps: usize,
}

impl GantryTiltInfo {
    /// Decomposes the displacement from `origin1` to `origin2` along the
    /// orientation basis, normalized per inter-slice step.
    ///
    /// `steps` is the number of inter-slice steps between the two origins
    /// (1 for adjacent slices); values below 1 are treated as 1. Returns
    /// `None` when the orientation basis is degenerate (zero-length right
    /// or up vector).
    #[must_use]
    pub fn from_geometry(
        right: Vec3,
        up: Vec3,
        origin1: Vec3,
        origin2: Vec3,
        steps: usize,
    ) -> Option<Self> {
        let right = right.normalized()?;
        let up = up.normalized()?;
        let normal = right.cross(&up).normalized()?;
        let steps = steps.max(1);
        let per_step = (origin2 - origin1) * (1.0 / steps as f64);
        Some(Self {
            shift_right: per_step.dot(&right),
            shift_up: per_step.dot(&up),
            shift_normal: per_step.dot(&normal),
            number_of_steps: steps,
        })
    }

    /// Whether the displacement has any in-plane component beyond the
    /// precision threshold.
    #[must_use]
    pub fn is_sheared(&self) -> bool {
        self.shift_right.abs() > SHEAR_PRECISION_MM || self.shift_up.abs() > SHEAR_PRECISION_MM
    }

    /// Whether the shear is a regular gantry tilt: confined to the up
    /// direction, with real progress along the normal. Only such stacks
    /// can be reconstructed by shearing them back.
    #[must_use]
    pub fn is_regular_gantry_tilt(&self) -> bool {
        self.shift_right.abs() <= SHEAR_PRECISION_MM
            && self.shift_up.abs() > SHEAR_PRECISION_MM
            && self.shift_normal.abs() > SHEAR_PRECISION_MM
    }

    /// The tilt angle in degrees, derived from the up/normal shift ratio.
    #[must_use]
    pub fn tilt_angle_degrees(&self) -> f64 {
        (self.shift_up.abs() / self.shift_normal.abs()).atan().to_degrees()
    }

    /// Per-step shift along the in-plane right direction.
    #[must_use]
    pub fn shift_right(&self) -> f64 {
        self.shift_right
    }

    /// Per-step shift along the in-plane up direction.
    #[must_use]
    pub fn shift_up(&self) -> f64 {
        self.shift_up
    }

    /// Per-step shift along the slice normal (the effective slice spacing
    /// a reconstruction should assume).
    #[must_use]
    pub fn shift_normal(&self) -> f64 {
        self.shift_normal
    }

    /// Number of inter-slice steps the summary was computed over.
    #[must_use]
    pub fn number_of_steps(&self) -> usize {
        self.number_of_steps
    }
}

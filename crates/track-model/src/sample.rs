//! Sample values stored in track channels.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A 2D point or vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Angle from the positive x axis, in `(-π, π]`.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Values that can be blended linearly between two keyframes.
pub trait Lerp: Clone {
    /// Blend `self` toward `other`; `t = 0` gives `self`, `t = 1` gives `other`.
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t
    }
}

/// Quantities that finite differences can be taken of.
///
/// Implemented for anything with vector-space arithmetic; each component is
/// differentiated independently.
pub trait Kinematic:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
    /// Per-axis components, used for sign checks.
    fn components(&self) -> Vec<f64>;
}

impl Kinematic for f64 {
    fn components(&self) -> Vec<f64> {
        vec![*self]
    }
}

impl Kinematic for Vec2 {
    fn components(&self) -> Vec<f64> {
        vec![self.x, self.y]
    }
}

/// A value held by one frame of a track channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sample {
    /// Position of a point.
    Point { position: Vec2 },

    /// Vector components (velocity, acceleration, force...).
    Vector { components: Vec2 },

    /// Calibration pair: two image points with known world separation.
    Pair { first: Vec2, second: Vec2 },

    /// Tape measure reading.
    Length { end1: Vec2, end2: Vec2, world_length: f64 },

    /// Protractor reading.
    Angle { vertex: Vec2, arm1: Vec2, arm2: Vec2 },

    /// Circle fitted through marked points.
    Circle { center: Vec2, radius: f64 },

    /// Reference frame: origin, rotation (radians) and scale.
    Coords { origin: Vec2, angle: f64, scale: Vec2 },
}

impl Sample {
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point {
            position: Vec2::new(x, y),
        }
    }

    pub fn vector(x: f64, y: f64) -> Self {
        Self::Vector {
            components: Vec2::new(x, y),
        }
    }

    /// Position for point samples.
    pub fn as_point(&self) -> Option<Vec2> {
        match self {
            Self::Point { position } => Some(*position),
            _ => None,
        }
    }

    /// Components for vector samples.
    pub fn as_vector(&self) -> Option<Vec2> {
        match self {
            Self::Vector { components } => Some(*components),
            _ => None,
        }
    }

    /// Opening angle of a protractor sample, in radians.
    pub fn protractor_angle(&self) -> Option<f64> {
        match self {
            Self::Angle { vertex, arm1, arm2 } => {
                let a = (*arm1 - *vertex).angle();
                let b = (*arm2 - *vertex).angle();
                Some(wrap_angle(b - a))
            }
            _ => None,
        }
    }
}

impl Lerp for Sample {
    /// Variants blend field by field. Mismatched variants cannot be blended
    /// and hold the starting value.
    fn lerp(&self, other: &Self, t: f64) -> Self {
        match (self, other) {
            (Self::Point { position: a }, Self::Point { position: b }) => Self::Point {
                position: a.lerp(b, t),
            },
            (Self::Vector { components: a }, Self::Vector { components: b }) => Self::Vector {
                components: a.lerp(b, t),
            },
            (
                Self::Pair {
                    first: a1,
                    second: a2,
                },
                Self::Pair {
                    first: b1,
                    second: b2,
                },
            ) => Self::Pair {
                first: a1.lerp(b1, t),
                second: a2.lerp(b2, t),
            },
            (
                Self::Length {
                    end1: a1,
                    end2: a2,
                    world_length: al,
                },
                Self::Length {
                    end1: b1,
                    end2: b2,
                    world_length: bl,
                },
            ) => Self::Length {
                end1: a1.lerp(b1, t),
                end2: a2.lerp(b2, t),
                world_length: al.lerp(bl, t),
            },
            (
                Self::Angle {
                    vertex: av,
                    arm1: a1,
                    arm2: a2,
                },
                Self::Angle {
                    vertex: bv,
                    arm1: b1,
                    arm2: b2,
                },
            ) => Self::Angle {
                vertex: av.lerp(bv, t),
                arm1: a1.lerp(b1, t),
                arm2: a2.lerp(b2, t),
            },
            (
                Self::Circle {
                    center: ac,
                    radius: ar,
                },
                Self::Circle {
                    center: bc,
                    radius: br,
                },
            ) => Self::Circle {
                center: ac.lerp(bc, t),
                radius: ar.lerp(br, t),
            },
            (
                Self::Coords {
                    origin: ao,
                    angle: aa,
                    scale: a_scale,
                },
                Self::Coords {
                    origin: bo,
                    angle: ba,
                    scale: bs,
                },
            ) => Self::Coords {
                origin: ao.lerp(bo, t),
                angle: aa + wrap_angle(ba - aa) * t,
                scale: a_scale.lerp(bs, t),
            },
            _ => self.clone(),
        }
    }
}

/// Wrap an angle difference into `(-π, π]`.
pub fn wrap_angle(mut delta: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    while delta <= -PI {
        delta += TAU;
    }
    while delta > PI {
        delta -= TAU;
    }
    delta
}

//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.
//!
//! The world is a 3D space with a flat ground plane: X and Z are the
//! planar axes, Y is height. Physics only ever works on the plane, so
//! [`Vec2Fixed`] is used for planar quantities (its `y` field maps to
//! world Z) and [`Vec3Fixed`] for authoritative world positions.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point planar vector (world X, world Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Planar second axis (world Z).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Fixed-point world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3Fixed {
    /// X coordinate (ground plane).
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Height above the ground plane. Never changed by physics.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Z coordinate (ground plane).
    #[serde(with = "fixed_serde")]
    pub z: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-edited configuration values.
///
/// Config files carry decimals (`speed: 4.5`). The decimal is parsed once
/// and converted to [`Fixed`] on load; the conversion is exact for every
/// value representable in the config, so all clients that load the same
/// file get the same bits.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Build a vector from integer components (test and setup helper).
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Squared length of the vector.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.x.saturating_mul(self.x).saturating_add(self.y.saturating_mul(self.y))
    }

    /// Length of the vector.
    ///
    /// Large vectors are halved until their squared length fits, then
    /// scaled back, so the result stays accurate across the whole range.
    #[must_use]
    pub fn length(self) -> Fixed {
        let (reduced, shift) = self.reduced();
        fixed_sqrt(reduced.length_squared()).saturating_mul_int(1_i64 << shift)
    }

    /// Halve both components until each magnitude is at most
    /// [`SQUARE_SAFE`]. Returns the reduced vector and the shift applied.
    fn reduced(self) -> (Self, u32) {
        let mut v = self;
        let mut shift = 0;
        while v.x.saturating_abs() > SQUARE_SAFE || v.y.saturating_abs() > SQUARE_SAFE {
            v = Self::new(v.x >> 1u32, v.y >> 1u32);
            shift += 1;
        }
        (v, shift)
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Whether both components are exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        // Direction is scale-invariant, so work on the reduced vector.
        let (v, _) = self.reduced();
        let len_sq = v.length_squared();

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(v.x / len, v.y / len)
    }

    /// Limit the vector's length to `max`, keeping its direction.
    #[must_use]
    pub fn clamp_length(self, max: Fixed) -> Self {
        if self.length_squared() > max * max {
            self.normalize().scale(max)
        } else {
            self
        }
    }
}

impl Vec3Fixed {
    /// Create a new world position.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// The world origin.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Build a position from integer components (test and setup helper).
    #[must_use]
    pub fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y), Fixed::from_num(z))
    }

    /// Projection onto the ground plane.
    #[must_use]
    pub const fn planar(self) -> Vec2Fixed {
        Vec2Fixed::new(self.x, self.z)
    }

    /// Replace the planar coordinates, keeping the height.
    #[must_use]
    pub const fn with_planar(self, planar: Vec2Fixed) -> Self {
        Self::new(planar.x, self.y, planar.y)
    }

    /// Squared distance on the ground plane, ignoring height.
    #[must_use]
    pub fn planar_distance_squared(self, other: Self) -> Fixed {
        self.planar().distance_squared(other.planar())
    }
}

/// Largest component magnitude whose square sums stay inside [`Fixed`].
const SQUARE_SAFE: Fixed = Fixed::const_from_int(1 << 14);

/// Computes the square root of a fixed-point number using binary search.
///
/// Uses a fixed iteration count so the result is bit-identical on every
/// platform.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = low + (high - low) / Fixed::from_num(2);
        match mid.checked_mul(mid) {
            Some(mid_sq) if mid_sq <= value => low = mid,
            _ => high = mid,
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Add for Vec3Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

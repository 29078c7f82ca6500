//! # JIS Standard Area Mesh Codec
//!
//! Converts latitude/longitude into the hierarchical area mesh codes used by
//! the PLATEAU data catalog (JIS X 0410), and decodes a code back into the
//! bounding rectangle of its cell.
//!
//! ## Levels
//!
//! | Level | Name | Digits | Cell (lat × lon) | Approx. size |
//! |-------|------|--------|------------------|--------------|
//! | 1 | Primary   | 4  | 40′ × 1°        | 80 km |
//! | 2 | Secondary | +2 | 5′ × 7.5′       | 10 km |
//! | 3 | Tertiary  | +2 | 30″ × 45″       | 1 km  |
//! | 4 | Half      | +1 | 15″ × 22.5″     | 500 m |
//! | 5 | Quarter   | +1 | 7.5″ × 11.25″   | 250 m |
//!
//! Half and quarter meshes number their 2×2 sub-cells 1 (south-west),
//! 2 (south-east), 3 (north-west), 4 (north-east).
//!
//! ## Arithmetic
//!
//! Coordinates are converted once into integer units of 1/8 arc-second
//! (28 800 units per degree). Every cell edge at every level is an integer
//! number of units, so all subdivisions are exact integer divisions that
//! floor toward the south-west corner. A point exactly on an edge belongs to
//! the cell north/east of that edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Grid units per degree (1/8 arc-second).
const UNITS_PER_DEGREE: i64 = 28_800;

/// Longitude origin of the primary mesh grid.
const LON_ORIGIN: f64 = 100.0;

/// Primary mesh rows are two digits: latitude must stay below 100 × 40′.
const LAT_LIMIT_UNITS: i64 = 100 * 19_200;

/// Primary mesh columns cover 100°E up to (but excluding) 180°E.
const LON_LIMIT_UNITS: i64 = 80 * UNITS_PER_DEGREE;

/// Absorbs floating-point error when a decimal input sits on a cell edge
/// (e.g. `35.1 * 28800` evaluating to `1010879.9999999`). Far below the
/// resolution of any mesh level.
const EDGE_EPSILON_UNITS: f64 = 1e-6;

/// Cell height/width in grid units for levels 1..=5.
const CELL_UNITS: [(i64, i64); 5] = [
    (19_200, 28_800),
    (2_400, 3_600),
    (240, 360),
    (120, 180),
    (60, 90),
];

/// Hierarchy level of an area mesh code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MeshLevel {
    /// 1次メッシュ, roughly 80 km square.
    Primary = 1,
    /// 2次メッシュ, roughly 10 km square.
    Secondary = 2,
    /// 3次メッシュ (standard mesh), roughly 1 km square.
    Tertiary = 3,
    /// 4次メッシュ (half mesh), roughly 500 m square.
    Half = 4,
    /// 5次メッシュ (quarter mesh), roughly 250 m square.
    Quarter = 5,
}

impl MeshLevel {
    /// All levels from coarsest to finest.
    pub const ALL: [MeshLevel; 5] = [
        Self::Primary,
        Self::Secondary,
        Self::Tertiary,
        Self::Half,
        Self::Quarter,
    ];

    /// Numeric level, 1 through 5.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Total number of digits in a code at this level.
    pub fn code_len(self) -> usize {
        match self {
            Self::Primary => 4,
            Self::Secondary => 6,
            Self::Tertiary => 8,
            Self::Half => 9,
            Self::Quarter => 10,
        }
    }

    /// Level implied by a code length, if any.
    pub fn from_code_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code_len() == len)
    }

    /// The next coarser level, `None` for the primary mesh.
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Primary => None,
            Self::Secondary => Some(Self::Primary),
            Self::Tertiary => Some(Self::Secondary),
            Self::Half => Some(Self::Tertiary),
            Self::Quarter => Some(Self::Half),
        }
    }

    fn cell_units(self) -> (i64, i64) {
        CELL_UNITS[usize::from(self.as_u8() - 1)]
    }
}

impl TryFrom<u8> for MeshLevel {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Primary),
            2 => Ok(Self::Secondary),
            3 => Ok(Self::Tertiary),
            4 => Ok(Self::Half),
            5 => Ok(Self::Quarter),
            other => Err(ValidationError::InvalidMeshLevel(other)),
        }
    }
}

impl From<MeshLevel> for u8 {
    fn from(level: MeshLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for MeshLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A validated JIS area mesh code (4, 6, 8, 9 or 10 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeshCode(String);

impl MeshCode {
    /// Encode a coordinate into the mesh code of the cell containing it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LatitudeOutOfRange`] or
    /// [`ValidationError::LongitudeOutOfRange`] when the coordinate is not
    /// finite or lies outside lat [0, 66.666…), lon [100, 180).
    pub fn from_lat_lon(lat: f64, lon: f64, level: MeshLevel) -> Result<Self, ValidationError> {
        let (lat_units, lon_units) = coordinate_units(lat, lon)?;

        let (row_h, col_w) = MeshLevel::Primary.cell_units();
        let mut code = String::with_capacity(level.code_len());
        code.push_str(&format!("{:02}{:02}", lat_units / row_h, lon_units / col_w));

        let mut lat_rem = lat_units % row_h;
        let mut lon_rem = lon_units % col_w;

        for current in MeshLevel::ALL.into_iter().skip(1) {
            if current > level {
                break;
            }
            let (h, w) = current.cell_units();
            let row = lat_rem / h;
            let col = lon_rem / w;
            lat_rem %= h;
            lon_rem %= w;

            match current {
                MeshLevel::Secondary | MeshLevel::Tertiary => {
                    push_digit(&mut code, row);
                    push_digit(&mut code, col);
                }
                _ => push_digit(&mut code, 2 * row + col + 1),
            }
        }

        Ok(Self(code))
    }

    /// Parse and validate a mesh code string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMeshCode`] on a bad length, a
    /// non-digit character, a primary column at or beyond 80 (180°E), a
    /// secondary index above 7, or a half/quarter digit outside 1–4.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let invalid = |reason: &str| ValidationError::InvalidMeshCode {
            code: s.clone(),
            reason: reason.to_string(),
        };

        let level = MeshLevel::from_code_len(s.len())
            .ok_or_else(|| invalid("length must be 4, 6, 8, 9 or 10 digits"))?;
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("non-digit character"));
        }

        let digits = s.as_bytes();
        if (digits[2] - b'0') >= 8 {
            return Err(invalid("primary column must be below 80 (180°E)"));
        }
        if level >= MeshLevel::Secondary && (digits[4] > b'7' || digits[5] > b'7') {
            return Err(invalid("secondary mesh digits must be 0-7"));
        }
        for idx in [8, 9] {
            if idx < digits.len() && !(b'1'..=b'4').contains(&digits[idx]) {
                return Err(invalid("half/quarter mesh digit must be 1-4"));
            }
        }

        Ok(Self(s))
    }

    /// Level of this code, implied by its length.
    pub fn level(&self) -> MeshLevel {
        // Length was validated at construction.
        MeshLevel::from_code_len(self.0.len()).unwrap_or(MeshLevel::Primary)
    }

    /// The enclosing cell one level up, `None` for a primary mesh.
    pub fn parent(&self) -> Option<MeshCode> {
        self.truncate(self.level().parent()?)
    }

    /// The enclosing cell at a coarser (or equal) level.
    pub fn truncate(&self, level: MeshLevel) -> Option<MeshCode> {
        if level > self.level() {
            return None;
        }
        Some(Self(self.0[..level.code_len()].to_string()))
    }

    /// Whether `self` is a strictly coarser cell containing `other`.
    pub fn is_ancestor_of(&self, other: &MeshCode) -> bool {
        self.level() < other.level() && other.0.starts_with(&self.0)
    }

    /// Bounding rectangle of this cell.
    pub fn bounds(&self) -> MeshBounds {
        let d = |i: usize| i64::from(self.0.as_bytes()[i] - b'0');
        let level = self.level();

        let mut south = (d(0) * 10 + d(1)) * CELL_UNITS[0].0;
        let mut west = (d(2) * 10 + d(3)) * CELL_UNITS[0].1;
        if level >= MeshLevel::Secondary {
            south += d(4) * CELL_UNITS[1].0;
            west += d(5) * CELL_UNITS[1].1;
        }
        if level >= MeshLevel::Tertiary {
            south += d(6) * CELL_UNITS[2].0;
            west += d(7) * CELL_UNITS[2].1;
        }
        for (idx, (h, w)) in [(8, CELL_UNITS[3]), (9, CELL_UNITS[4])] {
            if idx < self.0.len() {
                let quadrant = d(idx) - 1;
                south += (quadrant / 2) * h;
                west += (quadrant % 2) * w;
            }
        }

        let (h, w) = level.cell_units();
        MeshBounds {
            south: units_to_degrees(south),
            west: LON_ORIGIN + units_to_degrees(west),
            north: units_to_degrees(south + h),
            east: LON_ORIGIN + units_to_degrees(west + w),
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeshCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MeshCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MeshCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MeshCode> for String {
    fn from(code: MeshCode) -> Self {
        code.0
    }
}

impl AsRef<str> for MeshCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Geographic rectangle covered by one mesh cell, in degrees.
///
/// South and west edges are inclusive, north and east edges exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    /// Southern edge (inclusive).
    pub south: f64,
    /// Western edge (inclusive).
    pub west: f64,
    /// Northern edge (exclusive).
    pub north: f64,
    /// Eastern edge (exclusive).
    pub east: f64,
}

impl MeshBounds {
    /// Whether the coordinate falls inside this cell, using the same
    /// edge-assignment rule as the encoder.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lat_u = to_units(lat);
        let lon_u = to_units(lon - LON_ORIGIN);
        lat_u >= to_units(self.south)
            && lat_u < to_units(self.north)
            && lon_u >= to_units(self.west - LON_ORIGIN)
            && lon_u < to_units(self.east - LON_ORIGIN)
    }

    /// Center point as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

/// Encode `(lat, lon)` at a numeric level.
///
/// # Errors
///
/// [`ValidationError::InvalidMeshLevel`] when `level` is outside 1..=5, or a
/// coverage error from [`MeshCode::from_lat_lon`].
pub fn encode(lat: f64, lon: f64, level: u8) -> Result<MeshCode, ValidationError> {
    MeshCode::from_lat_lon(lat, lon, MeshLevel::try_from(level)?)
}

/// Decode a mesh code string into its cell bounds.
///
/// # Errors
///
/// [`ValidationError::InvalidMeshCode`] when the string is not a valid code.
pub fn decode(code: &str) -> Result<MeshBounds, ValidationError> {
    Ok(MeshCode::parse(code)?.bounds())
}

fn coordinate_units(lat: f64, lon: f64) -> Result<(i64, i64), ValidationError> {
    if !lat.is_finite() || lat < 0.0 {
        return Err(ValidationError::LatitudeOutOfRange(lat));
    }
    if !lon.is_finite() || !(LON_ORIGIN..180.0).contains(&lon) {
        return Err(ValidationError::LongitudeOutOfRange(lon));
    }

    let lat_units = to_units(lat);
    let lon_units = to_units(lon - LON_ORIGIN);
    if lat_units >= LAT_LIMIT_UNITS {
        return Err(ValidationError::LatitudeOutOfRange(lat));
    }
    if lon_units >= LON_LIMIT_UNITS {
        return Err(ValidationError::LongitudeOutOfRange(lon));
    }
    Ok((lat_units, lon_units))
}

#[allow(clippy::cast_possible_truncation)]
fn to_units(degrees: f64) -> i64 {
    (degrees * UNITS_PER_DEGREE as f64 + EDGE_EPSILON_UNITS).floor() as i64
}

#[allow(clippy::cast_precision_loss)]
fn units_to_degrees(units: i64) -> f64 {
    units as f64 / UNITS_PER_DEGREE as f64
}

fn push_digit(code: &mut String, value: i64) {
    const DIGITS: &[u8; 10] = b"0123456789";
    code.push(char::from(DIGITS[value.rem_euclid(10) as usize]));
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tokyo Station, the canonical worked example for JIS X 0410.
    const TOKYO_LAT: f64 = 35.681236;
    const TOKYO_LON: f64 = 139.767125;

    #[test]
    fn tokyo_station_all_levels() {
        let expected = ["5339", "533946", "53394611", "533946113", "5339461132"];
        for (level, want) in (1..=5).zip(expected) {
            let code = encode(TOKYO_LAT, TOKYO_LON, level).unwrap();
            assert_eq!(code.as_str(), want, "level {level}");
            assert_eq!(code.level().as_u8(), level);
        }
    }

    #[test]
    fn secondary_extends_primary() {
        let primary = encode(35.1, 136.9, 1).unwrap();
        let secondary = encode(35.1, 136.9, 2).unwrap();
        assert_eq!(primary.as_str(), "5236");
        assert_eq!(secondary.as_str().len(), 6);
        assert_eq!(&secondary.as_str()[..4], primary.as_str());
        assert_eq!(secondary.as_str(), "523657");
    }

    #[test]
    fn boundary_point_belongs_to_north_east_cell() {
        // 36.0°N is the edge between primary rows 53 and 54.
        assert_eq!(encode(36.0, 139.5, 1).unwrap().as_str(), "5439");
        assert_eq!(encode(35.999_999, 139.5, 1).unwrap().as_str(), "5339");
        // 140.0°E is the edge between primary columns 39 and 40.
        assert_eq!(encode(35.5, 140.0, 1).unwrap().as_str(), "5340");
        assert_eq!(encode(35.5, 139.999_999, 1).unwrap().as_str(), "5339");
    }

    #[test]
    fn half_mesh_quadrant_numbering() {
        let bounds = MeshCode::parse("53394611").unwrap().bounds();
        let (h, w) = (bounds.north - bounds.south, bounds.east - bounds.west);
        let sw = encode(bounds.south + h * 0.25, bounds.west + w * 0.25, 4).unwrap();
        let se = encode(bounds.south + h * 0.25, bounds.west + w * 0.75, 4).unwrap();
        let nw = encode(bounds.south + h * 0.75, bounds.west + w * 0.25, 4).unwrap();
        let ne = encode(bounds.south + h * 0.75, bounds.west + w * 0.75, 4).unwrap();
        assert_eq!(sw.as_str(), "533946111");
        assert_eq!(se.as_str(), "533946112");
        assert_eq!(nw.as_str(), "533946113");
        assert_eq!(ne.as_str(), "533946114");
    }

    #[test]
    fn rejects_out_of_range_level() {
        assert_eq!(
            encode(TOKYO_LAT, TOKYO_LON, 0).unwrap_err(),
            ValidationError::InvalidMeshLevel(0)
        );
        assert_eq!(
            encode(TOKYO_LAT, TOKYO_LON, 6).unwrap_err(),
            ValidationError::InvalidMeshLevel(6)
        );
    }

    #[test]
    fn rejects_coordinates_outside_coverage() {
        assert!(matches!(
            encode(-0.1, 139.0, 1),
            Err(ValidationError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(66.7, 139.0, 1),
            Err(ValidationError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(35.0, 99.9, 1),
            Err(ValidationError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(35.0, 180.0, 1),
            Err(ValidationError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(f64::NAN, 139.0, 1),
            Err(ValidationError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn coverage_corners_encode() {
        assert_eq!(encode(0.0, 100.0, 1).unwrap().as_str(), "0000");
        assert_eq!(encode(66.66, 179.99, 1).unwrap().as_str(), "9979");
    }

    #[test]
    fn primary_bounds() {
        let b = decode("5339").unwrap();
        assert!((b.south - 35.0 - 1.0 / 3.0).abs() < 1e-12);
        assert!((b.north - 36.0).abs() < 1e-12);
        assert!((b.west - 139.0).abs() < 1e-12);
        assert!((b.east - 140.0).abs() < 1e-12);
    }

    #[test]
    fn tertiary_bounds_contain_encoded_point() {
        let code = encode(TOKYO_LAT, TOKYO_LON, 3).unwrap();
        let b = code.bounds();
        assert!(b.contains(TOKYO_LAT, TOKYO_LON));
        assert!((b.north - b.south - 30.0 / 3600.0).abs() < 1e-12);
        assert!((b.east - b.west - 45.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn center_encodes_back_to_same_cell() {
        for code in ["5339", "533946", "53394611", "533946113", "5339461132"] {
            let parsed = MeshCode::parse(code).unwrap();
            let (lat, lon) = parsed.bounds().center();
            assert_eq!(MeshCode::from_lat_lon(lat, lon, parsed.level()).unwrap(), parsed);
        }
    }

    #[test]
    fn parse_rejects_malformed_codes() {
        for bad in ["", "533", "53394", "5339461", "53394611325", "53a9", "538946", "5339461105", "5380"] {
            assert!(MeshCode::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parent_and_ancestry() {
        let quarter = MeshCode::parse("5339461132").unwrap();
        let half = quarter.parent().unwrap();
        assert_eq!(half.as_str(), "533946113");
        assert!(half.is_ancestor_of(&quarter));
        assert!(!quarter.is_ancestor_of(&half));
        assert!(!quarter.is_ancestor_of(&quarter));
        assert_eq!(
            quarter.truncate(MeshLevel::Secondary).unwrap().as_str(),
            "533946"
        );
        assert!(MeshCode::parse("5339").unwrap().parent().is_none());
    }

    #[test]
    fn serde_uses_plain_string() {
        let code = MeshCode::parse("53394611").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"53394611\"");
        let back: MeshCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
        assert!(serde_json::from_str::<MeshCode>("\"12\"").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn coverage() -> impl Strategy<Value = (f64, f64)> {
        (0.0f64..66.66, 100.0f64..179.999)
    }

    proptest! {
        /// Encoding is a pure function of its input.
        #[test]
        fn encode_deterministic((lat, lon) in coverage(), level in 1u8..=5) {
            let a = encode(lat, lon, level).unwrap();
            let b = encode(lat, lon, level).unwrap();
            prop_assert_eq!(a, b);
        }

        /// Coarser codes are textual prefixes of finer codes for the same point.
        #[test]
        fn encode_hierarchy((lat, lon) in coverage(), l1 in 1u8..=5, l2 in 1u8..=5) {
            prop_assume!(l1 < l2);
            let coarse = encode(lat, lon, l1).unwrap();
            let fine = encode(lat, lon, l2).unwrap();
            prop_assert!(coarse.is_ancestor_of(&fine), "{} !< {}", coarse, fine);
            prop_assert_eq!(fine.truncate(coarse.level()), Some(coarse));
        }

        /// The cell named by the code contains the encoded point.
        #[test]
        fn encoded_cell_contains_point((lat, lon) in coverage(), level in 1u8..=5) {
            let code = encode(lat, lon, level).unwrap();
            prop_assert!(code.bounds().contains(lat, lon));
        }

        /// Every encoded code parses back unchanged.
        #[test]
        fn encoded_code_parses((lat, lon) in coverage(), level in 1u8..=5) {
            let code = encode(lat, lon, level).unwrap();
            prop_assert_eq!(MeshCode::parse(code.as_str()).unwrap(), code);
        }
    }
}

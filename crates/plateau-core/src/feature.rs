//! # CityGML Feature Types
//!
//! The PLATEAU data catalog groups CityGML files by a short feature-type
//! prefix (`bldg`, `tran`, …). The same prefixes appear in file names inside
//! packaged archives and in the catalog response's `files` map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A PLATEAU CityGML feature type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    /// 建築物: buildings.
    Bldg,
    /// 道路: roads.
    Tran,
    /// 橋梁: bridges.
    Brid,
    /// 都市計画決定情報: urban planning decisions.
    Urf,
    /// 土地利用: land use.
    Luse,
    /// 洪水浸水想定区域: river flood inundation zones.
    Fld,
    /// 津波浸水想定: tsunami inundation zones.
    Tnm,
    /// 土砂災害警戒区域: landslide warning zones.
    Lsld,
    /// 高潮浸水想定区域: storm surge inundation zones.
    Htd,
    /// 内水浸水想定区域: inland flooding zones.
    Ifld,
    /// 都市設備: city furniture.
    Frn,
    /// 植生: vegetation.
    Veg,
    /// 地形（起伏）: terrain relief.
    Dem,
}

impl FeatureType {
    /// Every feature type, in catalog order.
    pub const ALL: [FeatureType; 13] = [
        Self::Bldg,
        Self::Tran,
        Self::Brid,
        Self::Urf,
        Self::Luse,
        Self::Fld,
        Self::Tnm,
        Self::Lsld,
        Self::Htd,
        Self::Ifld,
        Self::Frn,
        Self::Veg,
        Self::Dem,
    ];

    /// Catalog key, e.g. `"bldg"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Bldg => "bldg",
            Self::Tran => "tran",
            Self::Brid => "brid",
            Self::Urf => "urf",
            Self::Luse => "luse",
            Self::Fld => "fld",
            Self::Tnm => "tnm",
            Self::Lsld => "lsld",
            Self::Htd => "htd",
            Self::Ifld => "ifld",
            Self::Frn => "frn",
            Self::Veg => "veg",
            Self::Dem => "dem",
        }
    }

    /// Human-readable description (Japanese name / English gloss).
    pub fn description(self) -> &'static str {
        match self {
            Self::Bldg => "建築物 / buildings",
            Self::Tran => "道路 / roads",
            Self::Brid => "橋梁 / bridges",
            Self::Urf => "都市計画決定情報 / urban planning",
            Self::Luse => "土地利用 / land use",
            Self::Fld => "洪水浸水想定区域 / river flooding",
            Self::Tnm => "津波浸水想定 / tsunami",
            Self::Lsld => "土砂災害警戒区域 / landslide",
            Self::Htd => "高潮浸水想定区域 / storm surge",
            Self::Ifld => "内水浸水想定区域 / inland flooding",
            Self::Frn => "都市設備 / city furniture",
            Self::Veg => "植生 / vegetation",
            Self::Dem => "地形 / terrain",
        }
    }

    /// Join feature types into a stable label: sorted, de-duplicated,
    /// dash-separated (`"bldg-brid"`).
    pub fn join_label(types: &[FeatureType]) -> String {
        let mut sorted = types.to_vec();
        sorted.sort_by_key(|t| t.code());
        sorted.dedup();
        sorted
            .iter()
            .map(|t| t.code())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FeatureType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.code() == wanted)
            .ok_or_else(|| ValidationError::UnknownFeatureType(s.to_string()))
    }
}

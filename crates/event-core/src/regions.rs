//! Region resolution from hashtags.
//!
//! The [`RegionTable`] is an ordered list: resolution returns the first
//! region whose hashtags intersect the message's hashtags. A region that
//! contains other regions must therefore come after all of them, otherwise
//! `#norditalia #italia` would resolve to Italy instead of North Italy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical regions, declared in default table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionId {
    NorthItaly,
    CentralItaly,
    SouthItaly,
    Sardinia,
    Sicily,
    Italy,
    France,
    Spain,
    Switzerland,
    Austria,
    Slovenia,
    Croatia,
    Germany,
    CzechRepublic,
    UnitedKingdom,
    Europe,
}

impl RegionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NorthItaly => "north_italy",
            Self::CentralItaly => "central_italy",
            Self::SouthItaly => "south_italy",
            Self::Sardinia => "sardinia",
            Self::Sicily => "sicily",
            Self::Italy => "italy",
            Self::France => "france",
            Self::Spain => "spain",
            Self::Switzerland => "switzerland",
            Self::Austria => "austria",
            Self::Slovenia => "slovenia",
            Self::Croatia => "croatia",
            Self::Germany => "germany",
            Self::CzechRepublic => "czech_republic",
            Self::UnitedKingdom => "united_kingdom",
            Self::Europe => "europe",
        }
    }

    /// Display name used in group headers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NorthItaly => "North Italy",
            Self::CentralItaly => "Central Italy",
            Self::SouthItaly => "South Italy",
            Self::Sardinia => "Sardinia",
            Self::Sicily => "Sicily",
            Self::Italy => "Italy",
            Self::France => "France",
            Self::Spain => "Spain",
            Self::Switzerland => "Switzerland",
            Self::Austria => "Austria",
            Self::Slovenia => "Slovenia",
            Self::Croatia => "Croatia",
            Self::Germany => "Germany",
            Self::CzechRepublic => "Czech Republic",
            Self::UnitedKingdom => "United Kingdom",
            Self::Europe => "Europe",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::NorthItaly | Self::CentralItaly | Self::SouthItaly | Self::Italy => "🇮🇹",
            Self::Sardinia => "🏝",
            Self::Sicily => "🌋",
            Self::France => "🇫🇷",
            Self::Spain => "🇪🇸",
            Self::Switzerland => "🇨🇭",
            Self::Austria => "🇦🇹",
            Self::Slovenia => "🇸🇮",
            Self::Croatia => "🇭🇷",
            Self::Germany => "🇩🇪",
            Self::CzechRepublic => "🇨🇿",
            Self::UnitedKingdom => "🇬🇧",
            Self::Europe => "🇪🇺",
        }
    }

    /// The region directly containing this one.
    pub fn parent(&self) -> Option<RegionId> {
        match self {
            Self::NorthItaly
            | Self::CentralItaly
            | Self::SouthItaly
            | Self::Sardinia
            | Self::Sicily => Some(Self::Italy),
            Self::Europe => None,
            _ => Some(Self::Europe),
        }
    }

    /// Whether `other` contains this region, directly or transitively.
    pub fn is_within(&self, other: RegionId) -> bool {
        let mut current = self.parent();
        while let Some(region) = current {
            if region == other {
                return true;
            }
            current = region.parent();
        }
        false
    }

    /// Italy itself or one of its sub-regions.
    pub fn is_italian(&self) -> bool {
        *self == Self::Italy || self.is_within(Self::Italy)
    }
}

/// Table ordering violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionTableError {
    #[error("region {container:?} is listed before its sub-region {sub_region:?}")]
    ContainerBeforeSubRegion {
        container: RegionId,
        sub_region: RegionId,
    },

    #[error("region {0:?} is listed more than once")]
    Duplicate(RegionId),
}

/// Ordered `(region, hashtags)` association list.
#[derive(Debug, Clone)]
pub struct RegionTable {
    entries: Vec<(RegionId, Vec<String>)>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let entries: &[(RegionId, &[&str])] = &[
            (RegionId::NorthItaly, &["norditalia", "norditaly", "nord", "northitaly"]),
            (RegionId::CentralItaly, &["centroitalia", "centralitaly", "centro"]),
            (RegionId::SouthItaly, &["suditalia", "southitaly", "sud"]),
            (RegionId::Sardinia, &["sardegna", "sardinia"]),
            (RegionId::Sicily, &["sicilia", "sicily"]),
            (RegionId::Italy, &["italia", "italy"]),
            (RegionId::France, &["francia", "france"]),
            (RegionId::Spain, &["spagna", "spain", "espana"]),
            (RegionId::Switzerland, &["svizzera", "switzerland", "schweiz"]),
            (RegionId::Austria, &["austria"]),
            (RegionId::Slovenia, &["slovenia"]),
            (RegionId::Croatia, &["croazia", "croatia"]),
            (RegionId::Germany, &["germania", "germany", "deutschland"]),
            (RegionId::CzechRepublic, &["repubblicaceca", "czech", "czechia"]),
            (RegionId::UnitedKingdom, &["uk", "inghilterra", "england"]),
            (RegionId::Europe, &["europa", "europe"]),
        ];

        Self {
            entries: entries
                .iter()
                .map(|(region, tags)| (*region, tags.iter().map(|t| t.to_string()).collect()))
                .collect(),
        }
    }
}

impl RegionTable {
    /// Build a table, checking that no region precedes one of its sub-regions.
    pub fn try_new(entries: Vec<(RegionId, Vec<String>)>) -> Result<Self, RegionTableError> {
        for (index, (region, _)) in entries.iter().enumerate() {
            for (later, _) in &entries[index + 1..] {
                if later == region {
                    return Err(RegionTableError::Duplicate(*region));
                }
                if later.is_within(*region) {
                    return Err(RegionTableError::ContainerBeforeSubRegion {
                        container: *region,
                        sub_region: *later,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(RegionId, Vec<String>)] {
        &self.entries
    }

    /// First region in table order matching any of the hashtags.
    pub fn resolve(&self, hashtags: &BTreeSet<String>) -> Option<RegionId> {
        self.entries
            .iter()
            .find(|(_, tags)| tags.iter().any(|tag| hashtags.contains(tag)))
            .map(|(region, _)| *region)
    }

    /// Regions in table order, which is also their grouping order.
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.entries.iter().map(|(region, _)| *region)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::NoteError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "FAVORITE")]
    Favorite,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "TITLE_A-Z")]
    TitleAz,
    #[serde(rename = "TIME")]
    Time,
}

impl FilterKey {
    pub const ALL_KEYS: [FilterKey; 5] = [
        FilterKey::All,
        FilterKey::Favorite,
        FilterKey::Completed,
        FilterKey::TitleAz,
        FilterKey::Time,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::All => "ALL",
            FilterKey::Favorite => "FAVORITE",
            FilterKey::Completed => "COMPLETED",
            FilterKey::TitleAz => "TITLE_A-Z",
            FilterKey::Time => "TIME",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKey::ALL_KEYS
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| NoteError::InvalidInput(format!("unknown filter key: {}", s)))
    }
}

/// Active filters for one session. Absent keys are inactive.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FilterState {
    active: BTreeMap<FilterKey, bool>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks exactly `keys` as active, with no exclusion rules applied.
    /// This is how a stored or caller-supplied selection is read back.
    pub fn from_active(keys: impl IntoIterator<Item = FilterKey>) -> Self {
        Self {
            active: keys.into_iter().map(|key| (key, true)).collect(),
        }
    }

    /// Replays `keys` through `toggle`, so the result obeys the same
    /// exclusion rules as interactive selection.
    pub fn from_keys(keys: impl IntoIterator<Item = FilterKey>) -> Self {
        let mut state = Self::new();
        for key in keys {
            state.toggle(key);
        }
        state
    }

    pub fn is_active(&self, key: FilterKey) -> bool {
        self.active.get(&key).copied().unwrap_or(false)
    }

    pub fn active_keys(&self) -> Vec<FilterKey> {
        self.active
            .iter()
            .filter(|(_, on)| **on)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active_keys().is_empty()
    }

    /// `ALL` resets everything else. Any other key drops `ALL`, evicts its
    /// sort-order rival (`TITLE_A-Z` vs `TIME`), then flips itself.
    pub fn toggle(&mut self, key: FilterKey) {
        if key == FilterKey::All {
            self.active.clear();
            self.active.insert(FilterKey::All, true);
            return;
        }

        self.active.remove(&FilterKey::All);
        match key {
            FilterKey::TitleAz => {
                self.active.remove(&FilterKey::Time);
            }
            FilterKey::Time => {
                self.active.remove(&FilterKey::TitleAz);
            }
            _ => {}
        }

        if self.active.remove(&key).is_none() {
            self.active.insert(key, true);
        }
    }
}

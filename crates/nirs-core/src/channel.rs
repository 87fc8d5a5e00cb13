//! Channel identity, hemisphere layout and the exclusion set

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Integer id of an optode channel (CH1, CH2, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Hemoglobin signal kind carried by a channel column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Oxygenated hemoglobin (HbO / O2Hb)
    Oxy,
    /// Deoxygenated hemoglobin (HbR / HHb)
    Deoxy,
}

impl SignalKind {
    /// Suffix used in the canonical column naming scheme
    pub fn channel_suffix(&self) -> &'static str {
        match self {
            SignalKind::Oxy => "HbO",
            SignalKind::Deoxy => "HbR",
        }
    }

    /// Suffix used in the aggregate column naming scheme
    pub fn aggregate_suffix(&self) -> &'static str {
        match self {
            SignalKind::Oxy => "oxy",
            SignalKind::Deoxy => "deoxy",
        }
    }
}

/// Region covered by an aggregate column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Left,
    Right,
    Grand,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Left => write!(f, "left"),
            Region::Right => write!(f, "right"),
            Region::Grand => write!(f, "grand"),
        }
    }
}

/// Assignment of channel ids to hemispheres and reference roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    /// Long channels over the left hemisphere
    pub left: Vec<ChannelId>,
    /// Long channels over the right hemisphere
    pub right: Vec<ChannelId>,
    /// Short (superficial reference) channels
    pub short: Vec<ChannelId>,
}

impl ChannelLayout {
    /// Layout of the walking-study montage: CH4-6 left, CH1-3 right,
    /// CH7-8 short reference.
    pub fn walking_study() -> Self {
        ChannelLayout {
            left: vec![ChannelId(4), ChannelId(5), ChannelId(6)],
            right: vec![ChannelId(1), ChannelId(2), ChannelId(3)],
            short: vec![ChannelId(7), ChannelId(8)],
        }
    }

    /// All long (measurement) channels of the layout
    pub fn long_channels(&self) -> Vec<ChannelId> {
        let mut all: Vec<ChannelId> = self.left.iter().chain(self.right.iter()).copied().collect();
        all.sort();
        all
    }

    /// Whether the id belongs to a short reference channel
    pub fn is_short(&self, id: ChannelId) -> bool {
        self.short.contains(&id)
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::walking_study()
    }
}

/// Which side(s) of a channel were found to be all zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroSide {
    Oxy,
    Deoxy,
    Both,
}

impl fmt::Display for ZeroSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZeroSide::Oxy => write!(f, "HbO"),
            ZeroSide::Deoxy => write!(f, "HbR"),
            ZeroSide::Both => write!(f, "HbO and HbR"),
        }
    }
}

/// One channel dropped for having a constant-zero signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub channel: ChannelId,
    pub zero_side: ZeroSide,
}

/// Set of channel ids dropped before the correction stages.
///
/// Downstream stages treat excluded channels as absent, not zero. The
/// detection rule is exact equality to zero across the whole column; a
/// near-zero but non-exact-zero channel is not excluded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionSet {
    entries: Vec<Exclusion>,
    ids: BTreeSet<ChannelId>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an excluded channel. Duplicate ids keep the first entry.
    pub fn insert(&mut self, channel: ChannelId, zero_side: ZeroSide) {
        if self.ids.insert(channel) {
            self.entries.push(Exclusion { channel, zero_side });
        }
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.ids.contains(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Entries in detection order, for the per-file exclusion log
    pub fn entries(&self) -> &[Exclusion] {
        &self.entries
    }

    /// Excluded ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.ids.iter().copied()
    }
}

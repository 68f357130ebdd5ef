//! Slot - anatomical binding positions
//!
//! Five fixed positions, each doubling as a bit index in [`SlotMask`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anatomical binding position.
///
/// The discriminant is the bit index used by [`SlotMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    LeftHand = 0,
    RightHand = 1,
    LeftFoot = 2,
    RightFoot = 3,
    Chest = 4,
}

impl Slot {
    /// Number of slots
    pub const COUNT: usize = 5;

    /// All slots in bit-index order
    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::LeftHand,
        Slot::RightHand,
        Slot::LeftFoot,
        Slot::RightFoot,
        Slot::Chest,
    ];

    /// Bit index (0-4)
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Slot for a bit index, `None` when out of range
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// snake_case name, as used in config files and CSV file names
    pub const fn as_str(self) -> &'static str {
        match self {
            Slot::LeftHand => "left_hand",
            Slot::RightHand => "right_hand",
            Slot::LeftFoot => "left_foot",
            Slot::RightFoot => "right_foot",
            Slot::Chest => "chest",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown slot '{0}'")]
pub struct SlotParseError(pub String);

impl FromStr for Slot {
    type Err = SlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == normalized)
            .ok_or_else(|| SlotParseError(s.to_string()))
    }
}

/// Compact set of slots, bit *i* set iff `Slot::ALL[i]` is a member.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct SlotMask(u8);

impl SlotMask {
    const VALID_BITS: u8 = (1 << Slot::COUNT) - 1;

    /// Empty mask
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask with every slot set
    pub const fn all() -> Self {
        Self(Self::VALID_BITS)
    }

    /// Build from raw bits; bits above index 4 are discarded
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::VALID_BITS)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, slot: Slot) -> bool {
        self.0 & (1 << slot as u8) != 0
    }

    #[inline]
    pub fn insert(&mut self, slot: Slot) {
        self.0 |= 1 << slot as u8;
    }

    #[inline]
    pub fn remove(&mut self, slot: Slot) {
        self.0 &= !(1 << slot as u8);
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set slots in bit-index order
    pub fn iter(self) -> impl Iterator<Item = Slot> {
        Slot::ALL.into_iter().filter(move |slot| self.contains(*slot))
    }
}

impl From<u8> for SlotMask {
    fn from(bits: u8) -> Self {
        Self::from_bits(bits)
    }
}

impl From<SlotMask> for u8 {
    fn from(mask: SlotMask) -> Self {
        mask.bits()
    }
}

impl FromIterator<Slot> for SlotMask {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut mask = SlotMask::empty();
        for slot in iter {
            mask.insert(slot);
        }
        mask
    }
}

impl fmt::Debug for SlotMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotMask({:05b})", self.0)
    }
}

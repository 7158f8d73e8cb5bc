//! The fixed garment size scale, per-size quantities and size-set descriptors.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One of the five sizes every product is offered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Size {
    S34,
    S36,
    S38,
    S40,
    S42,
}

impl Size {
    pub const ALL: [Size; 5] = [Size::S34, Size::S36, Size::S38, Size::S40, Size::S42];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Size::S34 => "34",
            Size::S36 => "36",
            Size::S38 => "38",
            Size::S40 => "40",
            Size::S42 => "42",
        }
    }

    pub const fn number(&self) -> u32 {
        match self {
            Size::S34 => 34,
            Size::S36 => 36,
            Size::S38 => 38,
            Size::S40 => 40,
            Size::S42 => 42,
        }
    }

    /// Position on the scale, also used as the seeded `sort_order`.
    pub const fn index(&self) -> usize {
        match self {
            Size::S34 => 0,
            Size::S36 => 1,
            Size::S38 => 2,
            Size::S40 => 3,
            Size::S42 => 4,
        }
    }

    pub fn from_number(n: u32) -> Option<Size> {
        Size::ALL.into_iter().find(|s| s.number() == n)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown size \"{0}\"")]
pub struct UnknownSize(pub String);

impl FromStr for Size {
    type Err = UnknownSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Size::from_number)
            .ok_or_else(|| UnknownSize(s.to_string()))
    }
}

impl Serialize for Size {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Size {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Largest quantity accepted for a single size of one order line.
pub const MAX_SIZE_QUANTITY: u32 = 100_000;

/// Quantity ordered per size. Absent sizes are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SizeQuantities([u32; 5]);

impl SizeQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, size: Size) -> u32 {
        self.0[size.index()]
    }

    pub fn set(&mut self, size: Size, quantity: u32) {
        self.0[size.index()] = quantity;
    }

    pub fn with(mut self, size: Size, quantity: u32) -> Self {
        self.set(size, quantity);
        self
    }

    pub fn total_quantity(&self) -> u64 {
        self.0.iter().map(|q| u64::from(*q)).sum()
    }

    /// First size whose quantity is above `limit`.
    pub fn exceeding(&self, limit: u32) -> Option<(Size, u32)> {
        self.iter().find(|(_, q)| *q > limit)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|q| *q == 0)
    }

    /// Sizes with a nonzero quantity, in scale order.
    pub fn non_zero(&self) -> impl Iterator<Item = (Size, u32)> + '_ {
        Size::ALL
            .into_iter()
            .map(|s| (s, self.get(s)))
            .filter(|(_, q)| *q > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Size, u32)> + '_ {
        Size::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    /// Per-size sum, saturating.
    pub fn merge(&mut self, other: &SizeQuantities) {
        for size in Size::ALL {
            let merged = self.get(size).saturating_add(other.get(size));
            self.set(size, merged);
        }
    }
}

impl FromIterator<(Size, u32)> for SizeQuantities {
    fn from_iter<I: IntoIterator<Item = (Size, u32)>>(iter: I) -> Self {
        let mut quantities = SizeQuantities::default();
        for (size, qty) in iter {
            quantities.set(size, qty);
        }
        quantities
    }
}

impl Serialize for SizeQuantities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Size::ALL.len()))?;
        for (size, qty) in self.iter() {
            map.serialize_entry(size.as_str(), &qty)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeQuantities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantitiesVisitor;

        impl<'de> Visitor<'de> for QuantitiesVisitor {
            type Value = SizeQuantities;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping size tokens (34..42) to quantities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut quantities = SizeQuantities::default();
                while let Some((key, qty)) = access.next_entry::<String, u32>()? {
                    let size: Size = key.parse().map_err(de::Error::custom)?;
                    quantities.set(size, qty);
                }
                Ok(quantities)
            }
        }

        deserializer.deserialize_map(QuantitiesVisitor)
    }
}

/// The sizes a product is offered in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeSet(Vec<Size>);

impl SizeSet {
    /// Descriptor stored for a product imported without one.
    pub const DEFAULT_DESCRIPTOR: &'static str = "34-42";

    pub fn all() -> Self {
        SizeSet(Size::ALL.to_vec())
    }

    /// Parses a descriptor such as `"34-38"` or `"36, 40 42"`.
    ///
    /// Ranges are inclusive over the fixed scale. Anything that yields no
    /// sizes (blank, reversed range, unknown tokens) means all sizes.
    pub fn parse(descriptor: Option<&str>) -> Self {
        let Some(raw) = descriptor.map(str::trim).filter(|d| !d.is_empty()) else {
            return Self::all();
        };

        let sizes: Vec<Size> = match raw.split_once('-') {
            Some((lo, hi)) => match (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
                (Ok(lo), Ok(hi)) => Size::ALL
                    .into_iter()
                    .filter(|s| (lo..=hi).contains(&s.number()))
                    .collect(),
                _ => Vec::new(),
            },
            None => {
                let mut picked: Vec<Size> = raw
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter_map(|token| token.parse::<Size>().ok())
                    .collect();
                picked.sort();
                picked.dedup();
                picked
            }
        };

        if sizes.is_empty() {
            Self::all()
        } else {
            SizeSet(sizes)
        }
    }

    pub fn contains(&self, size: Size) -> bool {
        self.0.contains(&size)
    }

    pub fn sizes(&self) -> &[Size] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for SizeSet {
    type Item = Size;
    type IntoIter = std::vec::IntoIter<Size>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

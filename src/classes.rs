//! Class labels and the label → bucket angle table.
//!
//! The classifier speaks in small integer labels (1..N). Each label maps
//! to a human-readable name and a servo angle in degrees. The table is
//! fixed-capacity and loaded once from configuration.

use core::fmt;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Maximum number of classes the table can hold.
pub const MAX_CLASSES: usize = 16;

/// Maximum byte length of a class name.
pub const MAX_NAME_LEN: usize = 32;

/// Servo range, inclusive, in degrees.
pub const MIN_ANGLE_DEG: i16 = 0;
pub const MAX_ANGLE_DEG: i16 = 180;

/// A predicted class, as reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabel(pub u8);

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the class table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub label: ClassLabel,
    pub name: String<MAX_NAME_LEN>,
    /// Target bucket angle. Signed so that a misconfigured negative value
    /// survives parsing and is rejected with a proper error.
    pub angle_deg: i16,
}

impl ClassEntry {
    /// Build an entry, truncating `name` to [`MAX_NAME_LEN`] bytes.
    pub fn new(label: u8, name: &str, angle_deg: i16) -> Self {
        let mut owned = String::new();
        for ch in name.chars() {
            if owned.push(ch).is_err() {
                break;
            }
        }
        Self {
            label: ClassLabel(label),
            name: owned,
            angle_deg,
        }
    }

    /// Whether the angle lies inside the servo range.
    pub fn angle_in_range(&self) -> bool {
        (MIN_ANGLE_DEG..=MAX_ANGLE_DEG).contains(&self.angle_deg)
    }
}

/// Fixed-capacity label → (name, angle) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable {
    entries: Vec<ClassEntry, MAX_CLASSES>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Build a table from `(label, name, angle)` rows. Rows past
    /// [`MAX_CLASSES`] are dropped.
    pub fn from_rows(rows: &[(u8, &str, i16)]) -> Self {
        let mut table = Self::new();
        for &(label, name, angle) in rows {
            if table.insert(ClassEntry::new(label, name, angle)).is_err() {
                break;
            }
        }
        table
    }

    /// Insert or replace the entry for `entry.label`.
    /// Returns the entry back if the table is full.
    pub fn insert(&mut self, entry: ClassEntry) -> Result<(), ClassEntry> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.label == entry.label) {
            *existing = entry;
            return Ok(());
        }
        self.entries.push(entry)
    }

    pub fn get(&self, label: ClassLabel) -> Option<&ClassEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Human-readable name for `label`, if known.
    pub fn name_of(&self, label: ClassLabel) -> Option<&str> {
        self.get(label).map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any label appears twice (only possible via deserialisation).
    pub fn has_duplicate_labels(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .any(|(i, a)| self.entries[i + 1..].iter().any(|b| b.label == a.label))
    }
}

impl Default for ClassTable {
    /// The five Lego part bins the sorter ships with.
    fn default() -> Self {
        Self::from_rows(&[
            (1, "axel", 0),
            (2, "connectors", 45),
            (3, "decorations", 90),
            (4, "fasteners", 135),
            (5, "gears", 180),
        ])
    }
}

//! Stable pod-to-color mapping for interleaved log lines.
//!
//! Colors are a pure function of the pod name, so replaying a session
//! reproduces them exactly. Distinct pods may share a color.

use std::collections::HashMap;

use serde::Serialize;

/// Display palette. Index 0 is reserved for records without a pod.
pub const POD_PALETTE: [&str; 12] = [
    "#A3A3A3", "#0EA5E9", "#22C55E", "#F59E0B", "#EC4899", "#8B5CF6", "#14B8A6", "#EF4444",
    "#84CC16", "#F97316", "#6366F1", "#D946EF",
];

/// A palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PodColor {
    /// Position in [`POD_PALETTE`]
    pub index: usize,
    /// CSS hex value
    pub hex: &'static str,
}

impl PodColor {
    /// Color used for records without a pod.
    pub const DEFAULT: Self = Self {
        index: 0,
        hex: POD_PALETTE[0],
    };

    /// Color for a palette index, wrapping around the palette.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        let index = index % POD_PALETTE.len();
        Self {
            index,
            hex: POD_PALETTE[index],
        }
    }
}

/// Palette index for a pod name.
///
/// Empty names map to the reserved index 0; every other name hashes onto
/// the remaining entries.
#[must_use]
pub fn palette_index(pod_name: &str) -> usize {
    if pod_name.is_empty() {
        return 0;
    }
    let hash = blake3::hash(pod_name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    let slots = (POD_PALETTE.len() - 1) as u64;
    1 + (u64::from_le_bytes(prefix) % slots) as usize
}

/// Lazily filled pod color table for one session.
///
/// An entry is created the first time a pod is seen and never changes.
#[derive(Debug, Default)]
pub struct PodColorAssigner {
    table: HashMap<String, PodColor>,
}

impl PodColorAssigner {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for a pod, recording it on first sighting.
    pub fn color_for(&mut self, pod_name: Option<&str>) -> PodColor {
        let Some(pod_name) = pod_name.filter(|p| !p.is_empty()) else {
            return PodColor::DEFAULT;
        };
        if let Some(color) = self.table.get(pod_name) {
            return *color;
        }
        let color = PodColor::from_index(palette_index(pod_name));
        self.table.insert(pod_name.to_string(), color);
        color
    }

    /// Color already recorded for a pod.
    #[must_use]
    pub fn get(&self, pod_name: &str) -> Option<PodColor> {
        self.table.get(pod_name).copied()
    }

    /// Number of pods seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no pod has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

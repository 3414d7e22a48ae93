use std::collections::{hash_map::Entry, HashMap};

use tiny_skia::Paint;

use crate::error::LayerSkip;

/// Cache key built from bucketed geometry, so slowly moving gradients reuse
/// a paint instead of rebuilding it every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradientKey {
    /// Ambient halo, 10px buckets for centre and radius.
    Halo { x: i32, y: i32, radius: i32 },
    /// Wipe blade, 5px buckets for its vertical position.
    Blade { y: i32 },
    Vignette,
}

impl GradientKey {
    pub fn halo(x: f32, y: f32, radius: f32) -> Self {
        Self::Halo {
            x: bucket(x, 10.0),
            y: bucket(y, 10.0),
            radius: bucket(radius, 10.0),
        }
    }

    pub fn blade(y: f32) -> Self {
        Self::Blade { y: bucket(y, 5.0) }
    }
}

fn bucket(value: f32, size: f32) -> i32 {
    (value / size).floor() as i32
}

/// Paints keyed by [`GradientKey`]. Entries are never evicted one by one; the
/// whole cache is cleared on resize and teardown.
#[derive(Debug, Default)]
pub struct GradientCache {
    entries: HashMap<GradientKey, Paint<'static>>,
    hits: u64,
    misses: u64,
}

impl GradientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached paint for `key`, building it with `build` on a miss.
    /// A failed build caches nothing.
    pub fn get_or_try_insert<F>(&mut self, key: GradientKey, build: F) -> Result<&Paint<'static>, LayerSkip>
    where
        F: FnOnce() -> Result<Paint<'static>, LayerSkip>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let paint = build()?;
                self.misses += 1;
                Ok(entry.insert(paint))
            }
        }
    }

    pub fn contains(&self, key: &GradientKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "clearing gradient cache");
        }
        self.entries.clear();
    }
}

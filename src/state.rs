use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Content key identifying one loaded image.
pub struct ImageKey(u64);

impl ImageKey {
    /// Derives the key from the encoded bytes of the image file.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// User-facing adjustment parameters, one value per control.
pub struct Adjustments {
    /// Percent, 100 leaves the image unchanged.
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Hue rotation in degrees.
    pub temperature: f32,
    /// Draw rotation about the surface center, in degrees clockwise.
    pub rotation: f32,
    /// Gaussian blur radius in pixels.
    pub blur: f32,
    /// Percent mix toward luminance.
    pub grayscale: f32,
    /// Halo radius in pixels; 0 disables the focus pass.
    pub focus: f32,
    pub retro: bool,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            temperature: 0.0,
            rotation: 0.0,
            blur: 0.0,
            grayscale: 0.0,
            focus: 0.0,
            retro: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// Partial update applied by [`StateStore::commit`]; `None` fields are left alone.
pub struct AdjustmentPatch {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub temperature: Option<f32>,
    pub rotation: Option<f32>,
    pub blur: Option<f32>,
    pub grayscale: Option<f32>,
    pub focus: Option<f32>,
    pub retro: Option<bool>,
}

impl From<Adjustments> for AdjustmentPatch {
    fn from(a: Adjustments) -> Self {
        Self {
            brightness: Some(a.brightness),
            contrast: Some(a.contrast),
            saturation: Some(a.saturation),
            temperature: Some(a.temperature),
            rotation: Some(a.rotation),
            blur: Some(a.blur),
            grayscale: Some(a.grayscale),
            focus: Some(a.focus),
            retro: Some(a.retro),
        }
    }
}

impl AdjustmentPatch {
    /// Returns `base` with every named field overwritten.
    pub fn applied_to(&self, base: Adjustments) -> Adjustments {
        Adjustments {
            brightness: self.brightness.unwrap_or(base.brightness),
            contrast: self.contrast.unwrap_or(base.contrast),
            saturation: self.saturation.unwrap_or(base.saturation),
            temperature: self.temperature.unwrap_or(base.temperature),
            rotation: self.rotation.unwrap_or(base.rotation),
            blur: self.blur.unwrap_or(base.blur),
            grayscale: self.grayscale.unwrap_or(base.grayscale),
            focus: self.focus.unwrap_or(base.focus),
            retro: self.retro.unwrap_or(base.retro),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Everything remembered about one loaded image.
pub struct AdjustmentState {
    pub adjustments: Adjustments,
    /// Set once noise has been added; survives reset.
    pub noise_added: bool,
    /// PNG-encoded preview of the last rendered output.
    pub thumbnail: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
/// Per-image adjustment states keyed by content.
pub struct StateStore {
    states: HashMap<ImageKey, AdjustmentState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for `key`, creating it with defaults on first use.
    pub fn get_or_create(&mut self, key: ImageKey) -> &AdjustmentState {
        self.states.entry(key).or_default()
    }

    pub fn get(&self, key: ImageKey) -> Option<&AdjustmentState> {
        self.states.get(&key)
    }

    /// Overwrites the fields named in `patch` in one assignment.
    pub fn commit(&mut self, key: ImageKey, patch: &AdjustmentPatch) {
        let state = self.states.entry(key).or_default();
        state.adjustments = patch.applied_to(state.adjustments);
    }

    /// Restores default adjustments, keeping the noise marker and thumbnail.
    pub fn reset(&mut self, key: ImageKey) {
        self.states.entry(key).or_default().adjustments = Adjustments::default();
    }

    pub fn mark_noise(&mut self, key: ImageKey) {
        self.states.entry(key).or_default().noise_added = true;
    }

    pub fn set_thumbnail(&mut self, key: ImageKey, png: Vec<u8>) {
        self.states.entry(key).or_default().thumbnail = Some(png);
    }
}

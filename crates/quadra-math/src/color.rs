// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};

/// Hue / saturation / value adjustment pushed to the shaders.
/// Each channel lives in [0, 1]; 0.5 leaves the texture unchanged.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct HsvFactors {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl HsvFactors {
    pub const NEUTRAL: Self = Self {
        hue: 0.5,
        saturation: 0.5,
        value: 0.5,
    };

    /// Builds clamped factors. NaN maps to the neutral 0.5.
    pub fn new(hue: f32, saturation: f32, value: f32) -> Self {
        Self {
            hue: clamp_unit(hue),
            saturation: clamp_unit(saturation),
            value: clamp_unit(value),
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.hue, self.saturation, self.value]
    }
}

impl Default for HsvFactors {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<[f32; 3]> for HsvFactors {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.5
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_clamped() {
        let f = HsvFactors::new(-1.0, 2.0, 0.25);
        assert_eq!(f.to_array(), [0.0, 1.0, 0.25]);
    }

    #[test]
    fn nan_becomes_neutral() {
        assert_eq!(HsvFactors::new(f32::NAN, 0.5, 0.5), HsvFactors::NEUTRAL);
    }

    #[test]
    fn push_constant_layout_is_three_floats() {
        assert_eq!(std::mem::size_of::<HsvFactors>(), 12);
        let bytes = bytemuck::bytes_of(&HsvFactors::NEUTRAL);
        assert_eq!(&bytes[0..4], &0.5f32.to_ne_bytes());
    }
}

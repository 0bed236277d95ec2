// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::Mat4;

bitflags! {
    /// Surface pre-transform bits. Values match `VkSurfaceTransformFlagBitsKHR`
    /// so a raw Vulkan mask converts with `from_bits_truncate`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SurfaceTransform: u32 {
        const IDENTITY = 0x0000_0001;
        const ROTATE_90 = 0x0000_0002;
        const ROTATE_180 = 0x0000_0004;
        const ROTATE_270 = 0x0000_0008;
        const HORIZONTAL_MIRROR = 0x0000_0010;
        const HORIZONTAL_MIRROR_ROTATE_90 = 0x0000_0020;
        const HORIZONTAL_MIRROR_ROTATE_180 = 0x0000_0040;
        const HORIZONTAL_MIRROR_ROTATE_270 = 0x0000_0080;
        const INHERIT = 0x0000_0100;
    }
}

impl SurfaceTransform {
    /// True when the surface is rotated a quarter turn, i.e. the reported
    /// extent is in the rotated frame and width/height must be swapped.
    pub fn is_quarter_turn(self) -> bool {
        self.intersects(Self::ROTATE_90 | Self::ROTATE_270)
    }
}

// Column-major, as consumed by the vertex shader's mat4.
const ROTATE_90: [f32; 16] = [
    0.0, 1.0, 0.0, 0.0, //
    -1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];
const ROTATE_270: [f32; 16] = [
    0.0, -1.0, 0.0, 0.0, //
    1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Matrix that compensates for the surface pre-transform in clip space.
///
/// Only quarter turns are handled. A 180 degree transform falls through to
/// identity; the compositor is expected to handle it.
pub fn prerotation_matrix(transform: SurfaceTransform) -> Mat4 {
    if transform.contains(SurfaceTransform::ROTATE_90) {
        Mat4::from_cols_array(&ROTATE_90)
    } else if transform.contains(SurfaceTransform::ROTATE_270) {
        Mat4::from_cols_array(&ROTATE_270)
    } else {
        Mat4::IDENTITY
    }
}

/// Extent in the identity orientation: swaps width/height for quarter turns.
pub fn identity_extent(width: u32, height: u32, transform: SurfaceTransform) -> (u32, u32) {
    if transform.is_quarter_turn() {
        (height, width)
    } else {
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPS: f32 = 1e-6;

    #[test]
    fn identity_transform_gives_identity() {
        assert_eq!(prerotation_matrix(SurfaceTransform::IDENTITY), Mat4::IDENTITY);
        assert_eq!(prerotation_matrix(SurfaceTransform::empty()), Mat4::IDENTITY);
    }

    #[test]
    fn half_turn_is_left_alone() {
        assert_eq!(prerotation_matrix(SurfaceTransform::ROTATE_180), Mat4::IDENTITY);
    }

    #[test]
    fn quarter_turns_are_mutual_inverses() {
        let r90 = prerotation_matrix(SurfaceTransform::ROTATE_90);
        let r270 = prerotation_matrix(SurfaceTransform::ROTATE_270);
        assert!((r90 * r270).abs_diff_eq(Mat4::IDENTITY, EPS));
        assert!((r270 * r90).abs_diff_eq(Mat4::IDENTITY, EPS));
    }

    #[test]
    fn quarter_turns_are_orthogonal() {
        for t in [SurfaceTransform::ROTATE_90, SurfaceTransform::ROTATE_270] {
            let m = prerotation_matrix(t);
            assert!(m.transpose().abs_diff_eq(m.inverse(), EPS), "{t:?}");
            assert!((m.determinant() - 1.0).abs() < EPS, "{t:?}");
        }
    }

    #[test]
    fn rotate_90_maps_x_axis_onto_y_axis() {
        let m = prerotation_matrix(SurfaceTransform::ROTATE_90);
        let v = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(v.abs_diff_eq(Vec4::new(0.0, 1.0, 0.0, 1.0), EPS));
    }

    #[test]
    fn identity_extent_swaps_only_quarter_turns() {
        assert_eq!(identity_extent(1080, 1920, SurfaceTransform::ROTATE_90), (1920, 1080));
        assert_eq!(identity_extent(1080, 1920, SurfaceTransform::ROTATE_270), (1920, 1080));
        assert_eq!(identity_extent(1080, 1920, SurfaceTransform::ROTATE_180), (1080, 1920));
        assert_eq!(identity_extent(1080, 1920, SurfaceTransform::IDENTITY), (1080, 1920));
    }

    #[test]
    fn raw_vulkan_bits_round_trip() {
        assert_eq!(SurfaceTransform::from_bits_truncate(0x2), SurfaceTransform::ROTATE_90);
        assert_eq!(SurfaceTransform::ROTATE_270.bits(), 0x8);
    }
}

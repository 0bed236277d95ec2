// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Orientation math and small shader-facing value types.

mod color;
mod orientation;

pub use color::HsvFactors;
pub use orientation::{identity_extent, prerotation_matrix, SurfaceTransform};

pub use glam::{Mat4, Vec4};

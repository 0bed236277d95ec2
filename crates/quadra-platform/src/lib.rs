// SPDX-License-Identifier: CEPL-1.0
//! Windowing for the host. Everything above this crate talks to `winit`
//! through this re-export so the version is pinned in one place.

pub use winit;

#[cfg(target_os = "android")]
pub use winit::platform::android::activity::AndroidApp;

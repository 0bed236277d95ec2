// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bring-up, swapchain, texture upload, the quad
//! pipeline and the per-frame loop.

mod debug;
pub mod device;
pub mod error;
pub mod frame;
pub mod memory;
pub mod pipeline;
mod renderer;
pub mod swapchain;
pub mod texture;

pub use device::{identity_capabilities, select_queue_family, DeviceContext, PhysicalDeviceInfo};
pub use error::{DeviceError, RenderError, ResourceError, VkFailure};
pub use frame::{FrameScheduler, FrameTarget, DEFAULT_FRAMES_IN_FLIGHT};
pub use pipeline::{PipelineConfig, FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH};
pub use renderer::{RendererSettings, VkQuadRenderer, DEFAULT_CLEAR_COLOR, DEFAULT_TEXTURE_PATH};
pub use swapchain::SwapchainPlan;
pub use texture::{UploadPath, UploadPlan};

use quadra_core::MemoryAssets;

static VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/shader.vert.spv"));
static FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/shader.frag.spv"));

/// The SPIR-V compiled at build time, under the paths the pipeline loads.
pub fn builtin_shaders() -> MemoryAssets {
    MemoryAssets::new()
        .with(VERTEX_SHADER_PATH, VERT_SPV.to_vec())
        .with(FRAGMENT_SHADER_PATH, FRAG_SPV.to_vec())
}

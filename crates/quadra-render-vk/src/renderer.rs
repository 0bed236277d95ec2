// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;
use quadra_core::AssetProvider;
use quadra_math::HsvFactors;
use quadra_render::{FrameOutcome, RenderSize, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info};

use crate::device::DeviceContext;
use crate::error::{RenderError, ResourceError, VkFailure, VkResultExt};
use crate::frame::{
    Acquired, FrameScheduler, FrameSlots, FrameSyncSet, FrameTarget, Presented, TransformUbo,
    DEFAULT_FRAMES_IN_FLIGHT,
};
use crate::pipeline::{hsv_push_range, PipelineConfig, PipelineState, QUAD_VERTEX_COUNT};
use crate::swapchain::SwapchainState;
use crate::texture::{load_texture, Texture, TEXTURE_FORMAT};

pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.5, 0.5, 0.0, 1.0];
pub const DEFAULT_TEXTURE_PATH: &str = "textures/sample_tex.png";

#[derive(Clone, Debug)]
pub struct RendererSettings {
    pub frames_in_flight: usize,
    pub clear_color: [f32; 4],
    pub hsv: HsvFactors,
    pub texture_path: String,
    pub pipeline: PipelineConfig,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            clear_color: DEFAULT_CLEAR_COLOR,
            hsv: HsvFactors::NEUTRAL,
            texture_path: DEFAULT_TEXTURE_PATH.to_owned(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Everything that exists between `init` and `cleanup`.
///
/// Field order does not drive teardown; `Drop` does it explicitly and the
/// device context, declared last, goes after everything created from it.
struct RendererCore {
    frames: FrameSlots,
    texture: Texture,
    swapchain: SwapchainState,
    pipeline: PipelineState,
    clear_color: [f32; 4],
    hsv: HsvFactors,
    desired_images: u32,
    size_hint: RenderSize,
    minimized: bool,
    ctx: DeviceContext,
}

impl RendererCore {
    // STRICT ORDER:
    // 1) device context (instance, surface, device, queue)
    // 2) render pass + layouts + pipeline for the surface format
    // 3) texture (decoded, uploaded, view + sampler)
    // 4) swapchain images + framebuffers against the render pass
    // 5) per-slot sync objects, command buffers, UBOs, descriptor sets
    unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        assets: &dyn AssetProvider,
        settings: &RendererSettings,
        size_hint: RenderSize,
    ) -> Result<Self, RenderError> {
        let ctx = DeviceContext::new(window, display)?;
        let format = ctx.surface_format().format;
        let frames_in_flight = settings.frames_in_flight.max(1);

        // Each step below fills one field; an early return drops `core`,
        // which releases whatever was built so far.
        let mut core = Self {
            frames: FrameSlots::empty(),
            texture: Texture::empty(),
            swapchain: SwapchainState::empty(),
            pipeline: PipelineState::empty(format),
            clear_color: settings.clear_color,
            hsv: settings.hsv,
            desired_images: frames_in_flight as u32,
            size_hint,
            minimized: false,
            ctx,
        };

        core.pipeline = PipelineState::new(&core.ctx, assets, format, settings.pipeline)?;

        let bytes = assets
            .read(&settings.texture_path)
            .map_err(ResourceError::from)?;
        core.texture = load_texture(
            &core.ctx,
            &bytes,
            TEXTURE_FORMAT,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        )?;

        core.swapchain = SwapchainState::new(
            &core.ctx,
            core.pipeline.render_pass,
            core.desired_images,
            size_hint,
        )?;
        core.frames = FrameSlots::new(
            &core.ctx,
            core.pipeline.descriptor_set_layout,
            &core.texture,
            frames_in_flight,
        )?;
        Ok(core)
    }

    /// Slot resources, or `NotInitialized` if the slot was never built.
    fn frame(&self, slot: usize) -> Result<&FrameSyncSet, RenderError> {
        self.frames.slots.get(slot).ok_or(RenderError::NotInitialized)
    }

    unsafe fn record(&self, slot: usize, image: u32) -> Result<(), RenderError> {
        let device = self.ctx.device();
        let frame = self.frame(slot)?;
        let cmd = frame.command_buffer;
        let extent = self.swapchain.extent;

        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        device
            .begin_command_buffer(cmd, &begin)
            .vk_context("begin_command_buffer")?;

        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        };
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.pipeline.render_pass,
            framebuffer: self.swapchain.images[image as usize].framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: 1,
            p_clear_values: &clear,
            ..Default::default()
        };
        device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);

        let vp = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
        let sc = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&sc));

        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.pipeline_layout,
            0,
            std::slice::from_ref(&frame.descriptor_set),
            &[],
        );
        let range = hsv_push_range();
        device.cmd_push_constants(
            cmd,
            self.pipeline.pipeline_layout,
            range.stage_flags,
            range.offset,
            bytemuck::bytes_of(&self.hsv),
        );
        device.cmd_draw(cmd, QUAD_VERTEX_COUNT, 1, 0, 0);

        device.cmd_end_render_pass(cmd);
        device
            .end_command_buffer(cmd)
            .vk_context("end_command_buffer")?;
        Ok(())
    }
}

impl FrameTarget for RendererCore {
    fn is_ready(&self) -> bool {
        !self.minimized && !self.frames.is_empty() && self.swapchain.image_count() > 0
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError> {
        let frame = self.frame(slot)?;
        if !frame.fence_awaitable {
            return Ok(());
        }
        let fence = frame.in_flight;
        unsafe {
            self.ctx
                .device()
                .wait_for_fences(std::slice::from_ref(&fence), true, u64::MAX)
                .vk_context("wait_for_fences")?;
        }
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<Acquired, RenderError> {
        let semaphore = self.frame(slot)?.image_available;
        let res = unsafe {
            self.ctx.swapchain_loader().acquire_next_image(
                self.swapchain.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match res {
            // suboptimal on acquire still yields a usable image; present reports it again
            Ok((index, _suboptimal)) => Ok(Acquired::Image(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
            Err(e) => Err(VkFailure {
                call: "acquire_next_image",
                result: e,
            }
            .into()),
        }
    }

    fn update_uniforms(&mut self, slot: usize) -> Result<(), RenderError> {
        let ubo = TransformUbo::for_transform(self.swapchain.pre_transform);
        unsafe { self.frames.write_ubo(self.ctx.device(), slot, &ubo)? };
        Ok(())
    }

    // Record first; the fence is reset only right before the submit that
    // re-arms it, and marked unawaitable until that submit succeeds.
    fn record_and_submit(&mut self, slot: usize, image: u32) -> Result<(), RenderError> {
        let frame = self.frame(slot)?;
        let (fence, cmd) = (frame.in_flight, frame.command_buffer);
        let (image_available, render_finished) = (frame.image_available, frame.render_finished);
        unsafe {
            let device = self.ctx.device();
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .vk_context("reset_command_buffer")?;
            self.record(slot, image)?;

            let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &image_available,
                p_wait_dst_stage_mask: &wait_stage,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &render_finished,
                ..Default::default()
            };
            device
                .reset_fences(std::slice::from_ref(&fence))
                .vk_context("reset_fences")?;
            self.frames.slots[slot].fence_awaitable = false;
            self.ctx
                .device()
                .queue_submit(self.ctx.queue(), std::slice::from_ref(&submit), fence)
                .vk_context("queue_submit")?;
            self.frames.slots[slot].fence_awaitable = true;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image: u32) -> Result<Presented, RenderError> {
        let frame = self.frame(slot)?;
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &frame.render_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        let res = unsafe {
            self.ctx
                .swapchain_loader()
                .queue_present(self.ctx.queue(), &present)
        };
        match res {
            Ok(false) => Ok(Presented::Optimal),
            Ok(true) => Ok(Presented::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Presented::OutOfDate),
            Err(e) => Err(VkFailure {
                call: "queue_present",
                result: e,
            }
            .into()),
        }
    }

    fn recreate_swapchain(&mut self) -> Result<(), RenderError> {
        unsafe {
            let caps = self.ctx.surface_capabilities()?;
            if caps.current_extent.width == 0 || caps.current_extent.height == 0 {
                // not ready until the host reports a non-empty size again
                debug!("swapchain: surface has zero extent, keeping current images");
                self.minimized = true;
                return Ok(());
            }

            self.ctx.wait_idle()?;
            self.swapchain.destroy(&self.ctx);

            if self.ctx.refresh_surface_format()? {
                let format = self.ctx.surface_format().format;
                self.pipeline.rebuild_for_format(&self.ctx, format)?;
            }

            self.swapchain = SwapchainState::new(
                &self.ctx,
                self.pipeline.render_pass,
                self.desired_images,
                self.size_hint,
            )?;
        }
        info!(
            "swapchain: recreated {}x{} with {} images",
            self.swapchain.extent.width,
            self.swapchain.extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }
}

// STRICT TEARDOWN ORDER: slot objects and pools, texture, swapchain,
// pipeline, then the device context (device, surface, instance).
impl Drop for RendererCore {
    fn drop(&mut self) {
        unsafe {
            let device = self.ctx.device();
            self.frames.wait_all(device).ok();
            device.device_wait_idle().ok();
            self.frames.destroy(device);
            self.texture.destroy(device);
            self.swapchain.destroy(&self.ctx);
            self.pipeline.destroy(device);
        }
    }
}

/// Vulkan implementation of [`Renderer`]: one textured, HSV-adjusted quad,
/// counter-rotated for the surface's pre-transform.
pub struct VkQuadRenderer {
    settings: RendererSettings,
    scheduler: FrameScheduler,
    size: RenderSize,
    core: Option<RendererCore>,
}

impl Default for VkQuadRenderer {
    fn default() -> Self {
        Self::new(RendererSettings::default())
    }
}

impl VkQuadRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            scheduler: FrameScheduler::new(settings.frames_in_flight),
            settings,
            size: RenderSize {
                width: 1280,
                height: 720,
            },
            core: None,
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn hsv(&self) -> HsvFactors {
        self.settings.hsv
    }
}

impl Renderer for VkQuadRenderer {
    fn init(
        &mut self,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        assets: &dyn AssetProvider,
    ) -> Result<()> {
        if self.core.is_some() {
            self.cleanup();
        }
        let mut core = unsafe { RendererCore::new(window, display, assets, &self.settings, self.size) }
            .context("vulkan renderer init")?;
        core.minimized = self.size.is_empty();
        self.core = Some(core);
        self.scheduler = FrameScheduler::new(self.settings.frames_in_flight);
        info!(
            "renderer: initialized, {} frame(s) in flight",
            self.core.as_ref().map_or(0, |c| c.frames.len())
        );
        Ok(())
    }

    fn render(&mut self) -> Result<FrameOutcome> {
        let Some(core) = self.core.as_mut() else {
            return Ok(FrameOutcome::Skipped);
        };
        match self.scheduler.run_frame(core) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.is_fatal() {
                    error!("renderer: fatal frame error: {e}");
                }
                Err(e.into())
            }
        }
    }

    fn cleanup(&mut self) {
        if self.core.take().is_some() {
            info!("renderer: cleaned up");
        }
        self.scheduler.reset();
    }

    fn is_initialized(&self) -> bool {
        self.core.is_some()
    }

    fn notify_resized(&mut self, size: RenderSize) {
        self.size = size;
        if let Some(core) = self.core.as_mut() {
            core.size_hint = size;
            core.minimized = size.is_empty();
        }
        if !size.is_empty() {
            self.scheduler.request_recreate();
        }
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.settings.clear_color = rgba;
        if let Some(core) = self.core.as_mut() {
            core.clear_color = rgba;
        }
    }

    fn set_hsv(&mut self, hue: f32, saturation: f32, value: f32) {
        let hsv = HsvFactors::new(hue, saturation, value);
        self.settings.hsv = hsv;
        if let Some(core) = self.core.as_mut() {
            core.hsv = hsv;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_before_init_is_skipped() {
        let mut r = VkQuadRenderer::default();
        assert!(!r.is_initialized());
        assert_eq!(r.render().unwrap(), FrameOutcome::Skipped);
        assert_eq!(r.scheduler().presented_frames(), 0);
    }

    #[test]
    fn cleanup_without_init_is_harmless() {
        let mut r = VkQuadRenderer::default();
        r.cleanup();
        r.cleanup();
        assert!(!r.is_initialized());
    }

    #[test]
    fn hsv_is_clamped_and_kept_across_lifecycles() {
        let mut r = VkQuadRenderer::default();
        r.set_hsv(1.5, -0.2, 0.25);
        assert_eq!(r.hsv().to_array(), [1.0, 0.0, 0.25]);
        r.cleanup();
        assert_eq!(r.settings().hsv.to_array(), [1.0, 0.0, 0.25]);
    }

    #[test]
    fn resize_requests_recreation_unless_empty() {
        let mut r = VkQuadRenderer::default();
        r.notify_resized(RenderSize {
            width: 0,
            height: 0,
        });
        assert!(!r.scheduler().recreate_pending());
        r.notify_resized(RenderSize {
            width: 1080,
            height: 1920,
        });
        assert!(r.scheduler().recreate_pending());
    }

    #[test]
    fn defaults() {
        let s = RendererSettings::default();
        assert_eq!(s.frames_in_flight, 2);
        assert_eq!(s.clear_color, [0.5, 0.5, 0.0, 1.0]);
        assert_eq!(s.hsv, HsvFactors::NEUTRAL);
        assert_eq!(s.texture_path, "textures/sample_tex.png");
    }

    #[test]
    fn portrait_rotate90_surface_renders_landscape_with_counter_rotation() {
        use crate::device::identity_capabilities;
        use crate::swapchain::SwapchainPlan;

        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            current_extent: vk::Extent2D {
                width: 1080,
                height: 1920,
            },
            min_image_extent: vk::Extent2D {
                width: 1080,
                height: 1920,
            },
            max_image_extent: vk::Extent2D {
                width: 1080,
                height: 1920,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::INHERIT,
            ..Default::default()
        };
        let plan = SwapchainPlan::from_capabilities(&identity_capabilities(caps), 2, RenderSize {
            width: 1080,
            height: 1920,
        });
        assert_eq!(plan.extent, vk::Extent2D { width: 1920, height: 1080 });

        let ubo = TransformUbo::for_transform(plan.pre_transform);
        let expected = quadra_math::prerotation_matrix(quadra_math::SurfaceTransform::ROTATE_90);
        assert_eq!(ubo.mvp, expected.to_cols_array_2d());
    }
}

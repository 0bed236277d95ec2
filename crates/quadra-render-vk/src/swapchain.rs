// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use quadra_render::RenderSize;
use tracing::info;

use crate::device::DeviceContext;
use crate::error::{RenderError, VkFailure, VkResultExt};

/// Pure swapchain decisions derived from (identity-oriented) capabilities.
/// Same capabilities in, same plan out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl SwapchainPlan {
    pub fn from_capabilities(
        caps: &vk::SurfaceCapabilitiesKHR,
        desired_images: u32,
        hint: RenderSize,
    ) -> Self {
        Self {
            extent: extent_from_caps(caps, hint),
            image_count: choose_image_count(caps, desired_images),
            pre_transform: caps.current_transform,
            composite_alpha: choose_composite_alpha(caps.supported_composite_alpha),
            present_mode: vk::PresentModeKHR::FIFO,
        }
    }
}

/// At least the surface minimum, capped by the maximum (0 means no cap).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, desired: u32) -> u32 {
    let count = desired.max(caps.min_image_count).max(1);
    if caps.max_image_count == 0 {
        count
    } else {
        count.min(caps.max_image_count)
    }
}

pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::OPAQUE,
    ]
    .into_iter()
    .find(|a| supported.contains(*a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

/// Presentable images plus their views and framebuffers.
pub struct SwapchainState {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<SwapchainImage>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    /// Transform the images were created with; drives the prerotation matrix.
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainState {
    pub fn empty() -> Self {
        Self {
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        }
    }

    pub unsafe fn new(
        ctx: &DeviceContext,
        render_pass: vk::RenderPass,
        desired_images: u32,
        hint: RenderSize,
    ) -> Result<Self, RenderError> {
        let caps = ctx.surface_capabilities()?;
        let plan = SwapchainPlan::from_capabilities(&caps, desired_images, hint);
        let surf_format = ctx.surface_format();

        info!(
            "swapchain: {}x{} images={} (min={}) transform={:?} alpha={:?} format={:?}",
            plan.extent.width,
            plan.extent.height,
            plan.image_count,
            caps.min_image_count,
            plan.pre_transform,
            plan.composite_alpha,
            surf_format.format
        );

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface(),
            min_image_count: plan.image_count,
            image_format: surf_format.format,
            image_color_space: surf_format.color_space,
            image_extent: plan.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: plan.pre_transform,
            composite_alpha: plan.composite_alpha,
            present_mode: plan.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        let loader = ctx.swapchain_loader();
        let swapchain = loader
            .create_swapchain(&swap_info, None)
            .vk_context("create_swapchain")?;

        let mut state = Self {
            swapchain,
            images: Vec::new(),
            format: surf_format.format,
            extent: plan.extent,
            pre_transform: plan.pre_transform,
        };
        if let Err(e) = state.create_images(ctx, render_pass) {
            state.destroy(ctx);
            return Err(e);
        }
        Ok(state)
    }

    unsafe fn create_images(&mut self, ctx: &DeviceContext, render_pass: vk::RenderPass) -> Result<(), RenderError> {
        let device = ctx.device();
        let images = ctx
            .swapchain_loader()
            .get_swapchain_images(self.swapchain)
            .vk_context("get_swapchain_images")?;

        for image in images {
            let iv_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: self.format,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = device
                .create_image_view(&iv_info, None)
                .vk_context("create_image_view")?;

            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: 1,
                p_attachments: &view,
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let framebuffer = match device.create_framebuffer(&fb_info, None) {
                Ok(fb) => fb,
                Err(e) => {
                    device.destroy_image_view(view, None);
                    return Err(RenderError::from(VkFailure {
                        call: "create_framebuffer",
                        result: e,
                    }));
                }
            };
            self.images.push(SwapchainImage {
                image,
                view,
                framebuffer,
            });
        }
        Ok(())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffers, then views, then the swapchain. Caller guarantees the
    /// device is idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        for img in self.images.drain(..) {
            device.destroy_framebuffer(img.framebuffer, None);
            device.destroy_image_view(img.view, None);
        }
        if self.swapchain != vk::SwapchainKHR::null() {
            ctx.swapchain_loader().destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::identity_capabilities;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE
                | vk::CompositeAlphaFlagsKHR::INHERIT,
            ..Default::default()
        }
    }

    const HINT: RenderSize = RenderSize {
        width: 800,
        height: 600,
    };

    #[test]
    fn empty_state_has_no_images() {
        let s = SwapchainState::empty();
        assert_eq!(s.image_count(), 0);
        assert_eq!(s.swapchain, vk::SwapchainKHR::null());
    }

    #[test]
    fn image_count_is_clamped() {
        assert_eq!(choose_image_count(&caps(2, 0), 3), 3);
        assert_eq!(choose_image_count(&caps(3, 0), 2), 3);
        assert_eq!(choose_image_count(&caps(2, 2), 3), 2);
        assert_eq!(choose_image_count(&caps(0, 0), 0), 1);
    }

    #[test]
    fn composite_alpha_prefers_inherit() {
        use vk::CompositeAlphaFlagsKHR as A;
        assert_eq!(choose_composite_alpha(A::OPAQUE | A::INHERIT), A::INHERIT);
        assert_eq!(choose_composite_alpha(A::OPAQUE | A::PRE_MULTIPLIED), A::OPAQUE);
        assert_eq!(choose_composite_alpha(A::PRE_MULTIPLIED), A::OPAQUE);
    }

    #[test]
    fn unchanged_capabilities_give_identical_plans() {
        let c = caps(2, 8);
        let a = SwapchainPlan::from_capabilities(&c, 2, HINT);
        let b = SwapchainPlan::from_capabilities(&c, 2, HINT);
        assert_eq!(a, b);
        assert_eq!(a.extent, c.current_extent);
        assert_eq!(a.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn undefined_extent_uses_clamped_hint() {
        let mut c = caps(2, 0);
        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        c.max_image_extent = vk::Extent2D {
            width: 640,
            height: 4096,
        };
        let p = SwapchainPlan::from_capabilities(&c, 2, HINT);
        assert_eq!(p.extent, vk::Extent2D { width: 640, height: 600 });
    }

    #[test]
    fn portrait_rotated_surface_plans_landscape_images() {
        let mut c = caps(2, 0);
        c.current_extent = vk::Extent2D {
            width: 1080,
            height: 1920,
        };
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        let p = SwapchainPlan::from_capabilities(&identity_capabilities(c), 2, HINT);
        assert_eq!(p.extent, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(p.pre_transform, vk::SurfaceTransformFlagsKHR::ROTATE_90);
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! Texture decode + upload.
//!
//! The pixels are always written by the host into a LINEAR, PREINITIALIZED
//! image. If the device can sample that directly we keep it; otherwise it
//! becomes the staging source for a copy into an OPTIMAL device-local image.
//! The sequence of barriers, copies and teardown is described by an
//! [`UploadPlan`] first and then executed step by step.
use ash::vk;
use tracing::{debug, info};

use crate::device::DeviceContext;
use crate::error::{ResourceError, VkFailure, VkResultExt};
use crate::memory::allocate_image_memory;

/// Bounded wait for the one-shot upload submission.
pub const TEXTURE_UPLOAD_TIMEOUT_NS: u64 = 100_000_000;

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadPath {
    /// Sample the host-written linear image directly.
    Linear,
    /// Copy the linear image into an optimal device-local one.
    Staged,
}

impl UploadPath {
    pub fn select(props: &vk::FormatProperties, format: vk::Format) -> Result<Self, ResourceError> {
        if props
            .linear_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
        {
            Ok(UploadPath::Linear)
        } else if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
        {
            Ok(UploadPath::Staged)
        } else {
            Err(ResourceError::UnsupportedTextureFormat(format))
        }
    }
}

/// Which of the two upload images a step refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadImage {
    /// Linear, host-written image. Staging source on the staged path.
    Host,
    /// Optimal, device-local destination (staged path only).
    Device,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub image: UploadImage,
    pub old: vk::ImageLayout,
    pub new: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStep {
    Transition(LayoutTransition),
    CopyHostToDevice,
    /// End recording, submit on a fence and wait (bounded).
    SubmitAndWait,
    DestroyCommandPool,
    DestroyStaging,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPlan {
    pub path: UploadPath,
    pub steps: Vec<UploadStep>,
}

impl UploadPlan {
    pub fn new(path: UploadPath) -> Self {
        use vk::ImageLayout as L;
        use vk::PipelineStageFlags as S;

        let t = |image, old, new, src_stage, dst_stage| {
            UploadStep::Transition(LayoutTransition {
                image,
                old,
                new,
                src_stage,
                dst_stage,
            })
        };

        let steps = match path {
            UploadPath::Linear => vec![
                t(
                    UploadImage::Host,
                    L::PREINITIALIZED,
                    L::SHADER_READ_ONLY_OPTIMAL,
                    S::HOST,
                    S::FRAGMENT_SHADER,
                ),
                UploadStep::SubmitAndWait,
                UploadStep::DestroyCommandPool,
            ],
            UploadPath::Staged => vec![
                t(
                    UploadImage::Host,
                    L::PREINITIALIZED,
                    L::TRANSFER_SRC_OPTIMAL,
                    S::HOST,
                    S::TRANSFER,
                ),
                t(
                    UploadImage::Device,
                    L::UNDEFINED,
                    L::TRANSFER_DST_OPTIMAL,
                    S::HOST,
                    S::TRANSFER,
                ),
                UploadStep::CopyHostToDevice,
                t(
                    UploadImage::Device,
                    L::TRANSFER_DST_OPTIMAL,
                    L::SHADER_READ_ONLY_OPTIMAL,
                    S::TRANSFER,
                    S::FRAGMENT_SHADER,
                ),
                UploadStep::SubmitAndWait,
                UploadStep::DestroyCommandPool,
                UploadStep::DestroyStaging,
            ],
        };
        Self { path, steps }
    }

    /// The image that ends up sampled.
    pub fn final_image(&self) -> UploadImage {
        match self.path {
            UploadPath::Linear => UploadImage::Host,
            UploadPath::Staged => UploadImage::Device,
        }
    }

    pub fn final_tiling(&self) -> vk::ImageTiling {
        match self.path {
            UploadPath::Linear => vk::ImageTiling::LINEAR,
            UploadPath::Staged => vk::ImageTiling::OPTIMAL,
        }
    }

    /// Layout of the sampled image once every step has run.
    pub fn final_layout(&self) -> vk::ImageLayout {
        let target = self.final_image();
        self.steps
            .iter()
            .filter_map(|s| match s {
                UploadStep::Transition(t) if t.image == target => Some(t.new),
                _ => None,
            })
            .last()
            .unwrap_or(vk::ImageLayout::PREINITIALIZED)
    }
}

/// Access masks implied by a layout transition.
pub fn transition_access_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> (vk::AccessFlags, vk::AccessFlags) {
    let src = match old {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::PREINITIALIZED => vk::AccessFlags::HOST_WRITE,
        _ => vk::AccessFlags::empty(),
    };
    let dst = match new {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::AccessFlags::TRANSFER_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::AccessFlags::SHADER_READ,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        _ => vk::AccessFlags::empty(),
    };
    (src, dst)
}

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

const COLOR_LAYERS: vk::ImageSubresourceLayers = vk::ImageSubresourceLayers {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    base_array_layer: 0,
    layer_count: 1,
};

/// A sampled 2D texture. Layout is SHADER_READ_ONLY_OPTIMAL once loaded.
#[derive(Debug)]
pub struct Texture {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub format: vk::Format,
    pub layout: vk::ImageLayout,
    pub tiling: vk::ImageTiling,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn empty() -> Self {
        Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            format: vk::Format::UNDEFINED,
            layout: vk::ImageLayout::UNDEFINED,
            tiling: vk::ImageTiling::OPTIMAL,
            width: 0,
            height: 0,
        }
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.sampler != vk::Sampler::null() {
            device.destroy_sampler(self.sampler, None);
            self.sampler = vk::Sampler::null();
        }
        if self.view != vk::ImageView::null() {
            device.destroy_image_view(self.view, None);
            self.view = vk::ImageView::null();
        }
        if self.image != vk::Image::null() {
            device.destroy_image(self.image, None);
            self.image = vk::Image::null();
        }
        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory, None);
            self.memory = vk::DeviceMemory::null();
        }
    }
}

#[derive(Clone, Copy)]
struct ImageAlloc {
    image: vk::Image,
    memory: vk::DeviceMemory,
}

impl ImageAlloc {
    unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_image(self.image, None);
        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory, None);
        }
    }
}

unsafe fn create_image(
    ctx: &DeviceContext,
    format: vk::Format,
    extent: vk::Extent2D,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    initial_layout: vk::ImageLayout,
    props: vk::MemoryPropertyFlags,
) -> Result<(ImageAlloc, vk::MemoryPropertyFlags), ResourceError> {
    let device = ctx.device();
    let ci = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout,
        ..Default::default()
    };
    let image = device.create_image(&ci, None).vk_context("create_image")?;
    match allocate_image_memory(ctx, image, props) {
        Ok((memory, flags)) => Ok((ImageAlloc { image, memory }, flags)),
        Err(e) => {
            device.destroy_image(image, None);
            Err(e)
        }
    }
}

/// Copies tightly packed RGBA8 rows into a mapped linear image, honouring
/// the driver's row pitch.
unsafe fn write_rows(
    ctx: &DeviceContext,
    img: ImageAlloc,
    mem_flags: vk::MemoryPropertyFlags,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ResourceError> {
    let device = ctx.device();
    let sub = vk::ImageSubresource {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        array_layer: 0,
    };
    let layout = device.get_image_subresource_layout(img.image, sub);
    let row_bytes = width as usize * 4;

    let base = device
        .map_memory(img.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        .vk_context("map_memory")? as *mut u8;
    for y in 0..height as usize {
        let src = &pixels[y * row_bytes..(y + 1) * row_bytes];
        let dst = base.add(layout.offset as usize + y * layout.row_pitch as usize);
        std::ptr::copy_nonoverlapping(src.as_ptr(), dst, row_bytes);
    }
    if !mem_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        let range = vk::MappedMemoryRange {
            s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
            memory: img.memory,
            offset: 0,
            size: vk::WHOLE_SIZE,
            ..Default::default()
        };
        if let Err(e) = device.flush_mapped_memory_ranges(std::slice::from_ref(&range)) {
            device.unmap_memory(img.memory);
            return Err(VkFailure {
                call: "flush_mapped_memory_ranges",
                result: e,
            }
            .into());
        }
    }
    device.unmap_memory(img.memory);
    Ok(())
}

/// Transient state while a plan runs. Anything still held when the upload
/// fails is released by `abort`.
struct Upload {
    host: Option<ImageAlloc>,
    device_image: Option<ImageAlloc>,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
    extent: vk::Extent2D,
}

impl Upload {
    unsafe fn begin(ctx: &DeviceContext) -> Result<(vk::CommandPool, vk::CommandBuffer), VkFailure> {
        let device = ctx.device();
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: ctx.queue_family(),
            flags: vk::CommandPoolCreateFlags::TRANSIENT,
            ..Default::default()
        };
        let pool = device
            .create_command_pool(&pool_info, None)
            .vk_context("create_command_pool")?;
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = match device.allocate_command_buffers(&ai) {
            Ok(v) => v[0],
            Err(e) => {
                device.destroy_command_pool(pool, None);
                return Err(VkFailure {
                    call: "allocate_command_buffers",
                    result: e,
                });
            }
        };
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        if let Err(e) = device.begin_command_buffer(cmd, &bi) {
            device.destroy_command_pool(pool, None);
            return Err(VkFailure {
                call: "begin_command_buffer",
                result: e,
            });
        }
        Ok((pool, cmd))
    }

    fn image(&self, which: UploadImage) -> Option<vk::Image> {
        match which {
            UploadImage::Host => self.host.map(|i| i.image),
            UploadImage::Device => self.device_image.map(|i| i.image),
        }
    }

    unsafe fn run(&mut self, ctx: &DeviceContext, plan: &UploadPlan) -> Result<(), ResourceError> {
        let device = ctx.device();
        for step in &plan.steps {
            debug!("texture upload: {step:?}");
            match *step {
                UploadStep::Transition(t) => {
                    let Some(image) = self.image(t.image) else {
                        continue;
                    };
                    let (src_access, dst_access) = transition_access_masks(t.old, t.new);
                    let barrier = vk::ImageMemoryBarrier {
                        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
                        src_access_mask: src_access,
                        dst_access_mask: dst_access,
                        old_layout: t.old,
                        new_layout: t.new,
                        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                        image,
                        subresource_range: COLOR_RANGE,
                        ..Default::default()
                    };
                    device.cmd_pipeline_barrier(
                        self.cmd,
                        t.src_stage,
                        t.dst_stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        std::slice::from_ref(&barrier),
                    );
                }
                UploadStep::CopyHostToDevice => {
                    let (Some(src), Some(dst)) = (
                        self.image(UploadImage::Host),
                        self.image(UploadImage::Device),
                    ) else {
                        continue;
                    };
                    let region = vk::ImageCopy {
                        src_subresource: COLOR_LAYERS,
                        src_offset: vk::Offset3D::default(),
                        dst_subresource: COLOR_LAYERS,
                        dst_offset: vk::Offset3D::default(),
                        extent: vk::Extent3D {
                            width: self.extent.width,
                            height: self.extent.height,
                            depth: 1,
                        },
                    };
                    device.cmd_copy_image(
                        self.cmd,
                        src,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        dst,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        std::slice::from_ref(&region),
                    );
                }
                UploadStep::SubmitAndWait => {
                    device
                        .end_command_buffer(self.cmd)
                        .vk_context("end_command_buffer")?;
                    let fci = vk::FenceCreateInfo {
                        s_type: vk::StructureType::FENCE_CREATE_INFO,
                        ..Default::default()
                    };
                    self.fence = device.create_fence(&fci, None).vk_context("create_fence")?;
                    let si = vk::SubmitInfo {
                        s_type: vk::StructureType::SUBMIT_INFO,
                        command_buffer_count: 1,
                        p_command_buffers: &self.cmd,
                        ..Default::default()
                    };
                    device
                        .queue_submit(ctx.queue(), std::slice::from_ref(&si), self.fence)
                        .vk_context("queue_submit")?;
                    match device.wait_for_fences(&[self.fence], true, TEXTURE_UPLOAD_TIMEOUT_NS) {
                        Ok(()) => {}
                        Err(vk::Result::TIMEOUT) => {
                            return Err(ResourceError::UploadTimeout {
                                timeout_ns: TEXTURE_UPLOAD_TIMEOUT_NS,
                            })
                        }
                        Err(e) => {
                            return Err(VkFailure {
                                call: "wait_for_fences",
                                result: e,
                            }
                            .into())
                        }
                    }
                }
                UploadStep::DestroyCommandPool => self.release_commands(device),
                UploadStep::DestroyStaging => {
                    if let Some(staging) = self.host.take() {
                        staging.destroy(device);
                    }
                }
            }
        }
        Ok(())
    }

    unsafe fn release_commands(&mut self, device: &ash::Device) {
        if self.fence != vk::Fence::null() {
            device.destroy_fence(self.fence, None);
            self.fence = vk::Fence::null();
        }
        if self.pool != vk::CommandPool::null() {
            device.free_command_buffers(self.pool, std::slice::from_ref(&self.cmd));
            device.destroy_command_pool(self.pool, None);
            self.pool = vk::CommandPool::null();
            self.cmd = vk::CommandBuffer::null();
        }
    }

    unsafe fn abort(mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        device.device_wait_idle().ok();
        self.release_commands(device);
        if let Some(i) = self.host.take() {
            i.destroy(device);
        }
        if let Some(i) = self.device_image.take() {
            i.destroy(device);
        }
    }
}

/// Decodes `bytes` (any format the `image` crate reads, PNG in practice) and
/// uploads it as a sampled texture. `required_props` applies to the
/// host-written image; host visibility is always added.
pub unsafe fn load_texture(
    ctx: &DeviceContext,
    bytes: &[u8],
    format: vk::Format,
    required_props: vk::MemoryPropertyFlags,
) -> Result<Texture, ResourceError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let extent = vk::Extent2D { width, height };

    let path = UploadPath::select(&ctx.format_properties(format), format)?;
    let plan = UploadPlan::new(path);
    info!("texture: {width}x{height} {format:?} via {path:?}");

    let host_usage = match path {
        UploadPath::Linear => vk::ImageUsageFlags::SAMPLED,
        UploadPath::Staged => vk::ImageUsageFlags::TRANSFER_SRC,
    };
    let (host, host_flags) = create_image(
        ctx,
        format,
        extent,
        vk::ImageTiling::LINEAR,
        host_usage,
        vk::ImageLayout::PREINITIALIZED,
        required_props | vk::MemoryPropertyFlags::HOST_VISIBLE,
    )?;
    if let Err(e) = write_rows(ctx, host, host_flags, rgba.as_raw(), width, height) {
        host.destroy(ctx.device());
        return Err(e);
    }

    let device_image = match path {
        UploadPath::Linear => None,
        UploadPath::Staged => match create_image(
            ctx,
            format,
            extent,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageLayout::UNDEFINED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok((img, _)) => Some(img),
            Err(e) => {
                host.destroy(ctx.device());
                return Err(e);
            }
        },
    };

    let (pool, cmd) = match Upload::begin(ctx) {
        Ok(pc) => pc,
        Err(e) => {
            host.destroy(ctx.device());
            if let Some(d) = device_image {
                d.destroy(ctx.device());
            }
            return Err(e.into());
        }
    };

    let mut upload = Upload {
        host: Some(host),
        device_image,
        pool,
        cmd,
        fence: vk::Fence::null(),
        extent,
    };
    if let Err(e) = upload.run(ctx, &plan) {
        upload.abort(ctx);
        return Err(e);
    }

    let final_alloc = match plan.final_image() {
        UploadImage::Host => upload.host.take(),
        UploadImage::Device => upload.device_image.take(),
    };
    let Some(final_alloc) = final_alloc else {
        upload.abort(ctx);
        return Err(ResourceError::UnsupportedTextureFormat(format));
    };
    // Plan fully ran: staging and command objects are gone.
    debug_assert!(upload.host.is_none() && upload.pool == vk::CommandPool::null());

    let mut texture = Texture {
        image: final_alloc.image,
        memory: final_alloc.memory,
        view: vk::ImageView::null(),
        sampler: vk::Sampler::null(),
        format,
        layout: plan.final_layout(),
        tiling: plan.final_tiling(),
        width,
        height,
    };
    if let Err(e) = create_view_and_sampler(ctx, &mut texture) {
        texture.destroy(ctx.device());
        return Err(e);
    }
    Ok(texture)
}

/// Nearest filtering, repeat addressing, no anisotropy.
fn sampler_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::NEAREST,
        min_filter: vk::Filter::NEAREST,
        mipmap_mode: vk::SamplerMipmapMode::NEAREST,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        mip_lod_bias: 0.0,
        anisotropy_enable: vk::FALSE,
        max_anisotropy: 1.0,
        compare_op: vk::CompareOp::NEVER,
        min_lod: 0.0,
        max_lod: 0.0,
        border_color: vk::BorderColor::FLOAT_OPAQUE_WHITE,
        unnormalized_coordinates: vk::FALSE,
        ..Default::default()
    }
}

unsafe fn create_view_and_sampler(ctx: &DeviceContext, tex: &mut Texture) -> Result<(), ResourceError> {
    let device = ctx.device();
    let sampler_ci = sampler_info();
    tex.sampler = device
        .create_sampler(&sampler_ci, None)
        .vk_context("create_sampler")?;

    let view_ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image: tex.image,
        view_type: vk::ImageViewType::TYPE_2D,
        format: tex.format,
        components: vk::ComponentMapping {
            r: vk::ComponentSwizzle::R,
            g: vk::ComponentSwizzle::G,
            b: vk::ComponentSwizzle::B,
            a: vk::ComponentSwizzle::A,
        },
        subresource_range: COLOR_RANGE,
        ..Default::default()
    };
    tex.view = device
        .create_image_view(&view_ci, None)
        .vk_context("create_image_view")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(linear: vk::FormatFeatureFlags, optimal: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            linear_tiling_features: linear,
            optimal_tiling_features: optimal,
            ..Default::default()
        }
    }

    #[test]
    fn path_follows_sampling_support() {
        let sampled = vk::FormatFeatureFlags::SAMPLED_IMAGE;
        let none = vk::FormatFeatureFlags::empty();
        assert_eq!(
            UploadPath::select(&features(sampled, sampled), TEXTURE_FORMAT).unwrap(),
            UploadPath::Linear
        );
        assert_eq!(
            UploadPath::select(&features(none, sampled), TEXTURE_FORMAT).unwrap(),
            UploadPath::Staged
        );
        assert!(matches!(
            UploadPath::select(&features(none, none), TEXTURE_FORMAT),
            Err(ResourceError::UnsupportedTextureFormat(f)) if f == TEXTURE_FORMAT
        ));
    }

    #[test]
    fn staged_plan_ends_optimal_and_shader_readable() {
        let plan = UploadPlan::new(UploadPath::Staged);
        assert_eq!(plan.final_image(), UploadImage::Device);
        assert_eq!(plan.final_tiling(), vk::ImageTiling::OPTIMAL);
        assert_eq!(plan.final_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn staging_is_destroyed_only_after_the_wait() {
        let plan = UploadPlan::new(UploadPath::Staged);
        let pos = |step: UploadStep| plan.steps.iter().position(|s| *s == step).unwrap();
        let wait = pos(UploadStep::SubmitAndWait);
        assert!(pos(UploadStep::CopyHostToDevice) < wait);
        assert!(pos(UploadStep::DestroyCommandPool) > wait);
        assert!(pos(UploadStep::DestroyStaging) > wait);
        assert_eq!(plan.steps.last(), Some(&UploadStep::DestroyStaging));
    }

    #[test]
    fn staged_transitions_use_transfer_layouts() {
        let plan = UploadPlan::new(UploadPath::Staged);
        let transitions: Vec<_> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                UploadStep::Transition(t) => Some((t.image, t.old, t.new)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (
                    UploadImage::Host,
                    vk::ImageLayout::PREINITIALIZED,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL
                ),
                (
                    UploadImage::Device,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL
                ),
                (
                    UploadImage::Device,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                ),
            ]
        );
    }

    #[test]
    fn linear_plan_is_a_single_transition() {
        let plan = UploadPlan::new(UploadPath::Linear);
        assert_eq!(plan.final_tiling(), vk::ImageTiling::LINEAR);
        assert_eq!(plan.final_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert!(!plan.steps.contains(&UploadStep::DestroyStaging));
        assert!(!plan.steps.contains(&UploadStep::CopyHostToDevice));
        let n = plan
            .steps
            .iter()
            .filter(|s| matches!(s, UploadStep::Transition(_)))
            .count();
        assert_eq!(n, 1);
    }

    #[test]
    fn access_masks() {
        use vk::AccessFlags as A;
        use vk::ImageLayout as L;
        assert_eq!(
            transition_access_masks(L::PREINITIALIZED, L::SHADER_READ_ONLY_OPTIMAL),
            (A::HOST_WRITE, A::SHADER_READ)
        );
        assert_eq!(
            transition_access_masks(L::PREINITIALIZED, L::TRANSFER_SRC_OPTIMAL),
            (A::HOST_WRITE, A::TRANSFER_READ)
        );
        assert_eq!(
            transition_access_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL),
            (A::empty(), A::TRANSFER_WRITE)
        );
        assert_eq!(
            transition_access_masks(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL),
            (A::TRANSFER_WRITE, A::SHADER_READ)
        );
        assert_eq!(
            transition_access_masks(L::COLOR_ATTACHMENT_OPTIMAL, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            (A::COLOR_ATTACHMENT_WRITE, A::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
        assert_eq!(
            transition_access_masks(L::UNDEFINED, L::PRESENT_SRC_KHR),
            (A::empty(), A::empty())
        );
    }

    #[test]
    fn sampler_is_nearest_repeat_without_anisotropy() {
        let ci = sampler_info();
        assert_eq!(ci.anisotropy_enable, vk::FALSE);
        assert_eq!(ci.max_anisotropy, 1.0);
        assert_eq!(ci.mag_filter, vk::Filter::NEAREST);
        assert_eq!(ci.min_filter, vk::Filter::NEAREST);
        assert_eq!(ci.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(ci.address_mode_v, vk::SamplerAddressMode::REPEAT);
    }
}

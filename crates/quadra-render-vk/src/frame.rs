// SPDX-License-Identifier: CEPL-1.0
//! Per-frame scheduling.
//!
//! [`FrameScheduler`] owns the frame state machine (slot index, deferred
//! recreation, phase) and drives anything implementing [`FrameTarget`]. The
//! Vulkan renderer is one such target; the tests use a recording fake.
use ash::vk;
use quadra_math::{prerotation_matrix, SurfaceTransform};
use quadra_render::FrameOutcome;
use tracing::{debug, warn};

use crate::device::DeviceContext;
use crate::error::{RenderError, ResourceError, VkFailure, VkResultExt};
use crate::memory::{create_buffer, AllocatedBuffer};
use crate::pipeline::{SAMPLER_BINDING, UBO_BINDING};
use crate::texture::Texture;

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Image(u32),
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// The device-facing half of a frame. Each call maps to one step of the
/// acquire -> record -> submit -> present sequence for `slot`.
pub trait FrameTarget {
    fn is_ready(&self) -> bool;
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError>;
    fn acquire_image(&mut self, slot: usize) -> Result<Acquired, RenderError>;
    fn update_uniforms(&mut self, slot: usize) -> Result<(), RenderError>;
    /// Resets the slot fence and command buffer, records and submits.
    fn record_and_submit(&mut self, slot: usize, image: u32) -> Result<(), RenderError>;
    fn present(&mut self, slot: usize, image: u32) -> Result<Presented, RenderError>;
    fn recreate_swapchain(&mut self) -> Result<(), RenderError>;
}

#[derive(Debug)]
pub struct FrameScheduler {
    frames_in_flight: usize,
    slot: usize,
    recreate_pending: bool,
    phase: FramePhase,
    presented: u64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_IN_FLIGHT)
    }
}

impl FrameScheduler {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            slot: 0,
            recreate_pending: false,
            phase: FramePhase::Idle,
            presented: 0,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
    pub fn slot(&self) -> usize {
        self.slot
    }
    pub fn phase(&self) -> FramePhase {
        self.phase
    }
    pub fn recreate_pending(&self) -> bool {
        self.recreate_pending
    }
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    /// Rebuild the swapchain at the start of the next frame instead of drawing.
    pub fn request_recreate(&mut self) {
        self.recreate_pending = true;
    }

    /// Back to slot 0 with nothing pending (new device, new slots).
    pub fn reset(&mut self) {
        self.slot = 0;
        self.recreate_pending = false;
        self.phase = FramePhase::Idle;
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait slot fence (CPU may reuse slot resources after this)
    // 2) acquire (signals slot image-available)
    // 3) write slot UBO
    // 4) reset fence + command buffer, record, submit (signals render-finished + fence)
    // 5) present (waits render-finished)
    // The fence is reset only after a successful acquire, so an early return
    // leaves it signaled and the next wait cannot deadlock.
    pub fn run_frame<T: FrameTarget + ?Sized>(&mut self, target: &mut T) -> Result<FrameOutcome, RenderError> {
        if !target.is_ready() {
            return Ok(FrameOutcome::Skipped);
        }
        let out = self.drive(target);
        self.phase = FramePhase::Idle;
        out
    }

    /// A target that is still not ready after recreating (surface with no
    /// extent) keeps the request pending and reports `Skipped`.
    fn recreate<T: FrameTarget + ?Sized>(&mut self, target: &mut T) -> Result<FrameOutcome, RenderError> {
        target.recreate_swapchain()?;
        if target.is_ready() {
            self.recreate_pending = false;
            Ok(FrameOutcome::Recreated)
        } else {
            debug!("frame: surface not presentable, recreation stays pending");
            self.recreate_pending = true;
            Ok(FrameOutcome::Skipped)
        }
    }

    fn drive<T: FrameTarget + ?Sized>(&mut self, target: &mut T) -> Result<FrameOutcome, RenderError> {
        if self.recreate_pending {
            debug!("frame: deferred swapchain recreation");
            return self.recreate(target);
        }

        let slot = self.slot;
        self.phase = FramePhase::Acquiring;
        target.wait_for_slot(slot)?;
        let image = match target.acquire_image(slot)? {
            Acquired::Image(i) => i,
            Acquired::OutOfDate => {
                debug!("frame: acquire out of date, recreating");
                return self.recreate(target);
            }
        };

        self.phase = FramePhase::Recording;
        target.update_uniforms(slot)?;
        target.record_and_submit(slot, image)?;
        self.phase = FramePhase::Submitted;

        self.phase = FramePhase::Presenting;
        match target.present(slot, image)? {
            Presented::Optimal => {}
            Presented::Suboptimal => {
                debug!("frame: present suboptimal, recreation deferred");
                self.recreate_pending = true;
            }
            Presented::OutOfDate => {
                warn!("frame: present out of date, recreating");
                // the frame was submitted either way; an empty surface only
                // keeps the recreation pending
                self.recreate(target)?;
            }
        }

        self.slot = (self.slot + 1) % self.frames_in_flight;
        self.presented += 1;
        Ok(FrameOutcome::Presented)
    }
}

/// Per-slot uniform payload: the prerotation matrix, column-major.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformUbo {
    pub mvp: [[f32; 4]; 4],
}

impl TransformUbo {
    /// Counter-rotates the quad for the transform the swapchain was built with.
    pub fn for_transform(transform: vk::SurfaceTransformFlagsKHR) -> Self {
        let t = SurfaceTransform::from_bits_truncate(transform.as_raw());
        Self {
            mvp: prerotation_matrix(t).to_cols_array_2d(),
        }
    }
}

/// Everything one in-flight slot owns.
#[derive(Debug)]
pub struct FrameSyncSet {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
    pub ubo: AllocatedBuffer,
    pub descriptor_set: vk::DescriptorSet,
    /// The fence is signaled or has a submission that will signal it.
    /// Cleared between `reset_fences` and a successful `queue_submit`.
    pub fence_awaitable: bool,
}

/// Slot resources plus the pools they are allocated from.
pub struct FrameSlots {
    pub command_pool: vk::CommandPool,
    pub descriptor_pool: vk::DescriptorPool,
    pub slots: Vec<FrameSyncSet>,
}

impl FrameSlots {
    pub fn empty() -> Self {
        Self {
            command_pool: vk::CommandPool::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            slots: Vec::new(),
        }
    }

    pub unsafe fn new(
        ctx: &DeviceContext,
        set_layout: vk::DescriptorSetLayout,
        texture: &Texture,
        count: usize,
    ) -> Result<Self, RenderError> {
        let device = ctx.device();
        let mut frames = Self::empty();
        if let Err(e) = frames.build(ctx, set_layout, texture, count) {
            device.device_wait_idle().ok();
            frames.destroy(device);
            return Err(e);
        }
        Ok(frames)
    }

    unsafe fn build(
        &mut self,
        ctx: &DeviceContext,
        set_layout: vk::DescriptorSetLayout,
        texture: &Texture,
        count: usize,
    ) -> Result<(), RenderError> {
        let device = ctx.device();
        let n = count as u32;

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: ctx.queue_family(),
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        self.command_pool = device
            .create_command_pool(&pool_info, None)
            .vk_context("create_command_pool")?;
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: n,
            ..Default::default()
        };
        let cmd_bufs = device
            .allocate_command_buffers(&alloc_info)
            .vk_context("allocate_command_buffers")?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: n,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: n,
            },
        ];
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: n,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        self.descriptor_pool = device
            .create_descriptor_pool(&pool_ci, None)
            .vk_context("create_descriptor_pool")?;
        let layouts = vec![set_layout; count];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.descriptor_pool,
            descriptor_set_count: n,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = device
            .allocate_descriptor_sets(&alloc)
            .vk_context("allocate_descriptor_sets")?;

        let sem_ci = vk::SemaphoreCreateInfo::default();
        // Signaled, so the first wait on each slot returns immediately.
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let ubo_size = std::mem::size_of::<TransformUbo>() as vk::DeviceSize;

        for (cmd, set) in cmd_bufs.into_iter().zip(sets) {
            let ubo = create_buffer(
                ctx,
                ubo_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            // Push first so a failure below still tears this slot down.
            self.slots.push(FrameSyncSet {
                image_available: vk::Semaphore::null(),
                render_finished: vk::Semaphore::null(),
                in_flight: vk::Fence::null(),
                command_buffer: cmd,
                ubo,
                descriptor_set: set,
                fence_awaitable: false,
            });
            let last = self.slots.len() - 1;
            let slot = &mut self.slots[last];
            slot.image_available = device
                .create_semaphore(&sem_ci, None)
                .vk_context("create_semaphore")?;
            slot.render_finished = device
                .create_semaphore(&sem_ci, None)
                .vk_context("create_semaphore")?;
            slot.in_flight = device
                .create_fence(&fence_ci, None)
                .vk_context("create_fence")?;
            slot.fence_awaitable = true;

            let buffer_info = vk::DescriptorBufferInfo {
                buffer: slot.ubo.buffer,
                offset: 0,
                range: ubo_size,
            };
            let image_info = vk::DescriptorImageInfo {
                sampler: texture.sampler,
                image_view: texture.view,
                image_layout: texture.layout,
            };
            let writes = [
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: UBO_BINDING,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    p_buffer_info: &buffer_info,
                    ..Default::default()
                },
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: SAMPLER_BINDING,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    p_image_info: &image_info,
                    ..Default::default()
                },
            ];
            device.update_descriptor_sets(&writes, &[]);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub unsafe fn write_ubo(&self, device: &ash::Device, slot: usize, ubo: &TransformUbo) -> Result<(), ResourceError> {
        self.slots[slot].ubo.write_pod(device, ubo)
    }

    /// Fences that will eventually signal. A fence reset for a submission
    /// that then failed would block forever and is left out.
    pub fn awaitable_fences(&self) -> Vec<vk::Fence> {
        self.slots
            .iter()
            .filter(|s| s.fence_awaitable && s.in_flight != vk::Fence::null())
            .map(|s| s.in_flight)
            .collect()
    }

    /// Waits every awaitable slot fence. Used before teardown.
    pub unsafe fn wait_all(&self, device: &ash::Device) -> Result<(), VkFailure> {
        let fences = self.awaitable_fences();
        if fences.is_empty() {
            return Ok(());
        }
        device
            .wait_for_fences(&fences, true, u64::MAX)
            .vk_context("wait_for_fences")
    }

    /// Caller guarantees the device is idle.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for mut s in self.slots.drain(..) {
            if s.in_flight != vk::Fence::null() {
                device.destroy_fence(s.in_flight, None);
            }
            if s.render_finished != vk::Semaphore::null() {
                device.destroy_semaphore(s.render_finished, None);
            }
            if s.image_available != vk::Semaphore::null() {
                device.destroy_semaphore(s.image_available, None);
            }
            s.ubo.destroy(device);
        }
        // Sets and command buffers go with their pools.
        if self.descriptor_pool != vk::DescriptorPool::null() {
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.descriptor_pool = vk::DescriptorPool::null();
        }
        if self.command_pool != vk::CommandPool::null() {
            device.destroy_command_pool(self.command_pool, None);
            self.command_pool = vk::CommandPool::null();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Uniforms(usize),
        Submit(usize, u32),
        Present(usize, u32),
        Recreate,
    }

    #[derive(Default)]
    struct FakeTarget {
        ready: bool,
        /// Recreation finds a surface with no extent.
        surface_empty: bool,
        calls: Vec<Call>,
        acquires: VecDeque<Acquired>,
        presents: VecDeque<Presented>,
        next_image: u32,
        images: u32,
    }

    impl FakeTarget {
        fn ready(images: u32) -> Self {
            Self {
                ready: true,
                images,
                ..Default::default()
            }
        }
    }

    impl FrameTarget for FakeTarget {
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }
        fn acquire_image(&mut self, slot: usize) -> Result<Acquired, RenderError> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let i = self.next_image;
                self.next_image = (self.next_image + 1) % self.images;
                Acquired::Image(i)
            }))
        }
        fn update_uniforms(&mut self, slot: usize) -> Result<(), RenderError> {
            self.calls.push(Call::Uniforms(slot));
            Ok(())
        }
        fn record_and_submit(&mut self, slot: usize, image: u32) -> Result<(), RenderError> {
            self.calls.push(Call::Submit(slot, image));
            Ok(())
        }
        fn present(&mut self, slot: usize, image: u32) -> Result<Presented, RenderError> {
            self.calls.push(Call::Present(slot, image));
            Ok(self.presents.pop_front().unwrap_or(Presented::Optimal))
        }
        fn recreate_swapchain(&mut self) -> Result<(), RenderError> {
            self.calls.push(Call::Recreate);
            if self.surface_empty {
                self.ready = false;
            }
            Ok(())
        }
    }

    #[test]
    fn not_ready_is_skipped_without_side_effects() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::default();
        sched.request_recreate();
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Skipped);
        assert!(target.calls.is_empty());
        assert_eq!(sched.slot(), 0);
        assert!(sched.recreate_pending());
    }

    #[test]
    fn one_frame_runs_steps_in_order() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(3);
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert_eq!(
            target.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Uniforms(0),
                Call::Submit(0, 0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(sched.phase(), FramePhase::Idle);
    }

    #[test]
    fn slot_wraps_after_n_frames() {
        for n in 1..=4 {
            let mut sched = FrameScheduler::new(n);
            let mut target = FakeTarget::ready(3);
            let start = sched.slot();
            for i in 0..n {
                assert_eq!(sched.slot(), i % n);
                sched.run_frame(&mut target).unwrap();
            }
            assert_eq!(sched.slot(), start);
            assert_eq!(sched.presented_frames(), n as u64);
        }
    }

    #[test]
    fn zero_frames_in_flight_is_clamped() {
        assert_eq!(FrameScheduler::new(0).frames_in_flight(), 1);
    }

    #[test]
    fn suboptimal_present_defers_recreation() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(2);
        target.presents.push_back(Presented::Suboptimal);

        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert!(sched.recreate_pending());
        assert!(!target.calls.contains(&Call::Recreate));

        target.calls.clear();
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Recreated);
        assert_eq!(target.calls, vec![Call::Recreate]);
        assert!(!sched.recreate_pending());

        target.calls.clear();
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert_eq!(target.calls.first(), Some(&Call::Wait(1)));
    }

    #[test]
    fn out_of_date_acquire_recreates_and_keeps_slot() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(2);
        target.acquires.push_back(Acquired::OutOfDate);

        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Recreated);
        assert_eq!(target.calls, vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]);
        assert_eq!(sched.slot(), 0);
        assert_eq!(sched.phase(), FramePhase::Idle);
    }

    #[test]
    fn out_of_date_present_recreates_immediately() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(2);
        target.presents.push_back(Presented::OutOfDate);

        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert_eq!(target.calls.last(), Some(&Call::Recreate));
        assert!(!sched.recreate_pending());
        assert_eq!(sched.slot(), 1);
    }

    #[test]
    fn host_resize_request_recreates_before_drawing() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(2);
        sched.request_recreate();
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Recreated);
        assert_eq!(target.calls, vec![Call::Recreate]);
    }

    #[test]
    fn errors_leave_scheduler_idle() {
        struct Failing;
        impl FrameTarget for Failing {
            fn is_ready(&self) -> bool {
                true
            }
            fn wait_for_slot(&mut self, _: usize) -> Result<(), RenderError> {
                Err(VkFailure {
                    call: "wait_for_fences",
                    result: vk::Result::ERROR_DEVICE_LOST,
                }
                .into())
            }
            fn acquire_image(&mut self, _: usize) -> Result<Acquired, RenderError> {
                unreachable!()
            }
            fn update_uniforms(&mut self, _: usize) -> Result<(), RenderError> {
                unreachable!()
            }
            fn record_and_submit(&mut self, _: usize, _: u32) -> Result<(), RenderError> {
                unreachable!()
            }
            fn present(&mut self, _: usize, _: u32) -> Result<Presented, RenderError> {
                unreachable!()
            }
            fn recreate_swapchain(&mut self) -> Result<(), RenderError> {
                unreachable!()
            }
        }

        let mut sched = FrameScheduler::new(2);
        let err = sched.run_frame(&mut Failing).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(sched.phase(), FramePhase::Idle);
        assert_eq!(sched.slot(), 0);
    }

    #[test]
    fn ubo_is_one_mat4() {
        assert_eq!(std::mem::size_of::<TransformUbo>(), 64);
    }

    #[test]
    fn rotated_swapchain_gets_quarter_turn_ubo() {
        let ubo = TransformUbo::for_transform(vk::SurfaceTransformFlagsKHR::ROTATE_90);
        assert_eq!(ubo.mvp[0], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(ubo.mvp[1], [-1.0, 0.0, 0.0, 0.0]);
        let id = TransformUbo::for_transform(vk::SurfaceTransformFlagsKHR::IDENTITY);
        assert_eq!(id.mvp, quadra_math::Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn recreate_against_empty_surface_is_skipped_and_stays_pending() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(3);
        target.surface_empty = true;
        sched.request_recreate();

        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Skipped);
        assert!(sched.recreate_pending());
        assert_eq!(target.calls, vec![Call::Recreate]);

        // still empty: nothing else is touched
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Skipped);
        assert_eq!(target.calls, vec![Call::Recreate]);

        // surface back: the pending recreation runs first
        target.surface_empty = false;
        target.ready = true;
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Recreated);
        assert!(!sched.recreate_pending());
        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Presented);
    }

    #[test]
    fn acquire_out_of_date_on_empty_surface_is_skipped() {
        let mut sched = FrameScheduler::new(2);
        let mut target = FakeTarget::ready(3);
        target.surface_empty = true;
        target.acquires.push_back(Acquired::OutOfDate);

        assert_eq!(sched.run_frame(&mut target).unwrap(), FrameOutcome::Skipped);
        assert!(sched.recreate_pending());
        assert_eq!(sched.slot(), 0);
    }

    fn slot(fence: u64, awaitable: bool) -> FrameSyncSet {
        use ash::vk::Handle;
        FrameSyncSet {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::from_raw(fence),
            command_buffer: vk::CommandBuffer::null(),
            ubo: AllocatedBuffer {
                buffer: vk::Buffer::null(),
                memory: vk::DeviceMemory::null(),
                size: 0,
            },
            descriptor_set: vk::DescriptorSet::null(),
            fence_awaitable: awaitable,
        }
    }

    #[test]
    fn teardown_skips_fences_reset_for_a_failed_submit() {
        use ash::vk::Handle;
        let mut frames = FrameSlots::empty();
        frames.slots.push(slot(1, true));
        frames.slots.push(slot(2, false));
        frames.slots.push(slot(0, true));
        assert_eq!(frames.awaitable_fences(), vec![vk::Fence::from_raw(1)]);
        assert_eq!(frames.len(), 3);
    }
}

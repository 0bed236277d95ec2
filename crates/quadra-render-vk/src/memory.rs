// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use bytemuck::Pod;

use crate::device::DeviceContext;
use crate::error::{ResourceError, VkFailure, VkResultExt};

/// First memory type allowed by `type_filter` whose flags contain `required`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32, ResourceError> {
    let count = props.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    for i in 0..count {
        let ok = (type_filter & (1 << i)) != 0
            && props.memory_types[i as usize].property_flags.contains(required);
        if ok {
            return Ok(i);
        }
    }
    Err(ResourceError::NoCompatibleMemoryType {
        type_filter,
        required,
    })
}

/// A buffer plus its dedicated allocation.
#[derive(Debug)]
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

pub unsafe fn create_buffer(
    ctx: &DeviceContext,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    props: vk::MemoryPropertyFlags,
) -> Result<AllocatedBuffer, ResourceError> {
    let device = ctx.device();
    let bci = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let buffer = device.create_buffer(&bci, None).vk_context("create_buffer")?;
    let req = device.get_buffer_memory_requirements(buffer);
    let mem_type = match find_memory_type(ctx.memory_properties(), req.memory_type_bits, props) {
        Ok(t) => t,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(e);
        }
    };
    let mai = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index: mem_type,
        ..Default::default()
    };
    let memory = match device.allocate_memory(&mai, None) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(VkFailure { call: "allocate_memory", result: e }.into());
        }
    };
    if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
        device.destroy_buffer(buffer, None);
        device.free_memory(memory, None);
        return Err(VkFailure { call: "bind_buffer_memory", result: e }.into());
    }
    Ok(AllocatedBuffer {
        buffer,
        memory,
        size,
    })
}

impl AllocatedBuffer {
    /// Map, copy, unmap. The buffer must live in host-visible, coherent memory.
    pub unsafe fn write_pod<T: Pod>(&self, device: &ash::Device, value: &T) -> Result<(), ResourceError> {
        let bytes = bytemuck::bytes_of(value);
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);
        let ptr = device
            .map_memory(
                self.memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )
            .vk_context("map_memory")?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
        device.unmap_memory(self.memory);
        Ok(())
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.buffer != vk::Buffer::null() {
            device.destroy_buffer(self.buffer, None);
            self.buffer = vk::Buffer::null();
        }
        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory, None);
            self.memory = vk::DeviceMemory::null();
        }
    }
}

/// Allocates and binds memory for `image`. Returns the allocation and the
/// flags of the memory type actually chosen.
pub unsafe fn allocate_image_memory(
    ctx: &DeviceContext,
    image: vk::Image,
    props: vk::MemoryPropertyFlags,
) -> Result<(vk::DeviceMemory, vk::MemoryPropertyFlags), ResourceError> {
    let device = ctx.device();
    let req = device.get_image_memory_requirements(image);
    let mem_type = find_memory_type(ctx.memory_properties(), req.memory_type_bits, props)?;
    let mai = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index: mem_type,
        ..Default::default()
    };
    let memory = device
        .allocate_memory(&mai, None)
        .vk_context("allocate_memory")?;
    if let Err(e) = device.bind_image_memory(image, memory, 0) {
        device.free_memory(memory, None);
        return Err(VkFailure { call: "bind_image_memory", result: e }.into());
    }
    let flags = ctx.memory_properties().memory_types[mem_type as usize].property_flags;
    Ok((memory, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut p = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            p.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        p
    }

    const DL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HV: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HC: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;

    #[test]
    fn picks_first_matching_type() {
        let p = props(&[DL, HV | HC, HV | HC | DL]);
        assert_eq!(find_memory_type(&p, 0b111, HV).unwrap(), 1);
        assert_eq!(find_memory_type(&p, 0b111, DL).unwrap(), 0);
        assert_eq!(find_memory_type(&p, 0b111, HV | DL).unwrap(), 2);
    }

    #[test]
    fn respects_type_filter() {
        let p = props(&[HV | HC, HV | HC]);
        assert_eq!(find_memory_type(&p, 0b10, HV).unwrap(), 1);
    }

    #[test]
    fn picks_first_match_or_errors_when_none_exists() {
        let types = [DL, HV, HV | HC, DL | HV | HC];
        let p = props(&types);
        // bit 4 lies past memory_type_count and must never be chosen
        for filter in 0u32..32 {
            for required in [DL, HV, HC, HV | HC, DL | HV, DL | HV | HC] {
                let expected = types
                    .iter()
                    .enumerate()
                    .find(|(i, f)| filter & (1u32 << *i) != 0 && f.contains(required))
                    .map(|(i, _)| i as u32);
                match (find_memory_type(&p, filter, required), expected) {
                    (Ok(i), Some(want)) => assert_eq!(i, want, "filter {filter:#b} required {required:?}"),
                    (Err(ResourceError::NoCompatibleMemoryType { type_filter, required: r }), None) => {
                        assert_eq!(type_filter, filter);
                        assert_eq!(r, required);
                    }
                    (got, want) => panic!("filter {filter:#b} required {required:?}: got {got:?}, want {want:?}"),
                }
            }
        }
    }

    #[test]
    fn no_match_is_an_error() {
        let p = props(&[DL]);
        let err = find_memory_type(&p, 0b1, HV).unwrap_err();
        assert!(matches!(err, ResourceError::NoCompatibleMemoryType { type_filter: 1, .. }));
        // bit outside memory_type_count is ignored
        assert!(find_memory_type(&p, 0b10, DL).is_err());
    }
}

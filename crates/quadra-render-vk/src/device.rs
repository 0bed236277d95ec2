// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use quadra_math::{identity_extent, SurfaceTransform};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr};
use tracing::{debug, info, warn};

use crate::debug::{validation_wanted, DebugMessenger, VALIDATION_LAYER};
use crate::error::{DeviceError, VkFailure, VkResultExt};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub supports_present: bool,
}

impl QueueFamilyInfo {
    pub fn can_render_and_present(&self) -> bool {
        self.queue_count > 0 && self.flags.contains(vk::QueueFlags::GRAPHICS) && self.supports_present
    }
}

/// Everything we learn about one physical device while picking one.
#[derive(Clone, Debug, Default)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub surface_caps: vk::SurfaceCapabilitiesKHR,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl PhysicalDeviceInfo {
    unsafe fn query(
        instance: &Instance,
        surf_i: &surface::Instance,
        surface: vk::SurfaceKHR,
        handle: vk::PhysicalDevice,
    ) -> Result<Self, VkFailure> {
        let properties = instance.get_physical_device_properties(handle);
        let memory = instance.get_physical_device_memory_properties(handle);

        let mut queue_families = Vec::new();
        for (i, q) in instance
            .get_physical_device_queue_family_properties(handle)
            .iter()
            .enumerate()
        {
            let supports_present = surf_i
                .get_physical_device_surface_support(handle, i as u32, surface)
                .unwrap_or(false);
            queue_families.push(QueueFamilyInfo {
                flags: q.queue_flags,
                queue_count: q.queue_count,
                supports_present,
            });
        }

        let surface_formats = surf_i
            .get_physical_device_surface_formats(handle, surface)
            .vk_context("get_physical_device_surface_formats")?;
        let surface_caps = surf_i
            .get_physical_device_surface_capabilities(handle, surface)
            .vk_context("get_physical_device_surface_capabilities")?;
        let present_modes = surf_i
            .get_physical_device_surface_present_modes(handle, surface)
            .vk_context("get_physical_device_surface_present_modes")?;

        Ok(Self {
            handle,
            properties,
            memory,
            queue_families,
            surface_formats,
            surface_caps,
            present_modes,
        })
    }

    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_owned())
    }

    fn log(&self) {
        let api = self.properties.api_version;
        info!(
            "vk: device '{}' type={:?} api={}.{}.{}",
            self.name(),
            self.properties.device_type,
            vk::api_version_major(api),
            vk::api_version_minor(api),
            vk::api_version_patch(api),
        );
        for (i, q) in self.queue_families.iter().enumerate() {
            debug!(
                "  queue family {i}: count={} flags={:?} present={}",
                q.queue_count, q.flags, q.supports_present
            );
        }
        for f in &self.surface_formats {
            debug!("  surface format {:?} / {:?}", f.format, f.color_space);
        }
        debug!(
            "  surface usage {:?}, present modes {:?}",
            self.surface_caps.supported_usage_flags, self.present_modes
        );
    }
}

/// First (device, queue family) pair with GRAPHICS and present support.
pub fn select_queue_family(devices: &[PhysicalDeviceInfo]) -> Option<(usize, u32)> {
    devices.iter().enumerate().find_map(|(d, info)| {
        info.queue_families
            .iter()
            .position(QueueFamilyInfo::can_render_and_present)
            .map(|q| (d, q as u32))
    })
}

/// Rewrites capabilities into the identity orientation: for quarter-turn
/// transforms the extents are reported rotated, so width and height swap.
pub fn identity_capabilities(mut caps: vk::SurfaceCapabilitiesKHR) -> vk::SurfaceCapabilitiesKHR {
    let t = SurfaceTransform::from_bits_truncate(caps.current_transform.as_raw());
    if !t.is_quarter_turn() {
        return caps;
    }
    for e in [
        &mut caps.current_extent,
        &mut caps.min_image_extent,
        &mut caps.max_image_extent,
    ] {
        // u32::MAX marks "surface size decided by the swapchain"; swapping
        // it is harmless since both halves carry the marker.
        let (w, h) = identity_extent(e.width, e.height, t);
        *e = vk::Extent2D {
            width: w,
            height: h,
        };
    }
    caps
}

/// Instance, surface, chosen physical device, logical device and queue.
pub struct DeviceContext {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    physical: PhysicalDeviceInfo,
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    queue_family: u32,
    queue: vk::Queue,
    surface_format: vk::SurfaceFormatKHR,
}

fn has_name(props: &[vk::ExtensionProperties], name: &CStr) -> bool {
    props
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
}

unsafe fn create_instance(
    entry: &Entry,
    display: raw_window_handle::RawDisplayHandle,
) -> Result<(Instance, bool), DeviceError> {
    let app = c"quadra";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let inst_exts = entry
        .enumerate_instance_extension_properties(None)
        .vk_context("enumerate_instance_extension_properties")?;
    let layers = entry
        .enumerate_instance_layer_properties()
        .vk_context("enumerate_instance_layer_properties")?;
    for e in &inst_exts {
        if let Ok(n) = e.extension_name_as_c_str() {
            debug!("vk: instance extension {}", n.to_string_lossy());
        }
    }
    for l in &layers {
        if let Ok(n) = l.layer_name_as_c_str() {
            debug!("vk: instance layer {}", n.to_string_lossy());
        }
    }

    let mut ext_vec: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .vk_context("enumerate_required_extensions")?
        .to_vec();
    let validation = validation_wanted(&layers, &inst_exts);
    if validation {
        ext_vec.push(ash::ext::debug_utils::NAME.as_ptr());
    } else if cfg!(debug_assertions) {
        warn!("vk: validation layer not available, continuing without it");
    }
    let layer_names = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layer_names.len() as u32, layer_names.as_ptr())
    } else {
        (0u32, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };
    let instance = entry
        .create_instance(&create_info, None)
        .vk_context("create_instance")?;
    Ok((instance, validation))
}

unsafe fn create_logical_device(
    instance: &Instance,
    phys: &PhysicalDeviceInfo,
    queue_family: u32,
) -> Result<ash::Device, DeviceError> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };

    let ext_props = instance
        .enumerate_device_extension_properties(phys.handle)
        .vk_context("enumerate_device_extension_properties")?;
    if !has_name(&ext_props, swapchain::NAME) {
        return Err(DeviceError::MissingExtension(
            swapchain::NAME.to_string_lossy().into_owned(),
        ));
    }
    let device_exts = [swapchain::NAME.as_ptr()];

    // The texture sampler is nearest/no-anisotropy; nothing optional is needed.
    let features = vk::PhysicalDeviceFeatures::default();

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };
    Ok(instance
        .create_device(phys.handle, &dinfo, None)
        .vk_context("create_device")?)
}

struct InstanceParts {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl InstanceParts {
    unsafe fn destroy(mut self) {
        self.surface_loader.destroy_surface(self.surface, None);
        if let Some(d) = self.debug.as_mut() {
            d.destroy();
        }
        self.instance.destroy_instance(None);
    }
}

impl DeviceContext {
    /// Builds everything up to the logical device.
    ///
    /// STRICT ORDER: instance -> surface from THIS instance -> physical
    /// devices queried against THIS surface -> logical device.
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
    ) -> Result<Self, DeviceError> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = Entry::load()?;
        let (instance, validation) = create_instance(&entry, dh)?;

        let debug = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("vk: debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = match ash_window::create_surface(&entry, &instance, dh, wh, None) {
            Ok(s) => s,
            Err(e) => {
                if let Some(mut d) = debug {
                    d.destroy();
                }
                instance.destroy_instance(None);
                return Err(VkFailure {
                    call: "create_surface",
                    result: e,
                }
                .into());
            }
        };

        let parts = InstanceParts {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
        };
        match Self::finish(&parts) {
            Ok((physical, device, queue_family, surface_format)) => {
                let InstanceParts {
                    entry,
                    instance,
                    debug,
                    surface_loader,
                    surface,
                } = parts;
                let swapchain_loader = swapchain::Device::new(&instance, &device);
                let queue = device.get_device_queue(queue_family, 0);
                Ok(Self {
                    entry,
                    instance,
                    debug,
                    surface_loader,
                    surface,
                    physical,
                    device,
                    swapchain_loader,
                    queue_family,
                    queue,
                    surface_format,
                })
            }
            Err(e) => {
                parts.destroy();
                Err(e)
            }
        }
    }

    unsafe fn finish(
        parts: &InstanceParts,
    ) -> Result<(PhysicalDeviceInfo, ash::Device, u32, vk::SurfaceFormatKHR), DeviceError> {
        let mut devices = Vec::new();
        for handle in parts
            .instance
            .enumerate_physical_devices()
            .vk_context("enumerate_physical_devices")?
        {
            let info =
                PhysicalDeviceInfo::query(&parts.instance, &parts.surface_loader, parts.surface, handle)?;
            info.log();
            devices.push(info);
        }

        let (idx, queue_family) =
            select_queue_family(&devices).ok_or(DeviceError::NoSuitableQueueFamily)?;
        let physical = devices.swap_remove(idx);
        let surface_format = *physical
            .surface_formats
            .first()
            .ok_or(DeviceError::NoSurfaceFormats)?;

        let device = create_logical_device(&parts.instance, &physical, queue_family)?;
        info!(
            "vk: using '{}' queue family {} format {:?} / {:?}",
            physical.name(),
            queue_family,
            surface_format.format,
            surface_format.color_space
        );
        Ok((physical, device, queue_family, surface_format))
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
    pub fn device(&self) -> &ash::Device {
        &self.device
    }
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }
    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical.memory
    }

    pub unsafe fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        self.instance
            .get_physical_device_format_properties(self.physical.handle, format)
    }

    /// Live surface capabilities, in the identity orientation.
    pub unsafe fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR, VkFailure> {
        let caps = self
            .surface_loader
            .get_physical_device_surface_capabilities(self.physical.handle, self.surface)
            .vk_context("get_physical_device_surface_capabilities")?;
        Ok(identity_capabilities(caps))
    }

    /// Re-reads the surface's preferred format. Returns whether it changed.
    pub unsafe fn refresh_surface_format(&mut self) -> Result<bool, DeviceError> {
        let formats = self
            .surface_loader
            .get_physical_device_surface_formats(self.physical.handle, self.surface)
            .vk_context("get_physical_device_surface_formats")?;
        let first = *formats.first().ok_or(DeviceError::NoSurfaceFormats)?;
        let changed = first.format != self.surface_format.format
            || first.color_space != self.surface_format.color_space;
        if changed {
            info!(
                "vk: surface format changed {:?} -> {:?}",
                self.surface_format.format, first.format
            );
        }
        self.surface_format = first;
        self.physical.surface_formats = formats;
        Ok(changed)
    }

    pub unsafe fn wait_idle(&self) -> Result<(), VkFailure> {
        self.device.device_wait_idle().vk_context("device_wait_idle")
    }
}

// STRICT TEARDOWN ORDER: device, debug messenger, surface, instance.
// Everything created from the device must already be gone.
impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            if let Some(d) = self.debug.as_mut() {
                d.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
        info!("vk: device context destroyed");
    }
}

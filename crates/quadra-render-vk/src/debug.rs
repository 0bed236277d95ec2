// SPDX-License-Identifier: CEPL-1.0
//! Validation layer plumbing. Only active in debug builds, and only when the
//! loader actually offers the layer and `VK_EXT_debug_utils`.
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use std::ffi::{c_void, CStr};
use tracing::{debug, error, info, warn};

pub(crate) const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub(crate) struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p = (*data).p_message;
    if p.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr(p).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!(target: "vulkan", "{msg}");
    } else {
        debug!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

/// Whether validation should be requested at instance creation.
pub(crate) fn validation_wanted(layers: &[vk::LayerProperties], exts: &[vk::ExtensionProperties]) -> bool {
    if !cfg!(debug_assertions) {
        return false;
    }
    let has_layer = layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
    let has_ext = exts
        .iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == debug_utils::NAME));
    has_layer && has_ext
}

impl DebugMessenger {
    pub(crate) unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self, vk::Result> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let messenger = loader.create_debug_utils_messenger(&ci, None)?;
        Ok(Self { loader, messenger })
    }

    /// Must run before the instance is destroyed.
    pub(crate) unsafe fn destroy(&mut self) {
        self.loader
            .destroy_debug_utils_messenger(self.messenger, None);
        self.messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use quadra_core::AssetError;
use thiserror::Error;

/// A single failed Vulkan entry point.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{call} failed: {result}")]
pub struct VkFailure {
    pub call: &'static str,
    pub result: vk::Result,
}

pub(crate) trait VkResultExt<T> {
    /// Tags a raw `VkResult` with the name of the call that produced it.
    fn vk_context(self, call: &'static str) -> Result<T, VkFailure>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn vk_context(self, call: &'static str) -> Result<T, VkFailure> {
        self.map_err(|result| VkFailure { call, result })
    }
}

/// Instance / surface / device setup failures. All fatal.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),
    #[error(transparent)]
    Vulkan(#[from] VkFailure),
    #[error("no physical device has a queue family with both graphics and present support")]
    NoSuitableQueueFamily,
    #[error("required device extension {0} is not available")]
    MissingExtension(String),
    #[error("surface reports no formats")]
    NoSurfaceFormats,
    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

/// Buffer / image / shader / texture setup failures. All fatal.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Vulkan(#[from] VkFailure),
    #[error("no memory type matches filter {type_filter:#x} with flags {required:?}")]
    NoCompatibleMemoryType {
        type_filter: u32,
        required: vk::MemoryPropertyFlags,
    },
    #[error("format {0:?} cannot be sampled with linear or optimal tiling")]
    UnsupportedTextureFormat(vk::Format),
    #[error("texture decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("texture upload did not finish within {timeout_ns} ns")]
    UploadTimeout { timeout_ns: u64 },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("shader {path} is not valid SPIR-V: {source}")]
    InvalidShader {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pipeline configuration: {0}")]
    InvalidPipelineConfig(&'static str),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Vulkan(#[from] VkFailure),
    #[error("renderer is not initialized")]
    NotInitialized,
}

impl RenderError {
    /// Fatal errors leave the renderer unusable until the next `init`.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Device(_) | RenderError::Resource(_) => true,
            RenderError::Vulkan(f) => !matches!(
                f.result,
                vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR | vk::Result::TIMEOUT
            ),
            RenderError::NotInitialized => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_context_keeps_call_name() {
        let r: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = r.vk_context("queue_submit").unwrap_err();
        assert_eq!(err.call, "queue_submit");
        assert!(err.to_string().starts_with("queue_submit failed"));
    }

    #[test]
    fn fatality() {
        let lost = RenderError::from(VkFailure {
            call: "queue_submit",
            result: vk::Result::ERROR_DEVICE_LOST,
        });
        assert!(lost.is_fatal());

        let stale = RenderError::from(VkFailure {
            call: "queue_present",
            result: vk::Result::ERROR_OUT_OF_DATE_KHR,
        });
        assert!(!stale.is_fatal());

        assert!(RenderError::from(DeviceError::NoSuitableQueueFamily).is_fatal());
        assert!(!RenderError::NotInitialized.is_fatal());
    }
}

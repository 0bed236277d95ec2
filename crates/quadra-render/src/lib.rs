// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use quadra_core::AssetProvider;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What a single `render()` call ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing to draw into (not initialized, or zero-sized surface).
    Skipped,
    /// The swapchain was rebuilt instead of drawing.
    Recreated,
    /// A frame was submitted and presented.
    Presented,
}

/// Lifecycle surface the host loop drives.
///
/// `init` may be called again after `cleanup`; `reset` is `cleanup` followed by
/// `init` against a new window. `render` before `init` is a no-op.
pub trait Renderer {
    fn init(
        &mut self,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        assets: &dyn AssetProvider,
    ) -> Result<()>;

    fn reset(
        &mut self,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        assets: &dyn AssetProvider,
    ) -> Result<()> {
        self.cleanup();
        self.init(window, display, assets)
    }

    fn render(&mut self) -> Result<FrameOutcome>;
    fn cleanup(&mut self);
    fn is_initialized(&self) -> bool;

    /// Host saw a resize/rotation; the swapchain is rebuilt on the next frame.
    fn notify_resized(&mut self, size: RenderSize);
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    /// Channels are clamped to [0, 1].
    fn set_hsv(&mut self, hue: f32, saturation: f32, value: f32);
}

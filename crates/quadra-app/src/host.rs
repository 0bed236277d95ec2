// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use quadra_core::AssetProvider;
use quadra_render::{FrameOutcome, RenderSize, Renderer};
use quadra_render_vk::RenderError;
use tracing::{error, info, warn};

use quadra_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::{Window, WindowId},
};

fn size_of(window: &Window) -> RenderSize {
    let s = window.inner_size();
    RenderSize {
        width: s.width,
        height: s.height,
    }
}

/// Drives a [`Renderer`] from winit's lifecycle:
/// resumed -> init (or reset), suspended -> cleanup, resized -> notify_resized,
/// redraw -> render.
pub struct Host<R: Renderer> {
    renderer: R,
    assets: Box<dyn AssetProvider>,
    window: Option<Window>,
    failure: Option<anyhow::Error>,
    frames: u64,
}

impl<R: Renderer> Host<R> {
    pub fn new(renderer: R, assets: Box<dyn AssetProvider>) -> Self {
        Self {
            renderer,
            assets,
            window: None,
            failure: None,
            frames: 0,
        }
    }

    /// The error that stopped the loop, if any.
    pub fn into_result(self) -> Result<()> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.renderer.cleanup();
        self.window = None;
        self.failure = Some(e);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_none() {
            let window = event_loop
                .create_window(Window::default_attributes().with_title("quadra"))
                .map_err(|e| anyhow!("create_window: {e}"))?;
            self.window = Some(window);
        }
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };

        self.renderer.notify_resized(size_of(window));
        if self.renderer.is_initialized() {
            self.renderer.reset(window, window, self.assets.as_ref())?;
        } else {
            self.renderer.init(window, window, self.assets.as_ref())?;
        }
        window.request_redraw();
        Ok(())
    }
}

impl<R: Renderer> ApplicationHandler for Host<R> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        info!("resumed");
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        info!("suspended");
        self.renderer.cleanup();
        // the native window is gone after this on Android
        self.window = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match &self.window {
            Some(w) if w.id() == window_id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested after {} frames", self.frames);
                self.renderer.cleanup();
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                info!("resized -> {}x{}", size.width, size.height);
                self.renderer.notify_resized(size);
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => match self.renderer.render() {
                Ok(FrameOutcome::Skipped) => {}
                Ok(outcome) => {
                    if outcome == FrameOutcome::Presented {
                        self.frames = self.frames.saturating_add(1);
                    }
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
                Err(e) => {
                    let fatal = e
                        .downcast_ref::<RenderError>()
                        .map_or(true, RenderError::is_fatal);
                    if fatal {
                        self.fail(event_loop, e);
                    } else {
                        warn!("frame error: {e:#}");
                        if let Some(w) = &self.window {
                            w.request_redraw();
                        }
                    }
                }
            },

            _ => {}
        }
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! Host application: config, asset wiring and the winit event loop around
//! the Vulkan quad renderer. Built as a desktop binary and, on Android, as
//! the cdylib the native activity loads.

pub mod config;
pub mod host;

use std::path::Path;

use anyhow::Result;
use quadra_core::{DirAssets, Layered, MemoryAssets};
use quadra_platform::winit::event_loop::EventLoop;
use quadra_render_vk::{builtin_shaders, RendererSettings, VkQuadRenderer, DEFAULT_TEXTURE_PATH};
use tracing::info;

pub use config::{AppCfg, Overrides};
pub use host::Host;

static SAMPLE_TEXTURE: &[u8] = include_bytes!("../../../assets/textures/sample_tex.png");

/// Files under `root` first, then the shaders and texture built into the binary.
pub fn default_assets(root: &Path) -> Layered<DirAssets, MemoryAssets> {
    let mut bundled = builtin_shaders();
    bundled.insert(DEFAULT_TEXTURE_PATH, SAMPLE_TEXTURE);
    Layered::new(DirAssets::new(root), bundled)
}

pub fn run(event_loop: EventLoop<()>, cfg: &AppCfg) -> Result<()> {
    let settings: RendererSettings = cfg.renderer_settings();
    info!(
        "assets root {} texture {} frames_in_flight {}",
        cfg.assets.root.display(),
        settings.texture_path,
        settings.frames_in_flight
    );
    let assets = default_assets(&cfg.assets.root);
    let mut host = Host::new(VkQuadRenderer::new(settings), Box::new(assets));
    event_loop.run_app(&mut host)?;
    host.into_result()
}

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: quadra_platform::AndroidApp) {
    use quadra_platform::winit::platform::android::EventLoopBuilderExtAndroid;

    quadra_core::init_tracing();
    let mut cfg = AppCfg::default();
    if let Some(dir) = app.internal_data_path() {
        cfg.assets.root = dir;
    }
    let event_loop = match EventLoop::builder().with_android_app(app).build() {
        Ok(el) => el,
        Err(e) => {
            tracing::error!("event loop: {e}");
            return;
        }
    };
    if let Err(e) = run(event_loop, &cfg) {
        tracing::error!("{e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::AssetProvider;
    use quadra_render_vk::{FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH};

    #[test]
    fn bundled_assets_fill_in_for_an_empty_root() {
        let root = std::env::temp_dir().join(format!("quadra-app-empty-{}", std::process::id()));
        let assets = default_assets(&root);
        assert_eq!(assets.read(DEFAULT_TEXTURE_PATH).unwrap(), SAMPLE_TEXTURE);
        assert!(!assets.read(VERTEX_SHADER_PATH).unwrap().is_empty());
        assert!(!assets.read(FRAGMENT_SHADER_PATH).unwrap().is_empty());
    }

    #[test]
    fn files_on_disk_take_precedence() {
        let root = std::env::temp_dir().join(format!("quadra-app-disk-{}", std::process::id()));
        std::fs::create_dir_all(root.join("textures")).unwrap();
        std::fs::write(root.join("textures/sample_tex.png"), [9u8, 9, 9]).unwrap();

        let assets = default_assets(&root);
        assert_eq!(assets.read(DEFAULT_TEXTURE_PATH).unwrap(), vec![9, 9, 9]);

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn bundled_texture_decodes_as_png() {
        assert_eq!(&SAMPLE_TEXTURE[1..4], b"PNG");
    }
}

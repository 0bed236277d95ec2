// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};

use quadra_math::HsvFactors;
use quadra_render_vk::{RendererSettings, DEFAULT_CLEAR_COLOR, DEFAULT_FRAMES_IN_FLIGHT, DEFAULT_TEXTURE_PATH};
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "quadra.toml";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default = "default_frames_in_flight")]
    pub frames_in_flight: usize,
    #[serde(default = "default_hsv")]
    pub hsv: [f32; 3],
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            frames_in_flight: default_frames_in_flight(),
            hsv: default_hsv(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AssetsCfg {
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    #[serde(default = "default_texture")]
    pub texture: String,
}

impl Default for AssetsCfg {
    fn default() -> Self {
        AssetsCfg {
            root: default_assets_root(),
            texture: default_texture(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub assets: AssetsCfg,
}

fn default_clear() -> [f32; 4] {
    DEFAULT_CLEAR_COLOR
}
fn default_frames_in_flight() -> usize {
    DEFAULT_FRAMES_IN_FLIGHT
}
fn default_hsv() -> [f32; 3] {
    HsvFactors::NEUTRAL.to_array()
}
fn default_assets_root() -> PathBuf {
    PathBuf::from("assets")
}
fn default_texture() -> String {
    DEFAULT_TEXTURE_PATH.to_owned()
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub assets: Option<PathBuf>,
    pub frames_in_flight: Option<usize>,
    pub hsv: Option<[f32; 3]>,
}

impl AppCfg {
    /// Missing or malformed files fall back to defaults.
    pub fn load(path: &Path) -> AppCfg {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                warn!("config {}: {e}; using defaults", path.display());
                AppCfg::default()
            }),
            Err(_) => {
                info!("config {} not found; using defaults", path.display());
                AppCfg::default()
            }
        }
    }

    pub fn parse(s: &str) -> Result<AppCfg, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn apply(&mut self, o: &Overrides) {
        if let Some(root) = &o.assets {
            self.assets.root = root.clone();
        }
        if let Some(n) = o.frames_in_flight {
            self.render.frames_in_flight = n;
        }
        if let Some(hsv) = o.hsv {
            self.render.hsv = hsv;
        }
    }

    pub fn renderer_settings(&self) -> RendererSettings {
        RendererSettings {
            frames_in_flight: self.render.frames_in_flight.max(1),
            clear_color: self.render.clear_color,
            hsv: HsvFactors::from(self.render.hsv),
            texture_path: self.assets.texture.clone(),
            ..RendererSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppCfg::parse("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.render.clear_color, [0.5, 0.5, 0.0, 1.0]);
        assert_eq!(cfg.render.frames_in_flight, 2);
        assert_eq!(cfg.assets.texture, "textures/sample_tex.png");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppCfg::parse(
            r#"
            [render]
            hsv = [0.25, 0.5, 0.75]

            [assets]
            root = "/data/quadra"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.hsv, [0.25, 0.5, 0.75]);
        assert_eq!(cfg.render.frames_in_flight, 2);
        assert_eq!(cfg.assets.root, PathBuf::from("/data/quadra"));
        assert_eq!(cfg.assets.texture, "textures/sample_tex.png");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("quadra-cfg-bad-{}.toml", std::process::id()));
        fs::write(&path, "[render\nclear_color = 3").unwrap();
        assert_eq!(AppCfg::load(&path), AppCfg::default());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("quadra-cfg-does-not-exist.toml");
        assert_eq!(AppCfg::load(&path), AppCfg::default());
    }

    #[test]
    fn overrides_win_and_settings_are_clamped() {
        let mut cfg = AppCfg::parse("[render]\nframes_in_flight = 3\n").unwrap();
        cfg.apply(&Overrides {
            assets: Some(PathBuf::from("other")),
            frames_in_flight: Some(0),
            hsv: Some([2.0, 0.5, -1.0]),
        });
        assert_eq!(cfg.assets.root, PathBuf::from("other"));

        let s = cfg.renderer_settings();
        assert_eq!(s.frames_in_flight, 1);
        assert_eq!(s.hsv.to_array(), [1.0, 0.5, 0.0]);
        assert_eq!(s.clear_color, [0.5, 0.5, 0.0, 1.0]);
    }
}

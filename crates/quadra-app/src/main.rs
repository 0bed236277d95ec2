// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use quadra_app::{AppCfg, Overrides};
use quadra_core::init_tracing;
use quadra_platform::winit::event_loop::EventLoop;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML)
    #[arg(long, default_value = quadra_app::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Asset root directory; overrides [assets] root
    #[arg(long)]
    assets: Option<PathBuf>,
    /// Frames in flight; overrides [render] frames_in_flight
    #[arg(long)]
    frames_in_flight: Option<usize>,
    /// HSV factors as h,s,v in [0, 1]; 0.5 is neutral
    #[arg(long, value_delimiter = ',', num_args = 3)]
    hsv: Option<Vec<f32>>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            assets: self.assets.clone(),
            frames_in_flight: self.frames_in_flight,
            hsv: self.hsv.as_deref().and_then(|v| <[f32; 3]>::try_from(v).ok()),
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let mut cfg = AppCfg::load(&args.config);
    cfg.apply(&args.overrides());

    let result = EventLoop::new()
        .map_err(anyhow::Error::from)
        .and_then(|event_loop| quadra_app::run(event_loop, &cfg));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Covah runtime: renders a procedural scene with a renderer plugin.
//!
//! Usage: `covah-runtime [--config session.ron] [--renderer ID] [--frames N]`

mod config;
mod scene;
mod session;

use anyhow::Result;
use clap::Parser;
use config::SessionConfig;
use covah_core::Token;
use covah_hydra::plugin::RendererPluginRegistry;
use covah_telemetry::utils::timer::ScopedMetricTimer;
use covah_telemetry::TelemetryService;
use session::Session;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "covah-runtime")]
#[command(about = "Render a procedural scene through the Covah render core")]
struct Args {
    /// Session configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Renderer plugin id, overriding the config
    #[arg(long)]
    renderer: Option<String>,

    /// Number of frames, overriding the config
    #[arg(long)]
    frames: Option<u32>,

    /// Garbage-collection interval in frames, overriding the config
    #[arg(long)]
    gc_interval: Option<u32>,

    /// List the linked renderer plugins and exit
    #[arg(long)]
    list_plugins: bool,

    /// Print the effective configuration as RON and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(renderer) = &self.renderer {
            config.renderer = Some(renderer.clone());
        }
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(interval) = self.gc_interval {
            config.gc_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

fn list_plugins(registry: &RendererPluginRegistry) {
    let default = registry.default_plugin_id();
    for desc in registry.plugin_descs() {
        let supported = registry
            .get_or_create_renderer_plugin(&Token::new(desc.id))
            .is_some_and(|plugin| plugin.is_supported());
        println!(
            "{:<28} {:<18} priority {:>3}  {}{}",
            desc.id,
            desc.display_name,
            desc.priority,
            if supported { "supported" } else { "unsupported" },
            if default.as_ref().is_some_and(|id| id == desc.id) { " (default)" } else { "" },
        );
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.session_config()?;
    if args.print_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    // Link the backends so their plugins reach the global registry.
    let builtin = covah_delegates::builtin_plugin_descs();
    log::debug!("{} builtin renderer plugins", builtin.len());
    let registry = RendererPluginRegistry::global();
    if args.list_plugins {
        list_plugins(registry);
        return Ok(());
    }

    let mut telemetry = TelemetryService::new(Duration::from_secs(1));
    telemetry.install_global();
    let frame_ms = telemetry
        .metrics_registry()
        .register_gauge("runtime", "frame_ms", "Wall time of the last frame", "ms")?;

    let mut session = Session::new(registry, config, telemetry.perf_log())?;
    for frame in 0..session.frames() {
        let report = {
            let _timer = ScopedMetricTimer::new(&frame_ms);
            session.run_frame(frame)
        };
        log::debug!("Frame {} done (converged: {})", report.frame, report.converged);
        if telemetry.tick() {
            telemetry.report();
        }
    }

    telemetry.report();
    let stats = session
        .index()
        .render_delegate()
        .map(|delegate| delegate.render_stats())
        .unwrap_or_default();
    for (key, value) in &stats {
        log::info!("{}: {:?}", key, value);
    }
    Ok(())
}

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

//! Session configuration, read from RON.

use covah_hydra::render_delegate::RenderSettingsMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read session config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid RON for a [`SessionConfig`].
    #[error("failed to parse session config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// The values parse but cannot drive a session.
    #[error("invalid session config: {0}")]
    Invalid(String),
}

/// The procedural scene to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Number of meshes.
    pub prims: usize,
    /// Points of each mesh. Faces fan out from the first point.
    pub points_per_prim: usize,
    /// Drive the points through a rest/wave computation chain.
    pub deformer: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            prims: 16,
            points_per_prim: 64,
            deformer: true,
        }
    }
}

/// Everything a session needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Plugin id. The highest-priority supported plugin when absent.
    pub renderer: Option<String>,
    /// Settings handed to the render delegate on creation.
    pub settings: RenderSettingsMap,
    /// Frames to render.
    pub frames: u32,
    /// Collect garbage every this many frames. Zero disables collection.
    pub gc_interval: u32,
    /// Scene time advanced per frame.
    pub time_step: f32,
    pub scene: SceneConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            renderer: None,
            settings: RenderSettingsMap::new(),
            frames: 8,
            gc_interval: 4,
            time_step: 1.0 / 24.0,
            scene: SceneConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded session config from '{}'", path.display());
        Ok(config)
    }

    /// Checks the values can drive a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 {
            return Err(ConfigError::Invalid("frames must be at least 1".into()));
        }
        if self.scene.points_per_prim < 3 {
            return Err(ConfigError::Invalid(format!(
                "points_per_prim must be at least 3, got {}",
                self.scene.points_per_prim
            )));
        }
        if !self.time_step.is_finite() {
            return Err(ConfigError::Invalid("time_step must be finite".into()));
        }
        Ok(())
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty)
    }
}

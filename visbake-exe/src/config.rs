//! User configuration options.

use std::{
    fs::{File, OpenOptions, create_dir_all},
    io::{Read, Seek, Write},
    path::PathBuf,
};

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use visbake::{
    BakeConfig, OcclusionBackend,
    glam::{Vec2, Vec3},
    log::{error, info, warn},
};

use crate::{BASE_DIR, CLIOptions, cli::{Vec2Arg, Vec3Arg}};

const LOG_TAG: &str = "UserConfig";

fn get_cfg_file() -> Option<PathBuf> {
    let mut dir = config_dir()?;
    dir.push(BASE_DIR);
    if let Err(e) = create_dir_all(&dir) {
        warn!(target: LOG_TAG, "Couldn't create {dir:?}: {e}");
        return None;
    }
    dir.push("user.toml");
    Some(dir)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub cell_size: Vec3,
    pub ray_step: Vec2,
    pub backend: OcclusionBackend,
    pub parallel: bool,
    pub batch_size: Option<usize>,
}

impl Default for UserConfig {
    fn default() -> Self {
        let bake = BakeConfig::default();
        Self {
            cell_size: bake.cell_size,
            ray_step: bake.ray_step,
            backend: bake.backend,
            parallel: bake.parallel,
            batch_size: bake.batch_size,
        }
    }
}

impl UserConfig {
    /// `load` reads the config, falling back to (and saving) defaults if it
    /// is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = get_cfg_file() else {
            warn!(target: LOG_TAG, "No user config dir, using defaults");
            return UserConfig::default();
        };

        let mut file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) => {
                warn!(target: LOG_TAG, "Couldn't open {path:?}, {e}");
                return UserConfig::default();
            }
        };
        let mut buf = String::new();
        if let Ok(read_len) = file.read_to_string(&mut buf) {
            if read_len == 0 {
                return UserConfig::create_default(&mut file);
            } else {
                if let Ok(data) = toml::from_str(&buf) {
                    info!(target: LOG_TAG, "Loaded user config file");
                    return data;
                }
                warn!("Could not deserialise {:?} recreating config", path);
            }
        }
        UserConfig::create_default(&mut file)
    }

    fn create_default(file: &mut File) -> Self {
        let config = UserConfig::default();
        info!("Created default user config file");
        match toml::to_string(&config) {
            Ok(data) => {
                let written = file
                    .set_len(0)
                    .and_then(|_| file.rewind())
                    .and_then(|_| file.write_all(data.as_bytes()));
                if let Err(e) = written {
                    error!("Could not write default config: {e}");
                }
            }
            Err(e) => error!("Could not serialise default config: {e}"),
        }
        config
    }

    pub fn write(&self) {
        let Some(path) = get_cfg_file() else {
            return;
        };
        let data = match toml::to_string_pretty(self) {
            Ok(data) => data,
            Err(e) => {
                error!("Parse config to TOML failed: {e}");
                return;
            }
        };
        File::create(&path)
            .and_then(|mut file| file.write_all(data.as_bytes()))
            .unwrap_or_else(|err| error!("Could not write config: {}", err));
        info!("Saved user config to {path:?}");
    }

    pub fn bake_config(&self) -> BakeConfig {
        BakeConfig {
            cell_size: self.cell_size,
            ray_step: self.ray_step,
            backend: self.backend,
            parallel: self.parallel,
            batch_size: self.batch_size,
        }
    }

    /// Sync the CLI options and UserOptions with each other
    pub fn sync_cli(&mut self, cli: &mut CLIOptions) {
        info!("Checking CLI options");

        if let Some(Vec3Arg(size)) = cli.cell_size {
            if size != self.cell_size {
                self.cell_size = size;
                info!("Cell size changed to: {size}");
            }
        } else {
            cli.cell_size = Some(Vec3Arg(self.cell_size));
        }

        if let Some(Vec2Arg(step)) = cli.ray_step {
            if step != self.ray_step {
                self.ray_step = step;
            }
        } else {
            cli.ray_step = Some(Vec2Arg(self.ray_step));
        }

        if let Some(backend) = cli.backend {
            if backend != self.backend {
                self.backend = backend;
            }
        } else {
            cli.backend = Some(self.backend);
        }

        if let Some(f) = cli.parallel {
            if f != self.parallel {
                self.parallel = f;
            }
        } else {
            cli.parallel = Some(self.parallel);
        }

        if cli.batch_size.is_some() {
            if cli.batch_size != self.batch_size {
                self.batch_size = cli.batch_size;
            }
        } else {
            cli.batch_size = self.batch_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use argh::FromArgs;

    use super::*;

    #[test]
    fn cli_wins_and_is_filled_in() {
        let args = ["--backend", "cpu", "--ray-step", "0.5,0.25"];
        let mut cli = CLIOptions::from_args(&["visbake"], &args).unwrap();
        let mut config = UserConfig {
            batch_size: Some(8),
            ..UserConfig::default()
        };
        config.sync_cli(&mut cli);

        assert_eq!(config.backend, OcclusionBackend::Cpu);
        assert_eq!(config.ray_step, Vec2::new(0.5, 0.25));
        assert_eq!(cli.cell_size, Some(Vec3Arg(Vec3::splat(10.0))));
        assert_eq!(cli.batch_size, Some(8));
        assert_eq!(cli.parallel, Some(true));
        assert_eq!(config.bake_config().batch_size, Some(8));
    }

    #[test]
    fn toml_roundtrip() {
        let config = UserConfig {
            cell_size: Vec3::new(4.0, 8.0, 4.0),
            batch_size: Some(16),
            ..UserConfig::default()
        };
        let data = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<UserConfig>(&data).unwrap(), config);
    }
}

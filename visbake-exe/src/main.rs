mod cli;
mod config;
mod progress;

use std::{
    error::Error,
    path::{Path, PathBuf},
    time::Duration,
};

use cli::*;
use mimalloc::MiMalloc;
use simplelog::TermLogger;
use visbake::{
    BakeCheckpoint, BakedVisibility, Baker, ColliderSetBuilder, StaticScene,
    glam::Vec3,
    log::{self, info, warn},
};

use crate::{config::UserConfig, progress::TerminalProgress};

const BASE_DIR: &str = "visbake/";

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<(), Box<dyn Error>> {
    let mut options: CLIOptions = argh::from_env();

    TermLogger::init(
        options.verbose.unwrap_or(log::LevelFilter::Info),
        simplelog::ConfigBuilder::default()
            .set_time_level(log::LevelFilter::Trace)
            .build(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    if let Some(Vec3Arg(point)) = options.inspect {
        return inspect(&options, point);
    }

    let mut user_config = UserConfig::load();
    user_config.sync_cli(&mut options);
    user_config.write();

    let scene_path = scene_path(&options)?;
    let scene = load_scene(&scene_path)?;
    let output = output_path(&options, &scene_path, &scene)?;
    let mut baker = Baker::new(user_config.bake_config(), ColliderSetBuilder::new());
    if !options.force && is_baked(&mut baker, &options, &scene_path, &scene, &output)? {
        warn!("{output:?} is up to date, skipping");
        return Ok(());
    }

    let fingerprint = scene.fingerprint();
    let checkpoint_path = BakeCheckpoint::path_for(&output);
    resume_or_initialize(&mut baker, &options, &scene, fingerprint, &checkpoint_path)?;

    info!("Starting PVS bake of {scene_path:?}...");
    let mut progress = TerminalProgress::new(options.time_limit.map(Duration::from_secs_f32));
    let result = baker.bake_remaining_with(&mut progress, |baker| {
        if !baker.is_complete() {
            save_checkpoint(baker, fingerprint, &checkpoint_path);
        }
    });
    progress.finish();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            save_checkpoint(&baker, fingerprint, &checkpoint_path);
            return Err(e.into());
        }
    };
    info!(
        "Baked {} objects in {:.2}s",
        report.objects_baked,
        report.elapsed.as_secs_f32()
    );
    #[cfg(feature = "hprof")]
    coarse_prof::write(&mut std::io::stdout())?;

    let baked = baker.into_baked()?;
    info!("Saving PVS data to {output:?}");
    baked.save_to_file(&output)?;
    if checkpoint_path.exists() {
        std::fs::remove_file(&checkpoint_path)?;
    }
    Ok(())
}

/// Picks up a checkpoint left by an interrupted run of the same scene, or
/// starts from scratch.
fn resume_or_initialize(
    baker: &mut Baker<ColliderSetBuilder>,
    options: &CLIOptions,
    scene: &StaticScene,
    fingerprint: u32,
    checkpoint_path: &Path,
) -> Result<(), Box<dyn Error>> {
    if options.force || !checkpoint_path.exists() {
        baker.initialize(scene)?;
        return Ok(());
    }
    match BakeCheckpoint::load_from_file(checkpoint_path) {
        Ok(checkpoint) if checkpoint.fingerprint() == fingerprint => {
            info!(
                "Found checkpoint at {checkpoint_path:?} with {}/{} objects baked",
                checkpoint.objects_baked(),
                checkpoint.total_objects()
            );
            if let Err(e) = baker.resume_from(scene, checkpoint) {
                warn!("Could not resume from checkpoint: {e}");
                baker.initialize(scene)?;
            }
        }
        Ok(_) => {
            warn!("Checkpoint at {checkpoint_path:?} is for a different scene");
            baker.initialize(scene)?;
        }
        Err(e) => {
            warn!("Could not load checkpoint: {e}");
            baker.initialize(scene)?;
        }
    }
    Ok(())
}

fn save_checkpoint(baker: &Baker<ColliderSetBuilder>, fingerprint: u32, path: &Path) {
    let saved = baker
        .checkpoint(fingerprint)
        .and_then(|checkpoint| checkpoint.save_to_file(path));
    match saved {
        Ok(()) => info!("Checkpoint written to {path:?}"),
        Err(e) => warn!("Could not write checkpoint: {e}"),
    }
}

fn scene_path(options: &CLIOptions) -> Result<PathBuf, Box<dyn Error>> {
    if options.scene.is_empty() {
        return Err("a scene file is required, pass --scene".into());
    }
    Ok(PathBuf::from(&options.scene))
}

fn load_scene(path: &Path) -> Result<StaticScene, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)?;
    let scene: StaticScene = toml::from_str(&data)?;
    info!("Loaded {} scene objects from {path:?}", scene.objects.len());
    Ok(scene)
}

/// `--output` if given, otherwise the cache file for this scene.
fn output_path(
    options: &CLIOptions,
    scene_path: &Path,
    scene: &StaticScene,
) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(output) = &options.output {
        return Ok(PathBuf::from(output));
    }
    let scene_name = scene_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("scene path has no usable file name")?;
    Ok(BakedVisibility::cache_path(scene_name, scene.fingerprint())?)
}

/// An explicit output only has to exist. A cache file must also match the
/// scene's targets and grid.
fn is_baked(
    baker: &mut Baker<ColliderSetBuilder>,
    options: &CLIOptions,
    scene_path: &Path,
    scene: &StaticScene,
    output: &Path,
) -> Result<bool, Box<dyn Error>> {
    if options.output.is_some() || !output.exists() {
        return Ok(output.exists());
    }
    baker.initialize(scene)?;
    let Some(grid) = baker.grid() else {
        return Ok(false);
    };
    let scene_name = scene_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let cached = BakedVisibility::load_from_cache(
        scene_name,
        scene.fingerprint(),
        baker.targets(),
        grid.world_bounds(),
        grid.cell_size(),
    );
    Ok(cached.is_some())
}

fn inspect(options: &CLIOptions, point: Vec3) -> Result<(), Box<dyn Error>> {
    let path = match &options.output {
        Some(output) => PathBuf::from(output),
        None => {
            let scene_path = scene_path(options)?;
            let scene = load_scene(&scene_path)?;
            output_path(options, &scene_path, &scene)?
        }
    };
    let baked = BakedVisibility::load_from_file(&path)?;
    info!("Loaded PVS data from {path:?} ({} bytes of flags)", baked.memory_usage());

    match baked.grid().cell_containing(point) {
        Some(cell) => {
            let visible = baked.visible_from(point);
            println!(
                "Cell {} {:?}: {} of {} objects visible",
                cell,
                baked.grid().cell_bounds(cell),
                visible.len(),
                baked.object_names().len()
            );
            for name in visible {
                println!("  {name}");
            }
        }
        None => println!("{point} is outside the baked grid"),
    }
    Ok(())
}

use std::str::FromStr;

use argh::FromArgs;
use visbake::{
    OcclusionBackend,
    glam::{Vec2, Vec3},
    log,
};

/// Bake potential visibility for a static scene
#[derive(Debug, Clone, FromArgs)]
pub struct CLIOptions {
    /// verbose level: off, error, warn, info, debug
    #[argh(option)]
    pub verbose: Option<log::LevelFilter>,
    /// path to the scene TOML file
    #[argh(option, default = "Default::default()")]
    pub scene: String,
    /// where to write the baked data, defaults to the cache dir
    #[argh(option)]
    pub output: Option<String>,
    /// size of one grid cell, `x,y,z`
    #[argh(option)]
    pub cell_size: Option<Vec3Arg>,
    /// ray sample spacing across a face, `x,y`
    #[argh(option)]
    pub ray_step: Option<Vec2Arg>,
    /// occlusion backend <cpu, gpu>
    #[argh(option)]
    pub backend: Option<OcclusionBackend>,
    /// bake this many objects per acceleration structure
    #[argh(option)]
    pub batch_size: Option<usize>,
    /// evaluate the cells of a sweep in parallel?
    #[argh(option)]
    pub parallel: Option<bool>,
    /// cancel the bake after this many seconds
    #[argh(option)]
    pub time_limit: Option<f32>,
    /// bake even if the output already exists
    #[argh(switch)]
    pub force: bool,
    /// print the objects visible from the point `x,y,z` and exit
    #[argh(option)]
    pub inspect: Option<Vec3Arg>,
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f32; N], std::io::Error> {
    let invalid = || {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Expected {N} comma separated numbers, got {s:?}"),
        )
    };
    let mut out = [0.0; N];
    let mut parts = s.split(',');
    for v in out.iter_mut() {
        *v = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(invalid)?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3Arg(pub Vec3);

impl FromStr for Vec3Arg {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_floats::<3>(s).map(|v| Self(Vec3::from_array(v)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2Arg(pub Vec2);

impl FromStr for Vec2Arg {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_floats::<2>(s).map(|v| Self(Vec2::from_array(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vectors() {
        assert_eq!(
            "1, 2.5,3".parse::<Vec3Arg>().unwrap(),
            Vec3Arg(Vec3::new(1.0, 2.5, 3.0))
        );
        assert_eq!("0.1,0.2".parse::<Vec2Arg>().unwrap(), Vec2Arg(Vec2::new(0.1, 0.2)));
        assert!("1,2".parse::<Vec3Arg>().is_err());
        assert!("1,2,3,4".parse::<Vec3Arg>().is_err());
        assert!("1,x".parse::<Vec2Arg>().is_err());
    }

    #[test]
    fn parse_args() {
        let cli = CLIOptions::from_args(
            &["visbake"],
            &["--scene", "hall.toml", "--cell-size", "4,4,4", "--backend", "cpu", "--force"],
        )
        .unwrap();
        assert_eq!(cli.scene, "hall.toml");
        assert_eq!(cli.cell_size, Some(Vec3Arg(Vec3::splat(4.0))));
        assert_eq!(cli.backend, Some(OcclusionBackend::Cpu));
        assert!(cli.force);
        assert!(cli.parallel.is_none());
    }
}

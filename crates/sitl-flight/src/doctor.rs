use anyhow::{Context, Result};
use sitl_shell::{ShellConfig, SitlConfig};

use crate::mission::Mission;
use crate::session::FlightOptions;

pub const MISSION_FILES: [&str; 2] = ["copter_mission.txt", "copter_glitch_mission.txt"];

pub fn check_sitl(cfg: &SitlConfig) -> Result<()> {
    anyhow::ensure!(cfg.binary.is_file(), "sitl.binary not found: {}", cfg.binary.display());
    anyhow::ensure!(cfg.speedup >= 1 && cfg.speedup <= 100, "sitl.speedup should be 1..100");
    anyhow::ensure!(!cfg.frame.is_empty(), "sitl.frame missing");
    cfg.home_location()?;
    for p in cfg.defaults_paths() {
        anyhow::ensure!(p.is_file(), "sitl defaults file not found: {}", p.display());
    }
    Ok(())
}

pub fn check_shell(cfg: &ShellConfig) -> Result<()> {
    anyhow::ensure!(!cfg.program.is_empty(), "shell.program missing");
    anyhow::ensure!(cfg.expect_timeout_s >= 1 && cfg.expect_timeout_s <= 600, "shell.expect_timeout_s should be 1..600");
    anyhow::ensure!(cfg.param_timeout_s >= cfg.expect_timeout_s, "shell.param_timeout_s shorter than expect_timeout_s");
    if let Some(rate) = cfg.streamrate {
        anyhow::ensure!(rate >= 1 && rate <= 50, "shell.streamrate should be 1..50");
    }
    Ok(())
}

/// Every stock mission must parse and carry at least one waypoint past home.
pub fn check_missions(opts: &FlightOptions) -> Result<()> {
    anyhow::ensure!(opts.mission_dir.is_dir(), "flight.mission_dir not found: {}", opts.mission_dir.display());
    for name in MISSION_FILES {
        let path = opts.mission_dir.join(name);
        let m = Mission::load(&path).with_context(|| format!("mission {}", path.display()))?;
        anyhow::ensure!(m.count() >= 2, "mission {} has no waypoints", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missions_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        let opts = FlightOptions { mission_dir: dir.path().to_path_buf(), use_map: false };
        assert!(check_missions(&opts).is_err());

        let body = "QGC WPL 110\n0\t1\t0\t16\t0\t0\t0\t0\t-35.36\t149.16\t584\t1\n1\t0\t3\t22\t0\t0\t0\t0\t-35.36\t149.16\t20\t1\n";
        for name in MISSION_FILES {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        check_missions(&opts).unwrap();

        std::fs::write(dir.path().join(MISSION_FILES[1]), "QGC WPL 110\n").unwrap();
        assert!(check_missions(&opts).is_err());
    }
}

//! Rebuild velocity and acceleration channels.

use std::f64::consts::TAU;
use std::path::PathBuf;

use kinetrack_common::{DerivativeDefaults, KinetrackResult};
use kinetrack_kinematics_core::DerivativeEngine;
use kinetrack_track_model::DerivativeParams;

use super::{load_document, save_document};

/// Which tracks to rebuild and with what settings.
pub struct DeriveOptions {
    pub track: Option<String>,
    /// Configured defaults to start from instead of each track's settings.
    pub defaults: Option<DerivativeDefaults>,
    pub algorithm: Option<String>,
    pub spill: Option<usize>,
    pub acceleration_spill: Option<usize>,
    pub rotation: bool,
    pub json: bool,
}

impl DeriveOptions {
    fn params_for(&self, current: DerivativeParams) -> KinetrackResult<DerivativeParams> {
        let base = match &self.defaults {
            Some(defaults) => DerivativeParams::from_defaults(defaults)?,
            None => current,
        };
        let algorithm = match &self.algorithm {
            Some(name) => name.parse()?,
            None => base.algorithm,
        };
        DerivativeParams::new(
            self.spill.unwrap_or(base.spill),
            self.acceleration_spill.unwrap_or(base.acceleration_spill),
            algorithm,
        )
    }

    fn selects(&self, id: &str) -> bool {
        self.track.as_deref().map_or(true, |wanted| wanted == id)
    }
}

pub fn run(path: PathBuf, options: DeriveOptions, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut document = load_document(&path)?;
    if let Some(id) = &options.track {
        if document.track(id).is_none() {
            anyhow::bail!("No track named '{id}'");
        }
    }

    let clip = document.clip;
    let clock = document.clock.clone();
    let mut report = Vec::new();

    for track in document.tracks.iter_mut().filter(|t| options.selects(&t.id)) {
        track.derivatives = options.params_for(track.derivatives)?;
        let summary = DerivativeEngine::refresh_all(track, &clip, &clock);

        let turns = if options.rotation && track.has_positions() {
            let rotation =
                DerivativeEngine::new(track.derivatives).rotation(&track.positions(), &clip, &clock);
            rotation
                .theta
                .last_frame()
                .and_then(|frame| rotation.theta.get(frame))
                .map(|theta| theta / TAU)
        } else {
            None
        };

        if !options.json {
            println!(
                "  {}: {} velocity, {} acceleration frames ({})",
                track.id,
                summary.velocity_frames,
                summary.acceleration_frames,
                track.derivatives.algorithm
            );
            if !summary.bounces.is_empty() {
                println!("    Bounces at frames {:?}", summary.bounces);
            }
            if let Some(turns) = turns {
                println!("    Rotation: {turns:.3} turns");
            }
        }
        report.push(serde_json::json!({
            "track": track.id,
            "algorithm": track.derivatives.algorithm.to_string(),
            "summary": summary,
            "turns": turns,
        }));
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    document.touch();
    let target = save_document(&document, &path, output)?;
    tracing::info!(path = %target.display(), tracks = report.len(), "saved derivatives");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetrack_track_model::DerivativeAlgorithm;

    fn options() -> DeriveOptions {
        DeriveOptions {
            track: None,
            defaults: None,
            algorithm: None,
            spill: None,
            acceleration_spill: None,
            rotation: false,
            json: false,
        }
    }

    #[test]
    fn test_track_settings_kept_without_overrides() {
        let current = DerivativeParams::new(3, 1, DerivativeAlgorithm::BounceDetect).unwrap();
        assert_eq!(options().params_for(current).unwrap(), current);
    }

    #[test]
    fn test_overrides_apply_over_defaults() {
        let opts = DeriveOptions {
            defaults: Some(DerivativeDefaults::default()),
            algorithm: Some("bounce_detect".to_string()),
            spill: Some(2),
            ..options()
        };
        let current = DerivativeParams::new(4, 4, DerivativeAlgorithm::FiniteDiff).unwrap();
        let params = opts.params_for(current).unwrap();
        assert_eq!(params.spill, 2);
        assert_eq!(params.acceleration_spill, 2);
        assert_eq!(params.algorithm, DerivativeAlgorithm::BounceDetect);
    }

    #[test]
    fn test_bad_algorithm_rejected() {
        let opts = DeriveOptions {
            algorithm: Some("spline".to_string()),
            ..options()
        };
        assert!(opts.params_for(DerivativeParams::default()).is_err());
    }

    #[test]
    fn test_track_filter() {
        let opts = DeriveOptions {
            track: Some("ball".to_string()),
            ..options()
        };
        assert!(opts.selects("ball"));
        assert!(!opts.selects("axes"));
        assert!(options().selects("anything"));
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use animation::{Animator, Interpolation, KeyframeTrack, SinusoidalOscillator};
use clap::Parser;
use parameters::{ParameterKind, ParameterStore, ParameterValue};
use render_protocol::Extent;
use renderer::{CoreSettings, DEFAULT_TARGET_PASSES};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TECHNIQUE: &str = "gradient";
pub const DEFAULT_DISPLAY_SIDE: u32 = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown technique `{0}`; run with --list to see the available ones")]
    UnknownTechnique(String),
    #[error("display size must be non-zero, got {width}x{height}")]
    EmptyDisplay { width: u32, height: u32 },
    #[error("loop end {loop_end} is before loop start {loop_start}")]
    LoopRange { loop_start: i64, loop_end: i64 },
    #[error("technique has no parameter named `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{name}` holds {expected:?} values, config value is {value}")]
    ParameterValue {
        name: String,
        expected: ParameterKind,
        value: toml::Value,
    },
    #[error("parameter `{name}` cannot be animated: {reason}")]
    Animation { name: String, reason: String },
}

/// Command-line flags. Every flag left unset falls back to the config file
/// and then to the built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(name = "hub", about = "Interactive multi-technique renderer")]
pub struct Cli {
    /// TOML file with hub settings, parameter values and animations.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub technique: Option<String>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Side of the square render cap for resolution-capped techniques.
    #[arg(long)]
    pub render_cap: Option<u32>,
    /// Accumulation passes per settled image.
    #[arg(long)]
    pub passes: Option<u32>,
    #[arg(long)]
    pub frames_per_recording_frame: Option<u32>,
    #[arg(long, allow_hyphen_values = true)]
    pub loop_start: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    pub loop_end: Option<i64>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub asset_dir: Option<PathBuf>,
    /// Start with recording enabled.
    #[arg(long)]
    pub record: bool,
    /// Print the technique catalog and exit.
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    #[default]
    Linear,
    Quadratic,
    Sinusoidal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationConfig {
    pub parameter: String,
    #[serde(default)]
    pub kind: AnimationKind,
    #[serde(default)]
    pub keyframes: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    pub technique: String,
    pub width: u32,
    pub height: u32,
    pub render_cap: u32,
    pub passes: u32,
    pub frames_per_recording_frame: u32,
    pub loop_start: i64,
    pub loop_end: i64,
    pub output_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub record: bool,
    /// Initial values keyed by parameter name.
    pub parameters: BTreeMap<String, toml::Value>,
    #[serde(rename = "animation")]
    pub animations: Vec<AnimationConfig>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            technique: DEFAULT_TECHNIQUE.to_owned(),
            width: DEFAULT_DISPLAY_SIDE,
            height: DEFAULT_DISPLAY_SIDE,
            render_cap: tiles::DEFAULT_RENDER_CAP,
            passes: DEFAULT_TARGET_PASSES,
            frames_per_recording_frame: recording::DEFAULT_FRAMES_PER_RECORDING_FRAME,
            loop_start: 0,
            loop_end: 0,
            output_dir: PathBuf::from("frames"),
            asset_dir: PathBuf::from("assets"),
            record: false,
            parameters: BTreeMap::new(),
            animations: Vec::new(),
        }
    }
}

impl HubConfig {
    /// Defaults, then the `--config` file, then flags.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(technique) = &cli.technique {
            self.technique.clone_from(technique);
        }
        if let Some(width) = cli.width {
            self.width = width;
        }
        if let Some(height) = cli.height {
            self.height = height;
        }
        if let Some(render_cap) = cli.render_cap {
            self.render_cap = render_cap;
        }
        if let Some(passes) = cli.passes {
            self.passes = passes;
        }
        if let Some(frames) = cli.frames_per_recording_frame {
            self.frames_per_recording_frame = frames;
        }
        if let Some(loop_start) = cli.loop_start {
            self.loop_start = loop_start;
        }
        if let Some(loop_end) = cli.loop_end {
            self.loop_end = loop_end;
        }
        if let Some(output_dir) = &cli.output_dir {
            self.output_dir.clone_from(output_dir);
        }
        if let Some(asset_dir) = &cli.asset_dir {
            self.asset_dir.clone_from(asset_dir);
        }
        self.record |= cli.record;
    }

    /// Pass counts, recording cadence and render cap are clamped by the core;
    /// only values it cannot repair are rejected here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if techniques::find(&self.technique).is_none() {
            return Err(ConfigError::UnknownTechnique(self.technique.clone()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyDisplay {
                width: self.width,
                height: self.height,
            });
        }
        if self.loop_end < self.loop_start {
            return Err(ConfigError::LoopRange {
                loop_start: self.loop_start,
                loop_end: self.loop_end,
            });
        }
        Ok(())
    }

    pub fn display(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn core_settings(&self, display: Extent) -> CoreSettings {
        CoreSettings {
            display,
            render_cap: Extent::square(self.render_cap),
            target_passes: self.passes,
            frames_per_recording_frame: self.frames_per_recording_frame,
            loop_start: self.loop_start,
            loop_end: self.loop_end,
            recording: self.record,
        }
    }

    /// Writes the `[parameters]` table into a freshly registered store.
    pub fn apply_parameters(&self, store: &mut ParameterStore) -> Result<(), ConfigError> {
        for (name, value) in &self.parameters {
            let id = store
                .find(name)
                .ok_or_else(|| ConfigError::UnknownParameter(name.clone()))?;
            let kind = store
                .info(id)
                .map_err(|_| ConfigError::UnknownParameter(name.clone()))?
                .kind;
            let parameter = parameter_value(kind, value).ok_or_else(|| {
                ConfigError::ParameterValue {
                    name: name.clone(),
                    expected: kind,
                    value: value.clone(),
                }
            })?;
            store
                .set_value(id, parameter)
                .map_err(|_| ConfigError::ParameterValue {
                    name: name.clone(),
                    expected: kind,
                    value: value.clone(),
                })?;
        }
        // Initial values are not edits.
        store.drain_changes();
        Ok(())
    }

    /// Builds the animators the `[[animation]]` tables describe, resolved
    /// against `store`.
    pub fn animators(
        &self,
        store: &ParameterStore,
    ) -> Result<Vec<(parameters::ParameterId, Animator)>, ConfigError> {
        self.animations
            .iter()
            .map(|animation| {
                let id = store
                    .find(&animation.parameter)
                    .ok_or_else(|| ConfigError::UnknownParameter(animation.parameter.clone()))?;
                let info = store
                    .info(id)
                    .map_err(|_| ConfigError::UnknownParameter(animation.parameter.clone()))?;
                let animator = match animation.kind {
                    AnimationKind::Linear => Animator::Keyframed {
                        track: KeyframeTrack::from_pairs(animation.keyframes.iter().copied()),
                        interpolation: Interpolation::Linear,
                    },
                    AnimationKind::Quadratic => Animator::Keyframed {
                        track: KeyframeTrack::from_pairs(animation.keyframes.iter().copied()),
                        interpolation: Interpolation::Quadratic,
                    },
                    AnimationKind::Sinusoidal => {
                        let live = store.scalar(id).map_err(|error| ConfigError::Animation {
                            name: animation.parameter.clone(),
                            reason: error.to_string(),
                        })?;
                        Animator::Sinusoidal(SinusoidalOscillator::for_loop(
                            self.loop_start,
                            self.loop_end,
                            live,
                            info.domain,
                        ))
                    }
                };
                Ok((id, animator))
            })
            .collect()
    }
}

fn parameter_value(kind: ParameterKind, value: &toml::Value) -> Option<ParameterValue> {
    match (kind, value) {
        (ParameterKind::Float, _) => number(value).map(ParameterValue::Float),
        (ParameterKind::Int, toml::Value::Integer(int)) => Some(ParameterValue::Int(*int)),
        (ParameterKind::Toggle, toml::Value::Boolean(toggle)) => Some(ParameterValue::Toggle(*toggle)),
        (ParameterKind::Vector2, toml::Value::Array(items)) if items.len() == 2 => {
            Some(ParameterValue::Vector2([number(&items[0])?, number(&items[1])?]))
        }
        (ParameterKind::Color, toml::Value::Array(items)) if items.len() == 4 => {
            let mut color = [0.0f32; 4];
            for (channel, item) in color.iter_mut().zip(items) {
                *channel = number(item)? as f32;
            }
            Some(ParameterValue::Color(color))
        }
        _ => None,
    }
}

fn number(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(float) => Some(*float),
        toml::Value::Integer(int) => Some(*int as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use parameters::ParameterSpec;

    use super::*;

    fn store() -> ParameterStore {
        let mut store = ParameterStore::new();
        store
            .register(ParameterSpec::new("Zoom", 1.0).range(0.1, 100.0).animatable())
            .expect("register zoom");
        store
            .register(ParameterSpec::new("Iterations", 256).range(8.0, 4096.0))
            .expect("register iterations");
        store
            .register(ParameterSpec::new("Center", [0.0, 0.0]))
            .expect("register center");
        store
            .register(ParameterSpec::new("Tint", [1.0f32, 1.0, 1.0, 1.0]).display_only())
            .expect("register tint");
        store
    }

    #[test]
    fn defaults_match_the_documented_startup_state() {
        let config = HubConfig::default();
        assert_eq!(config.technique, "gradient");
        assert_eq!(config.display(), Extent::square(1024));
        assert_eq!(config.render_cap, 512);
        assert_eq!(config.passes, 10);
        assert_eq!(config.frames_per_recording_frame, 1);
        assert_eq!((config.loop_start, config.loop_end), (0, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_the_config_file() {
        let mut config: HubConfig = toml::from_str(
            r#"
            technique = "complex"
            width = 640
            passes = 20
            "#,
        )
        .expect("parse config");
        let cli = Cli::parse_from(["hub", "--passes", "5", "--loop-start", "-4", "--record"]);
        config.apply_cli(&cli);

        assert_eq!(config.technique, "complex");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, DEFAULT_DISPLAY_SIDE);
        assert_eq!(config.passes, 5);
        assert_eq!(config.loop_start, -4);
        assert!(config.record);
    }

    #[test]
    fn unrepairable_values_are_rejected() {
        let config = HubConfig {
            technique: "raymarcher".to_owned(),
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTechnique(_))));

        let config = HubConfig {
            loop_start: 10,
            loop_end: 2,
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::LoopRange { .. })));

        let config = HubConfig {
            height: 0,
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyDisplay { .. })));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        assert!(toml::from_str::<HubConfig>("frame_rate = 60").is_err());
    }

    #[test]
    fn parameter_table_sets_values_without_reporting_changes() {
        let config: HubConfig = toml::from_str(
            r#"
            [parameters]
            Zoom = 250
            Iterations = 512
            Center = [0.25, -0.5]
            Tint = [1, 0.5, 0, 1]
            "#,
        )
        .expect("parse config");
        let mut store = store();
        config.apply_parameters(&mut store).expect("apply parameters");

        let zoom = store.find("Zoom").expect("zoom");
        assert_eq!(store.get_value(zoom), Ok(ParameterValue::Float(100.0)));
        let center = store.find("Center").expect("center");
        assert_eq!(store.get_value(center), Ok(ParameterValue::Vector2([0.25, -0.5])));
        let tint = store.find("Tint").expect("tint");
        assert_eq!(store.get_value(tint), Ok(ParameterValue::Color([1.0, 0.5, 0.0, 1.0])));
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn mistyped_or_unknown_parameters_are_reported() {
        let mut store = store();
        let config: HubConfig =
            toml::from_str("[parameters]\nIterations = true").expect("parse config");
        assert!(matches!(
            config.apply_parameters(&mut store),
            Err(ConfigError::ParameterValue { .. })
        ));

        let config: HubConfig = toml::from_str("[parameters]\nWarp = 1.0").expect("parse config");
        assert!(matches!(
            config.apply_parameters(&mut store),
            Err(ConfigError::UnknownParameter(_))
        ));
    }

    #[test]
    fn animation_tables_build_keyframed_animators() {
        let config: HubConfig = toml::from_str(
            r#"
            [[animation]]
            parameter = "Zoom"
            keyframes = [[0, 1.0], [10, 100.0]]
            "#,
        )
        .expect("parse config");
        let store = store();
        let animators = config.animators(&store).expect("build animators");
        assert_eq!(animators.len(), 1);
        let (id, animator) = &animators[0];
        assert_eq!(Some(*id), store.find("Zoom"));
        assert_eq!(animator.evaluate(5, 0.0), 50.5);
    }
}

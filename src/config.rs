use std::env;
use std::fs;
use std::path::Path;

use crate::error::{Fmp4Error, Result};

const ENV_FPS: &str = "H264_FMP4_FPS";
const ENV_FRAMES_PER_FRAGMENT: &str = "H264_FMP4_FRAMES_PER_FRAGMENT";
const ENV_TIMESCALE: &str = "H264_FMP4_TIMESCALE";

/// Timing parameters of a remux session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemuxConfig {
    /// Nominal input frame rate.
    pub fps: u32,
    /// Coded pictures per emitted fragment.
    pub frames_per_fragment: u32,
    /// Movie and media timescale in ticks per second.
    pub timescale: u32,
}

impl RemuxConfig {
    /// One fragment per second of video, 60 ticks per frame.
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            frames_per_fragment: fps,
            timescale: fps.saturating_mul(60),
        }
    }

    pub fn with_frames_per_fragment(mut self, frames: u32) -> Self {
        self.frames_per_fragment = frames;
        self
    }

    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Fmp4Error::InvalidConfig("fps must be non-zero".to_string()));
        }
        if self.frames_per_fragment == 0 {
            return Err(Fmp4Error::InvalidConfig(
                "frames_per_fragment must be non-zero".to_string(),
            ));
        }
        if self.timescale == 0 {
            return Err(Fmp4Error::InvalidConfig(
                "timescale must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode time advance per frame, `round(timescale / fps)`.
    pub fn step_dts(&self) -> u32 {
        if self.fps == 0 {
            return 0;
        }
        ((self.timescale as f64) / (self.fps as f64)).round() as u32
    }

    /// Defaults overlaid with any `H264_FMP4_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = env::var(ENV_FPS) {
            config = Self::new(value.trim().parse()?);
        }
        if let Ok(value) = env::var(ENV_FRAMES_PER_FRAGMENT) {
            config.frames_per_fragment = value.trim().parse()?;
        }
        if let Ok(value) = env::var(ENV_TIMESCALE) {
            config.timescale = value.trim().parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads a `key = value` file. Missing keys keep their defaults, with
    /// `fps` applied first so the derived defaults follow it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let mut fps = None;
        let mut frames_per_fragment = None;
        let mut timescale = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Fmp4Error::InvalidConfig(format!("expected key = value: {}", line)));
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "fps" => fps = Some(value.parse::<u32>()?),
                "frames_per_fragment" => frames_per_fragment = Some(value.parse::<u32>()?),
                "timescale" => timescale = Some(value.parse::<u32>()?),
                other => log::warn!("Ignoring unknown config key {}", other),
            }
        }

        let mut config = fps.map(Self::new).unwrap_or_default();
        if let Some(frames) = frames_per_fragment {
            config.frames_per_fragment = frames;
        }
        if let Some(timescale) = timescale {
            config.timescale = timescale;
        }
        config.validate()?;
        Ok(config)
    }
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self::new(60)
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# h264-fmp4 configuration
# Every key is optional. Environment variables H264_FMP4_FPS,
# H264_FMP4_FRAMES_PER_FRAGMENT and H264_FMP4_TIMESCALE take the same values.

# Nominal input frame rate
fps = 60

# Coded pictures per fragment (defaults to fps)
frames_per_fragment = 60

# Ticks per second (defaults to fps * 60)
timescale = 3600
"#;
        fs::write(path, template)?;
    }
    Ok(())
}

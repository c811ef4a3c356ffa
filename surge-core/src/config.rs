use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Records manufactured per tick.
    pub batch_size: usize,
    /// Keys are drawn uniformly from `[0, key_space)`.
    pub key_space: u32,
    /// Interval between batches, e.g. "100ms".
    pub tick: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 300,
            key_space: 500,
            tick: "100ms".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn tick_duration(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.tick)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    /// Tumbling window duration per key, anchored at first arrival, e.g. "500ms".
    pub size: String,
    /// At most this many of the newest buffered records survive a flush.
    pub retain: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: "500ms".to_string(),
            retain: 10,
        }
    }
}

impl WindowConfig {
    pub fn size_duration(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.size)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub generator: GeneratorConfig,
    pub window: WindowConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.generator.batch_size == 0 {
            anyhow::bail!("generator.batch_size must be positive");
        }
        if self.generator.key_space == 0 {
            anyhow::bail!("generator.key_space must be positive");
        }
        if self.window.retain == 0 {
            anyhow::bail!("window.retain must be positive");
        }
        if self.generator.tick_duration()?.is_zero() {
            anyhow::bail!("generator.tick must be positive");
        }
        if self.window.size_duration()?.is_zero() {
            anyhow::bail!("window.size must be positive");
        }
        Ok(())
    }
}

pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    // very small parser for values like "10s", "500ms", "2m"
    let s = s.trim();
    if let Some(num) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(num.parse::<u64>()?));
    }
    if let Some(num) = s.strip_suffix('s') {
        return Ok(Duration::from_secs(num.parse::<u64>()?));
    }
    if let Some(num) = s.strip_suffix('m') {
        return Ok(Duration::from_secs(num.parse::<u64>()? * 60));
    }
    if let Some(num) = s.strip_suffix('h') {
        return Ok(Duration::from_secs(num.parse::<u64>()? * 3_600));
    }
    // default assume seconds
    Ok(Duration::from_secs(s.parse::<u64>()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_with_suffixes() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.generator.batch_size, 300);
        assert_eq!(cfg.generator.key_space, 500);
        assert_eq!(cfg.generator.tick_duration().unwrap(), Duration::from_millis(100));
        assert_eq!(cfg.window.size_duration().unwrap(), Duration::from_millis(500));
        assert_eq!(cfg.window.retain, 10);
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let mut cfg = PipelineConfig::default();
        cfg.window.retain = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.generator.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.window.size = "0ms".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let cfg = PipelineConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.generator.batch_size, cfg.generator.batch_size);
        assert_eq!(back.window.retain, cfg.window.retain);
    }
}

use std::str::FromStr;

use framepool_kernels::KernelKind;
use framepool_shared::{ChunkGeometry, SetupError};

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 768;
pub const DEFAULT_CHUNKS: u32 = 8;
pub const DEFAULT_WORKERS: u32 = 3;

pub const ENV_WIDTH: &str = "FRAMEPOOL_WIDTH";
pub const ENV_HEIGHT: &str = "FRAMEPOOL_HEIGHT";
pub const ENV_CHUNKS: &str = "FRAMEPOOL_CHUNKS";
pub const ENV_WORKERS: &str = "FRAMEPOOL_WORKERS";
pub const ENV_KERNEL: &str = "FRAMEPOOL_KERNEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub width: u32,
    pub height: u32,
    pub chunk_count: u32,
    pub pool_size: u32,
    /// Which kernel the front end should build. [`Coordinator::start`] takes the
    /// kernel value itself, so this field only matters to callers that dispatch
    /// on it.
    ///
    /// [`Coordinator::start`]: crate::Coordinator::start
    pub kernel: KernelKind,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            chunk_count: DEFAULT_CHUNKS,
            pool_size: DEFAULT_WORKERS,
            kernel: KernelKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for env var {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error(transparent)]
    UnknownKernel(#[from] framepool_kernels::UnknownKernel),
}

impl PoolConfig {
    /// Defaults overridden by any `FRAMEPOOL_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let kernel = match lookup(ENV_KERNEL) {
            Some(raw) => raw.parse::<KernelKind>()?,
            None => defaults.kernel,
        };

        Ok(Self {
            width: parse_var(&lookup, ENV_WIDTH)?.unwrap_or(defaults.width),
            height: parse_var(&lookup, ENV_HEIGHT)?.unwrap_or(defaults.height),
            chunk_count: parse_var(&lookup, ENV_CHUNKS)?.unwrap_or(defaults.chunk_count),
            pool_size: parse_var(&lookup, ENV_WORKERS)?.unwrap_or(defaults.pool_size),
            kernel,
        })
    }

    /// Checks every setup rule and returns the chunk partition.
    pub fn validate(&self) -> Result<ChunkGeometry, SetupError> {
        if self.pool_size == 0 {
            return Err(SetupError::ZeroWorkers);
        }
        if self.pool_size > i32::MAX as u32 {
            return Err(SetupError::TooLarge {
                what: "pool size",
                value: u64::from(self.pool_size),
                limit: i32::MAX as u64,
            });
        }
        ChunkGeometry::new(self.width, self.height, self.chunk_count)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_setup() {
        let config = PoolConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 768);
        assert_eq!(config.chunk_count, 8);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.kernel, KernelKind::Fractal);

        let geometry = config.validate().unwrap();
        assert_eq!(geometry.chunk_height(), 96);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            (ENV_WIDTH, "320"),
            (ENV_HEIGHT, " 240 "),
            (ENV_CHUNKS, "12"),
            (ENV_WORKERS, "5"),
            (ENV_KERNEL, "noise"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            PoolConfig {
                width: 320,
                height: 240,
                chunk_count: 12,
                pool_size: 5,
                kernel: KernelKind::Noise,
            }
        );
    }

    #[test]
    fn unparsable_values_are_reported() {
        assert_eq!(
            PoolConfig::from_lookup(lookup_from(&[(ENV_WORKERS, "three")])),
            Err(ConfigError::InvalidValue {
                var: ENV_WORKERS,
                value: "three".into(),
            })
        );
        assert_eq!(
            PoolConfig::from_lookup(lookup_from(&[(ENV_WIDTH, "-1")])),
            Err(ConfigError::InvalidValue {
                var: ENV_WIDTH,
                value: "-1".into(),
            })
        );
        assert!(matches!(
            PoolConfig::from_lookup(lookup_from(&[(ENV_KERNEL, "plasma")])),
            Err(ConfigError::UnknownKernel(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_pools() {
        let zero_workers = PoolConfig {
            pool_size: 0,
            ..PoolConfig::default()
        };
        assert_eq!(zero_workers.validate(), Err(SetupError::ZeroWorkers));

        let huge = PoolConfig {
            pool_size: u32::MAX,
            ..PoolConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(SetupError::TooLarge { what: "pool size", .. })
        ));

        let uneven = PoolConfig {
            chunk_count: 7,
            ..PoolConfig::default()
        };
        assert_eq!(
            uneven.validate(),
            Err(SetupError::ChunkCountMismatch {
                height: 768,
                chunk_count: 7,
            })
        );
    }
}

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use ffindex_core::{
    cosine_distance, euclidean_distance, DistanceFn, IndexConfig, StorageDtype,
    DEFAULT_INITIAL_CAPACITY, DEFAULT_RESIZE_INCREMENT,
};

use crate::env_utils::{parse_bool_env, parse_env, parse_optional_env};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DistanceKind {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceKind {
    pub(crate) fn function(self) -> &'static DistanceFn {
        match self {
            Self::Cosine => &cosine_distance,
            Self::Euclidean => &euclidean_distance,
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl FromStr for DistanceKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            _ => Err(format!("unknown distance '{raw}', expected cosine or euclidean")),
        }
    }
}

/// Settings for stores created by the tool, read from `FFINDEX_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolConfig {
    pub(crate) dtype: StorageDtype,
    pub(crate) initial_capacity: usize,
    pub(crate) resize_increment: usize,
    pub(crate) strict_finite: bool,
    pub(crate) overwrite: bool,
    pub(crate) distance: DistanceKind,
    pub(crate) batch_size: Option<usize>,
}

impl ToolConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let dtype = parse_env("FFINDEX_DTYPE", StorageDtype::F32)?;
        let initial_capacity = parse_env("FFINDEX_INITIAL_CAPACITY", DEFAULT_INITIAL_CAPACITY)?;
        let resize_increment = parse_env("FFINDEX_RESIZE_INCREMENT", DEFAULT_RESIZE_INCREMENT)?;
        let strict_finite = parse_bool_env("FFINDEX_STRICT_FINITE", true)?;
        let overwrite = parse_bool_env("FFINDEX_OVERWRITE", false)?;
        let distance = parse_env("FFINDEX_DISTANCE", DistanceKind::Cosine)?;
        let batch_size = parse_optional_env::<usize>("FFINDEX_BATCH_SIZE")?;

        if batch_size == Some(0) {
            anyhow::bail!("FFINDEX_BATCH_SIZE must be > 0");
        }

        Ok(Self {
            dtype,
            initial_capacity,
            resize_increment,
            strict_finite,
            overwrite,
            distance,
            batch_size,
        })
    }

    /// Creation parameters for a new store holding `dim`-dimensional vectors.
    pub(crate) fn index_config(&self, dim: usize) -> Result<IndexConfig> {
        let config = IndexConfig::new(dim)
            .context("invalid target dimension")?
            .with_dtype(self.dtype)
            .with_initial_capacity(self.initial_capacity)
            .with_resize_increment(self.resize_increment)
            .with_strict_finite(self.strict_finite)
            .with_overwrite(self.overwrite);
        config.validate().context("invalid store configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const CONFIG_KEYS: &[&str] = &[
        "FFINDEX_DTYPE",
        "FFINDEX_INITIAL_CAPACITY",
        "FFINDEX_RESIZE_INCREMENT",
        "FFINDEX_STRICT_FINITE",
        "FFINDEX_OVERWRITE",
        "FFINDEX_DISTANCE",
        "FFINDEX_BATCH_SIZE",
    ];

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn capture(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|key| ((*key).to_string(), env::var(key).ok()))
                .collect();
            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                if let Some(value) = value {
                    env::set_var(key, value);
                } else {
                    env::remove_var(key);
                }
            }
        }
    }

    fn with_env<R>(pairs: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let _lock = env_lock().lock().expect("env test mutex must be lockable");
        let _guard = EnvGuard::capture(CONFIG_KEYS);

        for key in CONFIG_KEYS {
            env::remove_var(key);
        }
        for (key, value) in pairs {
            env::set_var(key, value);
        }

        f()
    }

    #[test]
    fn from_env_uses_expected_defaults() {
        let config = with_env(&[], || {
            ToolConfig::from_env().expect("default config must parse")
        });
        assert_eq!(config.dtype, StorageDtype::F32);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
        assert_eq!(config.resize_increment, DEFAULT_RESIZE_INCREMENT);
        assert!(config.strict_finite);
        assert!(!config.overwrite);
        assert_eq!(config.distance, DistanceKind::Cosine);
        assert_eq!(config.batch_size, None);
    }

    #[test]
    fn from_env_applies_overrides() {
        let config = with_env(
            &[
                ("FFINDEX_DTYPE", "float16"),
                ("FFINDEX_INITIAL_CAPACITY", "64"),
                ("FFINDEX_RESIZE_INCREMENT", "8"),
                ("FFINDEX_STRICT_FINITE", "off"),
                ("FFINDEX_OVERWRITE", "yes"),
                ("FFINDEX_DISTANCE", "L2"),
                ("FFINDEX_BATCH_SIZE", "128"),
            ],
            || ToolConfig::from_env().expect("override config must parse"),
        );
        assert_eq!(config.dtype, StorageDtype::F16);
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.resize_increment, 8);
        assert!(!config.strict_finite);
        assert!(config.overwrite);
        assert_eq!(config.distance, DistanceKind::Euclidean);
        assert_eq!(config.batch_size, Some(128));

        let index_config = config.index_config(3).expect("index config must build");
        assert_eq!(index_config.dim, 3);
        assert_eq!(index_config.dtype, StorageDtype::F16);
        assert_eq!(index_config.initial_capacity, 64);
        assert!(index_config.overwrite);
    }

    #[test]
    fn from_env_rejects_invalid_values() {
        let cases = [
            ("FFINDEX_DTYPE", "f64"),
            ("FFINDEX_INITIAL_CAPACITY", "-1"),
            ("FFINDEX_STRICT_FINITE", "maybe"),
            ("FFINDEX_DISTANCE", "manhattan"),
            ("FFINDEX_BATCH_SIZE", "0"),
        ];
        for (key, value) in cases {
            let result = with_env(&[(key, value)], ToolConfig::from_env);
            assert!(result.is_err(), "{key}={value} must be rejected");
        }
    }

    #[test]
    fn index_config_rejects_zero_dimension() {
        let config = with_env(&[], || {
            ToolConfig::from_env().expect("default config must parse")
        });
        assert!(config.index_config(0).is_err());
    }
}

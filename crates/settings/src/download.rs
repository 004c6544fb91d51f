use std::time::Duration;

use tracing::warn;

use crate::{
    DEFAULT_DELAY, DEFAULT_MAX_SIZE, DEFAULT_PART_SIZE, DELAY, KEYS, MAX_SIZE, PART_SIZE,
    SettingsError, SettingsSource,
};

/// Typed view of the download settings at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Bytes per delivered part.
    pub part_size: u64,
    /// Largest download accepted, in bytes.
    pub max_size: u64,
    /// Start-to-start period of the delivery loop.
    pub delay: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            delay: DEFAULT_DELAY,
        }
    }
}

impl DownloadSettings {
    /// Reads every setting from `source` in a single lookup.
    ///
    /// Missing keys use the defaults; unparsable values are logged and
    /// replaced by the default as well.
    pub fn load(source: &dyn SettingsSource) -> Self {
        let values = source.get_many(&[PART_SIZE, MAX_SIZE, DELAY]);
        let raw = |i: usize| values.get(i).cloned().flatten();
        Self {
            part_size: parse_u64(PART_SIZE, raw(0), DEFAULT_PART_SIZE),
            max_size: parse_u64(MAX_SIZE, raw(1), DEFAULT_MAX_SIZE),
            delay: Duration::from_secs(parse_u64(DELAY, raw(2), DEFAULT_DELAY.as_secs())),
        }
    }

    /// Checks that `value` is acceptable for `key` before it is stored.
    pub fn validate(key: &str, value: &str) -> Result<u64, SettingsError> {
        if !KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        let parsed = value
            .trim()
            .parse::<u64>()
            .map_err(|_| SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        if key == PART_SIZE && parsed == 0 {
            return Err(SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        Ok(parsed)
    }
}

fn parse_u64(key: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, value = %raw, error = %e, "invalid setting, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySettings;

    #[test]
    fn empty_source_uses_defaults() {
        let source = MemorySettings::new();
        assert_eq!(DownloadSettings::load(&source), DownloadSettings::default());
    }

    #[test]
    fn reads_values() {
        let source = MemorySettings::new();
        source.set(PART_SIZE, "1024");
        source.set(MAX_SIZE, " 4096 ");
        source.set(DELAY, "5");

        let settings = DownloadSettings::load(&source);
        assert_eq!(settings.part_size, 1024);
        assert_eq!(settings.max_size, 4096);
        assert_eq!(settings.delay, Duration::from_secs(5));
    }

    #[test]
    fn invalid_value_falls_back_to_default() {
        let source = MemorySettings::new();
        source.set(DELAY, "soon");
        source.set(MAX_SIZE, "-1");

        let settings = DownloadSettings::load(&source);
        assert_eq!(settings.delay, DEFAULT_DELAY);
        assert_eq!(settings.max_size, DEFAULT_MAX_SIZE);
    }

    #[test]
    fn reload_sees_changes() {
        let source = MemorySettings::new();
        source.set(DELAY, "10");
        assert_eq!(DownloadSettings::load(&source).delay, Duration::from_secs(10));

        source.set(DELAY, "2");
        assert_eq!(DownloadSettings::load(&source).delay, Duration::from_secs(2));
    }

    #[test]
    fn validate_rejects_unknown_key() {
        assert!(matches!(
            DownloadSettings::validate("colour", "1"),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    /// Source that only answers batched lookups and counts them.
    struct BatchOnly {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl SettingsSource for BatchOnly {
        fn get(&self, key: &str) -> Option<String> {
            panic!("unexpected single lookup of {key}");
        }

        fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            keys.iter()
                .map(|key| (*key == DELAY).then(|| "8".to_string()))
                .collect()
        }
    }

    #[test]
    fn load_uses_one_batched_lookup() {
        let source = BatchOnly {
            calls: Default::default(),
        };
        let settings = DownloadSettings::load(&source);

        assert_eq!(source.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(settings.delay, Duration::from_secs(8));
        assert_eq!(settings.part_size, DEFAULT_PART_SIZE);
        assert_eq!(settings.max_size, DEFAULT_MAX_SIZE);
    }

    #[test]
    fn validate_rejects_non_numbers_and_zero_part_size() {
        assert!(DownloadSettings::validate(DELAY, "abc").is_err());
        assert!(DownloadSettings::validate(PART_SIZE, "0").is_err());
        assert_eq!(DownloadSettings::validate(DELAY, "0").unwrap(), 0);
        assert_eq!(DownloadSettings::validate(MAX_SIZE, "77").unwrap(), 77);
    }
}

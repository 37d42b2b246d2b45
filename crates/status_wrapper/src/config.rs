use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use status_stream::{transform::TransformerKey, ReaderLimits, SpaceUnits};

use crate::error::WrapperError;

const DEFAULT_PRODUCER: &str = "i3status";
const DEFAULT_PRODUCER_CONFIG: &str = "i3status.conf";

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WrapperConfig {
    pub child: ChildConfig,
    pub options: OptionsConfig,
    pub limits: LimitsConfig,
    pub interceptors: Vec<InterceptorConfig>,
}

impl WrapperConfig {
    pub fn load(path: &Path) -> Result<Self, WrapperError> {
        let text = std::fs::read_to_string(path).map_err(|source| WrapperError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| WrapperError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChildConfig {
    pub program: Option<PathBuf>,
    pub args: Option<Vec<String>>,
}

impl ChildConfig {
    /// Defaults to `i3status -c <executable dir>/i3status.conf`.
    pub fn resolve(&self, exe_dir: &Path) -> (PathBuf, Vec<String>) {
        let program = self
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PRODUCER));
        let args = self.args.clone().unwrap_or_else(|| {
            vec![
                "-c".to_string(),
                exe_dir
                    .join(DEFAULT_PRODUCER_CONFIG)
                    .to_string_lossy()
                    .into_owned(),
            ]
        });
        (program, args)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsConfig {
    pub profile_interceptors: bool,
    pub profile_skipped_statuses: bool,
    pub profile_threshold_ms: u64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            profile_interceptors: false,
            profile_skipped_statuses: false,
            profile_threshold_ms: 100,
        }
    }
}

impl OptionsConfig {
    pub fn profile_threshold(&self) -> Duration {
        Duration::from_millis(self.profile_threshold_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_line_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: ReaderLimits::default().max_line_bytes,
        }
    }
}

impl LimitsConfig {
    pub fn reader_limits(&self) -> ReaderLimits {
        ReaderLimits {
            max_line_bytes: self.max_line_bytes,
        }
    }
}

/// How a command's stdout is turned into `full_text`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Trimmed stdout, verbatim.
    #[default]
    Text,
    /// Stdout is a byte count, rendered with power-of-ten thresholds.
    SpaceDecimal,
    /// Stdout is a byte count, rendered with power-of-two thresholds.
    SpaceBinary,
}

impl OutputFormat {
    pub fn space_units(self) -> Option<SpaceUnits> {
        match self {
            Self::Text => None,
            Self::SpaceDecimal => Some(SpaceUnits::Decimal),
            Self::SpaceBinary => Some(SpaceUnits::Binary),
        }
    }
}

/// One `[[interceptors]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorConfig {
    pub instance: Option<String>,
    pub name: Option<String>,
    pub command: Vec<String>,
    #[serde(default)]
    pub format: OutputFormat,
    pub cache_period: Option<NonZeroU32>,
    pub latency_ms: Option<[u64; 2]>,
}

impl InterceptorConfig {
    pub fn key(&self, index: usize) -> Result<TransformerKey, WrapperError> {
        match (&self.instance, &self.name) {
            (Some(instance), None) => Ok(TransformerKey::Instance(instance.clone())),
            (None, Some(name)) => Ok(TransformerKey::Name(name.clone())),
            (Some(_), Some(_)) => Err(WrapperError::InvalidInterceptor {
                index,
                reason: "set either `instance` or `name`, not both".to_string(),
            }),
            (None, None) => Err(WrapperError::InvalidInterceptor {
                index,
                reason: "one of `instance` or `name` is required".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: WrapperConfig = toml::from_str("").unwrap();
        assert!(config.interceptors.is_empty());
        assert!(!config.options.profile_interceptors);
        assert_eq!(config.options.profile_threshold(), Duration::from_millis(100));
        assert_eq!(config.limits.reader_limits(), ReaderLimits::default());

        let (program, args) = config.child.resolve(Path::new("/opt/bar"));
        assert_eq!(program, PathBuf::from("i3status"));
        assert_eq!(args, ["-c", "/opt/bar/i3status.conf"]);
    }

    #[test]
    fn full_config_parses() {
        let config: WrapperConfig = toml::from_str(
            r#"
            [child]
            program = "/usr/bin/i3status"
            args = ["-c", "/etc/i3status.conf"]

            [options]
            profile_interceptors = true
            profile_skipped_statuses = true
            profile_threshold_ms = 250

            [limits]
            max_line_bytes = 4096

            [[interceptors]]
            instance = "holder_disk_info"
            command = ["sh", "-c", "echo 1024"]
            format = "space-binary"
            cache_period = 10

            [[interceptors]]
            name = "load"
            command = ["uptime"]
            latency_ms = [100, 5000]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.child.resolve(Path::new("/unused")).1,
            ["-c", "/etc/i3status.conf"]
        );
        assert!(config.options.profile_skipped_statuses);
        assert_eq!(config.options.profile_threshold(), Duration::from_millis(250));
        assert_eq!(config.limits.max_line_bytes, 4096);

        let disk = &config.interceptors[0];
        assert_eq!(
            disk.key(0).unwrap(),
            TransformerKey::Instance("holder_disk_info".into())
        );
        assert_eq!(disk.format.space_units(), Some(SpaceUnits::Binary));
        assert_eq!(disk.cache_period.map(NonZeroU32::get), Some(10));

        let load = &config.interceptors[1];
        assert_eq!(load.key(1).unwrap(), TransformerKey::Name("load".into()));
        assert_eq!(load.format, OutputFormat::Text);
        assert_eq!(load.latency_ms, Some([100, 5000]));
    }

    #[test]
    fn interceptor_needs_exactly_one_key() {
        let config: WrapperConfig = toml::from_str(
            r#"
            [[interceptors]]
            command = ["true"]

            [[interceptors]]
            instance = "a"
            name = "b"
            command = ["true"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.interceptors[0].key(0),
            Err(WrapperError::InvalidInterceptor { index: 0, .. })
        ));
        assert!(matches!(
            config.interceptors[1].key(1),
            Err(WrapperError::InvalidInterceptor { index: 1, .. })
        ));
    }

    #[test]
    fn unknown_keys_and_zero_period_are_rejected() {
        assert!(toml::from_str::<WrapperConfig>("[options]\nprofile = true\n").is_err());
        assert!(toml::from_str::<WrapperConfig>(
            "[[interceptors]]\nname = \"x\"\ncommand = [\"true\"]\ncache_period = 0\n"
        )
        .is_err());
    }

    #[test]
    fn load_reports_path_on_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[options]\nprofile_skipped_statuses = true").unwrap();
        let config = WrapperConfig::load(file.path()).unwrap();
        assert!(config.options.profile_skipped_statuses);

        writeln!(file, "not toml at all [").unwrap();
        let err = WrapperConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, WrapperError::ConfigParse { .. }));

        let missing = file.path().with_extension("missing");
        let err = WrapperConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}

use std::process::Command;

use status_stream::transform::{BoxedTransformer, Latency, TimedCaching};
use status_stream::{
    format_space, Field, FieldTransformer, SpaceUnits, TransformError, TransformerRegistry,
};
use tracing::debug;

use crate::config::{InterceptorConfig, OutputFormat};
use crate::error::WrapperError;

/// Replaces `full_text` with the output of an external command.
///
/// All other keys of the field are kept. A non-zero exit, or output that is
/// not a byte count when a space format is requested, fails the transform.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
    units: Option<SpaceUnits>,
}

impl CommandTransformer {
    pub fn new(argv: &[String], format: OutputFormat) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            units: format.space_units(),
        })
    }

    fn run(&self) -> Result<String, TransformError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|err| TransformError::Command {
                program: self.program.clone(),
                message: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(TransformError::Command {
                program: self.program.clone(),
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn render(&self, stdout: String) -> Result<String, TransformError> {
        let Some(units) = self.units else {
            return Ok(stdout);
        };
        let bytes: u64 = stdout.parse().map_err(|err: std::num::ParseIntError| {
            TransformError::Parse {
                input: stdout.clone(),
                message: err.to_string(),
            }
        })?;
        Ok(format_space(bytes, units))
    }
}

impl FieldTransformer for CommandTransformer {
    fn transform(&mut self, mut field: Field) -> Result<Field, TransformError> {
        let stdout = self.run()?;
        let text = self.render(stdout)?;
        debug!(program = %self.program, text = %text, "command transformer");
        field.set_full_text(text);
        Ok(field)
    }
}

/// Builds the registry from `[[interceptors]]` entries.
///
/// Each entry becomes a [`CommandTransformer`], wrapped in [`Latency`] when
/// `latency_ms` is set and then in [`TimedCaching`] when `cache_period` is
/// set, so cached calls skip the injected delay.
pub fn build_registry(
    entries: &[InterceptorConfig],
) -> Result<TransformerRegistry, WrapperError> {
    let mut registry = TransformerRegistry::new();
    for (index, entry) in entries.iter().enumerate() {
        let key = entry.key(index)?;
        let command = CommandTransformer::new(&entry.command, entry.format).ok_or_else(|| {
            WrapperError::InvalidInterceptor {
                index,
                reason: "`command` must not be empty".to_string(),
            }
        })?;

        let mut transformer: BoxedTransformer = Box::new(command);
        if let Some([min, max]) = entry.latency_ms {
            if min > max {
                return Err(WrapperError::InvalidInterceptor {
                    index,
                    reason: format!("latency_ms range [{min}, {max}] is inverted"),
                });
            }
            transformer = Box::new(Latency::new(transformer, min..max));
        }
        if let Some(period) = entry.cache_period {
            transformer = Box::new(TimedCaching::new(transformer, period));
        }

        debug!(?key, "registering interceptor");
        if registry.insert(key.clone(), transformer).is_some() {
            return Err(WrapperError::InvalidInterceptor {
                index,
                reason: format!("duplicate key {key:?}"),
            });
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use status_stream::Record;

    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn entry(name: &str, command: Vec<String>) -> InterceptorConfig {
        InterceptorConfig {
            instance: None,
            name: Some(name.to_string()),
            command,
            format: OutputFormat::Text,
            cache_period: None,
            latency_ms: None,
        }
    }

    #[test]
    fn stdout_becomes_full_text_and_other_keys_stay() {
        let mut transformer =
            CommandTransformer::new(&sh("echo '  3 Qubes '"), OutputFormat::Text).unwrap();
        let field = Field::text("old")
            .with("name", "qubes")
            .with("color", "#00FF00");
        let out = transformer.transform(field).unwrap();
        assert_eq!(out.full_text(), Some("3 Qubes"));
        assert_eq!(out.name(), Some("qubes"));
        assert_eq!(out.color(), Some("#00FF00"));
    }

    #[test]
    fn space_formats_render_byte_counts() {
        let mut binary =
            CommandTransformer::new(&sh("echo 2048"), OutputFormat::SpaceBinary).unwrap();
        assert_eq!(
            binary.transform(Field::new()).unwrap().full_text(),
            Some("2K")
        );
        let mut decimal =
            CommandTransformer::new(&sh("echo 2048"), OutputFormat::SpaceDecimal).unwrap();
        assert_eq!(
            decimal.transform(Field::new()).unwrap().full_text(),
            Some("2048 Bytes")
        );
    }

    #[test]
    fn failures_are_reported() {
        let mut failing =
            CommandTransformer::new(&sh("echo nope >&2; exit 3"), OutputFormat::Text).unwrap();
        let err = failing.transform(Field::new()).unwrap_err();
        assert!(matches!(err, TransformError::Command { .. }));
        assert!(err.to_string().contains("nope"));

        let mut not_a_number =
            CommandTransformer::new(&sh("echo lots"), OutputFormat::SpaceBinary).unwrap();
        assert!(matches!(
            not_a_number.transform(Field::new()),
            Err(TransformError::Parse { .. })
        ));

        assert!(CommandTransformer::new(&[], OutputFormat::Text).is_none());
    }

    #[test]
    fn registry_dispatches_configured_entries() {
        let mut disk = entry("disk", sh("echo 12345"));
        disk.format = OutputFormat::SpaceBinary;
        disk.cache_period = NonZeroU32::new(2);
        let mut registry = build_registry(&[disk, entry("load", sh("echo busy"))]).unwrap();
        assert_eq!(registry.len(), 2);

        let record: Record = serde_json::from_str(
            r#"[{"name":"disk","full_text":"?"},{"name":"load","full_text":"?"},{"name":"cpu","full_text":"9%"}]"#,
        )
        .unwrap();
        let out = registry.apply(record).unwrap();
        let texts: Vec<_> = out.fields().iter().map(|f| f.full_text().unwrap()).collect();
        assert_eq!(texts, ["12K", "busy", "9%"]);
    }

    #[test]
    fn invalid_entries_are_rejected() {
        assert!(matches!(
            build_registry(&[entry("x", Vec::new())]),
            Err(WrapperError::InvalidInterceptor { index: 0, .. })
        ));

        let mut inverted = entry("x", sh("true"));
        inverted.latency_ms = Some([10, 5]);
        assert!(build_registry(&[inverted]).is_err());

        assert!(matches!(
            build_registry(&[entry("x", sh("true")), entry("x", sh("true"))]),
            Err(WrapperError::InvalidInterceptor { index: 1, .. })
        ));
    }
}

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::trace;

use super::generic::Profiling;
use super::{BoxedTransformer, FieldTransformer};
use crate::error::TransformError;
use crate::field::{Field, Record};

/// Which field key a transformer is registered under.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TransformerKey {
    Instance(String),
    Name(String),
}

/// Ordered two-stage dispatch: the `instance` match runs first, then the
/// `name` match. Both keys are read from the field as it arrived, so a
/// transformer that rewrites `name` does not redirect the second stage.
#[derive(Default)]
pub struct TransformerRegistry {
    by_instance: HashMap<String, BoxedTransformer>,
    by_name: HashMap<String, BoxedTransformer>,
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut instances: Vec<_> = self.by_instance.keys().collect();
        let mut names: Vec<_> = self.by_name.keys().collect();
        instances.sort();
        names.sort();
        f.debug_struct("TransformerRegistry")
            .field("by_instance", &instances)
            .field("by_name", &names)
            .finish()
    }
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `transformer`, replacing any previous one under the same key.
    pub fn insert(
        &mut self,
        key: TransformerKey,
        transformer: impl FieldTransformer + 'static,
    ) -> Option<BoxedTransformer> {
        let boxed: BoxedTransformer = Box::new(transformer);
        match key {
            TransformerKey::Instance(instance) => self.by_instance.insert(instance, boxed),
            TransformerKey::Name(name) => self.by_name.insert(name, boxed),
        }
    }

    pub fn with_instance(
        mut self,
        instance: impl Into<String>,
        transformer: impl FieldTransformer + 'static,
    ) -> Self {
        self.insert(TransformerKey::Instance(instance.into()), transformer);
        self
    }

    pub fn with_name(
        mut self,
        name: impl Into<String>,
        transformer: impl FieldTransformer + 'static,
    ) -> Self {
        self.insert(TransformerKey::Name(name.into()), transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.by_instance.len() + self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wraps every registered transformer in [`Profiling`].
    pub fn profiled(self, threshold: Duration) -> Self {
        fn wrap(
            map: HashMap<String, BoxedTransformer>,
            threshold: Duration,
        ) -> HashMap<String, BoxedTransformer> {
            map.into_iter()
                .map(|(key, inner)| {
                    let wrapped: BoxedTransformer = Box::new(Profiling::new(inner, threshold));
                    (key, wrapped)
                })
                .collect()
        }

        Self {
            by_instance: wrap(self.by_instance, threshold),
            by_name: wrap(self.by_name, threshold),
        }
    }

    /// Transforms each field independently; never adds, drops or reorders fields.
    pub fn apply(&mut self, record: Record) -> Result<Record, TransformError> {
        record
            .into_fields()
            .into_iter()
            .map(|field| self.apply_field(field))
            .collect::<Result<Vec<_>, _>>()
            .map(Record::new)
    }

    pub fn apply_field(&mut self, field: Field) -> Result<Field, TransformError> {
        let instance = field.instance().map(str::to_owned);
        let name = field.name().map(str::to_owned);
        let mut field = field;

        if let Some(transformer) = instance
            .as_deref()
            .and_then(|key| self.by_instance.get_mut(key))
        {
            trace!(instance = instance.as_deref(), "applying instance transformer");
            field = transformer.transform(field)?;
        }
        if let Some(transformer) = name.as_deref().and_then(|key| self.by_name.get_mut(key)) {
            trace!(name = name.as_deref(), "applying name transformer");
            field = transformer.transform(field)?;
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{from_fn, Identity};

    fn upper_full_text() -> impl FieldTransformer {
        from_fn(|mut field: Field| {
            let text = field.full_text().unwrap_or_default().to_uppercase();
            field.set_full_text(text);
            Ok(field)
        })
    }

    fn append(tag: &'static str) -> impl FieldTransformer {
        from_fn(move |mut field: Field| {
            let text = format!("{}{tag}", field.full_text().unwrap_or_default());
            field.set_full_text(text);
            Ok(field)
        })
    }

    fn sample_record() -> Record {
        serde_json::from_str(
            r##"[
                {"name":"wireless","instance":"wlan0","full_text":"W: down","color":"#FF0000"},
                {"name":"disk","instance":"/","full_text":"5k"},
                {"full_text":"no keys","separator":false}
            ]"##,
        )
        .unwrap()
    }

    #[test]
    fn unmatched_record_is_returned_deep_equal() {
        let mut registry = TransformerRegistry::new()
            .with_name("cpu", upper_full_text())
            .with_instance("eth0", Identity);
        let record = sample_record();
        assert_eq!(registry.apply(record.clone()).unwrap(), record);

        let mut empty = TransformerRegistry::new();
        assert!(empty.is_empty());
        assert_eq!(empty.apply(record.clone()).unwrap(), record);
    }

    #[test]
    fn name_match_transforms_only_that_field() {
        let mut registry = TransformerRegistry::new().with_name("disk", upper_full_text());
        let record: Record =
            serde_json::from_str(r#"[{"name":"disk","full_text":"5k"},{"full_text":"5k"}]"#)
                .unwrap();

        let out = registry.apply(record).unwrap();
        assert_eq!(
            out.fields()[0],
            Field::new().with("name", "disk").with("full_text", "5K")
        );
        assert_eq!(out.fields()[1], Field::text("5k"));
    }

    #[test]
    fn instance_stage_runs_before_name_stage() {
        let mut registry = TransformerRegistry::new()
            .with_name("disk", append("-name"))
            .with_instance("/", append("-instance"));

        let out = registry.apply(sample_record()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.fields()[1].full_text(), Some("5k-instance-name"));
        assert_eq!(out.fields()[0].full_text(), Some("W: down"));
    }

    #[test]
    fn name_stage_uses_the_incoming_name() {
        let rename = from_fn(|field: Field| Ok(field.with("name", "renamed")));
        let mut registry = TransformerRegistry::new()
            .with_instance("/", rename)
            .with_name("renamed", append("-wrong"))
            .with_name("disk", append("-right"));

        let out = registry.apply(sample_record()).unwrap();
        assert_eq!(out.fields()[1].name(), Some("renamed"));
        assert_eq!(out.fields()[1].full_text(), Some("5k-right"));
    }

    #[test]
    fn transformer_failure_fails_the_record() {
        let mut registry = TransformerRegistry::new().with_instance(
            "/",
            from_fn(|_| Err(TransformError::Other("pool unavailable".into()))),
        );
        let err = registry.apply(sample_record()).unwrap_err();
        assert!(err.to_string().contains("pool unavailable"));
    }

    #[test]
    fn profiled_wraps_every_transformer() {
        let mut registry = TransformerRegistry::new()
            .with_name("disk", Identity)
            .with_instance("wlan0", Identity)
            .profiled(Duration::from_secs(60));
        assert_eq!(registry.len(), 2);

        let out = registry.apply(sample_record()).unwrap();
        assert!(out.fields()[0].full_text().unwrap().starts_with("W: down("));
        assert!(out.fields()[1].full_text().unwrap().starts_with("5k("));
        assert_eq!(out.fields()[2].full_text(), Some("no keys"));
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut registry = TransformerRegistry::new();
        assert!(registry
            .insert(TransformerKey::Name("disk".into()), Identity)
            .is_none());
        assert!(registry
            .insert(TransformerKey::Name("disk".into()), upper_full_text())
            .is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            format!("{registry:?}"),
            r#"TransformerRegistry { by_instance: [], by_name: ["disk"] }"#
        );
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One status-bar block. Keys other than the well-known ones are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Field(Map<String, Value>);

impl Field {
    pub const NAME: &'static str = "name";
    pub const INSTANCE: &'static str = "instance";
    pub const FULL_TEXT: &'static str = "full_text";
    pub const COLOR: &'static str = "color";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a field carrying only `full_text`.
    pub fn text(full_text: impl Into<String>) -> Self {
        let mut field = Self::new();
        field.set_full_text(full_text);
        field
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.str_value(Self::NAME)
    }

    pub fn instance(&self) -> Option<&str> {
        self.str_value(Self::INSTANCE)
    }

    pub fn full_text(&self) -> Option<&str> {
        self.str_value(Self::FULL_TEXT)
    }

    pub fn color(&self) -> Option<&str> {
        self.str_value(Self::COLOR)
    }

    pub fn set_full_text(&mut self, full_text: impl Into<String>) {
        self.0
            .insert(Self::FULL_TEXT.to_string(), Value::String(full_text.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn str_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Field {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One status update: the fields of a single body line, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Vec<Field>);

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.0
    }
}

impl FromIterator<Field> for Record {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_and_key_order_survive_round_trip() {
        let line = r##"[{"name":"disk","instance":"/","full_text":"5K","color":"#00ff00","markup":"none","separator_block_width":9},{"full_text":"x"}]"##;
        let record: Record = serde_json::from_str(line).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.fields()[0].name(), Some("disk"));
        assert_eq!(record.fields()[0].instance(), Some("/"));
        assert_eq!(record.fields()[0].color(), Some("#00ff00"));
        assert_eq!(record.fields()[1].name(), None);

        let encoded = serde_json::to_string(&record).unwrap();
        assert_eq!(encoded, line);
        let decoded: Record = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn set_full_text_keeps_other_keys() {
        let mut field = Field::text("a").with("name", "cpu").with("urgent", true);
        field.set_full_text("b");
        assert_eq!(field.full_text(), Some("b"));
        assert_eq!(field.get("urgent"), Some(&Value::Bool(true)));
        assert_eq!(field.name(), Some("cpu"));
    }
}

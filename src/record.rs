//! Name-keyed records built from validated rows.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::data::Value;

/// Field values keyed by column name, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Pairs each value with the field name at the same position. Surplus
/// values or names on either side are dropped.
pub fn to_record(row: Vec<Value>, field_names: &[String]) -> Record {
    let fields = field_names.iter().cloned().zip(row).collect();
    Record { fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_in_schema_order() {
        let names = vec!["name".to_string(), "age".to_string()];
        let record = to_record(vec!["Alice".into(), Value::Integer(28)], &names);
        assert_eq!(record.get("age"), Some(&Value::Integer(28)));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"name":"Alice","age":28}"#
        );
    }

    #[test]
    fn truncates_to_shorter_side() {
        let names = vec!["a".to_string()];
        let record = to_record(vec![Value::Integer(1), Value::Integer(2)], &names);
        assert_eq!(record.len(), 1);
        assert!(to_record(Vec::new(), &names).is_empty());
    }
}

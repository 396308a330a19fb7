//! Caller-supplied column descriptions used to decode rows.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a column's bytes are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Unsigned integer masked to the column width.
    #[default]
    Int,
    /// IEEE-754 single precision.
    Float,
    /// String-table offset (dense) or inline string (sparse).
    Text,
    /// Unrecognised type name; decoded like [`FieldType::Int`].
    Other(String),
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "int" | "uint" => FieldType::Int,
            "float" => FieldType::Float,
            "text" => FieldType::Text,
            _ => FieldType::Other(name),
        }
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Int => "int".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Text => "text".to_string(),
            FieldType::Other(name) => name,
        }
    }
}

fn one() -> u32 {
    1
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: FieldType,
    /// Key columns are filled from the row ID, never from record bytes.
    #[serde(rename = "key", default)]
    pub is_key: bool,
    /// Number of contiguous elements.
    #[serde(default = "one")]
    pub array_size: u32,
    /// Byte offset of the first element inside a record.
    #[serde(rename = "pos", alias = "position", default)]
    pub byte_position: u16,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType, byte_position: u16) -> Self {
        Self {
            name: name.into(),
            ty,
            is_key: false,
            array_size: 1,
            byte_position,
        }
    }

    /// A key column.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::new(name, FieldType::Int, 0)
        }
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    /// Number of values this column contributes to a decoded row.
    pub fn value_count(&self) -> usize {
        if self.is_key {
            1
        } else {
            self.array_size as usize
        }
    }
}

/// Ordered column list describing one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStructure {
    #[serde(default)]
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableStructure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Parse a structure from JSON:
    ///
    /// ```json
    /// { "name": "Item", "fields": [
    ///     { "name": "ID", "key": true },
    ///     { "name": "Name", "type": "text", "pos": 0 },
    ///     { "name": "Stats", "type": "int", "pos": 4, "array_size": 3 } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Column headers in decoded-row order; array elements are suffixed
    /// with `[i]`.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for field in &self.fields {
            if field.value_count() == 1 {
                names.push(field.name.clone());
            } else {
                names.extend((0..field.value_count()).map(|i| format!("{}[{i}]", field.name)));
            }
        }
        names
    }

    /// Number of values a decoded row has.
    pub fn value_count(&self) -> usize {
        self.fields.iter().map(FieldSpec::value_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_with_defaults() {
        let structure = TableStructure::from_json(
            r#"{ "name": "Item", "fields": [
                { "name": "ID", "key": true },
                { "name": "Name", "type": "TEXT", "pos": 4 },
                { "name": "Stats", "type": "int", "position": 8, "array_size": 3 },
                { "name": "Scale", "type": "float", "pos": 20 },
                { "name": "Flags", "type": "byte", "pos": 24 }
            ] }"#,
        )
        .unwrap();

        assert_eq!(structure.name, "Item");
        assert_eq!(structure.fields.len(), 5);
        assert!(structure.fields[0].is_key);
        assert_eq!(structure.fields[1].ty, FieldType::Text);
        assert_eq!(structure.fields[1].byte_position, 4);
        assert_eq!(structure.fields[2].array_size, 3);
        assert_eq!(structure.fields[2].byte_position, 8);
        assert_eq!(structure.fields[3].ty, FieldType::Float);
        assert_eq!(structure.fields[4].ty, FieldType::Other("byte".to_string()));
        assert_eq!(structure.value_count(), 7);
    }

    #[test]
    fn column_names_expand_arrays() {
        let structure = TableStructure::new("T")
            .field(FieldSpec::key("ID"))
            .field(FieldSpec::new("Pos", FieldType::Float, 0).with_array_size(2));
        assert_eq!(structure.column_names(), vec!["ID", "Pos[0]", "Pos[1]"]);
    }

    #[test]
    fn invalid_json_is_a_structure_error() {
        assert!(matches!(
            TableStructure::from_json("{ \"fields\": 3 }"),
            Err(crate::Error::Structure(_))
        ));
    }

    #[test]
    fn type_names_round_trip_through_serde() {
        let spec = FieldSpec::new("X", FieldType::Other("Byte".into()), 2);
        let json = serde_json::to_string(&spec).unwrap();
        let back: FieldSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}

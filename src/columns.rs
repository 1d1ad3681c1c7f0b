//! Field listing for a schema file.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::ColumnsArgs,
    schema::Schema,
    table::{Align, Table},
};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {schema:?}", schema = args.schema))?;
    schema_table(&schema).print();
    for field in schema.unrecognized_fields() {
        warn!(
            "Field '{}' has unrecognized type '{}' and accepts only nulls",
            field.name, field.field_type
        );
    }
    info!("Listed {} field(s) from {:?}", schema.len(), args.schema);
    Ok(())
}

pub fn schema_table(schema: &Schema) -> Table {
    let mut table = Table::new(["#", "name", "type", "mode", "class"]).align(0, Align::Right);
    for (idx, field) in schema.iter().enumerate() {
        let class = field
            .field_type
            .coercion_class()
            .map(|class| class.as_str())
            .unwrap_or("-");
        table.push_row(vec![
            (idx + 1).to_string(),
            field.name.clone(),
            field.field_type.to_string(),
            field.mode.to_string(),
            class.to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_fields_with_their_class() {
        let schema = Schema::from_yaml_str(
            "- {name: id, type: INT64, mode: REQUIRED}\n- {name: tags, type: ARRAY}\n",
        )
        .unwrap();
        let rendered = schema_table(&schema).render();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert!(lines[2].contains("id") && lines[2].contains("REQUIRED"));
        assert!(lines[3].contains("ARRAY") && lines[3].trim_end().ends_with('-'));
    }
}

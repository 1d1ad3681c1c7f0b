mod common;

use common::TestWorkspace;
use tabular_ingest::schema::{LogicalType, Mode, Schema};

#[test]
fn loads_yaml_and_json_schema_files() {
    let workspace = TestWorkspace::new();
    let yaml = workspace.employee_schema();
    let json = workspace.write(
        "employees.json",
        r#"[
  {"name": "name", "type": "STRING", "mode": "REQUIRED"},
  {"name": "age", "type": "INT64", "mode": "REQUIRED"},
  {"name": "salary", "type": "FLOAT64", "mode": "NULLABLE"},
  {"name": "is_active", "type": "BOOL", "mode": "REQUIRED"},
  {"name": "created_at", "type": "TIMESTAMP", "mode": "REQUIRED"},
  {"name": "join_date", "type": "DATE", "mode": "REQUIRED"}
]"#,
    );

    let from_yaml = Schema::load(&yaml).expect("yaml schema");
    let from_json = Schema::load(&json).expect("json schema");
    assert_eq!(from_yaml, from_json);
    assert_eq!(
        from_yaml.field_names(),
        vec!["name", "age", "salary", "is_active", "created_at", "join_date"]
    );
    assert_eq!(from_yaml.field("SALARY").map(|f| f.mode), Some(Mode::Nullable));
}

#[test]
fn written_schema_reloads_identically() {
    let workspace = TestWorkspace::new();
    let original = Schema::load(&workspace.employee_schema()).expect("schema");
    let rendered = original.to_yaml_string().expect("yaml");
    assert!(rendered.starts_with("fields:"));
    assert_eq!(Schema::from_yaml_str(&rendered).expect("reload"), original);
}

#[test]
fn unrecognized_types_load_and_are_reported() {
    let schema = Schema::from_yaml_str(
        "fields:\n  - {name: id, type: INT64}\n  - {name: tags, type: ARRAY}\n  - {name: window, type: range}\n",
    )
    .expect("schema");
    let unknown = schema
        .unrecognized_fields()
        .map(|field| field.field_type.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        unknown,
        vec![
            LogicalType::Unrecognized("ARRAY".to_string()),
            LogicalType::Unrecognized("range".to_string()),
        ]
    );
}

#[test]
fn malformed_documents_name_the_file() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("broken.yaml", "fields: 3\n");
    let err = Schema::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.yaml"));

    assert!(Schema::from_yaml_str("name: x").is_err());
    assert!(Schema::from_yaml_str("- {name: x, type: ''}").is_err());
    assert!(Schema::load(&workspace.file("missing.yaml")).is_err());
}

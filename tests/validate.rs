use std::cell::Cell;

use proptest::prelude::*;
use tabular_ingest::{
    coerce::TypeCoercer,
    data::Value,
    literal::parse_row,
    schema::{FieldDescriptor, LogicalType, Mode, Schema},
    validate::{SchemaViolation, Validator, ViolationKind, validate_row},
};

fn people() -> Schema {
    Schema::new(vec![
        FieldDescriptor::required("name", LogicalType::String),
        FieldDescriptor::required("age", LogicalType::Int64),
        FieldDescriptor::nullable("salary", LogicalType::Float64),
    ])
    .expect("valid schema")
}

/// Coercer that records how often it is consulted.
#[derive(Default)]
struct CountingCoercer {
    calls: Cell<usize>,
}

impl TypeCoercer for CountingCoercer {
    fn coerce(&self, _value: &Value, _ty: &LogicalType) -> bool {
        self.calls.set(self.calls.get() + 1);
        true
    }
}

#[test]
fn employee_scenario() {
    let schema = people();

    assert_eq!(
        validate_row(&["Alice".into(), "28".into(), Value::Null], &schema),
        Ok(())
    );

    let err = validate_row(&["Bob".into(), "thirty".into(), Value::Float(8000.5)], &schema)
        .unwrap_err();
    assert_eq!(err.kind(), ViolationKind::TypeMismatch);
    assert_eq!(err.field(), Some("age"));

    let err = validate_row(&[Value::Null, "28".into(), Value::Float(8000.5)], &schema)
        .unwrap_err();
    assert_eq!(
        err,
        SchemaViolation::MissingRequiredField {
            field: "name".to_string()
        }
    );

    let err = validate_row(&["Carol".into(), "40".into()], &schema).unwrap_err();
    assert_eq!(err.kind(), ViolationKind::ArityMismatch);
    assert_eq!(
        err.to_string(),
        "Row length 2 does not match schema length 3"
    );
}

#[test]
fn parsed_rows_validate_the_same_way() {
    let schema = people();
    let row = parse_row(&["Alice".into(), "28".into(), "None".into()]);
    assert_eq!(row[1], Value::Integer(28));
    assert_eq!(row[2], Value::Null);
    assert!(validate_row(&row, &schema).is_ok());
}

#[test]
fn arity_check_runs_before_any_coercion() {
    let schema = people();
    let validator = Validator::with_coercer(&schema, CountingCoercer::default());

    for row in [
        vec![],
        vec![Value::from("Carol"), Value::from("40")],
        vec![Value::Null; 4],
    ] {
        let err = validator.validate(&row).unwrap_err();
        assert_eq!(err.kind(), ViolationKind::ArityMismatch);
    }
    assert_eq!(validator.coercer().calls.get(), 0);

    validator
        .validate(&["x".into(), "y".into(), Value::Null])
        .expect("spy accepts everything");
    assert_eq!(validator.coercer().calls.get(), 2);
}

#[test]
fn unrecognized_types_reject_values_but_allow_nulls() {
    let schema = Schema::new(vec![
        FieldDescriptor::nullable("tags", LogicalType::parse("ARRAY")),
        FieldDescriptor::nullable("extra", LogicalType::parse("STRUCT")),
    ])
    .expect("valid schema");
    assert!(validate_row(&[Value::Null, Value::Null], &schema).is_ok());
    let err = validate_row(&[Value::List(Vec::new()), Value::Null], &schema).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Field 'tags' with value '[]' cannot be converted to type 'ARRAY'"
    );
}

#[test]
fn rows_are_not_modified() {
    let schema = people();
    let row = vec![Value::from("Alice"), Value::from(" 28 "), Value::from("1_000.5")];
    let before = row.clone();
    assert!(validate_row(&row, &schema).is_ok());
    assert_eq!(row, before);
}

fn logical_types() -> impl Strategy<Value = LogicalType> {
    prop::sample::select(LogicalType::variants().to_vec()).prop_map(LogicalType::parse)
}

proptest! {
    #[test]
    fn required_null_always_fails(types in prop::collection::vec(logical_types(), 1..6), pick in any::<prop::sample::Index>()) {
        let position = pick.index(types.len());
        let fields = types
            .iter()
            .enumerate()
            .map(|(idx, ty)| {
                let mode = if idx == position { Mode::Required } else { Mode::Nullable };
                FieldDescriptor::new(format!("f{idx}"), ty.clone(), mode)
            })
            .collect();
        let schema = Schema::new(fields).expect("valid schema");
        let row = vec![Value::Null; types.len()];
        let err = validate_row(&row, &schema).unwrap_err();
        prop_assert_eq!(err, SchemaViolation::MissingRequiredField { field: format!("f{position}") });
    }

    #[test]
    fn nullable_nulls_always_pass(types in prop::collection::vec(logical_types(), 1..6)) {
        let fields = types
            .iter()
            .enumerate()
            .map(|(idx, ty)| FieldDescriptor::nullable(format!("f{idx}"), ty.clone()))
            .collect();
        let schema = Schema::new(fields).expect("valid schema");
        prop_assert!(validate_row(&vec![Value::Null; types.len()], &schema).is_ok());
    }

    #[test]
    fn arity_mismatch_reports_both_lengths(width in 1usize..6, actual in 0usize..8) {
        prop_assume!(width != actual);
        let fields = (0..width)
            .map(|idx| FieldDescriptor::required(format!("f{idx}"), LogicalType::String))
            .collect();
        let schema = Schema::new(fields).expect("valid schema");
        let err = validate_row(&vec![Value::from("x"); actual], &schema).unwrap_err();
        prop_assert_eq!(err, SchemaViolation::ArityMismatch { expected: width, actual });
    }
}

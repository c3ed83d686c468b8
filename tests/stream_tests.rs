use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use docstream::stream::Visit;
use docstream::{
    Environment, Expr, Expression, Filter, GroupBy, Map, Reduce, Skip, Source, Stream,
    StreamError, StreamResult, Take,
};
use serde_json::{json, Value};

fn numbers(values: &[i64]) -> Stream {
    Stream::from_values(values.iter().map(|v| json!(v)).collect::<Vec<_>>())
}

fn users() -> Stream {
    Stream::from_values(vec![
        json!({"name": "Alice", "age": 30, "city": "NYC"}),
        json!({"name": "Bob", "age": 25, "city": "LA"}),
        json!({"name": "Charlie", "age": 35, "city": "NYC"}),
        json!({"name": "Dana", "age": 41, "city": "SF"}),
    ])
}

/// Source whose rows all live inside an enclosing query scope.
struct Scoped {
    outer: Arc<Environment>,
    values: Vec<Value>,
}

impl Source for Scoped {
    fn iterate(self: Box<Self>, visit: Visit<'_>) -> StreamResult<()> {
        for value in self.values {
            let mut env = Environment::derived(self.outer.clone());
            env.set_current_value(value);
            if visit(Arc::new(env))?.is_break() {
                break;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Scoped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scoped")
    }
}

#[test]
fn test_skip_take_map() {
    let results = numbers(&[1, 2, 3, 4, 5])
        .pipe(Skip::new(Expression::lit(1)))
        .pipe(Take::new(Expression::lit(2)))
        .pipe(Map::new(Expression::Current * Expression::lit(10)))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(20), json!(30)]);
}

#[test]
fn test_filter_greater_than() {
    let results = numbers(&[1, 2, 3, 4, 5])
        .pipe(Filter::new(Expression::Current.gt(Expression::lit(3))))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(4), json!(5)]);
}

#[test]
fn test_filter_and_project_documents() {
    let results = users()
        .pipe(Filter::new(
            Expression::field("city")
                .equals(Expression::lit("NYC"))
                .and(Expression::field("age").gt(Expression::lit(26))),
        ))
        .pipe(Map::new(Expression::field("name")))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!("Alice"), json!("Charlie")]);
}

#[test]
fn test_map_output_keeps_input_reachable() {
    let mut names = Vec::new();
    users()
        .pipe(Map::new(Expression::field("age") + Expression::lit(1)))
        .iterate(|env| {
            assert!(env.outer().is_some());
            let original = env.outer().unwrap().current_value().unwrap();
            names.push(original["name"].clone());
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
    assert_eq!(names.len(), 4);
    assert_eq!(names[0], json!("Alice"));
}

#[test]
fn test_reduce_empty_input_yields_seed() {
    let results = numbers(&[])
        .pipe(Reduce::new(
            Expression::lit(100),
            Expression::Accumulator + Expression::Current,
        ))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(100)]);
}

#[test]
fn test_reduce_folds_left_to_right() {
    // acc * 10 + v makes the fold order visible.
    let results = numbers(&[1, 2, 3])
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator * Expression::lit(10) + Expression::Current,
        ))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(123)]);
}

#[test]
fn test_reduce_output_can_be_piped_further() {
    let results = numbers(&[1, 2, 3, 4])
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator + Expression::Current,
        ))
        .pipe(Map::new(Expression::Current * Expression::lit(2)))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(20)]);
}

#[test]
fn test_reduce_error_aborts_before_output() {
    let mut delivered = 0;
    let err = Stream::from_values(vec![json!(1), json!("two"), json!(3)])
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator - Expression::Current,
        ))
        .iterate(|_| {
            delivered += 1;
            Ok(ControlFlow::Continue(()))
        })
        .unwrap_err();
    assert!(matches!(err, StreamError::EvaluationError(_)));
    assert_eq!(delivered, 0);
}

#[test]
fn test_group_by_annotates_rows() {
    let results = users()
        .pipe(GroupBy::new(Expression::field("city")))
        .pipe(Map::new(Expression::GroupKey))
        .collect_values()
        .unwrap();
    assert_eq!(
        results,
        vec![json!("NYC"), json!("LA"), json!("NYC"), json!("SF")]
    );
}

#[test]
fn test_group_by_then_filter_on_key() {
    let results = users()
        .pipe(GroupBy::new(Expression::field("city")))
        .pipe(Filter::new(Expression::GroupKey.equals(Expression::lit("NYC"))))
        .pipe(Map::new(Expression::field("name")))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!("Alice"), json!("Charlie")]);
}

#[test]
fn test_reduce_after_group_by_folds_all_groups_together() {
    // Reduce does not branch on the group key: one accumulator for all rows.
    let results = users()
        .pipe(GroupBy::new(Expression::field("city")))
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator + Expression::lit(1),
        ))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(4)]);
}

#[test]
fn test_group_key_missing_without_group_by() {
    let err = users()
        .pipe(Map::new(Expression::GroupKey))
        .collect_values()
        .unwrap_err();
    assert_eq!(err, StreamError::NotFound("_group".to_string()));
}

#[test]
fn test_reserved_names_do_not_shadow_document_fields() {
    let results = Stream::from_values(vec![json!({"_group": "mine", "_acc": 1})])
        .pipe(GroupBy::new(Expression::lit("theirs")))
        .pipe(Map::new(Expression::field("_group")))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!("mine")]);
}

#[test]
fn test_outer_scope_bindings_are_visible() {
    let mut query_scope = Environment::new();
    query_scope.set("factor", json!(3));
    let source = Scoped {
        outer: Arc::new(query_scope),
        values: vec![json!(1), json!(2)],
    };

    let results = Stream::from_source(source)
        .pipe(Map::new(Expression::Current * Expression::var("factor")))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(3), json!(6)]);
}

#[test]
fn test_reduce_sees_outer_scope_through_rows() {
    let mut query_scope = Environment::new();
    query_scope.set("weight", json!(2));
    let source = Scoped {
        outer: Arc::new(query_scope),
        values: vec![json!(1), json!(2), json!(3)],
    };

    let results = Stream::from_source(source)
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator + Expression::Current * Expression::var("weight"),
        ))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(12)]);
}

#[test]
fn test_reduce_binding_shadows_outer_binding() {
    // The rows carry their own `_acc`-looking variable binding; the reduce
    // frame's accumulator is found first.
    let mut query_scope = Environment::new();
    query_scope.set(docstream::ACCUMULATOR_VAR, json!(1000));
    let source = Scoped {
        outer: Arc::new(query_scope),
        values: vec![json!(1), json!(2)],
    };

    let results = Stream::from_source(source)
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator + Expression::Current,
        ))
        .collect_values()
        .unwrap();
    assert_eq!(results, vec![json!(3)]);
}

#[test]
fn test_filter_error_stops_stream() {
    let mut seen = Vec::new();
    let err = numbers(&[1, 2, 3])
        .pipe(Filter::new(Expression::var("undefined")))
        .iterate(|env| {
            seen.push(env.current_value().cloned());
            Ok(ControlFlow::Continue(()))
        })
        .unwrap_err();
    assert!(matches!(err, StreamError::NotFound(_)));
    assert!(seen.is_empty());
}

#[test]
fn test_take_count_must_be_constant() {
    let err = numbers(&[1, 2, 3])
        .pipe(Take::new(Expression::Current))
        .collect_values()
        .unwrap_err();
    assert!(matches!(err, StreamError::NotFound(_)));
}

#[test]
fn test_custom_expr_implementation() {
    #[derive(Debug)]
    struct Square;

    impl fmt::Display for Square {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("square(_)")
        }
    }

    impl Expr for Square {
        fn eval(&self, env: &Environment) -> StreamResult<Value> {
            let v = Expression::Current.eval(env)?;
            let n = docstream::value::cast_to_integer(&v)?;
            Ok(json!(n * n))
        }
    }

    let stream = numbers(&[2, 3]).pipe(Map::new(Square));
    assert_eq!(stream.to_string(), "rows | map(square(_))");
    assert_eq!(stream.collect_values().unwrap(), vec![json!(4), json!(9)]);
}

#[test]
fn test_cloned_operator_drives_independent_traversals() {
    let take = Take::new(Expression::lit(2));
    let first = numbers(&[1, 2, 3]).pipe(take.clone()).collect_values().unwrap();
    let second = numbers(&[4, 5, 6]).pipe(take).collect_values().unwrap();
    assert_eq!(first, vec![json!(1), json!(2)]);
    assert_eq!(second, vec![json!(4), json!(5)]);
}

#[test]
fn test_iterate_with_debug_logging_enabled() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();

    let results = tracing::subscriber::with_default(subscriber, || {
        numbers(&[1, 2, 3])
            .pipe(Reduce::new(
                Expression::lit(0),
                Expression::Accumulator + Expression::Current,
            ))
            .pipe(Take::new(Expression::lit(1)))
            .collect_values()
    })
    .unwrap();
    assert_eq!(results, vec![json!(6)]);
}

#[test]
fn test_take_zero_reports_upstream_build_errors() {
    let err = numbers(&[1, 2])
        .pipe(Skip::new(Expression::lit("not a number")))
        .pipe(Take::new(Expression::lit(0)))
        .collect_values()
        .unwrap_err();
    assert!(matches!(err, StreamError::TypeError(_)));
}

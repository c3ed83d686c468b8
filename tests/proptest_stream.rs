//! Property-based tests for stream operators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docstream::{Expression, Filter, Map, Reduce, Skip, Stream, Take};
use proptest::prelude::*;
use serde_json::{json, Value};

fn to_values(items: &[i64]) -> Vec<Value> {
    items.iter().map(|i| json!(i)).collect()
}

/// Stream over `items` that counts how many rows were pulled from it.
fn counted(items: &[i64]) -> (Stream, Arc<AtomicUsize>) {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let rows = to_values(items).into_iter().inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (Stream::from_values(rows), pulled)
}

fn arb_items() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-1_000i64..1_000, 0..50)
}

proptest! {
    #[test]
    fn take_yields_prefix_without_lookahead(items in arb_items(), n in 0usize..60) {
        let (stream, pulled) = counted(&items);
        let results = stream
            .pipe(Take::new(Expression::lit(n as i64)))
            .collect_values()
            .unwrap();

        let expected = n.min(items.len());
        let values = to_values(&items);
        prop_assert_eq!(&results[..], &values[..expected]);
        prop_assert_eq!(pulled.load(Ordering::SeqCst), expected);
    }

    #[test]
    fn skip_drops_prefix(items in arb_items(), n in 0usize..60) {
        let results = Stream::from_values(to_values(&items))
            .pipe(Skip::new(Expression::lit(n as i64)))
            .collect_values()
            .unwrap();

        let dropped = n.min(items.len());
        let values = to_values(&items);
        prop_assert_eq!(&results[..], &values[dropped..]);
    }

    #[test]
    fn filter_keeps_truthy_subsequence(items in arb_items(), threshold in -1_000i64..1_000) {
        let results = Stream::from_values(to_values(&items))
            .pipe(Filter::new(Expression::Current.gt(Expression::lit(threshold))))
            .collect_values()
            .unwrap();

        let expected: Vec<Value> = items
            .iter()
            .filter(|&&i| i > threshold)
            .map(|i| json!(i))
            .collect();
        prop_assert!(results.len() <= items.len());
        prop_assert_eq!(results, expected);
    }

    #[test]
    fn map_preserves_length_and_order(items in arb_items(), factor in -100i64..100) {
        let results = Stream::from_values(to_values(&items))
            .pipe(Map::new(Expression::Current * Expression::lit(factor)))
            .collect_values()
            .unwrap();

        let expected: Vec<Value> = items.iter().map(|i| json!(i * factor)).collect();
        prop_assert_eq!(results, expected);
    }

    #[test]
    fn reduce_matches_left_fold(items in arb_items(), seed in -1_000i64..1_000) {
        let results = Stream::from_values(to_values(&items))
            .pipe(Reduce::new(
                Expression::lit(seed),
                Expression::Accumulator - Expression::Current,
            ))
            .collect_values()
            .unwrap();

        let expected = items.iter().fold(seed, |acc, i| acc - i);
        prop_assert_eq!(results, vec![json!(expected)]);
    }
}

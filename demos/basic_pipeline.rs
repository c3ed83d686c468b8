//! Runs a small query pipeline over in-memory documents.
//!
//! ```sh
//! RUST_LOG=docstream=debug cargo run --example basic_pipeline
//! ```

use std::ops::ControlFlow;

use docstream::{
    Expression, Filter, GroupBy, Map, Reduce, Skip, Stream, StreamConfig, StreamResult, Take,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn orders() -> Vec<serde_json::Value> {
    vec![
        json!({"id": 1, "customer": "alice", "amount": 120}),
        json!({"id": 2, "customer": "bob", "amount": 80}),
        json!({"id": 3, "customer": "alice", "amount": 45}),
        json!({"id": 4, "customer": "carol", "amount": 300}),
        json!({"id": 5, "customer": "bob", "amount": 15}),
    ]
}

fn main() -> StreamResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = StreamConfig::default();
    config.apply_env_overrides()?;

    // Second and third orders above 20, by amount.
    let page = Stream::scan(docstream::Rows::new(orders()), &config)
        .pipe(Filter::new(Expression::field("amount").gt(Expression::lit(20))))
        .pipe(Skip::new(Expression::lit(1)))
        .pipe(Take::new(Expression::lit(2)))
        .pipe(Map::new(Expression::field("id")));
    println!("{}", page);
    println!("  -> {:?}", page.collect_values()?);

    // Total amount across all orders.
    let total = Stream::scan(docstream::Rows::new(orders()), &config)
        .pipe(Map::new(Expression::field("amount")))
        .pipe(Reduce::new(
            Expression::lit(0),
            Expression::Accumulator + Expression::Current,
        ));
    println!("{}", total);
    println!("  -> {:?}", total.collect_values()?);

    // Group keys annotate each row.
    let grouped = Stream::scan(docstream::Rows::new(orders()), &config)
        .pipe(GroupBy::new(Expression::field("customer")));
    println!("{}", grouped);
    grouped.iterate(|env| {
        let key = docstream::Expr::eval(&Expression::GroupKey, &env)?;
        println!("  -> {} = {}", Expression::GroupKey, key);
        Ok(ControlFlow::Continue(()))
    })?;

    Ok(())
}

//! Bundles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use trellis_core::{
    Before, Bundle, BundleDescriptor, DerivationDecl, Interceptor, MutationDecl, Record, Signature, StateDecl,
    ValueKind,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// `count` state, `increment` / `add(n)` / `reset` mutations and a
/// `doubled` derivation.
pub fn counter() -> Bundle {
    BundleDescriptor::new("Counter")
        .state(
            StateDecl::new("counter")
                .field("count", ValueKind::Number, json!(0))
                .init_with(|config| {
                    let mut record = Record::new();
                    if let Some(start) = config.prop("start") {
                        record.insert("count".into(), start.clone());
                    }
                    record
                }),
        )
        .mutation(MutationDecl::new(
            "increment",
            Signature::nullary().returns(ValueKind::Number),
            |scope, _| {
                let count = scope.get("counter", "count")?.as_i64().unwrap_or(0) + 1;
                scope.set("counter", "count", json!(count))?;
                Ok(json!(count))
            },
        ))
        .mutation(MutationDecl::new(
            "add",
            Signature::new([ValueKind::Number]).returns(ValueKind::Number),
            |scope, args| {
                let by = args[0].as_i64().unwrap_or(0);
                let count = scope.get("counter", "count")?.as_i64().unwrap_or(0) + by;
                scope.set("counter", "count", json!(count))?;
                Ok(json!(count))
            },
        ))
        .mutation(MutationDecl::new("reset", Signature::nullary(), |scope, _| {
            scope.set("counter", "count", json!(0))?;
            Ok(json!(null))
        }))
        .derivation(DerivationDecl::new("doubled", ValueKind::Number, |scope| {
            let count = scope.field("counter", "count")?.as_i64().unwrap_or(0);
            Ok(json!(count * 2))
        }))
        .define()
        .expect("counter bundle")
}

/// Before and after hooks on `increment` that append to `log`.
pub fn logging(log: &Log) -> Bundle {
    let before_log = Arc::clone(log);
    let after_log = Arc::clone(log);
    BundleDescriptor::new("Logging")
        .depends_on("Counter")
        .intercept(
            "increment",
            Interceptor::before(move |_, args| {
                before_log.lock().push("before increment".into());
                Ok(Before::Continue(args))
            })
            .and_after(move |_, result, _| {
                after_log.lock().push(format!("after increment -> {result}"));
                Ok(result)
            }),
        )
        .define()
        .expect("logging bundle")
}

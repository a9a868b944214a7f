//! Property tests for memoization, isolation and composition order.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use trellis_core::{
    compose, Before, Bundle, BundleDescriptor, BundleRef, InstanceConfig, Interceptor, MutationDecl, Signature,
};

use common::{counter, entries, log, Log};

#[derive(Debug, Clone)]
enum Op {
    Add(i64),
    Increment,
    Reset,
    Read,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-50i64..50).prop_map(Op::Add),
        Just(Op::Increment),
        Just(Op::Reset),
        Just(Op::Read),
    ]
}

fn apply(instance: &trellis_core::Instance, op: &Op, model: &mut i64) {
    match op {
        Op::Add(n) => {
            instance.call("add", vec![json!(n)]).unwrap();
            *model += n;
        }
        Op::Increment => {
            instance.call("increment", vec![]).unwrap();
            *model += 1;
        }
        Op::Reset => {
            instance.call("reset", vec![]).unwrap();
            *model = 0;
        }
        Op::Read => {}
    }
}

/// `Base` declares `tick`; `Hook{i}` appends its name to `log` before it.
fn hook_bundles(count: usize, log: &Log) -> Vec<Bundle> {
    let base = BundleDescriptor::new("Base")
        .mutation(MutationDecl::new("tick", Signature::nullary(), |_, _| Ok(json!(null))))
        .define()
        .unwrap();
    let hooks = (0..count).map(|i| {
        let log = Arc::clone(log);
        BundleDescriptor::new(format!("Hook{i}"))
            .depends_on("Base")
            .intercept(
                "tick",
                Interceptor::before(move |_, args| {
                    log.lock().push(format!("Hook{i}"));
                    Ok(Before::Continue(args))
                }),
            )
            .define()
            .unwrap()
    });
    std::iter::once(base).chain(hooks).collect()
}

proptest! {
    /// A derivation read always matches a fresh computation from state.
    #[test]
    fn derivations_match_state(ops in prop::collection::vec(arb_op(), 0..40)) {
        let instance = compose([&counter()]).unwrap().instantiate(InstanceConfig::default());
        let mut model = 0i64;
        for op in &ops {
            apply(&instance, op, &mut model);
            prop_assert_eq!(instance.read("doubled").unwrap(), json!(model * 2));
        }
    }

    /// Reading without intervening writes never recomputes.
    #[test]
    fn repeated_reads_hit_the_cache(reads in 1usize..10, adds in prop::collection::vec(1i64..5, 0..10)) {
        let instance = compose([&counter()]).unwrap().instantiate(InstanceConfig::default());
        for n in &adds {
            instance.call("add", vec![json!(n)]).unwrap();
            instance.read("doubled").unwrap();
        }
        let before = instance.evaluations("doubled").unwrap();
        for _ in 0..reads {
            instance.read("doubled").unwrap();
        }
        prop_assert_eq!(instance.evaluations("doubled").unwrap(), before.max(1));
    }

    /// Calls on one instance are invisible to its siblings.
    #[test]
    fn instances_are_isolated(ops in prop::collection::vec(arb_op(), 0..20), start in -100i64..100) {
        let composed = compose([&counter()]).unwrap();
        let touched = composed.instantiate(InstanceConfig::default());
        let untouched = composed.instantiate(InstanceConfig::new().with_prop("start", json!(start)));

        let mut model = 0i64;
        for op in &ops {
            apply(&touched, op, &mut model);
        }

        prop_assert_eq!(untouched.read("doubled").unwrap(), json!(start * 2));
        prop_assert_eq!(untouched.state("counter").unwrap().version, 0);
    }

    /// Composing in two steps gives the same hook order as composing flat.
    #[test]
    fn nested_composition_matches_flat(count in 1usize..6, split in 0usize..7) {
        let log = log();
        let bundles = hook_bundles(count, &log);
        let split = split.min(bundles.len());

        let flat = compose(&bundles).unwrap();
        let inner = compose(&bundles[..split]).unwrap();
        let nested = compose(
            std::iter::once(BundleRef::from(&inner)).chain(bundles[split..].iter().map(BundleRef::from)),
        )
        .unwrap();

        prop_assert_eq!(nested.source_names(), flat.source_names());
        prop_assert_eq!(nested.hook_order("tick"), flat.hook_order("tick"));

        nested.instantiate(InstanceConfig::default()).call("tick", vec![]).unwrap();
        let expected: Vec<String> = (0..count).map(|i| format!("Hook{i}")).collect();
        prop_assert_eq!(entries(&log), expected);
    }

    /// Runtime hooks run in registration order, before and after the body.
    #[test]
    fn runtime_hooks_keep_registration_order(names in prop::collection::vec("[a-z]{1,6}", 1..8)) {
        let log = log();
        let instance = compose([&counter()]).unwrap().instantiate(InstanceConfig::default());
        for name in &names {
            let (before, after) = (Arc::clone(&log), Arc::clone(&log));
            let (b, a) = (name.clone(), name.clone());
            instance
                .add_hook(
                    "increment",
                    Interceptor::before(move |_, args| {
                        before.lock().push(format!("before {b}"));
                        Ok(Before::Continue(args))
                    })
                    .and_after(move |_, result, _| {
                        after.lock().push(format!("after {a}"));
                        Ok(result)
                    }),
                )
                .unwrap();
        }

        instance.call("increment", vec![]).unwrap();

        let expected: Vec<String> = names
            .iter()
            .map(|n| format!("before {n}"))
            .chain(names.iter().map(|n| format!("after {n}")))
            .collect();
        prop_assert_eq!(entries(&log), expected);
    }
}

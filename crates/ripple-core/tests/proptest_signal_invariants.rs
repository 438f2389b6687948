//! Property-based invariant tests for ripple-core signals.
//!
//! 1. Inside a batch, a subscriber is notified at most once, with the final
//!    value, and only if it differs from the value before the batch.
//! 2. Outside a batch, a subscriber sees exactly the sequence of distinct
//!    consecutive writes.
//! 3. A subscriber disposed before a write never observes it.
//! 4. A computed value always agrees with a direct evaluation of its sources.
//! 5. An effect observes the final value of every batch exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use ripple_core::{Signal, batch, computed, effect};

fn writes() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-5i32..5, 0..40)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Batched writes notify at most once with the final value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn batch_notifies_at_most_once(initial in -5i32..5, values in writes()) {
        let s = Signal::new(initial);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = s.subscribe(move |v| l.borrow_mut().push(*v));

        batch(|| {
            for v in &values {
                s.set(*v);
            }
        });

        let last = values.last().copied().unwrap_or(initial);
        let log = log.borrow();
        if last == initial {
            prop_assert!(log.is_empty(), "round trip must be silent, got {:?}", *log);
        } else {
            prop_assert_eq!(&*log, &vec![last]);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Unbatched writes deliver each distinct change
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unbatched_writes_deliver_changes(initial in -5i32..5, values in writes()) {
        let s = Signal::new(initial);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = s.subscribe(move |v| l.borrow_mut().push(*v));

        let mut expected = Vec::new();
        let mut current = initial;
        for v in &values {
            s.set(*v);
            if *v != current {
                expected.push(*v);
                current = *v;
            }
        }
        prop_assert_eq!(&*log.borrow(), &expected);
        prop_assert_eq!(s.version() as usize, expected.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Disposed subscribers see nothing afterwards
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn disposed_subscriber_never_notified(
        before in writes(),
        after in writes(),
    ) {
        let s = Signal::new(0);
        let hits_after = Rc::new(RefCell::new(0usize));
        let h = Rc::clone(&hits_after);
        let armed = Rc::new(RefCell::new(false));
        let a = Rc::clone(&armed);
        let sub = s.subscribe(move |_| {
            if *a.borrow() {
                *h.borrow_mut() += 1;
            }
        });
        for v in &before {
            s.set(*v);
        }
        sub.dispose();
        *armed.borrow_mut() = true;
        for v in &after {
            s.set(*v);
        }
        prop_assert_eq!(*hits_after.borrow(), 0);
        prop_assert_eq!(s.listener_count(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Computed agrees with direct evaluation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn computed_matches_direct(a_writes in writes(), b_writes in writes()) {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let (a2, b2) = (a.clone(), b.clone());
        let sum = computed(move || a2.get() * 10 + b2.get());

        for (i, v) in a_writes.iter().enumerate() {
            a.set(*v);
            if let Some(w) = b_writes.get(i) {
                b.set(*w);
            }
            prop_assert_eq!(sum.get(), a.peek() * 10 + b.peek());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Effects run once per batch
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn effect_runs_once_per_batch(batches in proptest::collection::vec(writes(), 1..6)) {
        let s = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s2, seen2) = (s.clone(), Rc::clone(&seen));
        let _e = effect(move || seen2.borrow_mut().push(s2.get()));

        let mut expected = vec![0];
        for values in &batches {
            let before = s.peek();
            batch(|| {
                for v in values {
                    s.set(*v);
                }
            });
            let after = s.peek();
            if after != before {
                expected.push(after);
            }
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}

//! E2E: teardown and failure isolation.
//!
//! Verifies:
//! 1. Unmount leaves no rendered nodes, subscriptions, or running tasks.
//! 2. A failing or panicking component renders the fallback; siblings render.
//! 3. A signal value with no element form affects only its own marker.
//! 4. A backend that never reuses still converges, by replacement.
//! 5. Writes made while the engine is rendering land after the pass.

#![forbid(unsafe_code)]

use pretty_assertions::assert_eq;
use ripple_core::{Signal, batch};
use ripple_harness::{DomFixture, Mutation, TtyFixture, counter, deferred, failing, panicking, ticker};
use ripple_render::{Callback, Component, Value, dynamic, el, fragment, text};

// ── Teardown ────────────────────────────────────────────────────────────

#[test]
fn unmount_releases_everything() {
    let label = Signal::new(Value::from("x"));
    let class = Signal::new(Value::from("c"));
    let count = Signal::new(Value::from(1));
    let (slow, deferred_control) = deferred("Slow");
    let (tick, ticker_control) = ticker("Tick");

    let view = el("main")
        .signal_prop("class", class.clone())
        .child(dynamic(label.clone()))
        .child(counter().element().prop("label", "n").signal_prop("count", count.clone()))
        .child(slow.element())
        .child(tick.element())
        .build();
    let fx = DomFixture::mount(&view);
    fx.engine.run_until_stalled();
    assert!(fx.engine.live_subscriptions() > 0);
    assert_eq!(ticker_control.open(), 1);

    fx.engine.unmount(fx.root);
    fx.engine.run_until_stalled();

    assert_eq!(fx.engine.live_nodes(), 0);
    assert_eq!(fx.engine.live_subscriptions(), 0);
    assert_eq!(label.listener_count(), 0);
    assert_eq!(class.listener_count(), 0);
    assert_eq!(count.listener_count(), 0);
    assert_eq!(deferred_control.cancelled(), 1);
    assert_eq!(ticker_control.open(), 0);
    assert!(fx.body.children().is_empty());

    // Idempotent.
    fx.engine.unmount(fx.root);
    assert_eq!(fx.engine.live_nodes(), 0);
}

#[test]
fn writes_after_unmount_are_inert() {
    let label = Signal::new(Value::from("a"));
    let fx = DomFixture::mount(&el("p").child(dynamic(label.clone())).build());
    fx.engine.unmount(fx.root);
    fx.clear();
    label.set(Value::from("b"));
    assert_eq!(fx.engine.with_strategy(|s| s.log().len()), 0);
}

#[test]
fn replaced_subtree_releases_its_signals() {
    let inner = Signal::new(Value::from("deep"));
    let outer = Signal::new(Value::from(el("p").child(dynamic(inner.clone())).build()));
    let fx = DomFixture::mount(&fragment([dynamic(outer.clone())]));
    assert_eq!(inner.listener_count(), 1);

    outer.set(Value::from("flat"));

    assert_eq!(inner.listener_count(), 0);
    assert_eq!(fx.html(), "flat");
}

// ── Isolation ───────────────────────────────────────────────────────────

#[test]
fn failing_component_is_isolated() {
    let view = el("div")
        .child(el("p").child("a"))
        .child(failing("boom").element())
        .child(el("p").child("b"))
        .build();
    let fx = DomFixture::mount(&view);
    assert_eq!(
        fx.html(),
        "<div><p>a</p><ripple-error role=\"alert\">⚠ boom</ripple-error><p>b</p></div>"
    );
}

#[test]
fn panicking_component_is_isolated() {
    let view = fragment([
        text("before"),
        panicking("kaboom").element().build(),
        text("after"),
    ]);
    let fx = DomFixture::mount(&view);
    let html = fx.html();
    assert!(html.starts_with("before<ripple-error role=\"alert\">"));
    assert!(html.contains("kaboom"));
    assert!(html.ends_with("</ripple-error>after"));
}

#[test]
fn invalid_value_affects_only_its_marker() {
    let good = Signal::new(Value::from("ok"));
    let bad = Signal::new(Value::from("fine"));
    let view = el("div")
        .child(dynamic(good.clone()))
        .child(el("span").child(dynamic(bad.clone())))
        .build();
    let fx = DomFixture::mount(&view);

    bad.set(Value::from(Callback::new(|_| {})));
    let html = fx.html();
    assert!(html.starts_with("<div>ok<span><ripple-error"));
    assert!(html.contains("callback"));

    good.set(Value::from("still ok"));
    assert!(fx.html().starts_with("<div>still ok<span><ripple-error"));

    bad.set(Value::from("recovered"));
    assert_eq!(fx.html(), "<div>still ok<span>recovered</span></div>");
}

// ── Backends without reuse ──────────────────────────────────────────────

#[test]
fn terminal_backend_always_replaces() {
    let label = Signal::new(Value::from("one"));
    let items = Signal::new(Value::from(fragment([
        el("p").key(1).child("first").build(),
        el("p").key(2).child("second").build(),
    ])));
    let view = fragment([
        el("h1").child(dynamic(label.clone())).build(),
        dynamic(items.clone()),
    ]);
    let fx = TtyFixture::mount(&view);
    assert_eq!(fx.lines(20), vec!["one", "first", "second"]);

    label.set(Value::from("two"));
    items.set(Value::from(fragment([
        el("p").key(2).child("second").build(),
        el("p").key(3).child("third").build(),
    ])));

    assert_eq!(fx.lines(20), vec!["two", "second", "third"]);
    let log = fx.engine.with_strategy(|s| s.take());
    assert!(log.iter().any(|m| matches!(m, Mutation::Reuse { accepted: false, .. })));
    assert!(!log.iter().any(|m| matches!(m, Mutation::Reuse { accepted: true, .. })));
    assert!(log.iter().any(|m| matches!(m, Mutation::Replace { .. })));
}

// ── Scheduling ──────────────────────────────────────────────────────────

#[test]
fn write_during_render_lands_after_the_pass() {
    let status = Signal::new(Value::from("idle"));
    let writer = status.clone();
    let eager = Component::new("Eager", move |_, _| {
        writer.set(Value::from("rendered"));
        Ok(text("eager"))
    });
    let view = fragment([dynamic(status.clone()), eager.element().build()]);
    let fx = DomFixture::mount(&view);
    assert_eq!(fx.html(), "renderedeager");
}

#[test]
fn batched_writes_apply_once() {
    let a = Signal::new(Value::from("a"));
    let b = Signal::new(Value::from("b"));
    let fx = DomFixture::mount(&el("p").child(dynamic(a.clone())).child(dynamic(b.clone())).build());
    batch(|| {
        a.set(Value::from("x"));
        a.set(Value::from("y"));
        b.set(Value::from("z"));
    });
    assert_eq!(fx.html(), "<p>yz</p>");
    assert_eq!(fx.engine.with_strategy(|s| s.count("reuse")), 2);
}

//! Engine + terminal backend.

use pretty_assertions::assert_eq;
use ripple_core::Signal;
use ripple_render::{Element, Engine, Value, dynamic, el, fragment};
use ripple_tty::TtyStrategy;

fn mount(view: &Element) -> Engine<TtyStrategy> {
    let tty = TtyStrategy::new();
    let screen = tty.screen();
    let engine = Engine::new(tty);
    engine.mount(screen, view);
    engine
}

fn lines(engine: &Engine<TtyStrategy>) -> Vec<String> {
    engine.with_strategy(|t| t.lines(20))
}

#[test]
fn text_change_replaces_node() {
    let label = Signal::new(Value::from("one"));
    let view = el("p").child("n: ").child(dynamic(label.clone())).build();
    let engine = mount(&view);
    let screen = engine.with_strategy(|t| t.screen());
    let p = engine.with_strategy(|t| t.children(screen)[0]);
    let before = engine.with_strategy(|t| t.children(p));
    engine.with_strategy(TtyStrategy::reset_stats);

    label.set(Value::from("two"));

    let after = engine.with_strategy(|t| t.children(p));
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    let stats = engine.with_strategy(|t| t.stats());
    assert_eq!(stats.created, 1);
    assert_eq!(stats.replaced, 1);
    assert_eq!(lines(&engine), vec!["n: two"]);
}

#[test]
fn equal_write_is_silent() {
    let label = Signal::new(Value::from("same"));
    let engine = mount(&el("p").child(dynamic(label.clone())).build());
    engine.with_strategy(TtyStrategy::reset_stats);
    label.set(Value::from("same"));
    assert_eq!(engine.with_strategy(|t| t.stats()), Default::default());
}

#[test]
fn list_update_repaints() {
    let rows = Signal::new(Value::from(fragment([
        el("p").key(1).child("first").build(),
        el("p").key(2).child("second").build(),
    ])));
    let engine = mount(&fragment([dynamic(rows.clone())]));
    assert_eq!(lines(&engine), vec!["first", "second"]);

    rows.set(Value::from(fragment([
        el("p").key(2).child("second").build(),
        el("p").key(3).child("third").build(),
    ])));
    assert_eq!(lines(&engine), vec!["second", "third"]);
}

#[test]
fn unmount_frees_every_node() {
    let label = Signal::new(Value::from("x"));
    let tty = TtyStrategy::new();
    let screen = tty.screen();
    let engine = Engine::new(tty);
    let root = engine.mount(screen, &el("div").child(el("p").child(dynamic(label.clone()))).build());
    engine.unmount(root);
    assert_eq!(engine.with_strategy(|t| t.node_count()), 1);
    assert_eq!(engine.live_nodes(), 0);
    assert_eq!(label.listener_count(), 0);
}

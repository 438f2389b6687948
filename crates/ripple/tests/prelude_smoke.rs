//! Smoke tests for the facade prelude: one reactive source driving both
//! backends.

#![forbid(unsafe_code)]
#![cfg(all(feature = "dom", feature = "tty"))]

use pretty_assertions::assert_eq;
use ripple::prelude::*;

fn view(label: &Computed<Value>) -> Element {
    el("p").child(dynamic(label.clone())).build()
}

#[test]
fn computed_label_drives_document() {
    let count = Signal::new(3_i64);
    let source = count.clone();
    let label = computed(move || Value::from(format!("count {}", source.get())));

    let doc = Document::new();
    let engine = Engine::new(DomStrategy::new(doc.clone()));
    engine.mount(doc.body(), &view(&label));
    assert_eq!(doc.body().inner_html(), "<p>count 3</p>");

    count.set(4);
    assert_eq!(doc.body().inner_html(), "<p>count 4</p>");
    assert_eq!(render_to_string(&view(&label)).html, "<p>count 4</p>");
}

#[test]
fn computed_label_drives_terminal() {
    let count = Signal::new(1_i64);
    let source = count.clone();
    let label = computed(move || Value::from(format!("count {}", source.get())));

    let tty = TtyStrategy::new();
    let screen = tty.screen();
    let engine = Engine::new(tty);
    engine.mount(screen, &view(&label));
    assert_eq!(engine.with_strategy(|t| t.lines(16)), vec!["count 1"]);

    batch(|| {
        count.set(2);
        count.set(5);
    });
    assert_eq!(engine.with_strategy(|t| t.lines(16)), vec!["count 5"]);
}

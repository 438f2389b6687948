#![forbid(unsafe_code)]

//! Flow layout from the node tree into a [`CellBuffer`].
//!
//! Block tags start on a fresh row and end their row; inline tags and text
//! flow. Text wraps at the buffer width on grapheme boundaries, and `\n` or
//! a `br` element forces a break.
//!
//! | Tag               | Style           |
//! |-------------------|-----------------|
//! | `b`, `strong`     | bold            |
//! | `i`, `em`         | italic          |
//! | `u`               | underline       |
//! | `s`               | strikethrough   |
//! | `dim`             | dim             |
//!
//! A `reverse` prop set to `true` reverses the subtree; a truthy `hidden`
//! prop skips it.

use ripple_render::Value;
use unicode_segmentation::UnicodeSegmentation;

use crate::cell::{CellBuffer, StyleFlags, grapheme_width};
use crate::strategy::{TtyKind, TtyNode, TtyStrategy};

const INLINE_TAGS: &[&str] = &[
    "a", "b", "code", "dim", "em", "i", "label", "s", "span", "strong", "u",
];

#[must_use]
pub fn is_inline_tag(tag: &str) -> bool {
    INLINE_TAGS.contains(&tag)
}

fn tag_style(tag: &str) -> StyleFlags {
    match tag {
        "b" | "strong" => StyleFlags::BOLD,
        "i" | "em" => StyleFlags::ITALIC,
        "u" => StyleFlags::UNDERLINE,
        "s" => StyleFlags::STRIKETHROUGH,
        "dim" => StyleFlags::DIM,
        _ => StyleFlags::empty(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null | Value::Bool(false)))
}

pub(crate) struct Painter<'a> {
    tty: &'a TtyStrategy,
    buf: CellBuffer,
    row: usize,
    col: usize,
    flags: StyleFlags,
}

impl<'a> Painter<'a> {
    pub(crate) fn new(tty: &'a TtyStrategy, width: usize) -> Self {
        Self {
            tty,
            buf: CellBuffer::new(width),
            row: 0,
            col: 0,
            flags: StyleFlags::empty(),
        }
    }

    pub(crate) fn finish(self) -> CellBuffer {
        self.buf
    }

    fn newline(&mut self) {
        self.row += 1;
        self.col = 0;
    }

    fn end_line(&mut self) {
        if self.col > 0 {
            self.newline();
        }
    }

    pub(crate) fn node(&mut self, node: TtyNode) {
        let Some(data) = self.tty.data(node) else {
            tracing::warn!(?node, "painting a freed node");
            return;
        };
        match &data.kind {
            TtyKind::Text(content) => self.text(content),
            TtyKind::Element { tag, props } => {
                if truthy(props.get("hidden")) {
                    return;
                }
                if tag == "br" {
                    self.newline();
                    return;
                }
                let saved = self.flags;
                self.flags |= tag_style(tag);
                if matches!(props.get("reverse"), Some(Value::Bool(true))) {
                    self.flags |= StyleFlags::REVERSE;
                }
                let block = !is_inline_tag(tag);
                if block {
                    self.end_line();
                }
                for child in &data.children {
                    self.node(*child);
                }
                if block {
                    self.end_line();
                }
                self.flags = saved;
            }
        }
    }

    fn text(&mut self, content: &str) {
        for g in content.graphemes(true) {
            if g == "\n" || g == "\r\n" {
                self.newline();
                continue;
            }
            let w = grapheme_width(g);
            if w == 0 {
                continue;
            }
            if self.col + w > self.buf.width() && self.col > 0 {
                self.newline();
            }
            self.col += self.buf.put(self.row, self.col, g, self.flags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ripple_render::RenderStrategy;

    fn tree(build: impl FnOnce(&mut TtyStrategy, TtyNode)) -> TtyStrategy {
        let mut tty = TtyStrategy::new();
        let screen = tty.screen();
        build(&mut tty, screen);
        tty
    }

    fn add(tty: &mut TtyStrategy, parent: TtyNode, tag: &str) -> TtyNode {
        let n = tty.create_element(tag);
        tty.append_child(&parent, &n);
        n
    }

    fn add_text(tty: &mut TtyStrategy, parent: TtyNode, text: &str) {
        let n = tty.create_text(text);
        tty.append_child(&parent, &n);
    }

    #[test]
    fn blocks_stack_and_inlines_flow() {
        let tty = tree(|tty, screen| {
            let title = add(tty, screen, "h1");
            add_text(tty, title, "Title");
            let p = add(tty, screen, "p");
            add_text(tty, p, "a ");
            let b = add(tty, p, "b");
            add_text(tty, b, "bold");
            add_text(tty, p, " c");
        });
        assert_eq!(tty.lines(20), vec!["Title", "a bold c"]);
        let buf = tty.paint(20);
        assert_eq!(buf.cell(1, 2).map(|c| c.flags), Some(StyleFlags::BOLD));
        assert_eq!(buf.cell(1, 6).map(|c| c.flags), Some(StyleFlags::empty()));
    }

    #[test]
    fn text_wraps_at_width() {
        let tty = tree(|tty, screen| add_text(tty, screen, "abcdefg"));
        assert_eq!(tty.lines(3), vec!["abc", "def", "g"]);
    }

    #[test]
    fn wide_grapheme_wraps_whole() {
        let tty = tree(|tty, screen| add_text(tty, screen, "ab世"));
        assert_eq!(tty.lines(3), vec!["ab", "世"]);
    }

    #[test]
    fn explicit_breaks() {
        let tty = tree(|tty, screen| {
            add_text(tty, screen, "a\nb");
            add(tty, screen, "br");
            add_text(tty, screen, "c");
        });
        assert_eq!(tty.lines(10), vec!["a", "b", "c"]);
    }

    #[test]
    fn hidden_subtree_is_skipped() {
        let tty = tree(|tty, screen| {
            let p = add(tty, screen, "p");
            add_text(tty, p, "shown");
            let q = add(tty, screen, "p");
            tty.set_property(&q, "hidden", &Value::from(true));
            add_text(tty, q, "secret");
        });
        assert_eq!(tty.lines(10), vec!["shown"]);
    }

    #[test]
    fn reverse_prop_styles_subtree() {
        let tty = tree(|tty, screen| {
            let p = add(tty, screen, "p");
            tty.set_property(&p, "reverse", &Value::from(true));
            add_text(tty, p, "x");
        });
        let buf = tty.paint(4);
        assert_eq!(buf.cell(0, 0).map(|c| c.flags), Some(StyleFlags::REVERSE));
    }
}

#![forbid(unsafe_code)]

//! Cell grid the terminal painter writes into.
//!
//! # Invariants
//!
//! 1. A grapheme wider than one column occupies its cell plus
//!    `width - 1` [`CellContent::Continuation`] cells to its right.
//! 2. Every row has exactly `width` cells; rows are added on demand.
//! 3. Writes past the right edge are dropped, never wrapped. Wrapping is the
//!    painter's job.

use unicode_width::UnicodeWidthStr;

bitflags::bitflags! {
    /// 8-bit cell style flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct StyleFlags: u8 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const REVERSE       = 0b0010_0000;
        const STRIKETHROUGH = 0b0100_0000;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CellContent {
    #[default]
    Empty,
    Grapheme(Box<str>),
    /// Trailing column of a wide grapheme.
    Continuation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub content: CellContent,
    pub flags: StyleFlags,
}

impl Cell {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content == CellContent::Empty
    }
}

/// Display width of a grapheme, in columns.
#[inline]
#[must_use]
pub fn grapheme_width(g: &str) -> usize {
    UnicodeWidthStr::width(g)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBuffer {
    width: usize,
    rows: Vec<Vec<Cell>>,
}

impl CellBuffer {
    /// An empty buffer `width` columns wide (at least one).
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            rows: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)
    }

    /// Make sure `row` exists.
    pub fn ensure_row(&mut self, row: usize) {
        while self.rows.len() <= row {
            self.rows.push(vec![Cell::default(); self.width]);
        }
    }

    /// Write `grapheme` at (`row`, `col`). Returns the columns consumed, or
    /// zero when it does not fit.
    pub fn put(&mut self, row: usize, col: usize, grapheme: &str, flags: StyleFlags) -> usize {
        let w = grapheme_width(grapheme);
        if w == 0 || col + w > self.width {
            return 0;
        }
        self.ensure_row(row);
        let cells = &mut self.rows[row];
        cells[col] = Cell {
            content: CellContent::Grapheme(grapheme.into()),
            flags,
        };
        for cell in &mut cells[col + 1..col + w] {
            *cell = Cell {
                content: CellContent::Continuation,
                flags,
            };
        }
        w
    }

    /// Text of one row with trailing blanks trimmed.
    #[must_use]
    pub fn row_text(&self, row: usize) -> String {
        let Some(cells) = self.rows.get(row) else {
            return String::new();
        };
        let mut out = String::with_capacity(self.width);
        for cell in cells {
            match &cell.content {
                CellContent::Empty => out.push(' '),
                CellContent::Grapheme(g) => out.push_str(g),
                CellContent::Continuation => {}
            }
        }
        out.truncate(out.trim_end().len());
        out
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        (0..self.height()).map(|r| self.row_text(r)).collect()
    }
}

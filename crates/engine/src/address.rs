//! Cell identity and rectangular spans.
//!
//! An `Address` uniquely identifies a cell in the engine's single address
//! space. It is the node type of the dependency graph and the key of the
//! cell store. The A1 string form exists only at the parse/format boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a cell.
///
/// Both components are 0-based: `Address::new(0, 0)` is `A1`,
/// `Address::new(1, 1)` is `B2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address {
    /// Row index (0-based). Declared first so `Ord` is row-major.
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Address {
    /// Create a new address from (column, row).
    #[inline]
    pub fn new(col: usize, row: usize) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style reference (`B2`, `$B$2`, `aa10`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let mut letters = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                letters.push(c.to_ascii_uppercase());
                chars.next();
            } else {
                break;
            }
        }
        if letters.is_empty() {
            return None;
        }

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let digits: String = chars.collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self::new(letters_to_col(&letters)?, row - 1))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row as u128 + 1)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Inclusive rectangle of cells.
///
/// Always normalized: `start` is the top-left corner and `end` the
/// bottom-right, whichever corners were passed to `new`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Address,
    pub end: Address,
}

impl Range {
    pub fn new(a: Address, b: Address) -> Self {
        Self {
            start: Address::new(a.col.min(b.col), a.row.min(b.row)),
            end: Address::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Rows spanned, saturating at `usize::MAX`.
    pub fn rows(&self) -> usize {
        (self.end.row - self.start.row).saturating_add(1)
    }

    /// Columns spanned, saturating at `usize::MAX`.
    pub fn cols(&self) -> usize {
        (self.end.col - self.start.col).saturating_add(1)
    }

    /// Number of cells covered. `None` on overflow.
    pub fn cell_count(&self) -> Option<usize> {
        let rows = (self.end.row - self.start.row).checked_add(1)?;
        let cols = (self.end.col - self.start.col).checked_add(1)?;
        rows.checked_mul(cols)
    }

    pub fn contains(&self, addr: Address) -> bool {
        (self.start.col..=self.end.col).contains(&addr.col)
            && (self.start.row..=self.end.row).contains(&addr.row)
    }

    /// Iterate the covered cells row-major.
    pub fn cells(&self) -> impl Iterator<Item = Address> + '_ {
        let (c0, c1) = (self.start.col, self.end.col);
        (self.start.row..=self.end.row)
            .flat_map(move |row| (c0..=c1).map(move |col| Address::new(col, row)))
    }

    /// Clip to the first `max_cols` x `max_rows` cells of the sheet.
    /// Returns `None` if nothing of the range lies inside.
    pub fn clip(&self, max_cols: usize, max_rows: usize) -> Option<Range> {
        if self.start.col >= max_cols || self.start.row >= max_rows {
            return None;
        }
        Some(Range {
            start: self.start,
            end: Address::new(self.end.col.min(max_cols - 1), self.end.row.min(max_rows - 1)),
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Convert 0-based column index to Excel-style letter(s).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert upper-case column letters to a 0-based index (A=0, Z=25, AA=26).
pub fn letters_to_col(letters: &str) -> Option<usize> {
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc = acc.checked_mul(26)?.checked_add(c as usize - 'A' as usize + 1)?;
    }
    acc.checked_sub(1)
}

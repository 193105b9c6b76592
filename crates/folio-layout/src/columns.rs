//! Balancing of a frame's content over multiple columns.

use std::num::NonZeroU32;
use std::ops::Range;

use folio_utils::Numeric;
use smallvec::SmallVec;

use crate::content::{Break, Piece};
use crate::geom::{Abs, Dir, Point, Rect, Size};

/// Settings for a frame's column layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ColumnConfig {
    /// The number of columns.
    pub count: NonZeroU32,
    /// The amount of space between columns.
    pub gutter: Abs,
    /// The horizontal direction in which columns progress.
    pub dir: Dir,
}

impl ColumnConfig {
    /// Create settings for `count` columns progressing left to right.
    pub fn new(count: NonZeroU32, gutter: Abs) -> Self {
        Self { count, gutter, dir: Dir::LTR }
    }
}

/// One balanced column: a range of pieces and their summed height.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnRun {
    /// The pieces in this column, as flat indices.
    pub pieces: Range<usize>,
    /// The column's content height.
    pub height: Abs,
}

/// The result of balancing pieces over columns.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Balance {
    /// The per-column runs, first column first.
    pub runs: SmallVec<[ColumnRun; 4]>,
    /// The content height the balancer actually needed: the height of the
    /// tallest column.
    pub needed: Abs,
}

/// Distribute pieces over `count` columns.
///
/// Columns are filled in order: a piece goes into the current column until
/// the target height would be exceeded, except that explicit column or page
/// breaks in the content cut a column early. The balancer never requests
/// growth of its parent; if the pieces do not fit the target, the reported
/// `needed` height exceeds it and the parent decides whether to grow.
pub fn balance(pieces: &[Piece], count: NonZeroU32, target: Abs) -> Balance {
    let count = count.get() as usize;
    let mut runs: SmallVec<[ColumnRun; 4]> = SmallVec::new();

    let mut start = 0;
    let mut height = Abs::zero();
    for (i, piece) in pieces.iter().enumerate() {
        // Only cut while a further column is available; the last column
        // absorbs everything that remains.
        let can_cut = runs.len() + 1 < count;
        let forced = can_cut && i > start && piece.forced != Break::None;
        let full = can_cut && !height.is_zero() && !target.fits(height + piece.height);
        if forced || full {
            runs.push(ColumnRun { pieces: start..i, height });
            start = i;
            height = Abs::zero();
            if runs.len() + 1 == count {
                // The last column takes everything that remains.
                break;
            }
        }
        height += piece.height;
    }

    // The trailing column.
    let height = pieces[start..].iter().map(|piece| piece.height).sum();
    runs.push(ColumnRun { pieces: start..pieces.len(), height });

    // Pad with empty columns so the count always matches.
    while runs.len() < count {
        runs.push(ColumnRun { pieces: pieces.len()..pieces.len(), height: Abs::zero() });
    }

    let needed = runs.iter().map(|run| run.height).fold(Abs::zero(), Abs::max);
    Balance { runs, needed }
}

/// Compute the rectangles the balanced columns occupy inside a print area.
///
/// Columns progress along the configured direction: in a right-to-left
/// writing mode the first column sits at the right edge.
pub fn column_rects(config: ColumnConfig, print: Rect, runs: &[ColumnRun]) -> Vec<Rect> {
    let count = runs.len().max(1);
    let gutter = config.gutter;
    let width =
        ((print.width() - gutter * (count - 1) as f64) / count as f64).max(Abs::zero());

    runs.iter()
        .enumerate()
        .map(|(i, run)| {
            let advance = (width + gutter) * i as f64;
            let x = if config.dir.is_positive() {
                print.left() + advance
            } else {
                print.right() - width - advance
            };
            Rect::new(Point::new(x, print.top()), Size::new(width, run.height))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(value: f64) -> Abs {
        Abs::pt(value)
    }

    fn lines(heights: &[f64]) -> Vec<Piece> {
        heights.iter().map(|&h| Piece::new(1, pt(h))).collect()
    }

    fn two() -> NonZeroU32 {
        NonZeroU32::new(2).unwrap()
    }

    #[test]
    fn test_balance_fills_first_column_first() {
        let pieces = lines(&[10.0, 10.0, 10.0, 10.0]);
        let balance = balance(&pieces, two(), pt(20.0));
        assert_eq!(balance.runs.len(), 2);
        assert_eq!(balance.runs[0].pieces, 0..2);
        assert_eq!(balance.runs[1].pieces, 2..4);
        assert_eq!(balance.needed, pt(20.0));
    }

    #[test]
    fn test_balance_never_exceeds_target_except_last() {
        let pieces = lines(&[15.0, 15.0, 15.0, 15.0, 15.0]);
        let balance = balance(&pieces, two(), pt(30.0));
        assert_eq!(balance.runs[0].pieces, 0..2);
        // The last column absorbs the overflow and reports it via `needed`.
        assert_eq!(balance.runs[1].pieces, 2..5);
        assert_eq!(balance.needed, pt(45.0));
    }

    #[test]
    fn test_forced_break_cuts_early() {
        let mut pieces = lines(&[10.0, 10.0, 10.0]);
        pieces[1].forced = Break::Column;
        let balance = balance(&pieces, two(), pt(100.0));
        assert_eq!(balance.runs[0].pieces, 0..1);
        assert_eq!(balance.runs[1].pieces, 1..3);
    }

    #[test]
    fn test_short_content_pads_empty_columns() {
        let pieces = lines(&[10.0]);
        let balance = balance(&pieces, NonZeroU32::new(3).unwrap(), pt(100.0));
        assert_eq!(balance.runs.len(), 3);
        assert!(balance.runs[1].height.is_zero());
        assert!(balance.runs[2].height.is_zero());
    }

    #[test]
    fn test_column_rects_rtl_progression() {
        let config = ColumnConfig {
            count: two(),
            gutter: pt(10.0),
            dir: Dir::RTL,
        };
        let print = Rect::new(Point::zero(), Size::new(pt(210.0), pt(100.0)));
        let pieces = lines(&[10.0, 10.0]);
        let balance = balance(&pieces, two(), pt(10.0));
        let rects = column_rects(config, print, &balance.runs);
        assert_eq!(rects[0].left(), pt(110.0));
        assert_eq!(rects[1].left(), pt(0.0));
        assert_eq!(rects[0].width(), pt(100.0));
    }
}

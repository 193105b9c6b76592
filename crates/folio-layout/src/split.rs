//! Deciding whether and where a frame's content may split across a page
//! boundary.
//!
//! The coordinator only reports: eligibility and the vertical deadline a
//! split-eligible frame may not grow past. It never performs the split
//! itself; the flow-continuation step that creates a follow frame on the
//! next page lives outside this core.

use crate::engine::Engine;
use crate::geom::Abs;
use crate::tree::{FrameId, LayoutTree};

impl LayoutTree {
    /// Whether the frame is permitted to have its content divided across a
    /// page boundary.
    ///
    /// Frames anchored inside footnotes or multi-column sections and frames
    /// explicitly marked non-splitting are excluded.
    pub fn split_eligible(&self, id: FrameId) -> bool {
        self.frame(id).is_some_and(|frame| {
            !frame.no_split && !frame.in_footnote && !frame.in_columns
        })
    }

    /// The vertical coordinate beyond which the frame may not grow on its
    /// current page: the bottom of the usable print area of the anchor's
    /// page.
    ///
    /// Returns `None` when the frame is not registered on a page; without a
    /// page there is no boundary to respect.
    pub fn split_deadline(&self, engine: &Engine, id: FrameId) -> Option<Abs> {
        let page = self.frame(id)?.page?;
        let origin = self.page_origin(page, engine.config.page_gap)?;
        Some(self.page(page)?.print_rect(origin).bottom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::content::PlainHost;
    use crate::engine::{Engine, LayoutConfig};
    use crate::frame::FloatFrame;
    use crate::geom::{Sides, Size};

    fn pt(value: f64) -> Abs {
        Abs::pt(value)
    }

    #[test]
    fn test_eligibility_exclusions() {
        let mut tree = LayoutTree::new();
        let plain = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0));
        let marked = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0).with_no_split());
        let footnote = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0).in_footnote());
        let columned = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0).in_columns());

        assert!(tree.split_eligible(plain));
        assert!(!tree.split_eligible(marked));
        assert!(!tree.split_eligible(footnote));
        assert!(!tree.split_eligible(columned));
    }

    #[test]
    fn test_deadline_is_print_area_bottom() {
        let host = PlainHost::new();
        let engine = Engine::new(&host, LayoutConfig::default());
        let mut tree = LayoutTree::new();
        let page = tree.add_page(
            Size::new(pt(500.0), pt(800.0)),
            Sides::splat(pt(50.0)),
        );
        let id = tree.insert(FloatFrame::new(
            Anchor::Page(page, crate::anchor::PageRelation::PrintArea),
            0..0,
        ));

        // Not on a page yet: no deadline.
        assert_eq!(tree.split_deadline(&engine, id), None);

        tree.append_object(page, id);
        assert_eq!(tree.split_deadline(&engine, id), Some(pt(750.0)));
    }
}

//! Resolution of anchor-relative positions.

use crate::content::{ContentHost, NodeIdx};
use crate::geom::{Abs, Point};
use crate::tree::{FrameId, LayoutTree, PageId};

/// The off-screen position a frame is parked at while its anchor dangles.
///
/// Parked frames stay parked until the next full invalidation.
pub const PARKED: Point = Point::splat(Abs::raw(-1e9));

/// Which rectangle of a page a page-anchored frame is positioned against.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PageRelation {
    /// The full page frame, ignoring margins.
    #[default]
    Frame,
    /// The print area inside the margins.
    PrintArea,
}

/// What a frame is positioned relative to.
///
/// All variants are weak references: resolution is a lookup that can fail,
/// never a dereference of an owning pointer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Anchor {
    /// Relative to a page.
    Page(PageId, PageRelation),
    /// Relative to a flowed paragraph or table.
    Paragraph(NodeIdx),
    /// Relative to a character within a paragraph.
    Char {
        /// The paragraph holding the character.
        node: NodeIdx,
        /// The character's offset within the paragraph.
        offset: u32,
    },
    /// Relative to another floating frame's content origin.
    Frame(FrameId),
}

impl Anchor {
    /// The content node the anchor sits in, if it is content-relative.
    pub fn node(&self) -> Option<NodeIdx> {
        match *self {
            Self::Paragraph(node) | Self::Char { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Compute the absolute base point the anchored frame's offset applies
    /// to. Returns `None` when the anchor dangles.
    ///
    /// `flow_width` is the width the anchor's content was flowed at; it only
    /// matters for character anchors, whose base depends on which line the
    /// character ended up on.
    pub(crate) fn resolve(
        &self,
        tree: &LayoutTree,
        host: &dyn ContentHost,
        page_gap: Abs,
        flow_width: Abs,
    ) -> Option<Point> {
        match *self {
            Self::Page(page, relation) => {
                let origin = tree.page_origin(page, page_gap)?;
                match relation {
                    PageRelation::Frame => Some(origin),
                    PageRelation::PrintArea => {
                        let margins = tree.page(page)?.margins();
                        Some(origin + Point::new(margins.left, margins.top))
                    }
                }
            }
            Self::Paragraph(node) => host.origin(node),
            Self::Char { node, offset } => {
                let origin = host.origin(node)?;
                // The anchor character may have wrapped into a continuation
                // line: walk forward over the lines before it, accumulating
                // their heights, until we reach the line that contains it at
                // the current layout pass.
                let measured = host.measure(node, flow_width)?;
                let line = measured.piece_at(offset);
                Some(origin + Point::with_y(measured.height_until(line)))
            }
            Self::Frame(parent) => {
                let parent = tree.frame(parent)?;
                if parent.is_parked() {
                    return None;
                }
                Some(parent.print_area().origin)
            }
        }
    }
}

//! Pages and their ordered registries of floating objects.

use std::ops::Range;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::content::NodeIdx;
use crate::frame::Validity;
use crate::geom::{Abs, Point, Rect, Sides, Size};
use crate::tree::{FrameId, LayoutTree, PageId};

/// One page of the document.
///
/// The page holds an ordered registry of the floating objects anchored to
/// it or to content it contains. The order is the stable paint order: the
/// registry is sorted by each object's ordinal, and objects are processed
/// and wrap-tested in ascending ordinal order.
#[derive(Debug, Clone)]
pub struct Page {
    size: Size,
    margins: Sides<Abs>,
    objects: SmallVec<[FrameId; 4]>,
}

impl Page {
    /// Create an empty page.
    pub fn new(size: Size, margins: Sides<Abs>) -> Self {
        Self { size, margins, objects: SmallVec::new() }
    }

    /// The page's full size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// The page's margins.
    pub fn margins(&self) -> Sides<Abs> {
        self.margins
    }

    /// The size of the print area inside the margins.
    pub fn print_size(&self) -> Size {
        let shrink = self.margins.sum_by_axis();
        Size::new(
            (self.size.x - shrink.x).max(Abs::zero()),
            (self.size.y - shrink.y).max(Abs::zero()),
        )
    }

    /// The page frame at the given absolute origin.
    pub fn frame_rect(&self, origin: Point) -> Rect {
        Rect::new(origin, self.size)
    }

    /// The print area at the given absolute origin.
    pub fn print_rect(&self, origin: Point) -> Rect {
        self.frame_rect(origin).inset(self.margins)
    }

    /// The registered objects in ascending paint order.
    pub fn objects(&self) -> &[FrameId] {
        &self.objects
    }

    pub(crate) fn insert_object_at(&mut self, at: usize, id: FrameId) {
        self.objects.insert(at, id);
    }

    pub(crate) fn remove_object(&mut self, id: FrameId) {
        self.objects.retain(|&mut other| other != id);
    }
}

impl LayoutTree {
    /// Register a frame on a page, assigning or confirming its paint-order
    /// ordinal.
    ///
    /// A frame is resident on at most one page; registering it while it is
    /// still on another page moves it there (remove, then append).
    pub fn append_object(&mut self, page: PageId, id: FrameId) {
        let Some(frame) = self.frame(id) else { return };
        if let Some(old) = frame.page {
            if old == page {
                return;
            }
            self.remove_object(old, id);
        }

        // A fresh frame gets the next free ordinal; one that brings an
        // ordinal along keeps it.
        let ordinal = match self.frame(id).map(|frame| frame.ordinal) {
            Some(0) | None => {
                let max = self
                    .page(page)
                    .map(|p| {
                        p.objects()
                            .iter()
                            .filter_map(|&o| self.frame(o))
                            .map(|f| f.ordinal)
                            .max()
                            .unwrap_or(0)
                    })
                    .unwrap_or(0);
                max + 1
            }
            Some(ordinal) => ordinal,
        };

        if let Some(frame) = self.frame_mut(id) {
            frame.ordinal = ordinal;
            frame.page = Some(page);
        }

        let at = self
            .page(page)
            .map(|p| {
                p.objects()
                    .iter()
                    .position(|&other| {
                        self.frame(other).map(|f| f.ordinal).unwrap_or(0) > ordinal
                    })
                    .unwrap_or(p.objects().len())
            })
            .unwrap_or(0);
        if let Some(page) = self.page_mut(page) {
            page.insert_object_at(at, id);
        }
    }

    /// Deregister a frame from a page.
    pub fn remove_object(&mut self, page: PageId, id: FrameId) {
        if let Some(page) = self.page_mut(page) {
            page.remove_object(id);
        }
        if let Some(frame) = self.frame_mut(id) {
            if frame.page == Some(page) {
                frame.page = None;
            }
        }
    }

    /// Move a frame to another page.
    ///
    /// Page membership is never mutated in place; the move is exactly a
    /// remove followed by an append.
    pub fn transfer_object(&mut self, id: FrameId, to: PageId) {
        if let Some(from) = self.frame(id).and_then(|frame| frame.page) {
            self.remove_object(from, id);
        }
        self.append_object(to, id);
    }

    /// Invalidate every object on the page whose anchor sits inside the
    /// given content range, after that content's own layout changed.
    ///
    /// With `unlock_positions`, position locks are released so the objects
    /// may move on the next pass.
    pub fn notify_lower_objects(
        &mut self,
        page: PageId,
        range: Range<NodeIdx>,
        unlock_positions: bool,
    ) {
        // Snapshot: invalidation must not be confused by registry mutation
        // while we walk it.
        let snapshot: Vec<FrameId> = self
            .page(page)
            .map(|p| p.objects().to_vec())
            .unwrap_or_default();

        let mut seen = FxHashSet::default();
        for id in snapshot {
            if !seen.insert(id) {
                continue;
            }
            let Some(frame) = self.frame_mut(id) else { continue };
            let Some(node) = frame.anchor.node() else { continue };
            if range.contains(&node) {
                frame.valid.remove(Validity::POSITION | Validity::SIZE);
                if unlock_positions {
                    frame.position_locked = false;
                }
            }
        }
    }
}

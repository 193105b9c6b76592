//! The retained layout tree: arenas for pages and floating frames.
//!
//! Frames and pages are referenced by plain handles. A handle is never an
//! owning pointer; looking one up after the referent was removed yields
//! `None`, which callers treat as a dangling reference.

use std::fmt::{self, Debug, Formatter};

use crate::anchor::Anchor;
use crate::frame::{FloatFrame, Validity};
use crate::geom::{Abs, Point, Sides, Size};
use crate::page::Page;

/// A stable handle to a floating frame.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FrameId(u32);

impl FrameId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Debug for FrameId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

/// A stable handle to a page.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PageId(u32);

impl PageId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Debug for PageId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

/// The retained layout state of one document.
#[derive(Debug, Default)]
pub struct LayoutTree {
    frames: Vec<Option<FloatFrame>>,
    pages: Vec<Page>,
    pub(crate) in_pass: bool,
}

impl LayoutTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page to the page sequence.
    pub fn add_page(&mut self, size: Size, margins: Sides<Abs>) -> PageId {
        self.pages.push(Page::new(size, margins));
        PageId::from_index(self.pages.len() - 1)
    }

    /// Access a page.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.index())
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(id.index())
    }

    /// The pages, front to back.
    pub fn pages(&self) -> impl Iterator<Item = PageId> + '_ {
        (0..self.pages.len()).map(PageId::from_index)
    }

    /// The page after the given one in the sequence.
    pub fn page_after(&self, id: PageId) -> Option<PageId> {
        let next = id.index() + 1;
        (next < self.pages.len()).then(|| PageId::from_index(next))
    }

    /// The absolute origin of the page: pages stack vertically with `gap`
    /// between them.
    pub fn page_origin(&self, id: PageId, gap: Abs) -> Option<Point> {
        if id.index() >= self.pages.len() {
            return None;
        }
        let y = self.pages[..id.index()]
            .iter()
            .map(|page| page.size().y + gap)
            .sum();
        Some(Point::with_y(y))
    }

    /// Take a frame into the tree, returning its handle.
    pub fn insert(&mut self, frame: FloatFrame) -> FrameId {
        self.frames.push(Some(frame));
        FrameId::from_index(self.frames.len() - 1)
    }

    /// Remove a frame, destroying its content sub-tree.
    ///
    /// Chain links to the removed frame are cleared on both sides and the
    /// frame is deregistered from its page.
    pub fn remove(&mut self, id: FrameId) {
        let Some(frame) = self.frames.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let Some(prev) = frame.prev {
            if let Some(master) = self.frame_mut(prev) {
                master.next = None;
                master.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
            }
        }
        if let Some(next) = frame.next {
            if let Some(follow) = self.frame_mut(next) {
                follow.prev = None;
                follow.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
            }
        }
        if let Some(page) = frame.page {
            if let Some(page) = self.page_mut(page) {
                page.remove_object(id);
            }
        }
    }

    /// Access a frame.
    pub fn frame(&self, id: FrameId) -> Option<&FloatFrame> {
        self.frames.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn frame_mut(&mut self, id: FrameId) -> Option<&mut FloatFrame> {
        self.frames.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// The handles of all live frames.
    pub fn frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| FrameId::from_index(index))
    }

    /// Move the frame to a new anchor without destroying it.
    pub fn re_anchor(&mut self, id: FrameId, anchor: Anchor) {
        if let Some(frame) = self.frame_mut(id) {
            frame.anchor = anchor;
            frame.last_base = None;
            frame.parked = false;
            frame.valid.remove(Validity::POSITION | Validity::CONTENT_POS);
        }
    }

    /// Express an explicit reposition (a drag) as a new anchor-relative
    /// offset.
    ///
    /// The delta against the cached anchor base is written back as the
    /// relation + offset pair, so the frame keeps following its anchor.
    pub fn drag_to(&mut self, id: FrameId, to: Point) {
        if let Some(frame) = self.frame_mut(id) {
            frame.rel = match frame.last_base {
                Some(base) => to - base,
                None => to,
            };
            frame.valid.remove(Validity::POSITION | Validity::CONTENT_POS);
        }
    }

    /// Change the stored attribute size.
    pub fn set_attr_size(&mut self, id: FrameId, size: Size) {
        if let Some(frame) = self.frame_mut(id) {
            frame.attr_size = size;
            frame.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        }
    }

    /// Change the sizing policies.
    pub fn set_sizing(
        &mut self,
        id: FrameId,
        w: crate::frame::SizePolicy,
        h: crate::frame::SizePolicy,
    ) {
        if let Some(frame) = self.frame_mut(id) {
            frame.sizing = crate::geom::Axes::new(w, h);
            frame.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        }
    }

    /// Change border plus padding.
    pub fn set_insets(&mut self, id: FrameId, insets: Sides<Abs>) {
        if let Some(frame) = self.frame_mut(id) {
            frame.insets = insets;
            frame.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        }
    }

    /// Mark the frame's position as needing recomputation.
    pub fn invalidate_position(&mut self, id: FrameId) {
        if let Some(frame) = self.frame_mut(id) {
            frame.valid.remove(Validity::POSITION);
        }
    }

    /// Mark the frame's size as needing recomputation.
    pub fn invalidate_size(&mut self, id: FrameId) {
        if let Some(frame) = self.frame_mut(id) {
            frame.valid.remove(Validity::SIZE);
        }
    }

    /// Mark the frame's content as changed: it will be re-measured and
    /// repositioned.
    pub fn invalidate_content(&mut self, id: FrameId) {
        if let Some(frame) = self.frame_mut(id) {
            frame.measure_cache.clear();
            frame.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        }
    }

    /// Invalidate every aspect of the frame.
    ///
    /// This is the full invalidation that also releases a position lock and
    /// un-parks a frame whose anchor dangled.
    pub fn invalidate_all(&mut self, id: FrameId) {
        if let Some(frame) = self.frame_mut(id) {
            frame.measure_cache.clear();
            frame.valid = Validity::empty();
            frame.position_locked = false;
            frame.parked = false;
        }
    }
}

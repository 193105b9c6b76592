//! The floating frame: an anchored, positionable content box.

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::ops::Range;

use bitflags::bitflags;
use folio_utils::Numeric;
use smallvec::SmallVec;

use crate::anchor::Anchor;
use crate::columns::ColumnConfig;
use crate::content::{ContentLayout, Measured, NodeIdx};
use crate::engine::Engine;
use crate::geom::{Abs, Axes, Point, Rect, Sides, Size};
use crate::tree::{FrameId, LayoutTree, PageId};

bitflags! {
    /// Which aspects of a frame's geometry are up to date.
    ///
    /// The three bits are independent: each is cleared by mutations that can
    /// affect that aspect and set again by the corresponding recomputation.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct Validity: u8 {
        /// The frame's position is up to date.
        const POSITION = 1 << 0;
        /// The frame's size is up to date.
        const SIZE = 1 << 1;
        /// The position of the frame's content within it is up to date.
        const CONTENT_POS = 1 << 2;
    }
}

/// How a frame's extent along one axis reacts to its content.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SizePolicy {
    /// The extent is the stored attribute, regardless of content.
    #[default]
    Fixed,
    /// The attribute is a floor; content can enlarge the extent.
    Minimum,
    /// The extent follows the content.
    Variable,
}

/// Why a grow or shrink request was not (fully) satisfied.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Refusal {
    /// The frame's extent is fixed by attribute.
    FixedSize,
    /// The frame sits in a column layout; growth must be re-triggered
    /// through the parent's column balancer.
    ColumnBalanced,
    /// The page-split deadline was reached; the excess flows to a follow
    /// frame.
    FlowsToFollow,
    /// The request could not be handled right now (e.g. re-entered while
    /// already executing).
    Unspecified,
}

/// The outcome of a grow, shrink or format request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Granted {
    /// The amount actually granted.
    pub granted: Abs,
    /// The amount that was refused.
    pub refused: Abs,
    /// Why part of the request was refused, if any was.
    pub reason: Option<Refusal>,
}

impl Granted {
    /// Everything was granted.
    pub fn full(granted: Abs) -> Self {
        Self { granted, refused: Abs::zero(), reason: None }
    }

    /// Everything was refused.
    pub fn refused(refused: Abs, reason: Refusal) -> Self {
        Self { granted: Abs::zero(), refused, reason: Some(reason) }
    }

    /// Part of the request was granted.
    pub fn partial(granted: Abs, refused: Abs, reason: Refusal) -> Self {
        Self { granted, refused, reason: Some(reason) }
    }
}

/// A positioned run of content inside a frame, ready for the renderer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContentRun {
    /// The run's rectangle in absolute document coordinates.
    pub rect: Rect,
    /// The shown pieces, as flat indices over the frame's slices.
    pub pieces: Range<usize>,
}

/// An anchored, floating content frame.
///
/// The frame owns the laid-out representation of its assigned content range
/// and dies with it. All references to other layout objects (anchor, chain
/// partners, page) are weak handles whose resolution can fail.
pub struct FloatFrame {
    // Anchoring.
    pub(crate) anchor: Anchor,
    pub(crate) rel: Point,
    pub(crate) last_base: Option<Point>,
    pub(crate) parked: bool,

    // Geometry.
    pub(crate) area: Rect,
    pub(crate) insets: Sides<Abs>,
    pub(crate) sizing: Axes<SizePolicy>,
    pub(crate) attr_size: Size,

    // State.
    pub(crate) valid: Validity,
    pub(crate) locked: bool,
    pub(crate) position_locked: bool,

    // Splitting and columns.
    pub(crate) no_split: bool,
    pub(crate) in_footnote: bool,
    pub(crate) in_columns: bool,
    pub(crate) columns: Option<ColumnConfig>,

    // Weak relations.
    pub(crate) prev: Option<FrameId>,
    pub(crate) next: Option<FrameId>,
    pub(crate) page: Option<PageId>,
    pub(crate) ordinal: u32,

    // Owned content.
    pub(crate) content: ContentLayout,
    pub(crate) runs: SmallVec<[ContentRun; 2]>,
    pub(crate) measure_cache: CachedCell<Vec<Measured>>,
    pub(crate) last_format: Option<Granted>,
}

impl FloatFrame {
    /// Create a frame for the given anchor and content range.
    ///
    /// The frame starts fully invalid; its geometry settles on the first
    /// calculation pass.
    pub fn new(anchor: Anchor, range: Range<NodeIdx>) -> Self {
        Self {
            anchor,
            rel: Point::zero(),
            last_base: None,
            parked: false,
            area: Rect::zero(),
            insets: Sides::splat(Abs::zero()),
            sizing: Axes::new(SizePolicy::Fixed, SizePolicy::Variable),
            attr_size: Size::zero(),
            valid: Validity::empty(),
            locked: false,
            position_locked: false,
            no_split: false,
            in_footnote: false,
            in_columns: false,
            columns: None,
            prev: None,
            next: None,
            page: None,
            ordinal: 0,
            content: ContentLayout::new(range),
            runs: SmallVec::new(),
            measure_cache: CachedCell::new(),
            last_format: None,
        }
    }

    /// Builder-style: the anchor-relative offset.
    pub fn with_offset(mut self, rel: Point) -> Self {
        self.rel = rel;
        self
    }

    /// Builder-style: the sizing policies for width and height.
    pub fn with_sizing(mut self, w: SizePolicy, h: SizePolicy) -> Self {
        self.sizing = Axes::new(w, h);
        self
    }

    /// Builder-style: the stored attribute size.
    pub fn with_attr_size(mut self, size: Size) -> Self {
        self.attr_size = size;
        self
    }

    /// Builder-style: border plus padding on each side.
    pub fn with_insets(mut self, insets: Sides<Abs>) -> Self {
        self.insets = insets;
        self
    }

    /// Builder-style: lay the content out in columns.
    pub fn with_columns(mut self, columns: ColumnConfig) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Builder-style: forbid splitting across page boundaries.
    pub fn with_no_split(mut self) -> Self {
        self.no_split = true;
        self
    }

    /// Builder-style: mark the anchor as sitting inside a footnote.
    pub fn in_footnote(mut self) -> Self {
        self.in_footnote = true;
        self
    }

    /// Builder-style: mark the anchor as sitting inside a multi-column
    /// section.
    pub fn in_columns(mut self) -> Self {
        self.in_columns = true;
        self
    }

    /// The frame area: the outer rectangle including borders.
    pub fn area(&self) -> Rect {
        self.area
    }

    /// The print area: the inner content rectangle.
    pub fn print_area(&self) -> Rect {
        self.area.inset(self.insets)
    }

    /// The frame's anchor.
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// The anchor-relative offset.
    pub fn offset(&self) -> Point {
        self.rel
    }

    /// Which aspects of the frame's geometry are up to date.
    pub fn validity(&self) -> Validity {
        self.valid
    }

    /// The page the frame is currently registered on.
    pub fn page(&self) -> Option<PageId> {
        self.page
    }

    /// The frame's paint-order ordinal on its page.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// The previous frame in the chain, if any.
    pub fn prev(&self) -> Option<FrameId> {
        self.prev
    }

    /// The next frame in the chain, if any.
    pub fn next(&self) -> Option<FrameId> {
        self.next
    }

    /// Whether the frame was parked because its anchor dangled.
    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// Whether repositioning is currently suppressed.
    pub fn is_position_locked(&self) -> bool {
        self.position_locked
    }

    /// Suppress repositioning until the next full invalidation.
    pub fn lock_position(&mut self) {
        self.position_locked = true;
    }

    /// The frame's laid-out content.
    pub fn content(&self) -> &ContentLayout {
        &self.content
    }

    /// The positioned content runs, for the renderer.
    pub fn runs(&self) -> &[ContentRun] {
        &self.runs
    }

    /// The outcome of the frame's most recent format, if it was formatted.
    pub fn last_outcome(&self) -> Option<Granted> {
        self.last_format
    }

    /// The height the frame's borders and padding add around content.
    pub(crate) fn inset_height(&self) -> Abs {
        self.insets.top + self.insets.bottom
    }

    /// The width the frame's borders and padding add around content.
    pub(crate) fn inset_width(&self) -> Abs {
        self.insets.left + self.insets.right
    }
}

impl Debug for FloatFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("FloatFrame")
            .field("anchor", &self.anchor)
            .field("area", &self.area)
            .field("valid", &self.valid)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl LayoutTree {
    /// Recompute the frame's size if it is invalid.
    ///
    /// Calling this twice without an intervening invalidation is a no-op:
    /// neither the content is re-measured nor the geometry mutated.
    pub fn format(&mut self, engine: &mut Engine, id: FrameId) -> Granted {
        let Some(frame) = self.frame(id) else {
            return Granted::refused(Abs::zero(), Refusal::Unspecified);
        };
        if frame.valid.contains(Validity::SIZE) {
            return frame.last_format.unwrap_or(Granted::full(Abs::zero()));
        }
        if frame.locked {
            return Granted::refused(Abs::zero(), Refusal::Unspecified);
        }

        self.frame_mut(id).unwrap().locked = true;
        let outcome = self.format_impl(engine, id);
        let frame = self.frame_mut(id).unwrap();
        frame.locked = false;
        frame.valid |= Validity::SIZE;
        frame.last_format = Some(outcome);
        outcome
    }

    fn format_impl(&mut self, engine: &mut Engine, id: FrameId) -> Granted {
        let old = self.frame(id).unwrap().area;
        let is_follow = self.frame(id).unwrap().prev.is_some();

        // Settle the width first; the content is measured against it.
        let width = self.computed_width(engine, id);

        // A follow shows what its master handed over; everything else
        // measures and shows its own assigned range.
        if !is_follow {
            let content_width =
                (width - self.frame(id).unwrap().inset_width()).max(Abs::zero());
            let measured = self.measure_range(engine, id, content_width);
            self.frame_mut(id).unwrap().content.fill(measured);
        }

        let frame = self.frame_mut(id).unwrap();

        // The content height: balanced over columns if configured, plain
        // stacked otherwise.
        let content_height = match &frame.columns {
            Some(config) => {
                let config = *config;
                let pieces = flat_pieces(&frame.content);
                let target = match frame.sizing.y {
                    SizePolicy::Fixed => (frame.attr_size.y - frame.inset_height())
                        .max(Abs::zero()),
                    _ => ideal_column_target(&pieces, config.count.get()),
                };
                crate::columns::balance(&pieces, config.count, target).needed
            }
            None => frame.content.height,
        };

        let mut height = match frame.sizing.y {
            SizePolicy::Fixed => frame.attr_size.y,
            SizePolicy::Variable => content_height + frame.inset_height(),
            SizePolicy::Minimum => {
                (content_height + frame.inset_height()).max(frame.attr_size.y)
            }
        };
        height.set_max(engine.config.min_height);

        // A split-eligible frame may not grow past the page-split deadline.
        // The excess is reported, not dropped; a higher-level flow step
        // creates the follow.
        let mut outcome = Granted::full(height);
        if self.split_eligible(id) {
            if let Some(deadline) = self.split_deadline(engine, id) {
                let top = self.frame(id).unwrap().area.top();
                let avail = (deadline - top).max(engine.config.min_height);
                if height > avail {
                    outcome = Granted::partial(avail, height - avail, Refusal::FlowsToFollow);
                    height = avail;
                }
            }
        }

        let frame = self.frame_mut(id).unwrap();
        frame.area.size = Size::new(width, height);

        // A chained master hands every overflowing piece to its follow.
        if frame.next.is_some() {
            self.reflow_chain(engine, id);
        }

        let new = self.frame(id).unwrap().area;
        if new != old {
            self.frame_mut(id).unwrap().valid.remove(Validity::CONTENT_POS);
            self.bounds_changed(engine, id, old, new);
        }

        outcome
    }

    /// Ask the frame to become `delta` taller.
    ///
    /// Returns the amount actually granted; when not everything was, the
    /// reason says why.
    pub fn grow(&mut self, engine: &mut Engine, id: FrameId, delta: Abs) -> Granted {
        let Some(frame) = self.frame(id) else {
            return Granted::refused(delta, Refusal::Unspecified);
        };
        if frame.locked {
            return Granted::refused(delta, Refusal::Unspecified);
        }
        if frame.sizing.y == SizePolicy::Fixed {
            return Granted::refused(delta, Refusal::FixedSize);
        }

        // A frame inside a column layout must not grow directly; growth is
        // re-triggered through the parent's balancer.
        if let Anchor::Frame(parent) = frame.anchor {
            if self.frame(parent).is_some_and(|p| p.columns.is_some()) {
                return Granted::refused(delta, Refusal::ColumnBalanced);
            }
        }

        self.frame_mut(id).unwrap().locked = true;

        let mut granted = delta;
        let mut outcome = Granted::full(delta);
        if self.split_eligible(id) {
            if let Some(deadline) = self.split_deadline(engine, id) {
                let bottom = self.frame(id).unwrap().area.bottom();
                let avail = (deadline - bottom).max(Abs::zero());
                if delta > avail {
                    granted = avail;
                    outcome = Granted::partial(avail, delta - avail, Refusal::FlowsToFollow);
                }
            }
        }

        let frame = self.frame_mut(id).unwrap();
        let old = frame.area;
        frame.area.size.y += granted;
        frame.valid.remove(Validity::CONTENT_POS);
        frame.locked = false;

        if !granted.is_zero() {
            let new = self.frame(id).unwrap().area;
            self.bounds_changed(engine, id, old, new);
        }
        outcome
    }

    /// Ask the frame to become `delta` shorter.
    ///
    /// A `Minimum`-height frame never shrinks below its declared minimum; a
    /// `Variable`-height frame never below its content.
    pub fn shrink(&mut self, engine: &mut Engine, id: FrameId, delta: Abs) -> Granted {
        let Some(frame) = self.frame(id) else {
            return Granted::refused(delta, Refusal::Unspecified);
        };
        if frame.locked {
            return Granted::refused(delta, Refusal::Unspecified);
        }
        if frame.sizing.y == SizePolicy::Fixed {
            return Granted::refused(delta, Refusal::FixedSize);
        }

        let floor = match frame.sizing.y {
            SizePolicy::Minimum => frame.attr_size.y,
            _ => frame.content.height + frame.inset_height(),
        }
        .max(engine.config.min_height);

        let granted = delta.min((frame.area.height() - floor).max(Abs::zero()));

        let frame = self.frame_mut(id).unwrap();
        frame.locked = true;
        let old = frame.area;
        frame.area.size.y -= granted;
        frame.valid.remove(Validity::CONTENT_POS);
        frame.locked = false;

        if !granted.is_zero() {
            let new = self.frame(id).unwrap().area;
            self.bounds_changed(engine, id, old, new);
        }

        if granted.approx_eq(delta) {
            Granted::full(granted)
        } else {
            Granted::partial(granted, delta - granted, Refusal::Unspecified)
        }
    }

    /// The frame's width under its horizontal sizing policy.
    fn computed_width(&self, engine: &Engine, id: FrameId) -> Abs {
        let frame = self.frame(id).unwrap();
        let attr = frame.attr_size.x;
        let policy = frame.sizing.x;
        if policy == SizePolicy::Fixed {
            return attr;
        }

        // Auto-fit: the narrowest width that avoids wrapping, clamped to the
        // anchor's available width when content would overflow it.
        let avail = self.available_width(id);
        let frame = self.frame(id).unwrap();
        let natural = frame
            .content
            .range
            .clone()
            .filter_map(|node| engine.host.natural_width(node))
            .fold(Abs::zero(), Abs::max);
        let fitted = (natural + frame.inset_width()).min(avail);
        match policy {
            SizePolicy::Variable => fitted,
            _ => fitted.max(attr),
        }
    }

    /// The width the anchor makes available to the frame.
    pub(crate) fn available_width(&self, id: FrameId) -> Abs {
        let Some(frame) = self.frame(id) else { return Abs::inf() };
        match frame.anchor {
            Anchor::Frame(parent) => self
                .frame(parent)
                .map(|p| p.print_area().width())
                .unwrap_or(Abs::inf()),
            _ => match frame.page.and_then(|page| self.page(page)) {
                Some(page) => page.print_size().x,
                None => Abs::inf(),
            },
        }
    }

    /// Measure the frame's assigned node range at the given width, reusing
    /// the previous measurement when neither the range nor the width
    /// changed.
    fn measure_range(
        &mut self,
        engine: &mut Engine,
        id: FrameId,
        width: Abs,
    ) -> Vec<Measured> {
        let frame = self.frame(id).unwrap();
        let range = frame.content.range.clone();
        let host = engine.host;
        frame.measure_cache.get_or_init((range.clone(), width), |_| {
            range
                .clone()
                .map(|node| host.measure(node, width).unwrap_or_default())
                .collect()
        })
    }

    /// React to a change of the frame's registered bounds: refresh the
    /// page registration and queue a wrap notice so overlapping content
    /// re-measures its exclusions.
    pub(crate) fn bounds_changed(
        &mut self,
        engine: &mut Engine,
        id: FrameId,
        old: Rect,
        new: Rect,
    ) {
        if let Some(page) = self.frame(id).and_then(|frame| frame.page) {
            if !old.is_empty() {
                engine.notify_wrap(page, old);
            }
            engine.notify_wrap(page, new);
        }
        // A taller or shorter master changes what its follow receives.
        if let Some(next) = self.frame(id).and_then(|frame| frame.next) {
            if let Some(follow) = self.frame_mut(next) {
                follow.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
            }
        }
        // Frames anchored to this one follow its movements.
        let dependents: Vec<FrameId> = self
            .frames()
            .filter(|&other| {
                self.frame(other)
                    .is_some_and(|f| f.anchor == Anchor::Frame(id))
            })
            .collect();
        for dependent in dependents {
            if let Some(frame) = self.frame_mut(dependent) {
                frame.valid.remove(Validity::POSITION);
            }
        }
    }
}

/// The frame's shown pieces as one flat list for the balancer.
pub(crate) fn flat_pieces(content: &ContentLayout) -> Vec<crate::content::Piece> {
    let mut pieces = Vec::new();
    for slice in &content.slices {
        let offset = slice.node - content.range.start;
        let measured = &content.measured[offset];
        pieces.extend(measured.pieces[slice.pieces.clone()].iter().cloned());
    }
    pieces
}

/// The target height at which `count` columns come out even.
pub(crate) fn ideal_column_target(
    pieces: &[crate::content::Piece],
    count: u32,
) -> Abs {
    let total: Abs = pieces.iter().map(|piece| piece.height).sum();
    total / count as f64
}

/// Wraps a parameterized computation and caches its latest output.
///
/// - When the computation is performed multiple times consecutively with the
///   same argument, reuses the cache.
/// - When the argument changes, the new output is cached.
/// - `clear` drops the cache so that changed content is re-measured even
///   under an unchanged argument.
pub(crate) struct CachedCell<T>(RefCell<Option<(u128, T)>>);

impl<T> CachedCell<T> {
    /// Create an empty cached cell.
    pub fn new() -> Self {
        Self(RefCell::new(None))
    }

    /// Perform the computation `f` with caching.
    pub fn get_or_init<F, I>(&self, input: I, f: F) -> T
    where
        I: Hash,
        T: Clone,
        F: FnOnce(I) -> T,
    {
        let input_hash = folio_utils::hash128(&input);

        let mut slot = self.0.borrow_mut();
        if let Some((hash, output)) = &*slot {
            if *hash == input_hash {
                return output.clone();
            }
        }

        let output = f(input);
        *slot = Some((input_hash, output.clone()));
        output
    }

    /// Drop the cached output.
    pub fn clear(&self) {
        self.0.borrow_mut().take();
    }
}

impl<T> Default for CachedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for CachedCell<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad("CachedCell(..)")
    }
}

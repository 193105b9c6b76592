//! The calculation driver: configuration, the pass context, and the
//! recursive calculate-if-dirty loop.

use ecow::{eco_format, EcoVec};

use crate::anchor::{Anchor, PARKED};
use crate::content::ContentHost;
use crate::diag::{Diagnostic, Sink};
use crate::frame::{flat_pieces, ContentRun, Validity};
use crate::geom::{Abs, Rect, Sides, Size};
use crate::tree::{FrameId, LayoutTree, PageId};

/// The default bound for the position/size retry loop.
///
/// Mutual invalidation between a frame, its anchor and its siblings is
/// genuinely cyclic; the bound is an empirically tuned constant, not a
/// derived property.
pub const DEFAULT_LOOP_MAX: usize = 5;

/// Tunable constants of the layout engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayoutConfig {
    /// How often the position/size cycle may retry before the pass accepts
    /// the current geometry.
    pub loop_max: usize,
    /// The minimum height a frame is clamped to.
    pub min_height: Abs,
    /// The gap kept clear around a frame when content wraps beside it.
    pub clearance: Abs,
    /// The vertical gap between consecutive pages.
    pub page_gap: Abs,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            loop_max: DEFAULT_LOOP_MAX,
            min_height: Abs::pt(2.0),
            clearance: Abs::pt(4.0),
            page_gap: Abs::pt(20.0),
        }
    }
}

/// A queued notification that a frame's bounds changed and overlapping
/// content must re-measure its wrap exclusions.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapNotice {
    /// The page the bounds lie on.
    pub page: PageId,
    /// The affected area, grown by the configured clearance.
    pub area: Rect,
}

/// The context threaded through one or more layout passes.
pub struct Engine<'a> {
    /// The content model that measures content for us.
    pub host: &'a dyn ContentHost,
    /// The engine's tunable constants.
    pub config: LayoutConfig,
    /// Collects diagnostics across passes.
    pub sink: Sink,
    wrap_notices: EcoVec<WrapNotice>,
}

impl<'a> Engine<'a> {
    /// Create an engine over the given content model.
    pub fn new(host: &'a dyn ContentHost, config: LayoutConfig) -> Self {
        Self { host, config, sink: Sink::new(), wrap_notices: EcoVec::new() }
    }

    /// Queue a wrap notice for the given frame bounds.
    pub(crate) fn notify_wrap(&mut self, page: PageId, area: Rect) {
        let area = area.outset(Sides::splat(self.config.clearance.max(Abs::zero())));
        self.wrap_notices.push(WrapNotice { page, area });
    }

    /// Take out the queued wrap notices.
    ///
    /// The caller applies them to the content model (re-measuring wrap
    /// exclusions for overlapping content) and re-marks affected frames.
    pub fn drain_wrap_notices(&mut self) -> EcoVec<WrapNotice> {
        std::mem::take(&mut self.wrap_notices)
    }
}

impl LayoutTree {
    /// Calculate a single frame: anchor first, then position, then size,
    /// then content position, each only if dirty.
    ///
    /// Entry point for one layout pass; at most one pass may be in flight
    /// at a time.
    pub fn calculate(&mut self, engine: &mut Engine, id: FrameId) {
        debug_assert!(!self.in_pass, "layout pass already in progress");
        self.in_pass = true;
        self.calculate_inner(engine, id, 0);
        self.in_pass = false;
    }

    /// Calculate every object on the page, in ascending paint order.
    pub fn calculate_page(&mut self, engine: &mut Engine, page: PageId) {
        debug_assert!(!self.in_pass, "layout pass already in progress");
        self.in_pass = true;
        self.calculate_page_inner(engine, page);
        self.in_pass = false;
    }

    /// Calculate the whole document, front to back.
    ///
    /// A later page's content is not touched before the earlier pages have
    /// settled; the traversal order is the synchronization.
    pub fn calculate_all(&mut self, engine: &mut Engine) {
        debug_assert!(!self.in_pass, "layout pass already in progress");
        self.in_pass = true;
        let pages: Vec<_> = self.pages().collect();
        for page in pages {
            self.calculate_page_inner(engine, page);
        }
        self.in_pass = false;
    }

    fn calculate_page_inner(&mut self, engine: &mut Engine, page: PageId) {
        // One sweep can re-invalidate earlier objects (a grown frame moves
        // its dependents, a moved frame reflows a follow). Retry bounded
        // sweeps until the page is stable; past the bound, the current
        // geometry is accepted as best effort.
        let mut attempt = 0;
        loop {
            // Snapshot: calculation may re-register objects while we walk.
            let objects: Vec<FrameId> = self
                .page(page)
                .map(|p| p.objects().to_vec())
                .unwrap_or_default();

            if objects.iter().all(|&id| {
                self.frame(id).is_none_or(|frame| frame.validity().is_all())
            }) {
                break;
            }

            if attempt >= engine.config.loop_max {
                engine.sink.warn(Diagnostic::warning(eco_format!(
                    "layout loop bound exceeded on {page:?}; accepting current geometry"
                )));
                for id in objects {
                    if let Some(frame) = self.frame_mut(id) {
                        frame.valid = Validity::all();
                    }
                }
                break;
            }

            for id in objects {
                self.calculate_inner(engine, id, 0);
            }
            attempt += 1;
        }
    }

    fn calculate_inner(&mut self, engine: &mut Engine, id: FrameId, depth: usize) {
        let Some(frame) = self.frame(id) else { return };

        if depth > engine.config.loop_max {
            engine.sink.warn(Diagnostic::warning(eco_format!(
                "anchor recursion bound exceeded at {id:?}; accepting current geometry"
            )));
            return;
        }

        // Settle what this frame depends on first: a frame anchor, and the
        // chain master whose handover feeds this frame.
        if let Anchor::Frame(parent) = frame.anchor {
            if self.frame(parent).is_some_and(|p| !p.validity().is_all()) {
                self.calculate_inner(engine, parent, depth + 1);
            }
        }
        if let Some(master) = self.frame(id).and_then(|frame| frame.prev) {
            if self.frame(master).is_some_and(|m| !m.validity().is_all()) {
                self.calculate_inner(engine, master, depth + 1);
            }
        }

        // Pick up content edits the host tracked since the last measurement.
        if let Some(range) = self.frame(id).map(|frame| frame.content.range.clone()) {
            if range.clone().any(|node| engine.host.is_dirty(node)) {
                self.invalidate_content(id);
            }
        }

        let mut attempt = 0;
        loop {
            let Some(frame) = self.frame(id) else { return };
            if frame.valid.is_all() {
                break;
            }
            if attempt >= engine.config.loop_max {
                engine.sink.warn(Diagnostic::warning(eco_format!(
                    "layout loop bound exceeded at {id:?}; accepting current geometry"
                )));
                if let Some(frame) = self.frame_mut(id) {
                    frame.valid = Validity::all();
                }
                break;
            }

            self.resolve_position(engine, id);
            self.format(engine, id);
            self.position_content(id);
            attempt += 1;
        }
    }

    /// Recompute the frame's position if it is invalid.
    pub(crate) fn resolve_position(&mut self, engine: &mut Engine, id: FrameId) {
        let Some(frame) = self.frame(id) else { return };
        if frame.valid.contains(Validity::POSITION) {
            return;
        }

        // A position-locked frame must not move during this pass; the lock
        // falls with the next full invalidation.
        if frame.position_locked {
            if let Some(frame) = self.frame_mut(id) {
                frame.valid |= Validity::POSITION;
            }
            return;
        }

        let flow_width = self.available_width(id);
        let resolved = frame.anchor.resolve(
            self,
            engine.host,
            engine.config.page_gap,
            flow_width,
        );

        match resolved {
            Some(base) => {
                let rel = self.frame(id).unwrap().rel;
                let target = base + rel;
                let frame = self.frame_mut(id).unwrap();
                frame.last_base = Some(base);
                frame.parked = false;
                frame.valid |= Validity::POSITION;
                let old = frame.area;
                if frame.area.origin != target {
                    frame.area.origin = target;
                    frame.valid.remove(Validity::CONTENT_POS);
                    let new = frame.area;
                    self.bounds_changed(engine, id, old, new);
                }
            }
            None => {
                // Dangling anchor: park off-screen and wait for the next
                // full invalidation. Never an error.
                let frame = self.frame_mut(id).unwrap();
                frame.area.origin = PARKED;
                frame.parked = true;
                frame.valid |= Validity::POSITION;
            }
        }
    }

    /// Recompute the position of the frame's content within it if invalid.
    pub(crate) fn position_content(&mut self, id: FrameId) {
        let Some(frame) = self.frame(id) else { return };
        if frame.valid.contains(Validity::CONTENT_POS) {
            return;
        }

        let print = frame.print_area();
        let runs = match frame.columns {
            Some(config) => {
                let pieces = flat_pieces(&frame.content);
                let balance =
                    crate::columns::balance(&pieces, config.count, print.height());
                let rects = crate::columns::column_rects(config, print, &balance.runs);
                balance
                    .runs
                    .iter()
                    .zip(rects)
                    .map(|(run, rect)| ContentRun { rect, pieces: run.pieces.clone() })
                    .collect()
            }
            None => {
                let total: usize =
                    frame.content.slices.iter().map(|slice| slice.pieces.len()).sum();
                let rect = Rect::new(
                    print.origin,
                    Size::new(print.width(), print.height().min(frame.content.height)),
                );
                std::iter::once(ContentRun { rect, pieces: 0..total }).collect()
            }
        };

        let frame = self.frame_mut(id).unwrap();
        frame.runs = runs;
        frame.valid |= Validity::CONTENT_POS;
    }
}

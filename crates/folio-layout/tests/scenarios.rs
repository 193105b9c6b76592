//! End-to-end scenarios driving the engine through its public API.

use std::cell::Cell;
use std::io::{Read, Seek, SeekFrom, Write};

use folio_layout::geom::{Abs, Point, Rect, Sides, Size};
use folio_layout::{
    cache, Anchor, ContentHost, Engine, FloatFrame, LayoutConfig, LayoutTree, Measured,
    NodeIdx, NodeKind, PageId, PageRelation, PlainHost, Refusal, SizePolicy,
};

fn pt(value: f64) -> Abs {
    Abs::pt(value)
}

/// A page whose print area is exactly 1000 units tall.
fn thousand_unit_page(tree: &mut LayoutTree) -> PageId {
    tree.add_page(Size::new(pt(600.0), pt(1000.0)), Sides::splat(Abs::zero()))
}

fn page_float(page: PageId, range: std::ops::Range<NodeIdx>) -> FloatFrame {
    FloatFrame::new(Anchor::Page(page, PageRelation::PrintArea), range)
        .with_sizing(SizePolicy::Fixed, SizePolicy::Variable)
        .with_attr_size(Size::new(pt(200.0), Abs::zero()))
}

#[test]
fn test_simple_float() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);

    let frame = tree.frame(id).unwrap();
    assert!(frame.validity().is_all());
    assert_eq!(frame.area().height(), pt(150.0));
    assert_eq!(frame.area().origin, Point::zero());
    assert!(engine.sink.warnings().is_empty());
}

#[test]
fn test_simple_float_with_border() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree
        .insert(page_float(page, para..para + 1).with_insets(Sides::splat(pt(5.0))));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);

    let frame = tree.frame(id).unwrap();
    assert_eq!(frame.area().height(), pt(160.0));
    // Containment: the frame area holds the content rectangle plus borders.
    assert!(frame.area().contains_rect(frame.print_area()));
    assert_eq!(frame.print_area().height(), pt(150.0));
}

#[test]
fn test_overflow_split() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    assert_eq!(tree.frame(id).unwrap().area().height(), pt(150.0));

    // The content grows to 1200 units.
    host.replace(para, vec![folio_layout::Piece::new(12, pt(15.0)); 80]);
    tree.invalidate_content(id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);

    let frame = tree.frame(id).unwrap();
    // Clamped to the page-split deadline; the rest is reported, not dropped.
    assert_eq!(frame.area().height(), pt(1000.0));
    assert!(frame.area().bottom() <= pt(1000.0));

    let outcome = frame.last_outcome().unwrap();
    assert_eq!(outcome.reason, Some(Refusal::FlowsToFollow));
    assert_eq!(outcome.refused, pt(200.0));
}

#[test]
fn test_chain_transfer() {
    let mut host = PlainHost::new();
    let para = host.paragraph(50, 10, pt(10.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);

    let master = tree.insert(
        FloatFrame::new(Anchor::Page(page, PageRelation::PrintArea), para..para + 1)
            .with_sizing(SizePolicy::Fixed, SizePolicy::Fixed)
            .with_attr_size(Size::new(pt(200.0), pt(300.0))),
    );
    let follow = tree.insert(
        page_float(page, 0..0).with_offset(Point::new(pt(250.0), Abs::zero())),
    );
    tree.append_object(page, master);
    tree.append_object(page, follow);

    assert!(tree.link(master, follow));

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate_page(&mut engine, page);

    // The master shows its first 300 units; the remaining 200 continue in
    // the follow's content sub-tree.
    let m = tree.frame(master).unwrap();
    assert_eq!(m.area().height(), pt(300.0));
    assert_eq!(m.content().height, pt(300.0));

    let f = tree.frame(follow).unwrap();
    assert_eq!(f.content().height, pt(200.0));
    assert_eq!(f.area().height(), pt(200.0));

    // Unlinking hands the content back and empties the follow.
    tree.unlink(master, follow);
    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate_page(&mut engine, page);
    assert_eq!(tree.frame(master).unwrap().content().height, pt(500.0));
    assert!(tree.frame(follow).unwrap().content().is_empty());
}

#[test]
fn test_loop_bound_accepts_geometry() {
    let host = PlainHost::new();
    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);

    // Two frames anchored to each other with a nonzero offset never reach a
    // fixed point: each move of one repositions the other.
    let a = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0));
    let b = tree.insert(FloatFrame::new(Anchor::Paragraph(0), 0..0));
    tree.append_object(page, a);
    tree.append_object(page, b);
    tree.re_anchor(a, Anchor::Frame(b));
    tree.re_anchor(b, Anchor::Frame(a));
    tree.drag_to(a, Point::splat(pt(10.0)));
    tree.drag_to(b, Point::splat(pt(10.0)));

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate_page(&mut engine, page);

    // The pass terminated within the bound, warned, and accepted the
    // geometry as final.
    assert!(engine
        .sink
        .warnings()
        .iter()
        .any(|diag| diag.message.contains("loop bound")));
    assert!(tree.frame(a).unwrap().validity().is_all());
    assert!(tree.frame(b).unwrap().validity().is_all());
    assert!(tree.frame(a).unwrap().area().height().to_raw().is_finite());
}

#[test]
fn test_grow_shrink_inverse() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1).with_no_split());
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    let before = tree.frame(id).unwrap().area().height();

    let granted = tree.grow(&mut engine, id, pt(70.0));
    assert_eq!(granted.granted, pt(70.0));
    assert_eq!(granted.reason, None);

    let back = tree.shrink(&mut engine, id, pt(70.0));
    assert_eq!(back.granted, pt(70.0));
    assert_eq!(tree.frame(id).unwrap().area().height(), before);
}

#[test]
fn test_grow_refusals() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let fixed = tree.insert(
        FloatFrame::new(Anchor::Page(page, PageRelation::PrintArea), para..para + 1)
            .with_sizing(SizePolicy::Fixed, SizePolicy::Fixed)
            .with_attr_size(Size::new(pt(200.0), pt(100.0))),
    );
    tree.append_object(page, fixed);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, fixed);

    let refused = tree.grow(&mut engine, fixed, pt(10.0));
    assert_eq!(refused.granted, Abs::zero());
    assert_eq!(refused.reason, Some(Refusal::FixedSize));
    assert_eq!(tree.frame(fixed).unwrap().area().height(), pt(100.0));

    // A split-eligible frame cannot grow past the deadline; the excess
    // flows to a follow.
    let eligible = tree.insert(page_float(page, para..para + 1));
    tree.append_object(page, eligible);
    tree.calculate(&mut engine, eligible);
    let partial = tree.grow(&mut engine, eligible, pt(2000.0));
    assert_eq!(partial.reason, Some(Refusal::FlowsToFollow));
    assert_eq!(partial.granted, pt(850.0));
    assert_eq!(partial.refused, pt(1150.0));
}

#[test]
fn test_growth_queues_wrap_notices() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1).with_no_split());
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    engine.drain_wrap_notices();

    tree.grow(&mut engine, id, pt(40.0));
    let notices = engine.drain_wrap_notices();
    assert!(!notices.is_empty());
    assert!(notices.iter().all(|notice| notice.page == page));
    // The notice area covers the grown frame plus clearance.
    let area = tree.frame(id).unwrap().area();
    assert!(notices.iter().any(|notice| notice.area.contains_rect(area)));
}

/// A host that counts measurements, to observe idempotence.
struct CountingHost {
    inner: PlainHost,
    measures: Cell<usize>,
}

impl ContentHost for CountingHost {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn kind(&self, node: NodeIdx) -> Option<NodeKind> {
        self.inner.kind(node)
    }

    fn measure(&self, node: NodeIdx, width: Abs) -> Option<Measured> {
        self.measures.set(self.measures.get() + 1);
        self.inner.measure(node, width)
    }

    fn natural_width(&self, node: NodeIdx) -> Option<Abs> {
        self.inner.natural_width(node)
    }

    fn origin(&self, node: NodeIdx) -> Option<Point> {
        self.inner.origin(node)
    }

    fn is_dirty(&self, node: NodeIdx) -> bool {
        self.inner.is_dirty(node)
    }
}

#[test]
fn test_calculate_is_idempotent() {
    let mut inner = PlainHost::new();
    let para = inner.paragraph(10, 12, pt(15.0));
    let host = CountingHost { inner, measures: Cell::new(0) };

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    let first = tree.frame(id).unwrap().area();
    let measured = host.measures.get();
    assert!(measured > 0);

    // No intervening invalidation: neither geometry nor measurement count
    // may change.
    tree.calculate(&mut engine, id);
    assert_eq!(tree.frame(id).unwrap().area(), first);
    assert_eq!(host.measures.get(), measured);
}

#[test]
fn test_dangling_anchor_parks_frame() {
    let mut host = PlainHost::new();
    let para = host.paragraph(4, 10, pt(12.0));
    host.set_origin(para, Point::new(pt(50.0), pt(60.0)));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(FloatFrame::new(Anchor::Paragraph(para), para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    assert!(!tree.frame(id).unwrap().is_parked());

    // The anchor paragraph disappears from the flow: resolution fails
    // silently and the frame parks off-screen.
    let id2 = tree.insert(FloatFrame::new(Anchor::Paragraph(99), para..para + 1));
    tree.append_object(page, id2);
    tree.calculate(&mut engine, id2);

    let frame = tree.frame(id2).unwrap();
    assert!(frame.is_parked());
    assert_eq!(frame.area().origin, folio_layout::PARKED);
    assert!(frame.validity().is_all());

    // The next full invalidation un-parks it.
    tree.invalidate_all(id2);
    assert!(!tree.frame(id2).unwrap().is_parked());
}

#[test]
fn test_drag_writes_back_relative_offset() {
    let mut host = PlainHost::new();
    let para = host.paragraph(4, 10, pt(12.0));
    host.set_origin(para, Point::new(pt(50.0), pt(60.0)));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(FloatFrame::new(Anchor::Paragraph(para), para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    assert_eq!(tree.frame(id).unwrap().area().origin, Point::new(pt(50.0), pt(60.0)));

    // Drag to an absolute position; the delta against the anchor base is
    // stored as the new relative offset.
    tree.drag_to(id, Point::new(pt(80.0), pt(100.0)));
    assert_eq!(tree.frame(id).unwrap().offset(), Point::new(pt(30.0), pt(40.0)));

    tree.calculate(&mut engine, id);
    assert_eq!(tree.frame(id).unwrap().area().origin, Point::new(pt(80.0), pt(100.0)));
}

#[test]
fn test_cache_file_round_trip() {
    let entries = vec![
        cache::CacheEntry::Para { node: 0, offset: None },
        cache::CacheEntry::Para { node: 3, offset: Some(42) },
        cache::CacheEntry::Table { node: 7, row: None },
        cache::CacheEntry::Fly { page: 0, ordinal: 1, x: 0, y: 720, width: 2540, height: 1270 },
    ];

    let mut file = tempfile::tempfile().unwrap();
    cache::write(&entries, &mut file).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let back = cache::read(&mut file).unwrap();
    assert_eq!(back, entries);
}

#[test]
fn test_cache_corruption_discards_whole_file() {
    let entries = vec![
        cache::CacheEntry::Para { node: 0, offset: None },
        cache::CacheEntry::Para { node: 3, offset: Some(42) },
    ];

    let mut file = tempfile::tempfile().unwrap();
    cache::write(&entries, &mut file).unwrap();

    // Corrupt the second record's type tag on disk.
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    let second_tag = 4 + 4 + 1 + 2 + 4;
    bytes[second_tag] = 0xEE;

    let mut file = tempfile::tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    assert!(matches!(
        cache::read(&mut file),
        Err(cache::CacheError::UnknownTag(0xEE))
    ));
}

#[test]
fn test_containment_invariant_over_operations() {
    let mut host = PlainHost::new();
    let para = host.paragraph(20, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(
        page_float(page, para..para + 1).with_insets(Sides::new(
            pt(4.0),
            pt(6.0),
            pt(4.0),
            pt(8.0),
        )),
    );
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);

    let check = |frame: &FloatFrame| {
        assert!(frame.area().contains_rect(frame.print_area()));
        let runs_box: Option<Rect> = frame
            .runs()
            .iter()
            .map(|run| run.rect)
            .reduce(|a, b| Rect::from_points(a.origin.min(b.origin), a.end_point().max(b.end_point())));
        if let Some(runs_box) = runs_box {
            assert!(frame.print_area().contains_rect(runs_box));
        }
    };

    check(tree.frame(id).unwrap());
    tree.grow(&mut engine, id, pt(33.0));
    tree.calculate(&mut engine, id);
    check(tree.frame(id).unwrap());
    tree.shrink(&mut engine, id, pt(12.0));
    tree.calculate(&mut engine, id);
    check(tree.frame(id).unwrap());
}

#[test]
fn test_nested_float_grow_redirects_to_balancer() {
    let mut host = PlainHost::new();
    let outer_para = host.paragraph(12, 12, pt(15.0));
    let inner_para = host.paragraph(4, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let parent = tree.insert(
        page_float(page, outer_para..outer_para + 1).with_columns(
            folio_layout::ColumnConfig::new(std::num::NonZeroU32::new(2).unwrap(), pt(10.0)),
        ),
    );
    tree.append_object(page, parent);

    let nested = tree.insert(
        FloatFrame::new(Anchor::Frame(parent), inner_para..inner_para + 1)
            .with_sizing(SizePolicy::Fixed, SizePolicy::Variable)
            .with_attr_size(Size::new(pt(80.0), Abs::zero())),
    );
    tree.append_object(page, nested);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate_page(&mut engine, page);

    // Growth inside a column layout must be re-triggered through the
    // parent's balancer.
    let refused = tree.grow(&mut engine, nested, pt(10.0));
    assert_eq!(refused.reason, Some(Refusal::ColumnBalanced));
    assert_eq!(refused.granted, Abs::zero());
}

#[test]
fn test_removed_frame_refuses_with_unspecified() {
    let mut host = PlainHost::new();
    let para = host.paragraph(10, 12, pt(15.0));

    let mut tree = LayoutTree::new();
    let page = thousand_unit_page(&mut tree);
    let id = tree.insert(page_float(page, para..para + 1));
    tree.append_object(page, id);

    let mut engine = Engine::new(&host, LayoutConfig::default());
    tree.calculate(&mut engine, id);
    tree.remove(id);

    // A stale handle is a dangling reference, not an error: the request is
    // refused without a reason more specific than `Unspecified`.
    let missing = tree.grow(&mut engine, id, pt(10.0));
    assert_eq!(missing.reason, Some(Refusal::Unspecified));
    assert!(tree.frame(id).is_none());
    assert!(tree.page(page).unwrap().objects().is_empty());
}

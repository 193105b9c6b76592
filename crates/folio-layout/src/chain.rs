//! Master/follow chains: linked frames whose overflow content continues in
//! the next link.

use crate::content::{partition, ContentLayout};
use crate::engine::Engine;
use crate::frame::Validity;
use crate::tree::{FrameId, LayoutTree};

impl LayoutTree {
    /// Establish a chain from `master` to `follow`.
    ///
    /// The link is strictly pairwise: it is only established if the master
    /// has no outgoing and the follow no incoming link yet. A conflicting
    /// request is a no-op (asserted in debug builds) and leaves both frames
    /// unchanged. Returns whether the link was established.
    pub fn link(&mut self, master: FrameId, follow: FrameId) -> bool {
        if master == follow {
            debug_assert!(false, "cannot chain a frame to itself");
            return false;
        }
        let (Some(m), Some(f)) = (self.frame(master), self.frame(follow)) else {
            return false;
        };
        if m.next.is_some() || f.prev.is_some() {
            debug_assert!(
                false,
                "chain link already occupied on one side of {master:?} -> {follow:?}"
            );
            return false;
        }

        self.frame_mut(master).unwrap().next = Some(follow);
        self.frame_mut(follow).unwrap().prev = Some(master);

        // The master's trailing content reflows into the new continuation;
        // the follow recomputes against the master's end state.
        let m = self.frame_mut(master).unwrap();
        m.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        let f = self.frame_mut(follow).unwrap();
        f.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        true
    }

    /// Break the chain between `master` and `follow`.
    ///
    /// Both sides are cleared together. Content that had flowed into the
    /// follow is handed back to the master's content sub-tree; the follow
    /// ends up empty and is expected to be discarded by the caller.
    pub fn unlink(&mut self, master: FrameId, follow: FrameId) {
        let (Some(m), Some(f)) = (self.frame(master), self.frame(follow)) else {
            return;
        };
        if m.next != Some(follow) || f.prev != Some(master) {
            debug_assert!(false, "{master:?} -> {follow:?} is not a chain");
            return;
        }

        let follow_range = f.content.range.clone();
        let had_content = !f.content.is_empty();

        let m = self.frame_mut(master).unwrap();
        m.next = None;
        if had_content {
            m.content.range.end = m.content.range.end.max(follow_range.end);
            m.measure_cache.clear();
        }
        m.valid.remove(Validity::SIZE | Validity::CONTENT_POS);

        let f = self.frame_mut(follow).unwrap();
        f.prev = None;
        f.content = ContentLayout::new(0..0);
        f.measure_cache.clear();
        f.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
    }

    /// Redistribute the master's content between it and its follow.
    ///
    /// The master keeps the prefix that fits its print area; everything
    /// else is transferred into the follow's content sub-tree. Masters are
    /// always settled before their follows consume the handover.
    pub(crate) fn reflow_chain(&mut self, _engine: &mut Engine, master: FrameId) {
        let Some(m) = self.frame(master) else { return };
        let Some(follow) = m.next else { return };

        let capacity = m.print_area().height();
        let (kept, moved) = partition(&m.content, capacity);

        let range = m.content.range.clone();
        let measured = m.content.measured.clone();

        let m = self.frame_mut(master).unwrap();
        m.content.height = kept.iter().map(|slice| slice.height).sum();
        m.content.slices = kept;

        if let Some(f) = self.frame_mut(follow) {
            f.content.range = range;
            f.content.measured = measured;
            f.content.height = moved.iter().map(|slice| slice.height).sum();
            f.content.slices = moved;
            f.valid.remove(Validity::SIZE | Validity::CONTENT_POS);
        }
    }
}

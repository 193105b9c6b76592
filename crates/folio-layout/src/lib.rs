//! Folio's floating-frame layout engine.
//!
//! Positions anchored frames relative to pages, paragraphs, characters or
//! other frames, grows and shrinks them to fit their content, balances
//! columns, splits content across page boundaries via master/follow chains,
//! and propagates invalidation through per-aspect dirty bits so that
//! re-layout after an edit stays incremental.

mod anchor;
mod chain;
mod columns;
mod content;
mod diag;
mod engine;
mod frame;
mod page;
mod split;
mod tree;

pub mod cache;
pub mod geom;

pub use self::anchor::{Anchor, PageRelation, PARKED};
pub use self::columns::{balance, column_rects, Balance, ColumnConfig, ColumnRun};
pub use self::content::{
    Break, ContentHost, ContentLayout, Measured, NodeIdx, NodeKind, Piece, PlainHost,
    Slice,
};
pub use self::diag::{Diagnostic, Severity, Sink};
pub use self::engine::{Engine, LayoutConfig, WrapNotice, DEFAULT_LOOP_MAX};
pub use self::frame::{
    ContentRun, FloatFrame, Granted, Refusal, SizePolicy, Validity,
};
pub use self::page::Page;
pub use self::tree::{FrameId, LayoutTree, PageId};

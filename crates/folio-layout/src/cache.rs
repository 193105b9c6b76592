//! The persisted layout cache: page-break hints that seed re-pagination.
//!
//! The file records where page boundaries fell the last time the document
//! was paginated, plus per-frame geometry hints. Hints are never
//! authoritative: positions and sizes are always recomputed from current
//! content, and a cache that fails validation in any record is discarded as
//! a whole.
//!
//! # File format
//!
//! All integers are little-endian.
//!
//! ```text
//! magic   b"FOLC"
//! header  u16 major version, u16 minor version
//! records tag u8, length u16, payload
//!   PARA  b'P': u32 node index, optionally u32 character offset
//!   TABLE b'T': u32 node index, u32 row offset (0xFFFF_FFFF = whole table)
//!   FLY   b'F': u16 page, u32 ordinal, i32 x, y, width, height
//! ```
//!
//! A missing `PARA` offset field (length 4 instead of 8) means the whole
//! paragraph moved to the next page without a split.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Read, Write};

use crate::content::{ContentHost, NodeKind};
use crate::geom::{Abs, Point, Rect, Size};
use crate::tree::LayoutTree;

/// The file's magic tag.
pub const MAGIC: [u8; 4] = *b"FOLC";

/// The current major format version. Files with a newer major version are
/// rejected.
pub const MAJOR_VERSION: u16 = 1;

/// The current minor format version.
pub const MINOR_VERSION: u16 = 0;

/// The sentinel row offset meaning "whole table, no split".
const WHOLE_TABLE: u32 = u32::MAX;

const TAG_PARA: u8 = b'P';
const TAG_TABLE: u8 = b'T';
const TAG_FLY: u8 = b'F';

/// One record of the layout cache.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CacheEntry {
    /// A page boundary fell at a paragraph.
    Para {
        /// The content-node index, relative to the first node.
        node: u32,
        /// The character offset of the split, or `None` for a whole,
        /// unsplit paragraph.
        offset: Option<u32>,
    },
    /// A page boundary fell at a table.
    Table {
        /// The content-node index, relative to the first node.
        node: u32,
        /// The row offset of the split, or `None` for a whole table.
        row: Option<u32>,
    },
    /// A floating frame's last geometry, relative to its page origin.
    ///
    /// Only a hint for seeding; the true geometry is always recomputed.
    Fly {
        /// The page number.
        page: u16,
        /// The frame's stable paint-order ordinal.
        ordinal: u32,
        /// Horizontal offset from the page origin, in raw units.
        x: i32,
        /// Vertical offset from the page origin, in raw units.
        y: i32,
        /// The frame width in raw units.
        width: i32,
        /// The frame height in raw units.
        height: i32,
    },
}

/// Why a layout cache was rejected.
///
/// Any of these discards the entire cache; records are never partially
/// applied.
#[derive(Debug)]
pub enum CacheError {
    /// The file does not start with the cache magic.
    BadMagic,
    /// The file's major version is newer than this reader understands.
    NewerVersion(u16),
    /// The file ended in the middle of a record.
    Truncated,
    /// A record carried an unknown type tag.
    UnknownTag(u8),
    /// A record's length does not match its type.
    BadLength(u8, u16),
    /// A record referred to a content node outside the live model.
    NodeOutOfRange(u32),
    /// A record's type does not match the live node's kind.
    KindMismatch(u32),
    /// Break records were not ordered by content index.
    Misordered,
    /// Reading the underlying stream failed.
    Io(io::Error),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::BadMagic => f.pad("not a layout cache file"),
            Self::NewerVersion(major) => {
                write!(f, "layout cache version {major} is too new")
            }
            Self::Truncated => f.pad("layout cache is truncated"),
            Self::UnknownTag(tag) => {
                write!(f, "unknown layout cache record tag {tag:#04x}")
            }
            Self::BadLength(tag, len) => {
                write!(f, "invalid length {len} for record tag {tag:#04x}")
            }
            Self::NodeOutOfRange(node) => {
                write!(f, "cached node index {node} is out of range")
            }
            Self::KindMismatch(node) => {
                write!(f, "cached record kind does not match node {node}")
            }
            Self::Misordered => f.pad("layout cache records are out of order"),
            Self::Io(err) => write!(f, "failed to read layout cache ({err})"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(err),
        }
    }
}

/// Serialize the entries into a cache file.
pub fn write(entries: &[CacheEntry], w: &mut dyn Write) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&MAJOR_VERSION.to_le_bytes())?;
    w.write_all(&MINOR_VERSION.to_le_bytes())?;

    for entry in entries {
        match *entry {
            CacheEntry::Para { node, offset } => {
                let len: u16 = if offset.is_some() { 8 } else { 4 };
                w.write_all(&[TAG_PARA])?;
                w.write_all(&len.to_le_bytes())?;
                w.write_all(&node.to_le_bytes())?;
                if let Some(offset) = offset {
                    w.write_all(&offset.to_le_bytes())?;
                }
            }
            CacheEntry::Table { node, row } => {
                w.write_all(&[TAG_TABLE])?;
                w.write_all(&8u16.to_le_bytes())?;
                w.write_all(&node.to_le_bytes())?;
                w.write_all(&row.unwrap_or(WHOLE_TABLE).to_le_bytes())?;
            }
            CacheEntry::Fly { page, ordinal, x, y, width, height } => {
                w.write_all(&[TAG_FLY])?;
                w.write_all(&22u16.to_le_bytes())?;
                w.write_all(&page.to_le_bytes())?;
                w.write_all(&ordinal.to_le_bytes())?;
                for value in [x, y, width, height] {
                    w.write_all(&value.to_le_bytes())?;
                }
            }
        }
    }

    Ok(())
}

/// Deserialize a cache file.
///
/// This checks structure only; call [`validate`] against the live content
/// model before trusting any record.
pub fn read(r: &mut dyn Read) -> Result<Vec<CacheEntry>, CacheError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CacheError::BadMagic);
    }

    let major = read_u16(r)?;
    let _minor = read_u16(r)?;
    if major > MAJOR_VERSION {
        return Err(CacheError::NewerVersion(major));
    }

    let mut entries = Vec::new();
    loop {
        let mut tag = [0u8; 1];
        match r.read_exact(&mut tag) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }

        let len = read_u16(r)?;
        match (tag[0], len) {
            (TAG_PARA, 4) => {
                entries.push(CacheEntry::Para { node: read_u32(r)?, offset: None });
            }
            (TAG_PARA, 8) => {
                entries.push(CacheEntry::Para {
                    node: read_u32(r)?,
                    offset: Some(read_u32(r)?),
                });
            }
            (TAG_TABLE, 8) => {
                let node = read_u32(r)?;
                let row = match read_u32(r)? {
                    WHOLE_TABLE => None,
                    row => Some(row),
                };
                entries.push(CacheEntry::Table { node, row });
            }
            (TAG_FLY, 22) => {
                entries.push(CacheEntry::Fly {
                    page: read_u16(r)?,
                    ordinal: read_u32(r)?,
                    x: read_i32(r)?,
                    y: read_i32(r)?,
                    width: read_i32(r)?,
                    height: read_i32(r)?,
                });
            }
            (TAG_PARA | TAG_TABLE | TAG_FLY, len) => {
                return Err(CacheError::BadLength(tag[0], len));
            }
            (tag, _) => return Err(CacheError::UnknownTag(tag)),
        }
    }

    Ok(entries)
}

/// Check every record against the live content model.
///
/// Node indices must be in range, record kinds must match the nodes they
/// refer to, and break records must be ordered by content index. Any
/// violation rejects the whole cache.
pub fn validate(
    entries: &[CacheEntry],
    host: &dyn ContentHost,
) -> Result<(), CacheError> {
    let mut last = None;
    for entry in entries {
        let (node, expected) = match *entry {
            CacheEntry::Para { node, .. } => (node, NodeKind::Paragraph),
            CacheEntry::Table { node, .. } => (node, NodeKind::Table),
            CacheEntry::Fly { .. } => continue,
        };

        if node as usize >= host.len() {
            return Err(CacheError::NodeOutOfRange(node));
        }
        if host.kind(node as usize) != Some(expected) {
            return Err(CacheError::KindMismatch(node));
        }

        if last.is_some_and(|last| node < last) {
            return Err(CacheError::Misordered);
        }
        last = Some(node);
    }
    Ok(())
}

/// A page-break position extracted from a validated cache, used to bias
/// where breaks are first attempted during initial pagination.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BreakSeed {
    /// The node the break fell at.
    pub node: u32,
    /// The split offset within the node (characters or rows), or `None`
    /// when the whole node moved.
    pub offset: Option<u32>,
}

/// Extract the page-break seeds, in content order.
pub fn seeds(entries: &[CacheEntry]) -> Vec<BreakSeed> {
    entries
        .iter()
        .filter_map(|entry| match *entry {
            CacheEntry::Para { node, offset } => Some(BreakSeed { node, offset }),
            CacheEntry::Table { node, row } => Some(BreakSeed { node, offset: row }),
            CacheEntry::Fly { .. } => None,
        })
        .collect()
}

/// Snapshot the geometry of every registered frame as `FLY` hint records,
/// in page order.
pub fn fly_entries(tree: &LayoutTree, page_gap: Abs) -> Vec<CacheEntry> {
    let mut entries = Vec::new();
    for (index, page) in tree.pages().enumerate() {
        let Some(origin) = tree.page_origin(page, page_gap) else { continue };
        let objects = tree.page(page).map(|p| p.objects().to_vec()).unwrap_or_default();
        for id in objects {
            let Some(frame) = tree.frame(id) else { continue };
            let rect = frame.area().translate(-origin);
            entries.push(CacheEntry::Fly {
                page: index as u16,
                ordinal: frame.ordinal(),
                x: rect.left().to_raw().round() as i32,
                y: rect.top().to_raw().round() as i32,
                width: rect.width().to_raw().round() as i32,
                height: rect.height().to_raw().round() as i32,
            });
        }
    }
    entries
}

/// Look up a frame's cached geometry hint by page and ordinal.
///
/// The rectangle is relative to the page's origin.
pub fn fly_hint(entries: &[CacheEntry], page: u16, ordinal: u32) -> Option<Rect> {
    entries.iter().find_map(|entry| match *entry {
        CacheEntry::Fly { page: p, ordinal: o, x, y, width, height }
            if p == page && o == ordinal =>
        {
            Some(Rect::new(
                Point::new(Abs::raw(x as f64), Abs::raw(y as f64)),
                Size::new(Abs::raw(width as f64), Abs::raw(height as f64)),
            ))
        }
        _ => None,
    })
}

fn read_u16(r: &mut dyn Read) -> Result<u16, CacheError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut dyn Read) -> Result<u32, CacheError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(r: &mut dyn Read) -> Result<i32, CacheError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

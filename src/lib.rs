//! Parser and unpacker for legacy Android boot images, including images
//! patched with Loki.

use std::io::{Read, Seek};

pub use error::Error;
pub use extract::{effective_page_size, extract_all, Segment};
pub use header::{
    locate_magic, read_loki_tag, BootImageHeader, LocatedHeader, BOOT_MAGIC, HEADER_SIZE,
    LOKI_MAGIC, LOKI_TAG_OFFSET, MAGIC_SCAN_LIMIT,
};
pub use metadata::{Metadata, Offsets, KERNEL_BASE_OFFSET};
pub use padding::{advance_past_padding, padding_after};
pub use sink::{DirSink, OutputSink};

mod error;
mod extract;
mod header;
mod metadata;
mod padding;
mod sink;

/// Result of [`unpack`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Unpacked {
    pub located: LocatedHeader,
    /// Page size used for alignment
    pub page_size: u32,
    /// Segments written to the sink, in order
    pub segments: Vec<Segment>,
}

impl Unpacked {
    pub fn header(&self) -> &BootImageHeader {
        &self.located.header
    }
    pub fn metadata(&self) -> Metadata {
        Metadata::new(self.header(), self.page_size)
    }
}

/// Decodes the header and writes the text records followed by the segments
/// to `sink`.
///
/// Nothing is written if the header cannot be decoded or the page size is
/// invalid. A zero `page_size_override` keeps the header's page size.
pub fn unpack<R: Read + Seek, S: OutputSink + ?Sized>(
    reader: &mut R,
    page_size_override: u32,
    sink: &mut S,
) -> Result<Unpacked, Error> {
    let located = LocatedHeader::locate(reader)?;
    let page_size = effective_page_size(&located.header, page_size_override)?;

    Metadata::new(&located.header, page_size).emit(sink)?;
    let segments = extract_all(reader, &located.header, page_size, sink)?;

    Ok(Unpacked {
        located,
        page_size,
        segments,
    })
}

use std::io::Read;

use crate::{
    header::{BootImageHeader, HEADER_SIZE},
    padding::advance_past_padding,
    Error, OutputSink,
};

/// A named byte range following the header
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Kernel,
    Ramdisk,
    Second,
    DeviceTree,
}

impl Segment {
    /// Segments in on-disk order
    pub const ALL: [Self; 4] = [Self::Kernel, Self::Ramdisk, Self::Second, Self::DeviceTree];

    /// Output file suffix
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Kernel => "zImage",
            Self::Ramdisk => "ramdisk.gz",
            Self::Second => "second",
            Self::DeviceTree => "dt",
        }
    }
    pub fn size(self, hdr: &BootImageHeader) -> u32 {
        match self {
            Self::Kernel => hdr.kernel_size,
            Self::Ramdisk => hdr.ramdisk_size,
            Self::Second => hdr.second_size,
            Self::DeviceTree => hdr.dt_size,
        }
    }
    /// Kernel and ramdisk are always emitted, even when empty.
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Second | Self::DeviceTree)
    }
}

/// Picks `page_size_override` if nonzero, else the header's page size.
pub fn effective_page_size(hdr: &BootImageHeader, page_size_override: u32) -> Result<u32, Error> {
    let page_size = if page_size_override != 0 {
        page_size_override
    } else {
        hdr.page_size
    };
    if page_size.is_power_of_two() {
        Ok(page_size)
    } else {
        Err(Error::InvalidPageSize(page_size))
    }
}

/// Copies every present segment from `reader` into `sink`.
///
/// `reader` must be positioned right after the header. Returns the emitted
/// segments in order.
pub fn extract_all<R: Read, S: OutputSink + ?Sized>(
    reader: &mut R,
    hdr: &BootImageHeader,
    page_size_override: u32,
    sink: &mut S,
) -> Result<Vec<Segment>, Error> {
    let page_size = effective_page_size(hdr, page_size_override)?;
    advance_past_padding(reader, HEADER_SIZE, page_size)?;

    let mut emitted = Vec::with_capacity(Segment::ALL.len());
    for segment in Segment::ALL {
        let size = segment.size(hdr);
        if segment.is_optional() && size == 0 {
            continue;
        }
        let data = read_segment(reader, segment, size)?;
        sink.emit(segment.suffix(), &data)?;
        advance_past_padding(reader, size, page_size)?;
        emitted.push(segment);
    }
    Ok(emitted)
}

/// Buffers the whole segment so a short read never reaches the sink as a partial output.
fn read_segment<R: Read>(reader: &mut R, segment: Segment, size: u32) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    let actual = reader
        .by_ref()
        .take(u64::from(size))
        .read_to_end(&mut data)? as u64;
    if actual < u64::from(size) {
        return Err(Error::Truncated {
            segment,
            expected: size,
            actual,
        });
    }
    log::debug!("read {size} bytes of {segment:?}");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::padding::padding_after;

    fn header(kernel: u32, ramdisk: u32, second: u32, dt: u32) -> BootImageHeader {
        BootImageHeader {
            kernel_size: kernel,
            kernel_addr: 0x1000_8000,
            ramdisk_size: ramdisk,
            ramdisk_addr: 0x1100_0000,
            second_size: second,
            second_addr: 0x10f0_0000,
            tags_addr: 0x1000_0100,
            page_size: 2048,
            dt_size: dt,
            unused: 0,
            name: [0; 16],
            cmdline: Box::new([0; 512]),
            id: [0; 8],
        }
    }

    /// Body of an image, starting right after the header.
    fn body(page_size: usize, segments: &[(u8, usize)]) -> Vec<u8> {
        let mut buf = vec![0xee; page_size - HEADER_SIZE as usize];
        for &(fill, len) in segments {
            buf.extend(std::iter::repeat(fill).take(len));
            let padding = padding_after(len as u32, page_size as u32) as usize;
            buf.extend(std::iter::repeat(0xee).take(padding));
        }
        buf
    }

    #[test]
    fn extracts_all_four_segments_in_order() {
        let hdr = header(3000, 100, 2048, 10);
        let data = body(2048, &[(1, 3000), (2, 100), (3, 2048), (4, 10)]);
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();

        let emitted = extract_all(&mut Cursor::new(data), &hdr, 0, &mut sink).unwrap();
        assert_eq!(emitted, Segment::ALL);
        assert_eq!(sink.len(), 4);
        for ((name, bytes), (suffix, fill, len)) in sink.iter().zip([
            ("zImage", 1, 3000),
            ("ramdisk.gz", 2, 100),
            ("second", 3, 2048),
            ("dt", 4, 10),
        ]) {
            assert_eq!(name, suffix);
            assert_eq!(bytes.len(), len);
            assert!(bytes.iter().all(|b| *b == fill));
        }
    }

    #[test]
    fn absent_optional_segments_are_skipped() {
        let hdr = header(10, 0, 0, 0);
        let data = body(2048, &[(1, 10)]);
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();

        let emitted = extract_all(&mut Cursor::new(data), &hdr, 0, &mut sink).unwrap();
        assert_eq!(emitted, [Segment::Kernel, Segment::Ramdisk]);
        assert_eq!(sink[1], ("ramdisk.gz".to_owned(), Vec::new()));
    }

    #[test]
    fn override_page_size_is_used_for_alignment() {
        let hdr = header(5000, 20, 0, 0);
        let data = body(4096, &[(1, 5000), (2, 20)]);
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();

        extract_all(&mut Cursor::new(data), &hdr, 4096, &mut sink).unwrap();
        assert_eq!(sink[1].1, vec![2; 20]);
    }

    #[test]
    fn truncated_segment_is_not_emitted() {
        let hdr = header(4096, 100, 0, 0);
        let mut data = body(2048, &[(1, 4096)]);
        data.truncate(data.len() - 1);
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();

        let err = extract_all(&mut Cursor::new(data), &hdr, 0, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                segment: Segment::Kernel,
                expected: 4096,
                actual: 4095,
            }
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn invalid_page_sizes_are_rejected() {
        let mut hdr = header(1, 1, 0, 0);
        hdr.page_size = 0;
        assert!(matches!(
            effective_page_size(&hdr, 0),
            Err(Error::InvalidPageSize(0))
        ));
        assert_eq!(effective_page_size(&hdr, 0x800).unwrap(), 0x800);
        hdr.page_size = 3000;
        assert!(matches!(
            effective_page_size(&hdr, 0),
            Err(Error::InvalidPageSize(3000))
        ));
        assert!(matches!(
            effective_page_size(&hdr, 0x1001),
            Err(Error::InvalidPageSize(0x1001))
        ));
    }
}

use std::fmt;

use crate::{header::BootImageHeader, Error, OutputSink};

/// Distance between the load base and the kernel load address
pub const KERNEL_BASE_OFFSET: u32 = 0x0000_8000;

/// Load addresses relative to the load base
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Offsets {
    pub kernel: u32,
    pub ramdisk: u32,
    pub second: u32,
    pub tags: u32,
}

impl fmt::Display for Offsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--kernel_offset {:08x} --ramdisk_offset {:08x} --second_offset {:08x} --tags_offset {:08x}",
            self.kernel, self.ramdisk, self.second, self.tags
        )
    }
}

/// Header fields written out as text records
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub cmdline: Vec<u8>,
    pub base: u32,
    pub offsets: Offsets,
    pub page_size: u32,
}

impl Metadata {
    /// Addresses wrap around like the unsigned 32-bit fields they come from.
    pub fn new(hdr: &BootImageHeader, page_size: u32) -> Self {
        let base = hdr.kernel_addr.wrapping_sub(KERNEL_BASE_OFFSET);
        Self {
            cmdline: hdr.cmdline_bytes().to_vec(),
            base,
            offsets: Offsets {
                kernel: hdr.kernel_addr.wrapping_sub(base),
                ramdisk: hdr.ramdisk_addr.wrapping_sub(base),
                second: hdr.second_addr.wrapping_sub(base),
                tags: hdr.tags_addr.wrapping_sub(base),
            },
            page_size,
        }
    }

    /// `(suffix, contents)` pairs, each line terminated by a newline.
    pub fn records(&self) -> [(&'static str, Vec<u8>); 4] {
        let mut cmdline = self.cmdline.clone();
        cmdline.push(b'\n');
        [
            ("cmdline", cmdline),
            ("base", format!("{:08x}\n", self.base).into_bytes()),
            ("offsets", format!("{}\n", self.offsets).into_bytes()),
            ("pagesize", format!("{}\n", self.page_size).into_bytes()),
        ]
    }

    pub fn emit<S: OutputSink + ?Sized>(&self, sink: &mut S) -> Result<(), Error> {
        for (suffix, contents) in self.records() {
            sink.emit(suffix, &contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(
        kernel_addr: u32,
        ramdisk_addr: u32,
        second_addr: u32,
        tags_addr: u32,
    ) -> BootImageHeader {
        let mut cmdline = Box::new([0u8; 512]);
        cmdline[..27].copy_from_slice(b"androidboot.hardware=qcom x");
        BootImageHeader {
            kernel_size: 0,
            kernel_addr,
            ramdisk_size: 0,
            ramdisk_addr,
            second_size: 0,
            second_addr,
            tags_addr,
            page_size: 2048,
            dt_size: 0,
            unused: 0,
            name: [0; 16],
            cmdline,
            id: [0; 8],
        }
    }

    #[test]
    fn offsets_line_format() {
        let offsets = Offsets {
            kernel: 0x100,
            ramdisk: 0x2000,
            second: 0,
            tags: 0x4000,
        };
        assert_eq!(
            offsets.to_string(),
            "--kernel_offset 00000100 --ramdisk_offset 00002000 --second_offset 00000000 --tags_offset 00004000"
        );
    }

    #[test]
    fn offsets_relative_to_zero_base() {
        let hdr = header(0x8000, 0x8000 + 0x2000, 0, 0x100);
        let meta = Metadata::new(&hdr, 2048);
        assert_eq!(meta.base, 0);
        assert_eq!(
            meta.offsets,
            Offsets {
                kernel: 0x8000,
                ramdisk: 0xa000,
                second: 0,
                tags: 0x100,
            }
        );
    }

    #[test]
    fn typical_msm_addresses() {
        let hdr = header(0x8020_8000, 0x8220_0000, 0x8110_0000, 0x8020_0100);
        let meta = Metadata::new(&hdr, 2048);
        assert_eq!(meta.base, 0x8020_0000);
        assert_eq!(meta.offsets.kernel, 0x8000);
        assert_eq!(meta.offsets.ramdisk, 0x0200_0000);
        assert_eq!(meta.offsets.second, 0x00f0_0000);
        assert_eq!(meta.offsets.tags, 0x100);
    }

    #[test]
    fn addresses_below_base_wrap() {
        let hdr = header(0x4000, 0, 0, 0);
        let meta = Metadata::new(&hdr, 2048);
        assert_eq!(meta.base, 0xffff_c000);
        assert_eq!(meta.offsets.kernel, 0x8000);
        assert_eq!(meta.offsets.ramdisk, 0x4000);
    }

    #[test]
    fn records_are_newline_terminated() {
        let hdr = header(0x1000_8000, 0x1100_0000, 0x10f0_0000, 0x1000_0100);
        let records = Metadata::new(&hdr, 4096).records();
        let names: Vec<_> = records.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["cmdline", "base", "offsets", "pagesize"]);
        assert_eq!(records[0].1, b"androidboot.hardware=qcom x\n");
        assert_eq!(records[1].1, b"10000000\n");
        assert_eq!(
            records[2].1,
            b"--kernel_offset 00008000 --ramdisk_offset 01000000 --second_offset 00f00000 --tags_offset 00000100\n"
        );
        assert_eq!(records[3].1, b"4096\n");
    }
}

use std::io::{self, Read, Seek, SeekFrom};

use binrw::{binrw, BinRead};

use crate::Error;

/// Boot image magic
pub const BOOT_MAGIC: [u8; 8] = *b"ANDROID!";
/// Last offset at which the magic is searched for
pub const MAGIC_SCAN_LIMIT: usize = 512;
/// Size of [`BootImageHeader`] on disk
pub const HEADER_SIZE: u32 = 608;
/// Tag written by Loki at [`LOKI_TAG_OFFSET`] bytes past the magic
pub const LOKI_MAGIC: [u8; 4] = *b"LOKI";
pub const LOKI_TAG_OFFSET: u64 = 0x400;

/// Legacy Android boot image header with a device tree size field
///
/// # Layout
///
/// ```text
/// +-----------------+
/// | boot header     | 1 page
/// +-----------------+
/// | kernel          | n pages
/// +-----------------+
/// | ramdisk         | m pages
/// +-----------------+
/// | second stage    | o pages
/// +-----------------+
/// | device tree     | p pages
/// +-----------------+
/// ```
#[binrw]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[brw(little, magic = b"ANDROID!")]
pub struct BootImageHeader {
    /// Kernel size
    pub kernel_size: u32,
    /// Kernel physical load addr
    pub kernel_addr: u32,
    /// Ramdisk size
    pub ramdisk_size: u32,
    /// Ramdisk physical load addr
    pub ramdisk_addr: u32,
    /// Second bootloader size
    pub second_size: u32,
    /// Second bootloader physical load addr
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    /// Device tree size
    pub dt_size: u32,
    pub unused: u32,
    pub name: [u8; 16],
    /// Kernel command line
    pub cmdline: Box<[u8; 512]>,
    /// Digest slot filled in by mkbootimg
    pub id: [u32; 8],
}

impl BootImageHeader {
    /// Moves the sizes Loki stashed away back into their usual fields.
    ///
    /// Loki keeps the real kernel size in `dt_size`, the real ramdisk size in
    /// `unused` and the ramdisk load address in `second_addr`.
    pub fn apply_loki_remap(&mut self) {
        self.kernel_size = std::mem::take(&mut self.dt_size);
        self.ramdisk_size = std::mem::take(&mut self.unused);
        self.ramdisk_addr = std::mem::take(&mut self.second_addr);
    }
    /// Kernel command line up to the first NUL
    pub fn cmdline_bytes(&self) -> &[u8] {
        take_until_null(&*self.cmdline)
    }
    /// Board name up to the first NUL
    pub fn board_name(&self) -> &[u8] {
        take_until_null(&self.name)
    }
}

/// A decoded header together with where and how it was found
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocatedHeader {
    pub header: BootImageHeader,
    /// Offset of the magic from the start of the input
    pub magic_offset: u64,
    /// Whether the header was patched by Loki and has been remapped
    pub loki: bool,
}

impl LocatedHeader {
    /// Finds, decodes and, for Loki images, remaps the header.
    ///
    /// Leaves `reader` positioned right after the header.
    pub fn locate<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        let magic_offset = locate_magic(reader)?;
        log::debug!("Android magic found at {magic_offset}");
        let loki = read_loki_tag(reader, magic_offset)?;

        reader.seek(SeekFrom::Start(magic_offset))?;
        let mut header = BootImageHeader::read(reader)?;
        if loki {
            log::info!("Loki patched image detected, remapping header");
            header.apply_loki_remap();
        }
        Ok(Self {
            header,
            magic_offset,
            loki,
        })
    }
}

/// Returns the lowest offset in `0..=512` at which [`BOOT_MAGIC`] starts.
pub fn locate_magic<R: Read + Seek>(reader: &mut R) -> Result<u64, Error> {
    reader.seek(SeekFrom::Start(0))?;
    let mut window = Vec::with_capacity(MAGIC_SCAN_LIMIT + BOOT_MAGIC.len());
    reader
        .by_ref()
        .take((MAGIC_SCAN_LIMIT + BOOT_MAGIC.len()) as u64)
        .read_to_end(&mut window)?;

    window
        .windows(BOOT_MAGIC.len())
        .position(|candidate| candidate == BOOT_MAGIC)
        .map(|offset| offset as u64)
        .ok_or(Error::MagicNotFound)
}

/// Checks for the Loki tag. Input too short to hold the tag has none.
pub fn read_loki_tag<R: Read + Seek>(reader: &mut R, magic_offset: u64) -> Result<bool, Error> {
    reader.seek(SeekFrom::Start(magic_offset + LOKI_TAG_OFFSET))?;
    let mut tag = [0u8; 4];
    match reader.read_exact(&mut tag) {
        Ok(()) => Ok(tag == LOKI_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn take_until_null(input: &[u8]) -> &[u8] {
    match input.iter().position(|x| *x == 0) {
        Some(null_idx) => &input[..null_idx],
        None => input,
    }
}

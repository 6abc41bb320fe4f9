use std::io::{self, Read};

/// Returns the number of bytes needed after an item of `item_size` bytes to
/// reach the next `page_size` boundary.
///
/// `page_size` must be a power of two.
pub const fn padding_after(item_size: u32, page_size: u32) -> u32 {
    let page_mask = page_size.wrapping_sub(1);
    if item_size & page_mask == 0 {
        0
    } else {
        page_size.wrapping_sub(item_size & page_mask)
    }
}

/// Skips the padding that follows an item of `item_size` bytes.
///
/// Returns the number of bytes actually skipped, which is less than the
/// padding if the input ends early.
pub fn advance_past_padding<R: Read>(
    reader: &mut R,
    item_size: u32,
    page_size: u32,
) -> io::Result<u64> {
    let padding = padding_after(item_size, page_size);
    let skipped = io::copy(&mut reader.by_ref().take(u64::from(padding)), &mut io::sink())?;
    log::debug!("skipped {skipped} of {padding} padding bytes after {item_size} byte item");
    Ok(skipped)
}

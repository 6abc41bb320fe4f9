use std::{
    fs::File,
    io::{self, stdout, BufReader, Write},
    path::PathBuf,
};

use abootimg_loki::{unpack, DirSink, Segment, Unpacked};
use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

use crate::logger::StderrLogger;

mod logger;

/// Unpack a legacy Android boot image into its segments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the boot or recovery image
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory of the unpacked images
    #[arg(short, long, default_value = "./")]
    output: PathBuf,

    /// Page size in hexadecimal, overriding the one in the header
    #[arg(short, long, value_parser = parse_hex_u32)]
    pagesize: Option<u32>,

    /// Text output format
    #[arg(value_enum, long, default_value_t = TextOutputFormat::Info)]
    format: TextOutputFormat,

    /// Output null-terminated argument strings
    #[arg(short = '0', long)]
    null: bool,

    /// Log more, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TextOutputFormat {
    /// Header summary in the `BOARD_*` style of the classic unpackbootimg
    Info,
    /// Output shell-escaped (quoted) argument strings that can be used to
    /// reconstruct the boot image using `mkbootimg`
    Mkbootimg,
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hexadecimal page size: {e}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    StderrLogger::new(match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    })
    .init()?;

    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let mut r = BufReader::new(file);
    let mut sink = DirSink::new(&args.output, &args.input);

    let unpacked = unpack(&mut r, args.pagesize.unwrap_or(0), &mut sink)
        .with_context(|| format!("failed to unpack {}", args.input.display()))?;

    match args.format {
        TextOutputFormat::Info => print_info(stdout().lock(), &unpacked)?,
        TextOutputFormat::Mkbootimg => {
            print_mkbootimg(stdout().lock(), &unpacked, &sink, args.null)?
        }
    }
    Ok(())
}

fn print_info<W: Write>(mut out: W, unpacked: &Unpacked) -> io::Result<()> {
    let hdr = unpacked.header();
    writeln!(out, "Android magic found at: {}", unpacked.located.magic_offset)?;
    if unpacked.located.loki {
        writeln!(out, "Loki patched image, header remapped")?;
    }
    write!(out, "BOARD_KERNEL_CMDLINE ")?;
    out.write_all(hdr.cmdline_bytes())?;
    writeln!(out)?;
    writeln!(out, "BOARD_KERNEL_BASE {:08x}", unpacked.metadata().base)?;
    writeln!(out, "BOARD_PAGE_SIZE {}", hdr.page_size)?;
    write!(out, "BOARD_NAME ")?;
    out.write_all(hdr.board_name())?;
    writeln!(out)
}

fn print_mkbootimg<W: Write>(
    out: W,
    unpacked: &Unpacked,
    sink: &DirSink,
    null: bool,
) -> anyhow::Result<()> {
    let hdr = unpacked.header();
    let meta = unpacked.metadata();
    let mut args = ArgWriter::new(out, null);

    for segment in &unpacked.segments {
        let flag = match segment {
            Segment::Kernel => "kernel",
            Segment::Ramdisk => "ramdisk",
            Segment::Second => "second",
            Segment::DeviceTree => "dt",
        };
        let path = sink.path(segment.suffix());
        args.arg(flag, path.as_os_str().as_encoded_bytes())?;
    }
    args.arg("cmdline", hdr.cmdline_bytes())?;
    args.arg("board", hdr.board_name())?;
    args.arg("base", format!("0x{:08x}", meta.base).as_bytes())?;
    args.arg("pagesize", unpacked.page_size.to_string().as_bytes())?;
    args.arg("kernel_offset", format!("0x{:08x}", meta.offsets.kernel).as_bytes())?;
    args.arg("ramdisk_offset", format!("0x{:08x}", meta.offsets.ramdisk).as_bytes())?;
    args.arg("second_offset", format!("0x{:08x}", meta.offsets.second).as_bytes())?;
    args.arg("tags_offset", format!("0x{:08x}", meta.offsets.tags).as_bytes())?;
    args.finish()?;
    Ok(())
}

/// Prints `--flag value` pairs separated by spaces, or by NULs with `-0`.
struct ArgWriter<W> {
    out: W,
    null: bool,
    first: bool,
}

impl<W: Write> ArgWriter<W> {
    fn new(out: W, null: bool) -> Self {
        Self {
            out,
            null,
            first: true,
        }
    }

    fn sep(&self) -> &'static [u8] {
        if self.null {
            b"\0"
        } else {
            b" "
        }
    }

    fn arg(&mut self, flag: &str, value: &[u8]) -> anyhow::Result<()> {
        let sep = self.sep();
        if !self.first {
            self.out.write_all(sep)?;
        }
        self.first = false;
        write!(self.out, "--{flag}")?;
        self.out.write_all(sep)?;
        if self.null {
            self.out.write_all(value)?;
        } else {
            let q = shlex::bytes::Quoter::new();
            self.out.write_all(&q.quote(value)?)?;
        }
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        if self.null {
            self.out.write_all(b"\0")?;
        } else {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }
}

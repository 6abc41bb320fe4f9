use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::Error;

/// Destination for extracted segments and text records
pub trait OutputSink {
    /// Writes one complete output named by `suffix`.
    fn emit(&mut self, suffix: &str, contents: &[u8]) -> Result<(), Error>;
}

/// Collects outputs in memory as `(suffix, contents)` pairs.
impl OutputSink for Vec<(String, Vec<u8>)> {
    fn emit(&mut self, suffix: &str, contents: &[u8]) -> Result<(), Error> {
        self.push((suffix.to_owned(), contents.to_vec()));
        Ok(())
    }
}

/// Writes each output to `<dir>/<basename of input>-<suffix>`
///
/// `dir` is created on the first write, so a run that fails before
/// producing any output leaves no trace.
#[derive(Clone, Debug)]
pub struct DirSink {
    dir: PathBuf,
    prefix: OsString,
    dir_created: bool,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>, input: &Path) -> Self {
        let prefix = input
            .file_name()
            .unwrap_or(input.as_os_str())
            .to_os_string();
        Self {
            dir: dir.into(),
            prefix,
            dir_created: false,
        }
    }
    pub fn path(&self, suffix: &str) -> PathBuf {
        let mut name = self.prefix.clone();
        name.push("-");
        name.push(suffix);
        self.dir.join(name)
    }
}

impl OutputSink for DirSink {
    fn emit(&mut self, suffix: &str, contents: &[u8]) -> Result<(), Error> {
        if !self.dir_created {
            fs::create_dir_all(&self.dir).map_err(|source| Error::OutputWrite {
                path: self.dir.clone(),
                source,
            })?;
            self.dir_created = true;
        }
        let path = self.path(suffix);
        fs::write(&path, contents).map_err(|source| Error::OutputWrite {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}

#[cfg(test)]
#[test]
fn test() {
    let sink = DirSink::new("out", Path::new("/tmp/images/boot.img"));
    assert_eq!(sink.path("zImage"), Path::new("out/boot.img-zImage"));
    assert_eq!(sink.path("ramdisk.gz"), Path::new("out/boot.img-ramdisk.gz"));

    // A regular file where the output directory should go
    let blocker = std::env::temp_dir().join(format!("abootimg-loki-sink-{}", std::process::id()));
    fs::write(&blocker, b"").unwrap();
    let mut blocked = DirSink::new(blocker.join("out"), Path::new("boot.img"));
    let result = blocked.emit("base", b"00000000\n");
    fs::remove_file(&blocker).unwrap();
    assert!(matches!(
        result,
        Err(Error::OutputWrite { path, .. }) if path == blocker.join("out")
    ));
}

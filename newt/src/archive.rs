//! Directory transfers travel as zip archives with stored (uncompressed)
//! entries: the sender zips a folder into a sibling `.zip` artefact, the
//! receiver unzips it next to itself and deletes the archive.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::Error;

/// Zip the contents of `dir` into a sibling `<dir>.zip`, stored entries
/// only, and return the archive path.
pub fn zip_dir(dir: &Path) -> Result<PathBuf, Error> {
  let mut out = dir.as_os_str().to_owned();
  out.push(".zip");
  let out = PathBuf::from(out);

  let mut zip = ZipWriter::new(File::create(&out)?);
  let options = FileOptions::default().compression_method(CompressionMethod::Stored);
  add_entries(&mut zip, dir, dir, options)?;
  zip.finish()?;

  Ok(out)
}

fn add_entries(zip: &mut ZipWriter<File>,
               root: &Path,
               dir: &Path,
               options: FileOptions)
               -> Result<(), Error> {
  for entry in fs::read_dir(dir)? {
    let path = entry?.path();

    if path.is_dir() {
      add_entries(zip, root, &path, options)?;
    } else {
      let name = path.strip_prefix(root)
                     .unwrap_or(&path)
                     .to_string_lossy()
                     .into_owned();
      zip.start_file(name, options)?;
      std::io::copy(&mut File::open(&path)?, zip)?;
    }
  }
  Ok(())
}

/// Extract `<x>.zip` into a sibling directory `<x>` and return that
/// directory. The archive itself is left for the caller to delete.
pub fn unzip_sibling(zip_path: &Path) -> Result<PathBuf, Error> {
  let out = zip_path.with_extension("");
  let mut archive = ZipArchive::new(File::open(zip_path)?)?;
  archive.extract(&out)?;
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zip_then_unzip_restores_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("photos");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(src.join("a.txt"), b"alpha").unwrap();
    fs::write(src.join("nested/b.bin"), [0u8, 1, 2, 255]).unwrap();

    let archive = zip_dir(&src).unwrap();
    assert_eq!(archive, tmp.path().join("photos.zip"));

    // unzip into a fresh location, as the receiving side would
    let recv = tmp.path().join("recv");
    fs::create_dir_all(&recv).unwrap();
    let moved = recv.join("photos.zip");
    fs::rename(&archive, &moved).unwrap();

    let out = unzip_sibling(&moved).unwrap();
    assert_eq!(out, recv.join("photos"));
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(out.join("nested/b.bin")).unwrap(), vec![0u8, 1, 2, 255]);
  }
}

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use super::validate_entry_path;
use crate::runtime::{Runtime, clean_path};

const PARTIAL_SUFFIX: &str = ".partial";

/// Reader and writer for `.tar.gz` bundle archives.
pub struct TarGz;

impl TarGz {
    pub fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    /// Read every regular file of the archive into memory, keyed by its
    /// cleaned entry path. A single invalid entry name fails the whole read.
    #[tracing::instrument(skip(self, runtime))]
    pub fn read_files<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        debug!("Reading tar.gz archive {:?}...", archive_path);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        self.read_from(file)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))
    }

    pub fn read_from<T: Read>(&self, reader: T) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut files = BTreeMap::new();

        for entry in archive.entries().context("Failed to list tar entries")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            if !entry.header().entry_type().is_file() {
                debug!("Skipping non-regular entry {:?}", entry.path_bytes());
                continue;
            }

            let raw_path = entry.path_bytes().into_owned();
            let cleaned = match std::str::from_utf8(&raw_path) {
                Ok(path) if !path.is_empty() => clean_path(path).into_bytes(),
                _ => raw_path,
            };
            let path = validate_entry_path(&cleaned)?.to_string();

            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .with_context(|| format!("Failed to read tar entry '{}'", path))?;
            files.insert(path, contents);
        }

        Ok(files)
    }

    /// Write `entries` (paths relative to `source_dir`, `/`-separated) into
    /// `<dest_dir>/<archive_name>`. The archive is assembled under a
    /// `.partial` name and only renamed once the gzip stream is finished.
    #[tracing::instrument(skip(self, runtime, entries))]
    pub fn compress<R: Runtime>(
        &self,
        runtime: &R,
        source_dir: &Path,
        entries: &[String],
        dest_dir: &Path,
        archive_name: &str,
    ) -> Result<PathBuf> {
        // never produce an archive that read_files would refuse
        for entry in entries {
            validate_entry_path(entry.as_bytes())?;
        }

        if !runtime.exists(dest_dir) {
            runtime.create_dir_all(dest_dir)?;
        }

        let final_path = dest_dir.join(archive_name);
        let partial_path = dest_dir.join(format!("{}{}", archive_name, PARTIAL_SUFFIX));

        if let Err(e) = self.write_archive(runtime, source_dir, entries, &partial_path) {
            if runtime.exists(&partial_path)
                && let Err(cleanup) = runtime.remove_file(&partial_path)
            {
                debug!("Failed to remove {:?}: {}", partial_path, cleanup);
            }
            return Err(e);
        }

        runtime.rename(&partial_path, &final_path)?;
        info!("Wrote archive {:?}", final_path);
        Ok(final_path)
    }

    fn write_archive<R: Runtime>(
        &self,
        runtime: &R,
        source_dir: &Path,
        entries: &[String],
        archive_path: &Path,
    ) -> Result<()> {
        let file = runtime.create_file(archive_path)?;
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

        for entry in entries {
            let contents = runtime.read(&source_dir.join(entry))?;

            // append_data emits a GNU long-name record for paths over 100 bytes
            let mut header = Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, entry, contents.as_slice())
                .with_context(|| format!("Failed to add '{}' to archive", entry))?;
            debug!("Added {}", entry);
        }

        let encoder = builder
            .into_inner()
            .context("Failed to finish tar stream")?;
        let mut file = encoder.finish().context("Failed to finish gzip stream")?;
        file.flush()
            .with_context(|| format!("Failed to flush {:?}", archive_path))?;
        Ok(())
    }
}

//! Rewriting of all class files inside a jar.

use std::io::{Cursor, Read, Write};
use anyhow::{Context, Result};
use log::warn;
use zip::{ZipArchive, ZipWriter};
use zip::write::{ExtendedFileOptions, FileOptions};
use crate::CLASS_MAGIC;

/// Copies the jar entry by entry, passing every class file through
/// [`crate::shade_class`].
///
/// A class file that cannot be processed (an unknown signature version, say,
/// or a `ScalaLongSignature` annotation) is copied unchanged with a warning
/// instead of failing the whole jar; such a class wouldn't have been rewritten
/// by the tool anyway.
pub(crate) fn shade(input: &[u8], replace: &str, with: &str, dump: bool) -> Result<Vec<u8>> {
	let mut zip = ZipArchive::new(Cursor::new(input))
		.context("failed to open input as a zip archive")?;
	let mut zip_out = ZipWriter::new(Cursor::new(Vec::new()));

	for index in 0..zip.len() {
		let mut file = zip.by_index(index)?;
		let name = file.name().to_owned();

		let mut options: FileOptions<'_, ExtendedFileOptions> = FileOptions::default();
		if let Some(last_modified) = file.last_modified() {
			options = options.last_modified_time(last_modified);
		}

		if file.is_dir() {
			zip_out.add_directory(name, options)?;
			continue;
		}

		let mut data = Vec::new();
		file.read_to_end(&mut data)
			.with_context(|| format!("failed to read jar entry {name}"))?;

		if name.ends_with(".class") && data.starts_with(&CLASS_MAGIC) {
			match crate::shade_class(&data, replace, with, dump) {
				Ok(Some(rewritten)) => data = rewritten,
				Ok(None) => {},
				Err(e) => warn!("leaving class {name} untouched: {e:#}"),
			}
		}

		zip_out.start_file(name, options)?;
		zip_out.write_all(&data)?;
	}

	Ok(zip_out.finish()?.into_inner())
}

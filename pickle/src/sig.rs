//! Parsing and serialization of a whole signature: the version header plus the
//! entry table, in the byte form carried (7-bit encoded) by the annotation.

use std::fmt::{Display, Formatter};
use std::io::{Cursor, Read};
use anyhow::{bail, Result};
use crate::PickleError;
use crate::nat::{self, NatRead};
use crate::table::Table;

/// The only format version we know how to rewrite.
pub const MAJOR_VERSION: u32 = 5;
pub const MINOR_VERSION: u32 = 0;

/// A decoded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalaSig {
	major_version: u32,
	minor_version: u32,
	table: Table,
}

impl ScalaSig {
	/// Parses a signature from its byte form.
	///
	/// Layout: major version Nat, minor version Nat, entry count Nat, then per
	/// entry a type tag Nat, a payload length Nat and that many payload bytes.
	/// scalac pads the encoded form with at most one trailing zero byte, which
	/// is accepted and not preserved; anything else after the last entry is an
	/// error.
	pub fn parse(bytes: &[u8]) -> Result<ScalaSig> {
		let mut reader = Cursor::new(bytes);

		let major_version = reader.read_nat()?;
		let minor_version = reader.read_nat()?;
		if (major_version, minor_version) != (MAJOR_VERSION, MINOR_VERSION) {
			bail!(PickleError::VersionMismatch { major: major_version, minor: minor_version });
		}

		let entry_count = reader.read_nat_as_usize()?;
		let mut table = Table::new();
		for _ in 0..entry_count {
			let tag = reader.read_nat()?;
			let length = reader.read_nat_as_usize()?;
			let raw = reader.read_u8_vec(length)?;
			table.add_entry(tag, &raw)?;
		}

		// up to one zero byte of padding, then nothing
		let mut end = [0u8; 1];
		if reader.read(&mut end)? != 0 {
			if end[0] != 0 {
				bail!("unexpected trailing byte {:#04x} after the entry table", end[0]);
			}
			if reader.read(&mut end)? != 0 {
				bail!("unexpected data after the entry table");
			}
		}

		Ok(ScalaSig { major_version, minor_version, table })
	}

	/// Serializes the signature back to its byte form, without padding.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::new();
		nat::write(self.major_version, &mut out);
		nat::write(self.minor_version, &mut out);
		self.table.write(&mut out);
		out
	}

	/// Rewrites every namespace reference matching `replace` to `with`, see
	/// [`Table::replace`].
	pub fn replace(&mut self, replace: &str, with: &str) -> Result<usize> {
		self.table.replace(replace, with)
	}

	pub fn table(&self) -> &Table {
		&self.table
	}
}

impl Display for ScalaSig {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "version {}.{}, {} entries", self.major_version, self.minor_version, self.table.len())?;
		self.table.fmt(f)
	}
}

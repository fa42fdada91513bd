//! The entry table of a signature.
//!
//! Entries cross-reference each other by table position, so the table is
//! strictly append-only: positions handed out once stay valid for the life of
//! the table. Only term names (tag 1) and external module class references
//! (tag 10) are decoded; every other entry is carried as opaque bytes.

use std::fmt::{Display, Formatter};
use std::io::Cursor;
use anyhow::{bail, Context, Result};
use crate::{nat, PickleError};
use crate::nat::NatRead;

/// Type tags of the entries we decode; all other tags stay opaque.
pub mod tag {
	pub const TERM_NAME: u32 = 1;
	pub const EXT_MOD_CLASS_REF: u32 = 10;
}

/// One record of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEntry {
	/// A raw name component, UTF-8.
	TermName { name: String },
	/// One level of an absolute namespace: `name_ref` points at a
	/// [`TableEntry::TermName`], `symbol_ref` at the parent
	/// [`TableEntry::ExtModClassRef`], or `None` for a root.
	ExtModClassRef { name_ref: u32, symbol_ref: Option<u32> },
	/// Any entry kind we do not interpret, preserved verbatim.
	Opaque { tag: u32, raw: Vec<u8> },
}

impl TableEntry {
	fn write(&self, out: &mut Vec<u8>) {
		match self {
			TableEntry::TermName { name } => {
				nat::write(tag::TERM_NAME, out);
				nat::write(name.len() as u32, out);
				out.extend_from_slice(name.as_bytes());
			},
			TableEntry::ExtModClassRef { name_ref, symbol_ref } => {
				nat::write(tag::EXT_MOD_CLASS_REF, out);
				let length = nat::size(*name_ref) + symbol_ref.map_or(0, nat::size);
				nat::write(length as u32, out);
				nat::write(*name_ref, out);
				if let Some(symbol_ref) = symbol_ref {
					nat::write(*symbol_ref, out);
				}
			},
			TableEntry::Opaque { tag, raw } => {
				nat::write(*tag, out);
				nat::write(raw.len() as u32, out);
				out.extend_from_slice(raw);
			},
		}
	}
}

impl Display for TableEntry {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TableEntry::TermName { name } =>
				write!(f, "type=termName name={name}"),
			TableEntry::ExtModClassRef { name_ref, symbol_ref } => {
				write!(f, "type=extModClassRef nameRef={name_ref}")?;
				match symbol_ref {
					Some(symbol_ref) => write!(f, " symbolRef={symbol_ref}"),
					None => write!(f, " symbolRef=none"),
				}
			},
			TableEntry::Opaque { tag, raw } => {
				write!(f, "type={tag} raw=")?;
				for &b in raw.iter().take(64) {
					if b > 32 && b < 127 {
						write!(f, "{}", char::from(b))?;
					} else {
						f.write_str(".")?;
					}
				}
				Ok(())
			},
		}
	}
}

/// The ordered, append-only collection of entries of a signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
	entries: Vec<TableEntry>,
}

impl Table {
	pub fn new() -> Table {
		Table { entries: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&TableEntry> {
		self.entries.get(index)
	}

	pub fn entries(&self) -> impl Iterator<Item=&TableEntry> {
		self.entries.iter()
	}

	/// Appends one entry, decoding the payload when the tag is one we
	/// understand. The position of the new entry is `self.len() - 1`.
	pub fn add_entry(&mut self, tag: u32, raw: &[u8]) -> Result<()> {
		let entry = match tag {
			tag::TERM_NAME => {
				let name = String::from_utf8(raw.to_vec())
					.map_err(|_| PickleError::MalformedEntry { tag })?;
				TableEntry::TermName { name }
			},
			tag::EXT_MOD_CLASS_REF => {
				let mut reader = Cursor::new(raw);
				let name_ref = reader.read_nat()
					.map_err(|_| PickleError::MalformedEntry { tag })?;

				// the parent reference is optional in the byte encoding
				let symbol_ref = if reader.position() < raw.len() as u64 {
					Some(reader.read_nat().map_err(|_| PickleError::MalformedEntry { tag })?)
				} else {
					None
				};

				if reader.position() < raw.len() as u64 {
					bail!(PickleError::MalformedEntry { tag });
				}
				TableEntry::ExtModClassRef { name_ref, symbol_ref }
			},
			_ => TableEntry::Opaque { tag, raw: raw.to_vec() },
		};
		self.entries.push(entry);
		Ok(())
	}

	/// The absolute namespace a class ref entry encodes, root first, joined
	/// with `.`.
	///
	/// Fails with [`PickleError::UnresolvableReference`] if `index` is not a
	/// class ref or its reference chain is broken.
	pub fn resolve(&self, index: usize) -> Result<String> {
		self.try_resolve(index)
			.ok_or_else(|| PickleError::UnresolvableReference { index }.into())
	}

	/// Like [`resolve`][Table::resolve], with a broken chain as `None`.
	pub fn try_resolve(&self, index: usize) -> Option<String> {
		let mut parts = Vec::new();
		let mut current = index;
		// bounded walk: a chain longer than the table is a reference cycle
		for _ in 0..=self.entries.len() {
			let TableEntry::ExtModClassRef { name_ref, symbol_ref } = self.entries.get(current)? else {
				return None;
			};
			let TableEntry::TermName { name } = self.entries.get(*name_ref as usize)? else {
				return None;
			};
			parts.push(name.as_str());

			match symbol_ref {
				Some(parent) => current = *parent as usize,
				None => {
					parts.reverse();
					return Some(parts.join("."));
				},
			}
		}
		None
	}

	/// Rewrites every class ref entry that currently resolves exactly to
	/// `replace` so it resolves to `with` instead, and returns how many
	/// entries were rewritten.
	///
	/// The matched entries keep their table positions; their new name and
	/// parent chain are materialized as fresh entries at the end of the
	/// table. Parent chains are never shared or reused, not even between two
	/// matches in the same call: existing entries may have dependents we do
	/// not understand, so only the exact matched entry is known to be safe to
	/// touch. Either all matches are rewritten or the table is left untouched.
	pub fn replace(&mut self, replace: &str, with: &str) -> Result<usize> {
		let components: Vec<&str> = with.split('.').collect();
		if components.iter().any(|c| c.is_empty()) {
			bail!("invalid replacement namespace {with:?}: empty path component");
		}

		let matched: Vec<usize> = (0..self.entries.len())
			.filter(|&index| {
				matches!(self.entries[index], TableEntry::ExtModClassRef { .. })
					&& self.try_resolve(index).as_deref() == Some(replace)
			})
			.collect();

		// all appends below must stay addressable as u32 table indices
		let appended = matched.len() * (2 * components.len() - 1);
		u32::try_from(self.entries.len() + appended)
			.with_context(|| format!("table too large to rename {} entries", matched.len()))?;

		for &index in &matched {
			let name_ref = self.push(TableEntry::TermName { name: components[components.len() - 1].to_owned() });
			let symbol_ref = self.append_class_ref(&components[..components.len() - 1]);

			let TableEntry::ExtModClassRef { name_ref: entry_name_ref, symbol_ref: entry_symbol_ref } = &mut self.entries[index] else {
				unreachable!("matched entries are class refs");
			};
			*entry_name_ref = name_ref;
			*entry_symbol_ref = symbol_ref;
		}

		Ok(matched.len())
	}

	fn push(&mut self, entry: TableEntry) -> u32 {
		self.entries.push(entry);
		(self.entries.len() - 1) as u32
	}

	/// Appends a fresh term-name/class-ref pair per component, root first,
	/// and returns the position of the leaf class ref (`None` for no
	/// components).
	fn append_class_ref(&mut self, components: &[&str]) -> Option<u32> {
		let mut symbol_ref = None;
		for &component in components {
			let name_ref = self.push(TableEntry::TermName { name: component.to_owned() });
			symbol_ref = Some(self.push(TableEntry::ExtModClassRef { name_ref, symbol_ref }));
		}
		symbol_ref
	}

	/// Writes the entry count and all entries.
	pub(crate) fn write(&self, out: &mut Vec<u8>) {
		nat::write(self.entries.len() as u32, out);
		for entry in &self.entries {
			entry.write(out);
		}
	}
}

impl Display for Table {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		for (index, entry) in self.entries.iter().enumerate() {
			write!(f, "{index}: {entry}")?;
			if let TableEntry::ExtModClassRef { .. } = entry {
				if let Some(namespace) = self.try_resolve(index) {
					write!(f, " -> {namespace}")?;
				}
			}
			writeln!(f)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::PickleError;
	use super::{tag, Table, TableEntry};

	/// `com` (0, 1), `com.example` (2, 3), `com.example.Foo` (4, 5), plus one
	/// opaque entry (6).
	fn sample_table() -> Result<Table> {
		let mut table = Table::new();
		table.add_entry(tag::TERM_NAME, b"com")?;
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[0])?;
		table.add_entry(tag::TERM_NAME, b"example")?;
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[2, 1])?;
		table.add_entry(tag::TERM_NAME, b"Foo")?;
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[4, 3])?;
		table.add_entry(2, &[0xab])?;
		Ok(table)
	}

	#[test]
	fn add_and_resolve() -> Result<()> {
		let table = sample_table()?;
		assert_eq!(table.len(), 7);
		assert_eq!(table.resolve(1)?, "com");
		assert_eq!(table.resolve(3)?, "com.example");
		assert_eq!(table.resolve(5)?, "com.example.Foo");
		Ok(())
	}

	#[test]
	fn resolve_rejects_non_class_refs() -> Result<()> {
		let table = sample_table()?;
		for index in [0, 6, 7] {
			let err = table.resolve(index).unwrap_err();
			assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::UnresolvableReference { index }));
		}
		Ok(())
	}

	#[test]
	fn resolve_broken_chain() -> Result<()> {
		let mut table = Table::new();
		// name_ref out of bounds
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[5])?;
		// symbol_ref points at a term name instead of a class ref
		table.add_entry(tag::TERM_NAME, b"a")?;
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[1, 1])?;
		assert_eq!(table.try_resolve(0), None);
		assert_eq!(table.try_resolve(2), None);
		Ok(())
	}

	#[test]
	fn resolve_reference_cycle() -> Result<()> {
		let mut table = Table::new();
		table.add_entry(tag::TERM_NAME, b"loop")?;
		// entry 1 is its own parent
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[0, 1])?;
		assert_eq!(table.try_resolve(1), None);
		Ok(())
	}

	#[test]
	fn malformed_entries() -> Result<()> {
		let mut table = Table::new();
		let err = table.add_entry(tag::TERM_NAME, &[0xff, 0xfe]).unwrap_err();
		assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::MalformedEntry { tag: 1 }));

		let err = table.add_entry(tag::EXT_MOD_CLASS_REF, &[]).unwrap_err();
		assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::MalformedEntry { tag: 10 }));

		// three fields is one too many
		let err = table.add_entry(tag::EXT_MOD_CLASS_REF, &[1, 2, 3]).unwrap_err();
		assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::MalformedEntry { tag: 10 }));

		assert!(table.is_empty());
		Ok(())
	}

	#[test]
	fn replace_leaf() -> Result<()> {
		let mut table = sample_table()?;
		assert_eq!(table.replace("com.example.Foo", "com.example.Bar")?, 1);

		// the matched entry resolves to the new namespace, at its old position
		assert_eq!(table.resolve(5)?, "com.example.Bar");
		// the old parent chain is untouched
		assert_eq!(table.resolve(1)?, "com");
		assert_eq!(table.resolve(3)?, "com.example");
		assert_eq!(table.get(0), Some(&TableEntry::TermName { name: "com".to_owned() }));
		assert_eq!(table.get(4), Some(&TableEntry::TermName { name: "Foo".to_owned() }));

		// one fresh leaf name plus a fresh two-level parent chain
		assert_eq!(table.len(), 7 + 5);
		assert_eq!(table.get(7), Some(&TableEntry::TermName { name: "Bar".to_owned() }));
		assert_eq!(table.get(11), Some(&TableEntry::ExtModClassRef { name_ref: 10, symbol_ref: Some(9) }));
		assert_eq!(table.get(5), Some(&TableEntry::ExtModClassRef { name_ref: 7, symbol_ref: Some(11) }));
		Ok(())
	}

	#[test]
	fn replace_to_root() -> Result<()> {
		let mut table = sample_table()?;
		assert_eq!(table.replace("com.example.Foo", "Flat")?, 1);
		assert_eq!(table.resolve(5)?, "Flat");
		assert_eq!(table.len(), 7 + 1);
		assert_eq!(table.get(5), Some(&TableEntry::ExtModClassRef { name_ref: 7, symbol_ref: None }));
		Ok(())
	}

	#[test]
	fn replace_no_match() -> Result<()> {
		let mut table = sample_table()?;
		let mut before = Vec::new();
		table.write(&mut before);

		assert_eq!(table.replace("com.example.Baz", "org.example.Baz")?, 0);
		// prefix matches are not full-path matches
		assert_eq!(table.replace("com.example", "org.example")?, 1);
		assert_eq!(table.replace("com.example", "org.example")?, 0);

		let mut table = sample_table()?;
		assert_eq!(table.replace("nothing.here", "anywhere")?, 0);
		let mut after = Vec::new();
		table.write(&mut after);
		assert_eq!(before, after);
		Ok(())
	}

	#[test]
	fn replace_does_not_share_chains() -> Result<()> {
		let mut table = sample_table()?;
		// a second entry resolving to the same namespace
		table.add_entry(tag::TERM_NAME, b"Foo")?;
		table.add_entry(tag::EXT_MOD_CLASS_REF, &[7, 3])?;

		assert_eq!(table.replace("com.example.Foo", "com.example.Bar")?, 2);
		assert_eq!(table.resolve(5)?, "com.example.Bar");
		assert_eq!(table.resolve(8)?, "com.example.Bar");

		// each match got its own chain of 5 fresh entries
		assert_eq!(table.len(), 9 + 10);
		let first = table.get(5).cloned();
		let second = table.get(8).cloned();
		let (Some(TableEntry::ExtModClassRef { symbol_ref: Some(a), .. }), Some(TableEntry::ExtModClassRef { symbol_ref: Some(b), .. })) = (first, second) else {
			panic!("expected class refs");
		};
		assert_ne!(a, b);
		Ok(())
	}

	#[test]
	fn replace_rejects_empty_components() -> Result<()> {
		let mut table = sample_table()?;
		assert!(table.replace("com.example.Foo", "").is_err());
		assert!(table.replace("com.example.Foo", "com..Bar").is_err());
		// nothing was mutated
		assert_eq!(table.len(), 7);
		assert_eq!(table.resolve(5)?, "com.example.Foo");
		Ok(())
	}

	#[test]
	fn opaque_entries_round_trip() -> Result<()> {
		let mut table = Table::new();
		table.add_entry(23, &[1, 2, 3, 0xff])?;
		let mut out = Vec::new();
		table.write(&mut out);
		assert_eq!(out, &[1, 23, 4, 1, 2, 3, 0xff]);
		Ok(())
	}
}

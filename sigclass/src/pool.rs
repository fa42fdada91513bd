use std::io::Read;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use crate::read::ClassRead;

/// The constant pool, byte-exact: every entry keeps its raw payload so a pool
/// can be written back unchanged, except for the `Utf8` entries we rewrite.
///
/// Entries are keyed by their pool index; `Long` and `Double` occupy two
/// indices, so the key of the entry after one of those skips a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pool {
	count: usize,
	entries: IndexMap<usize, PoolEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PoolEntry {
	Utf8(Vec<u8>),
	/// Everything else, payload kept verbatim.
	Other { tag: u8, data: Vec<u8> },
}

impl Pool {
	pub(crate) fn parse(reader: &mut impl Read) -> Result<Pool> {
		let count = reader.read_u16_as_usize()?;
		let mut entries = IndexMap::new();

		let mut i = 1; // indexing is from 1
		while i < count {
			let (entry, slots) = PoolEntry::parse(reader)
				.with_context(|| format!("failed to parse constant pool entry number {i}"))?;
			entries.insert(i, entry);
			i += slots;
		}
		if i != count {
			bail!("constant pool entry number {} overruns the declared count {count}", i - 1);
		}

		Ok(Pool { count, entries })
	}

	pub(crate) fn write(&self, out: &mut Vec<u8>) {
		out.extend_from_slice(&(self.count as u16).to_be_bytes());
		for entry in self.entries.values() {
			entry.write(out);
		}
	}

	pub(crate) fn get_utf8(&self, index: usize) -> Result<&[u8]> {
		let entry = self.entries.get(&index)
			.ok_or_else(|| anyhow!("constant pool index {index} out of bounds for pool count {}", self.count))?;
		let PoolEntry::Utf8(vec) = entry else {
			bail!("constant pool entry {index} isn't Utf8, we got: {entry:?}");
		};
		Ok(vec)
	}

	pub(crate) fn set_utf8(&mut self, index: usize, vec: Vec<u8>) -> Result<()> {
		if vec.len() > u16::MAX as usize {
			bail!("replacement for constant pool entry {index} is {} bytes, larger than a Utf8 constant can hold", vec.len());
		}
		let entry = self.entries.get_mut(&index)
			.ok_or_else(|| anyhow!("constant pool index {index} out of bounds for pool count {}", self.count))?;
		let PoolEntry::Utf8(old) = entry else {
			bail!("constant pool entry {index} isn't Utf8, we got: {entry:?}");
		};
		*old = vec;
		Ok(())
	}
}

impl PoolEntry {
	/// Parses one entry, returning it together with the number of pool indices
	/// it occupies.
	fn parse(reader: &mut impl Read) -> Result<(PoolEntry, usize)> {
		let tag = reader.read_u8()?;
		let (payload_size, slots) = match tag {
			1 => {
				let length = reader.read_u16_as_usize()?;
				return Ok((PoolEntry::Utf8(reader.read_u8_vec(length)?), 1));
			},
			7 | 8 | 16 | 19 | 20 => (2, 1), // Class, String, MethodType, Module, Package
			15 => (3, 1), // MethodHandle
			3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => (4, 1),
			5 | 6 => (8, 2), // Long and Double take a phantom second slot
			tag => bail!("unknown constant pool tag {tag}"),
		};
		let data = reader.read_u8_vec(payload_size)?;
		Ok((PoolEntry::Other { tag, data }, slots))
	}

	fn write(&self, out: &mut Vec<u8>) {
		match self {
			PoolEntry::Utf8(vec) => {
				out.push(1);
				out.extend_from_slice(&(vec.len() as u16).to_be_bytes());
				out.extend_from_slice(vec);
			},
			PoolEntry::Other { tag, data } => {
				out.push(*tag);
				out.extend_from_slice(data);
			},
		}
	}
}

#[cfg(test)]
mod testing {
	use std::io::Cursor;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use super::Pool;

	/// count 6: Utf8 "Hi", Integer 7, Long (two slots), Class -> 1.
	const POOL_BYTES: &[u8] = &[
		0, 6,
		1, 0, 2, b'H', b'i',
		3, 0, 0, 0, 7,
		5, 0, 0, 0, 0, 0, 0, 0, 42,
		7, 0, 1,
	];

	#[test]
	fn parse_write_identity() -> Result<()> {
		let pool = Pool::parse(&mut Cursor::new(POOL_BYTES))?;
		let mut out = Vec::new();
		pool.write(&mut out);
		assert_eq!(out, POOL_BYTES);
		Ok(())
	}

	#[test]
	fn long_takes_two_slots() -> Result<()> {
		let pool = Pool::parse(&mut Cursor::new(POOL_BYTES))?;
		assert_eq!(pool.get_utf8(1)?, b"Hi");
		// 3 is the Long, 4 its phantom slot, 5 the Class
		assert!(pool.get_utf8(3).is_err());
		assert!(pool.get_utf8(4).is_err());
		assert!(pool.get_utf8(5).is_err());
		assert!(pool.get_utf8(6).is_err());
		Ok(())
	}

	#[test]
	fn set_utf8() -> Result<()> {
		let mut pool = Pool::parse(&mut Cursor::new(POOL_BYTES))?;
		pool.set_utf8(1, b"Welcome".to_vec())?;
		assert_eq!(pool.get_utf8(1)?, b"Welcome");
		assert!(pool.set_utf8(2, b"x".to_vec()).is_err());

		let mut out = Vec::new();
		pool.write(&mut out);
		let mut expected = vec![0, 6, 1, 0, 7];
		expected.extend_from_slice(b"Welcome");
		expected.extend_from_slice(&POOL_BYTES[7..]);
		assert_eq!(out, expected);
		Ok(())
	}

	#[test]
	fn truncated() {
		assert!(Pool::parse(&mut Cursor::new(&POOL_BYTES[..4])).is_err());
		assert!(Pool::parse(&mut Cursor::new(&[0u8, 2, 99])).is_err());
	}
}

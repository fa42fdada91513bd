//! Reading and writing of "Nat" values, the integer primitive of the pickle
//! format: big-endian base-128, with the high bit of every byte except the
//! last used as a continuation marker. Every length, count and table index in
//! the format is a Nat.

use std::io::Read;
use anyhow::{bail, Result};
use crate::PickleError;

/// The number of bytes [`write`] produces for `value`, without writing anything.
pub fn size(mut value: u32) -> usize {
	let mut count = 0;
	loop {
		value >>= 7;
		count += 1;
		if value == 0 {
			return count;
		}
	}
}

/// Appends the encoding of `value` to `out`.
pub fn write(value: u32, out: &mut Vec<u8>) {
	fn inner(value: u32, out: &mut Vec<u8>, flag: u8) {
		let b = (value & 0x7f) as u8;
		let h = value >> 7;
		if h != 0 {
			inner(h, out, 0x80);
		}
		out.push(b | flag);
	}
	inner(value, out, 0)
}

/// Byte-level reading for the pickle format, on top of [`Read`].
///
/// An exhausted reader surfaces as [`PickleError::TruncatedInput`].
pub trait NatRead: Read {
	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut buf = [0u8; N];
		match self.read_exact(&mut buf) {
			Ok(()) => Ok(buf),
			Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => bail!(PickleError::TruncatedInput),
			Err(e) => Err(e.into()),
		}
	}
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n()?))
	}
	fn read_u8_vec(&mut self, length: usize) -> Result<Vec<u8>> {
		let mut vec = vec![0u8; length];
		match self.read_exact(&mut vec) {
			Ok(()) => Ok(vec),
			Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => bail!(PickleError::TruncatedInput),
			Err(e) => Err(e.into()),
		}
	}
	fn read_nat(&mut self) -> Result<u32> {
		let mut acc: u64 = 0;
		loop {
			let b = self.read_u8()?;
			acc = (acc << 7) | u64::from(b & 0x7f);
			if acc > u64::from(u32::MAX) {
				bail!("base-128 integer does not fit in 32 bits");
			}
			if b & 0x80 == 0 {
				return Ok(acc as u32);
			}
		}
	}
	fn read_nat_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_nat()? as usize)
	}
}
impl<T: Read> NatRead for T {}

#[cfg(test)]
mod testing {
	use std::io::Cursor;
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::PickleError;
	use super::{size, write, NatRead};

	fn round_trip(value: u32, expected: &[u8]) -> Result<()> {
		let mut out = Vec::new();
		write(value, &mut out);
		assert_eq!(out, expected);
		assert_eq!(size(value), expected.len());
		assert_eq!(Cursor::new(&out).read_nat()?, value);
		Ok(())
	}

	#[test]
	fn boundaries() -> Result<()> {
		round_trip(0, &[0x00])?;
		round_trip(1, &[0x01])?;
		round_trip(0x7f, &[0x7f])?;
		round_trip(0x80, &[0x81, 0x00])?;
		round_trip(0x3fff, &[0xff, 0x7f])?;
		round_trip(0x4000, &[0x81, 0x80, 0x00])?;
		round_trip(u32::MAX, &[0x8f, 0xff, 0xff, 0xff, 0x7f])
	}

	#[test]
	fn sequence() -> Result<()> {
		let mut out = Vec::new();
		for value in [5, 0, 300] {
			write(value, &mut out);
		}
		let mut reader = Cursor::new(&out);
		assert_eq!(reader.read_nat()?, 5);
		assert_eq!(reader.read_nat()?, 0);
		assert_eq!(reader.read_nat()?, 300);
		Ok(())
	}

	#[test]
	fn non_minimal_leading_zero() -> Result<()> {
		// a continuation byte with an all-zero payload is legal, just wasteful
		assert_eq!(Cursor::new(&[0x80, 0x01]).read_nat()?, 1);
		Ok(())
	}

	#[test]
	fn truncated() {
		// the last byte still has the continuation bit set
		let err = Cursor::new(&[0xff, 0xff]).read_nat().unwrap_err();
		assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::TruncatedInput));

		let err = Cursor::new(&[]).read_nat().unwrap_err();
		assert_eq!(err.downcast_ref::<PickleError>(), Some(&PickleError::TruncatedInput));
	}

	#[test]
	fn too_large_for_u32() {
		assert!(Cursor::new(&[0x90, 0x80, 0x80, 0x80, 0x00]).read_nat().is_err());
	}
}

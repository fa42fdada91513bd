use std::io::Read;
use anyhow::{bail, Result};

/// Big-endian primitive reads for the class file format, on top of [`Read`].
pub(crate) trait ClassRead: Read {
	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut buf = [0u8; N];
		let length = self.read(&mut buf)?;
		if length == N {
			Ok(buf)
		} else {
			bail!("unexpected data end")
		}
	}
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n()?))
	}
	fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n()?))
	}
	fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n()?))
	}
	fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	fn read_u32_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u32()? as usize)
	}
	fn read_u8_vec(&mut self, length: usize) -> Result<Vec<u8>> {
		let mut vec = vec![0u8; length];
		let read = self.read(&mut vec)?;
		if read == length {
			Ok(vec)
		} else {
			bail!("unexpected data end")
		}
	}
	fn skip(&mut self, length: usize) -> Result<()> {
		let mut remaining = length;
		let mut buf = [0u8; 64];
		while remaining > 0 {
			let chunk = remaining.min(buf.len());
			let read = self.read(&mut buf[..chunk])?;
			if read == 0 {
				bail!("unexpected data end");
			}
			remaining -= read;
		}
		Ok(())
	}
}
impl<T: Read> ClassRead for T {}

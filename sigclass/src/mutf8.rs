//! Conversion between constant pool `Utf8` bytes and rust strings.
//!
//! Class files store strings in the "modified UTF-8" of the Java Virtual
//! Machine Specification, which encodes `\0` as two bytes and supplementary
//! characters as surrogate pairs. See
//! <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7>.

use anyhow::{Context, Result};
use java_string::{JavaStr, JavaString};

pub(crate) fn decode(vec: Vec<u8>) -> Result<String> {
	let string = JavaString::from_modified_utf8(vec)
		.context("invalid java utf8 contents")?;
	Ok(string.as_java_str().as_str()
		.context("string contains unpaired surrogates")?
		.to_owned())
}

pub(crate) fn encode(string: &str) -> Vec<u8> {
	JavaStr::from_str(string).to_modified_utf8().into_owned()
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use super::{decode, encode};

	#[test]
	fn ascii() -> Result<()> {
		assert_eq!(decode(b"bytes".to_vec())?, "bytes");
		assert_eq!(encode("bytes"), b"bytes");
		Ok(())
	}

	#[test]
	fn two_byte_zero() -> Result<()> {
		assert_eq!(encode("\u{0}a\u{0}"), &[0xc0, 0x80, b'a', 0xc0, 0x80]);
		assert_eq!(decode(vec![0xc0, 0x80, b'a', 0xc0, 0x80])?, "\u{0}a\u{0}");
		Ok(())
	}

	#[test]
	fn round_trip_bmp() -> Result<()> {
		let s = "\u{0}\u{7f}\u{80}\u{7ff}\u{800}\u{ffff}";
		assert_eq!(decode(encode(s))?, s);
		Ok(())
	}

	#[test]
	fn invalid() {
		assert!(decode(vec![0xff]).is_err());
		// truncated two-byte sequence
		assert!(decode(vec![0xc0]).is_err());
	}
}

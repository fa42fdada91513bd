//! The 7-bit string transform used by the `@ScalaSignature` annotation to
//! carry arbitrary bytes inside a string value.
//!
//! Briefly:
//! 1. the input bytes are repacked, preserving bit order, into 7-bit groups
//!    (7 input bytes become 8 packed bytes, a final run of `r` input bytes
//!    becomes `r + 1` packed bytes),
//! 2. every packed byte `p` is shifted to `(p + 1) & 0x7f` and written as one
//!    unit in `0..=127`.
//!
//! The scalac implementation lives in `scala.reflect.internal.pickling.Encoding`.
//! A shifted value of 0 is a plain NUL unit; the class file constant pool can
//! carry it because modified UTF-8 spells NUL as the two-byte pair `0xC0 0x80`
//! (see the conversion layer above this codec). Decoding also tolerates that
//! pair appearing as *units*, treating it as the one NUL unit it denotes.

/// Tests whether `encoded` only consists of units a signature encoding may
/// contain: single units below 128, and the two-unit escape `0xC0 0x80`.
pub fn is_valid_encoding(encoded: &str) -> bool {
	let mut chars = encoded.chars();
	while let Some(c) = chars.next() {
		if (c as u32) < 128 {
			continue;
		}
		if c == '\u{c0}' && chars.next() == Some('\u{80}') {
			continue;
		}
		return false;
	}
	true
}

/// Encodes bytes into a string using the scheme.
pub fn encode(raw: &[u8]) -> String {
	let mut packed = vec![0u8; packed_len(raw.len())];
	for (at, &value) in raw.iter().enumerate() {
		pack_byte(&mut packed, at, value);
	}

	let mut out = String::with_capacity(packed.len());
	for p in packed {
		out.push(char::from((p + 1) & 0x7f));
	}
	out
}

/// Decodes a string back to the bytes it encodes.
///
/// Returns `None` for any string that is not a valid encoding; arbitrary
/// strings get probed with this, so that is a normal outcome, not a fault.
pub fn decode(encoded: &str) -> Option<Vec<u8>> {
	// Undo the +1 shift (and the escaped NUL form) while validating.
	let mut packed = Vec::with_capacity(encoded.len());
	let mut chars = encoded.chars();
	while let Some(c) = chars.next() {
		let unit = c as u32;
		if unit < 128 {
			packed.push((unit as u8).wrapping_sub(1) & 0x7f);
		} else if unit == 0xc0 && chars.next() == Some('\u{80}') {
			// the escaped form of a NUL unit, same shifted value
			packed.push(0x7f);
		} else {
			return None;
		}
	}

	// Regroup the packed 7-bit values into bytes.
	let length = unpacked_len(packed.len())?;
	let mut out = Vec::with_capacity(length);
	for at in 0..length {
		out.push(unpack_byte(&packed, at));
	}
	Some(out)
}

/// How many packed bytes the repacking step produces for `input_length` input
/// bytes. This covers only the 8-to-7 bit repacking, not the escape for 0.
fn packed_len(input_length: usize) -> usize {
	let rem = input_length % 7;
	input_length / 7 * 8 + if rem > 0 { rem + 1 } else { 0 }
}

/// How many bytes `packed_length` packed bytes decode back into.
///
/// Returns `None` for `packed_length % 8 == 1`: no input length packs to such
/// a count, so a string with that many units cannot be a valid encoding.
fn unpacked_len(packed_length: usize) -> Option<usize> {
	let rem = packed_length % 8;
	if rem == 1 {
		return None;
	}
	Some(packed_length / 8 * 7 + if rem > 0 { rem - 1 } else { 0 })
}

/// Spreads input byte number `at` over the two packed bytes holding its bits.
///
/// The bit stream is little-endian per byte: the low `7 - at % 7` bits of the
/// value land in the high end of the first packed byte, the rest in the low
/// end of the next one. `buffer` must be zero-initialized with room for
/// `packed_len` bytes.
fn pack_byte(buffer: &mut [u8], at: usize, value: u8) {
	let low_bits = 7 - (at % 7) as u32;
	let start = at / 7 * 8 + at % 7;
	buffer[start] |= (value << (7 - low_bits)) & 0x7f;
	buffer[start + 1] |= value >> low_bits;
}

/// Extracts byte number `at` from the packed buffer, inverse of [`pack_byte`].
fn unpack_byte(buffer: &[u8], at: usize) -> u8 {
	let low_bits = 7 - (at % 7) as u32;
	let start = at / 7 * 8 + at % 7;
	let low = buffer[start] >> (7 - low_bits);
	let high = buffer[start + 1] << low_bits;
	high | low
}

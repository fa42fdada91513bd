//! Reading and rewriting of the `@ScalaSignature` annotation of a class file.
//!
//! scalac stores the pickled signature of a class as a string element named
//! `bytes` on a `RuntimeVisibleAnnotations` entry of type
//! `Lscala/reflect/ScalaSignature;`. The string is the 7-bit encoding of
//! [`pickle`] and, like any string constant, sits in the constant pool as a
//! `Utf8` entry.
//!
//! [`SigClass`] parses just enough of a class file to find that `Utf8` entry:
//! the constant pool is decoded entry by entry, everything after it is kept as
//! opaque bytes and only walked, not interpreted, to locate the annotation.
//! Rewriting a namespace then only ever touches the one pool entry, so
//! everything else of the class file is reproduced byte for byte.

use std::io::{Cursor, Read};
use anyhow::{bail, Context, Result};
use pickle::PickleError;
use pickle::encoding;
use pickle::sig::ScalaSig;
use crate::pool::Pool;
use crate::read::ClassRead;

mod mutf8;
mod pool;
mod read;

const MAGIC: u32 = 0xcafe_babe;
const ANNOTATIONS_ATTRIBUTE: &[u8] = b"RuntimeVisibleAnnotations";
const SIGNATURE_ANNOTATION: &[u8] = b"Lscala/reflect/ScalaSignature;";
const LONG_SIGNATURE_ANNOTATION: &[u8] = b"Lscala/reflect/ScalaLongSignature;";
const BYTES_ELEMENT: &[u8] = b"bytes";

/// A class file, opened just far enough to rewrite its signature annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigClass {
	minor_version: u16,
	major_version: u16,
	pool: Pool,
	/// Everything after the constant pool, verbatim.
	tail: Vec<u8>,
	sig: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
	/// The pool index of the `Utf8` entry holding the encoded signature.
	utf8_index: usize,
	sig: ScalaSig,
}

impl SigClass {
	pub fn parse(bytes: &[u8]) -> Result<SigClass> {
		let mut reader = Cursor::new(bytes);

		let magic = reader.read_u32()?;
		if magic != MAGIC {
			bail!("not a class file: magic is {magic:#010x}");
		}
		let minor_version = reader.read_u16()?;
		let major_version = reader.read_u16()?;

		let pool = Pool::parse(&mut reader)
			.context("failed to parse the constant pool")?;

		let mut tail = Vec::new();
		reader.read_to_end(&mut tail)?;

		let sig = find_signature_index(&tail, &pool)
			.context("failed to locate the signature annotation")?
			.map(|utf8_index| -> Result<Signature> {
				let string = mutf8::decode(pool.get_utf8(utf8_index)?.to_vec())?;
				let raw = encoding::decode(&string)
					.ok_or(PickleError::InvalidEncodedString)?;
				let sig = ScalaSig::parse(&raw)
					.context("failed to parse the signature annotation value")?;
				Ok(Signature { utf8_index, sig })
			})
			.transpose()?;

		Ok(SigClass { minor_version, major_version, pool, tail, sig })
	}

	/// Rewrites every namespace reference matching `replace` in the signature
	/// to `with` and returns how many references were rewritten; `0` also for
	/// classes without a signature annotation.
	pub fn replace(&mut self, replace: &str, with: &str) -> Result<usize> {
		let Some(signature) = &mut self.sig else {
			return Ok(0);
		};
		let count = signature.sig.replace(replace, with)?;
		if count > 0 {
			let encoded = encoding::encode(&signature.sig.to_bytes());
			self.pool.set_utf8(signature.utf8_index, mutf8::encode(&encoded))?;
		}
		Ok(count)
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend_from_slice(&MAGIC.to_be_bytes());
		out.extend_from_slice(&self.minor_version.to_be_bytes());
		out.extend_from_slice(&self.major_version.to_be_bytes());
		self.pool.write(&mut out);
		out.extend_from_slice(&self.tail);
		out
	}

	pub fn signature(&self) -> Option<&ScalaSig> {
		self.sig.as_ref().map(|signature| &signature.sig)
	}
}

/// Walks the class structure after the constant pool and returns the pool
/// index of the `Utf8` constant holding the encoded signature, if the class
/// has a signature annotation.
fn find_signature_index(tail: &[u8], pool: &Pool) -> Result<Option<usize>> {
	let mut reader = Cursor::new(tail);

	// access_flags, this_class, super_class
	reader.skip(6)?;
	let interfaces_count = reader.read_u16_as_usize()?;
	reader.skip(2 * interfaces_count)?;

	// fields and methods have the same shape, and cannot carry the annotation
	for _ in 0..2 {
		let members = reader.read_u16_as_usize()?;
		for _ in 0..members {
			reader.skip(6)?; // access_flags, name_index, descriptor_index
			let attributes = reader.read_u16_as_usize()?;
			for _ in 0..attributes {
				reader.skip(2)?;
				let length = reader.read_u32_as_usize()?;
				reader.skip(length)?;
			}
		}
	}

	let attributes = reader.read_u16_as_usize()?;
	let mut found = None;
	for _ in 0..attributes {
		let name_index = reader.read_u16_as_usize()?;
		let length = reader.read_u32_as_usize()?;
		if pool.get_utf8(name_index)? == ANNOTATIONS_ATTRIBUTE {
			let attribute = reader.read_u8_vec(length)?;
			if let Some(index) = scan_annotations(&attribute, pool)? {
				if found.replace(index).is_some() {
					bail!("class carries more than one signature annotation");
				}
			}
		} else {
			reader.skip(length)?;
		}
	}
	Ok(found)
}

fn scan_annotations(attribute: &[u8], pool: &Pool) -> Result<Option<usize>> {
	let mut reader = Cursor::new(attribute);
	let num_annotations = reader.read_u16_as_usize()?;
	let mut found = None;
	for _ in 0..num_annotations {
		if let Some(index) = scan_annotation(&mut reader, pool)? {
			if found.replace(index).is_some() {
				bail!("class carries more than one signature annotation");
			}
		}
	}
	Ok(found)
}

fn scan_annotation(reader: &mut Cursor<&[u8]>, pool: &Pool) -> Result<Option<usize>> {
	let type_index = reader.read_u16_as_usize()?;
	let pairs = reader.read_u16_as_usize()?;
	let type_name = pool.get_utf8(type_index)?;

	if type_name == SIGNATURE_ANNOTATION {
		if pairs != 1 {
			bail!("signature annotation has {pairs} elements instead of one");
		}
		let name_index = reader.read_u16_as_usize()?;
		if pool.get_utf8(name_index)? != BYTES_ELEMENT {
			bail!("signature annotation element isn't named `bytes`");
		}
		let tag = reader.read_u8()?;
		if tag != b's' {
			bail!("signature annotation element isn't a string, tag is {:?}", char::from(tag));
		}
		return Ok(Some(reader.read_u16_as_usize()?));
	}
	if type_name == LONG_SIGNATURE_ANNOTATION {
		// signatures over 65535 bytes get split over a string array element
		bail!("classes with a ScalaLongSignature annotation are not supported");
	}

	for _ in 0..pairs {
		reader.skip(2)?; // element_name_index
		skip_element_value(reader)?;
	}
	Ok(None)
}

fn skip_element_value(reader: &mut Cursor<&[u8]>) -> Result<()> {
	let tag = reader.read_u8()?;
	match tag {
		b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2)?,
		b'e' => reader.skip(4)?, // type_name_index, const_name_index
		b'@' => {
			reader.skip(2)?; // type_index
			let pairs = reader.read_u16_as_usize()?;
			for _ in 0..pairs {
				reader.skip(2)?;
				skip_element_value(reader)?;
			}
		},
		b'[' => {
			let values = reader.read_u16_as_usize()?;
			for _ in 0..values {
				skip_element_value(reader)?;
			}
		},
		tag => bail!("unknown element value tag {:?}", char::from(tag)),
	}
	Ok(())
}

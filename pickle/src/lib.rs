//! Partial decoding, modification and re-encoding of the pickle format that
//! scalac embeds in the `@ScalaSignature` class annotation.
//!
//! The format is a table of typed entries; this crate deliberately decodes
//! only the two entry kinds needed to rewrite absolute namespaces (term names
//! and external module class references) and keeps every other entry as raw
//! bytes, to avoid depending on parts of the format we do not need to
//! understand. See <http://lampwww.epfl.ch/~dubochet/new_pickle.pdf> and
//! `scala.reflect.internal.pickling` for the format itself.
//!
//! The entry point is [`sig::ScalaSig`]: parse the decoded annotation bytes,
//! call [`sig::ScalaSig::replace`] to rename a namespace, and serialize back
//! with [`sig::ScalaSig::to_bytes`]. The annotation stores those bytes as a
//! string in the 7-bit encoding implemented by [`encoding`].

use std::fmt::{Display, Formatter};

pub mod nat;
pub mod encoding;
pub mod table;
pub mod sig;

/// The failure kinds of signature parsing and rewriting.
///
/// These ride inside [`anyhow::Error`]; use
/// [`downcast_ref`][anyhow::Error::downcast_ref] when the kind matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickleError {
	/// The signature declares a format version other than the one supported pair.
	VersionMismatch { major: u32, minor: u32 },
	/// The input ended in the middle of a field.
	TruncatedInput,
	/// An entry payload does not have the shape its type tag requires.
	MalformedEntry { tag: u32 },
	/// A string failed [`encoding::is_valid_encoding`].
	InvalidEncodedString,
	/// A `name_ref`/`symbol_ref` chain cannot be followed to a valid root.
	UnresolvableReference { index: usize },
}

impl Display for PickleError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			PickleError::VersionMismatch { major, minor } =>
				write!(f, "unexpected signature version: {major}.{minor}"),
			PickleError::TruncatedInput =>
				write!(f, "unexpected end of signature data"),
			PickleError::MalformedEntry { tag } =>
				write!(f, "malformed payload for table entry of type {tag}"),
			PickleError::InvalidEncodedString =>
				write!(f, "string is not a valid 7-bit signature encoding"),
			PickleError::UnresolvableReference { index } =>
				write!(f, "table entry {index} does not resolve to a namespace"),
		}
	}
}

impl std::error::Error for PickleError {}

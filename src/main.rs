//! A command line tool for fixing `@ScalaSignature` annotations after shading.
//!
//! Relocating (or "shading") compiled Scala classes into a new namespace with
//! the usual jar tools rewrites the constant pool references, but not the
//! pickled signature the Scala compiler reads back for separate compilation,
//! which still names the original namespace. This tool rewrites those
//! signatures too.

use std::fs;
use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info};
use sigclass::SigClass;

mod jar;

const CLASS_MAGIC: [u8; 4] = 0xcafe_babe_u32.to_be_bytes();

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// The jar or class file to read.
	input: PathBuf,

	/// Where to write the result. The whole input is reproduced, with only the
	/// signature annotation strings of matching classes rewritten.
	output: PathBuf,

	/// The fully qualified name to rewrite, e.g. `com.example.Foo`.
	from: String,

	/// The fully qualified name to rewrite it to, e.g. `shaded.com.example.Foo`.
	to: String,

	/// Be verbose.
	#[arg(short = 'v', long = "verbose")]
	verbose: bool,

	/// Dump the decoded signature table of every class that has one.
	#[arg(long = "debug")]
	debug: bool,
}

fn setup_logger(verbose: bool) -> Result<()> {
	let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{}] {}", record.level(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()?;
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logger(cli.verbose || cli.debug)?;

	let input = fs::read(&cli.input)
		.with_context(|| anyhow!("failed to read input file {:?}", cli.input))?;

	let output = if input.starts_with(&CLASS_MAGIC) {
		shade_class(&input, &cli.from, &cli.to, cli.debug)
			.with_context(|| anyhow!("failed to process class file {:?}", cli.input))?
			.unwrap_or(input)
	} else {
		jar::shade(&input, &cli.from, &cli.to, cli.debug)
			.with_context(|| anyhow!("failed to process jar {:?}", cli.input))?
	};

	fs::write(&cli.output, output)
		.with_context(|| anyhow!("failed to write output file {:?}", cli.output))
}

/// Rewrites one class, returning `None` when nothing matched and the original
/// bytes can be used as they are.
fn shade_class(data: &[u8], replace: &str, with: &str, dump: bool) -> Result<Option<Vec<u8>>> {
	let mut class = SigClass::parse(data)?;
	if dump {
		if let Some(sig) = class.signature() {
			debug!("signature: {sig}");
		}
	}
	let count = class.replace(replace, with)?;
	if count == 0 {
		return Ok(None);
	}
	info!("rewrote {count} reference(s) to {replace}");
	Ok(Some(class.to_bytes()))
}

//! Fetch the OCR models into `./ocr` (or the directory given as first argument).
//!
//! The source can be overridden with `RAILBOT_MODEL_URL`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

const DEFAULT_BASE: &str = "https://github.com/zibo-chen/rust-paddle-ocr/raw/main/models";

/// (remote name, local name)
const FILES: &[(&str, &str)] = &[
	("PP-OCRv5_mobile_det.mnn", "detection.mnn"),
	("latin_PP-OCRv5_mobile_rec_infer.mnn", "latin_recognition.mnn"),
	("ppocr_keys_latin.txt", "latin_charset.txt"),
];

fn main() -> anyhow::Result<()> {
	let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("ocr"));
	let base = std::env::var("RAILBOT_MODEL_URL").unwrap_or_else(|_| DEFAULT_BASE.to_string());
	std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

	for (remote, local) in FILES {
		let target = dir.join(local);
		if target.is_file() {
			println!("{} already present", target.display());
			continue;
		}
		let url = format!("{}/{remote}", base.trim_end_matches('/'));
		println!("fetching {url}");
		download(&url, &target)?;
	}

	println!("models ready in {}", dir.display());
	Ok(())
}

fn download(url: &str, target: &Path) -> anyhow::Result<()> {
	let resp = ureq::get(url).call().with_context(|| format!("GET {url}"))?;
	let mut bytes = Vec::new();
	resp.into_reader()
		.read_to_end(&mut bytes)
		.with_context(|| format!("reading {url}"))?;
	if bytes.is_empty() {
		bail!("{url} returned an empty body");
	}

	// Write beside the target first so an interrupted run leaves no partial model.
	let partial = target.with_extension("part");
	let mut file = std::fs::File::create(&partial).with_context(|| format!("creating {}", partial.display()))?;
	file.write_all(&bytes)?;
	file.sync_all()?;
	std::fs::rename(&partial, target).with_context(|| format!("moving into {}", target.display()))?;
	Ok(())
}

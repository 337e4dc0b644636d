use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

#[derive(Debug, Clone)]
pub struct OcrAssets {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Assets {
	pub ocr: OcrAssets,
	/// Folder holding the `buttons/`, `status/` and `materials/` templates.
	pub templates: PathBuf,
}

/// Folders searched for assets, most specific first.
///
/// `configured` comes from the config file; `RAILBOT_ASSETS_DIR` overrides
/// everything else.
pub fn candidates(configured: Option<&Path>) -> Vec<PathBuf> {
	let mut candidates = Vec::new();
	if let Some(dir) = std::env::var_os("RAILBOT_ASSETS_DIR") {
		candidates.push(PathBuf::from(dir));
	}
	if let Some(dir) = configured {
		candidates.push(dir.to_path_buf());
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	// The workspace root, for runs from a different CWD during development.
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".."));
	candidates
}

pub fn resolve_assets(configured: Option<&Path>, lang_code: &str) -> Result<Assets> {
	let candidates = candidates(configured);
	Ok(Assets {
		ocr: find_ocr(&candidates, lang_code)?,
		templates: find_templates(&candidates)?,
	})
}

/// Accept either the asset root (containing `<sub>/`) or `<sub>/` itself.
fn normalize(dir: &Path, sub: &str, landmark: &str) -> PathBuf {
	if dir.join(landmark).exists() {
		dir.to_path_buf()
	} else {
		dir.join(sub)
	}
}

pub fn find_ocr(candidates: &[PathBuf], lang_code: &str) -> Result<OcrAssets> {
	let recognition_name = format!("{lang_code}_recognition.mnn");
	let charset_name = format!("{lang_code}_charset.txt");

	let mut tried = Vec::new();
	for base in candidates {
		let ocr_dir = normalize(base, "ocr", "detection.mnn");
		let detection = ocr_dir.join("detection.mnn");
		let recognition = ocr_dir.join(&recognition_name);
		let charset = ocr_dir.join(&charset_name);

		if detection.is_file() && recognition.is_file() && charset.is_file() {
			tracing::debug!(dir = %ocr_dir.display(), "ocr models found");
			return Ok(OcrAssets { detection, recognition, charset });
		}
		tried.push(ocr_dir);
	}

	bail!(
		"OCR model files not found. Expected these files:\n  - ocr/detection.mnn\n  - ocr/{recognition_name}\n  - ocr/{charset_name}\n\nSearched in:\n{}\n\nFix: run `model_downloader <dir>/ocr`, or set RAILBOT_ASSETS_DIR to the folder that contains `ocr/`.",
		list(&tried)
	)
}

pub fn find_templates(candidates: &[PathBuf]) -> Result<PathBuf> {
	let mut tried = Vec::new();
	for base in candidates {
		let dir = normalize(base, "templates", "buttons");
		if dir.join("buttons").is_dir() {
			tracing::debug!(dir = %dir.display(), "templates found");
			return Ok(dir);
		}
		tried.push(dir);
	}

	bail!(
		"Template folder not found. Expected `templates/buttons/` (plus `status/` and `materials/`).\n\nSearched in:\n{}",
		list(&tried)
	)
}

fn list(paths: &[PathBuf]) -> String {
	paths
		.iter()
		.map(|p| format!("  - {}", p.display()))
		.collect::<Vec<_>>()
		.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	fn touch(path: PathBuf) {
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, b"").unwrap();
	}

	#[test]
	fn finds_ocr_models_under_the_root_or_directly() {
		let empty = tempdir().unwrap();
		let root = tempdir().unwrap();
		for f in ["detection.mnn", "latin_recognition.mnn", "latin_charset.txt"] {
			touch(root.path().join("ocr").join(f));
		}

		let candidates = vec![empty.path().to_path_buf(), root.path().to_path_buf()];
		let ocr = find_ocr(&candidates, "latin").unwrap();
		assert_eq!(ocr.detection, root.path().join("ocr").join("detection.mnn"));

		let direct = vec![root.path().join("ocr")];
		assert!(find_ocr(&direct, "latin").is_ok());
		assert!(find_ocr(&candidates, "chinese").is_err());
	}

	#[test]
	fn templates_need_a_buttons_folder() {
		let root = tempdir().unwrap();
		let candidates = vec![root.path().to_path_buf()];
		assert!(find_templates(&candidates).is_err());

		fs::create_dir_all(root.path().join("templates").join("buttons")).unwrap();
		assert_eq!(find_templates(&candidates).unwrap(), root.path().join("templates"));
	}
}

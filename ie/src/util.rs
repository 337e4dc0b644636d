use crate::Image;

pub static RATIO_REGEX: std::sync::LazyLock<regex::Regex> =
	std::sync::LazyLock::new(|| regex::Regex::new(r"(?<current>\d+)\s*/\s*(?<required>\d+)").expect("regex"));

/// Write `image` to `./debug_<label>.png` when `RAILBOT_WRITE_IMAGE=1`.
pub fn debug_snapshot(image: Image, label: &str) {
	if std::env::var("RAILBOT_WRITE_IMAGE").as_deref() != Ok("1") {
		return;
	}
	let name = label
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
		.take(40)
		.collect::<String>();
	if let Err(err) = image.save_png(format!("./debug_{name}.png")) {
		tracing::debug!(error = %err, "debug snapshot failed");
	}
}

//! Fuzzy matching of recognized text against known status phrases.

/// Uppercase and collapse whitespace.
pub fn normalize(text: &str) -> String {
	text.split_whitespace()
		.map(|w| w.to_uppercase())
		.collect::<Vec<_>>()
		.join(" ")
}

/// `1 - levenshtein / longer length`, in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f32 {
	let len = a.chars().count().max(b.chars().count());
	if len == 0 {
		return 1.0;
	}
	1.0 - levenshtein::levenshtein(a, b) as f32 / len as f32
}

/// How well `phrase` occurs somewhere in `text`.
///
/// A literal occurrence scores 1.0. Otherwise the best similarity between
/// the phrase and any run of as many words, or the whole text.
pub fn phrase_ratio(text: &str, phrase: &str) -> f32 {
	let text = normalize(text);
	let phrase = normalize(phrase);
	if phrase.is_empty() || text.is_empty() {
		return 0.0;
	}
	if text.contains(&phrase) {
		return 1.0;
	}

	let words = text.split(' ').collect::<Vec<_>>();
	let n = phrase.split(' ').count();
	let windows = words
		.windows(n.min(words.len()))
		.map(|w| similarity(&w.join(" "), &phrase));

	windows.fold(similarity(&text, &phrase), f32::max)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseMatch {
	/// Index into the candidate list.
	pub index: usize,
	pub ratio: f32,
}

/// Best candidate at or above `threshold`; ties go to the earlier candidate.
pub fn match_phrase(text: &str, candidates: &[&str], threshold: f32) -> Option<PhraseMatch> {
	let mut best: Option<PhraseMatch> = None;
	for (index, candidate) in candidates.iter().enumerate() {
		let ratio = phrase_ratio(text, candidate);
		if ratio >= threshold && best.is_none_or(|b| ratio > b.ratio) {
			best = Some(PhraseMatch { index, ratio });
		}
	}
	best
}

/// Outcome of checking text against two mutually exclusive phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseVerdict {
	Positive,
	Negative,
	/// Neither or both matched. Treat as the outcome that spends nothing.
	Unclear,
}

pub fn classify(text: &str, positive: &str, negative: &str, threshold: f32) -> PhraseVerdict {
	let pos = phrase_ratio(text, positive) >= threshold;
	let neg = phrase_ratio(text, negative) >= threshold;
	match (pos, neg) {
		(true, false) => PhraseVerdict::Positive,
		(false, true) => PhraseVerdict::Negative,
		_ => PhraseVerdict::Unclear,
	}
}

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

const STOPWORDS: &[&str] = &[
	"a", "about", "after", "against", "all", "an", "and", "any", "are", "as", "at", "be", "before",
	"being", "between", "by", "can", "clinical", "during", "each", "for", "from", "has", "have",
	"in", "into", "is", "it", "its", "may", "new", "not", "of", "on", "or", "other", "over",
	"participant", "participants", "patient", "patients", "per", "study", "such", "than", "that",
	"the", "their", "these", "this", "those", "through", "to", "treatment", "treatments", "trial",
	"trials", "under", "via", "was", "were", "which", "who", "will", "with", "within", "without",
];

/// Folds `text` to lower-case ASCII alphanumerics separated by single spaces.
pub fn fold(text: &str) -> String {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.nfkd() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else if ch.is_alphanumeric() {
			// Non-ASCII letters survive decomposition only when they have no ASCII base.
			normalized.extend(ch.to_lowercase());
		} else if !is_combining_mark(ch) {
			normalized.push(' ');
		}
	}

	normalized
}

pub fn is_stopword(token: &str) -> bool {
	STOPWORDS.binary_search(&token).is_ok()
}

/// Tokens in order of appearance, stopwords removed, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
	fold(text)
		.split_whitespace()
		.filter(|token| !is_stopword(token))
		.map(str::to_string)
		.collect()
}

pub fn token_set(text: &str) -> BTreeSet<String> {
	tokenize(text).into_iter().collect()
}

pub fn token_set_of<'a, I>(parts: I) -> BTreeSet<String>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut out = BTreeSet::new();

	for part in parts {
		out.extend(tokenize(part));
	}

	out
}

/// Tokens of `needles` that also appear in `haystack`, in sorted order.
pub fn overlap<'a>(needles: &'a BTreeSet<String>, haystack: &BTreeSet<String>) -> Vec<&'a str> {
	needles.iter().filter(|token| haystack.contains(*token)).map(String::as_str).collect()
}

fn is_combining_mark(ch: char) -> bool {
	matches!(ch as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

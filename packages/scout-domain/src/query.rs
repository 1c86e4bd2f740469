//! Registry condition queries built from the profile's condition and notes.

use regex::Regex;

use scout_config::SynonymRule;

use crate::{Error, Result};

const CONCEPT_SEPARATORS: [char; 4] = [',', ';', '/', '+'];

#[derive(Debug)]
struct CompiledRule {
	matcher: Regex,
	group: String,
}

/// Synonym rules compiled to word-bounded, case-insensitive matchers.
#[derive(Debug)]
pub struct SynonymTable {
	rules: Vec<CompiledRule>,
}
impl SynonymTable {
	pub fn new(rules: &[SynonymRule]) -> Result<Self> {
		let mut compiled = Vec::with_capacity(rules.len());

		for rule in rules {
			let pattern = rule.pattern.trim();

			if pattern.is_empty() || rule.synonyms.is_empty() {
				continue;
			}

			let matcher = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(pattern))).map_err(
				|source| Error::InvalidSynonym { pattern: pattern.to_string(), source },
			)?;
			let terms: Vec<String> = rule.synonyms.iter().map(|synonym| quote(synonym)).collect();
			let group =
				if terms.len() == 1 { terms[0].clone() } else { format!("({})", terms.join(" OR ")) };

			compiled.push(CompiledRule { matcher, group });
		}

		Ok(Self { rules: compiled })
	}

	fn group_for(&self, phrase: &str) -> Option<&str> {
		self.rules.iter().find(|rule| rule.matcher.is_match(phrase)).map(|rule| rule.group.as_str())
	}
}

/// Ordered concept groups of one query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionQuery {
	groups: Vec<String>,
}
impl ConditionQuery {
	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	pub fn groups(&self) -> &[String] {
		&self.groups
	}

	/// All concepts required.
	pub fn strict(&self) -> Option<String> {
		self.joined(" AND ")
	}

	/// Any concept suffices.
	pub fn loose(&self) -> Option<String> {
		self.joined(" OR ")
	}

	fn push(&mut self, group: String) {
		if !self.groups.contains(&group) {
			self.groups.push(group);
		}
	}

	fn joined(&self, separator: &str) -> Option<String> {
		if self.groups.is_empty() { None } else { Some(self.groups.join(separator)) }
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryPlan {
	/// Condition concepts only.
	pub primary: ConditionQuery,
	/// Condition concepts plus synonym concepts spotted in the notes.
	pub effective: ConditionQuery,
}
impl QueryPlan {
	pub fn has_distinct_primary(&self) -> bool {
		self.primary != self.effective && !self.primary.is_empty()
	}
}

pub fn build_plan(
	table: &SynonymTable,
	condition: Option<&str>,
	notes: Option<&str>,
) -> QueryPlan {
	let condition = condition.map(str::trim).unwrap_or_default();
	let mut primary = ConditionQuery::default();

	for phrase in split_concepts(condition) {
		match table.group_for(&phrase) {
			Some(group) => primary.push(group.to_string()),
			None => primary.push(quote(&phrase)),
		}
	}

	let mut effective = primary.clone();

	if let Some(notes) = notes.map(str::trim).filter(|notes| !notes.is_empty()) {
		for rule in &table.rules {
			if rule.matcher.is_match(notes) && !rule.matcher.is_match(condition) {
				effective.push(rule.group.clone());
			}
		}
	}

	QueryPlan { primary, effective }
}

/// Splits on punctuation separators and on the standalone word "and".
pub fn split_concepts(text: &str) -> Vec<String> {
	let mut phrases = Vec::new();

	for piece in text.split(CONCEPT_SEPARATORS) {
		let mut words = Vec::new();

		for word in piece.split_whitespace() {
			if word.eq_ignore_ascii_case("and") {
				flush_phrase(&mut words, &mut phrases);
			} else {
				words.push(word);
			}
		}

		flush_phrase(&mut words, &mut phrases);
	}

	phrases
}

fn flush_phrase(words: &mut Vec<&str>, phrases: &mut Vec<String>) {
	if !words.is_empty() {
		phrases.push(words.join(" "));
		words.clear();
	}
}

fn quote(term: &str) -> String {
	let term = term.trim().replace('"', "");

	if term.contains(|ch: char| ch.is_whitespace() || ch == '-') {
		format!("\"{term}\"")
	} else {
		term
	}
}

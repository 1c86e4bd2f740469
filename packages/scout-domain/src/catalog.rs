use crate::{Result, trial::CatalogTrial};

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.json");

/// Curated trials shipped with the binary.
#[derive(Clone, Debug)]
pub struct Catalog {
	trials: Vec<CatalogTrial>,
}
impl Catalog {
	pub fn embedded() -> Result<Self> {
		Self::from_json(EMBEDDED_CATALOG)
	}

	pub fn from_json(raw: &str) -> Result<Self> {
		let trials = serde_json::from_str(raw)?;

		Ok(Self { trials })
	}

	pub fn trials(&self) -> &[CatalogTrial] {
		&self.trials
	}

	pub fn get(&self, id: &str) -> Option<&CatalogTrial> {
		self.trials.iter().find(|trial| trial.id == id)
	}
}

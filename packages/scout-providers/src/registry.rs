//! Client for a ClinicalTrials.gov v2 style registry.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use scout_config::RegistryProviderConfig;
use scout_domain::trial::{Coordinates, RegistryTrial, TrialDetail, TrialLocation, TrialStatus};

use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoFilter {
	pub lat: f64,
	pub lng: f64,
	pub radius_miles: f64,
}

/// One registry search. Empty fields are left out of the request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistryQuery {
	pub condition: Option<String>,
	pub statuses: Vec<TrialStatus>,
	pub geo: Option<GeoFilter>,
	pub location_text: Option<String>,
}
impl RegistryQuery {
	pub fn params(&self, page_size: u32) -> Vec<(&'static str, String)> {
		let mut params = vec![("format", "json".to_string()), ("pageSize", page_size.to_string())];

		if let Some(condition) = self.condition.as_deref().filter(|value| !value.trim().is_empty()) {
			params.push(("query.cond", condition.to_string()));
		}
		if !self.statuses.is_empty() {
			let statuses: Vec<&str> =
				self.statuses.iter().map(|status| status.as_api_value()).collect();

			params.push(("filter.overallStatus", statuses.join(",")));
		}
		if let Some(geo) = self.geo {
			params.push((
				"filter.geo",
				format!("distance({:.4},{:.4},{}mi)", geo.lat, geo.lng, geo.radius_miles.round()),
			));
		}
		if let Some(location) =
			self.location_text.as_deref().filter(|value| !value.trim().is_empty())
		{
			params.push(("query.locn", location.to_string()));
		}

		params
	}
}

pub async fn search(cfg: &RegistryProviderConfig, query: &RegistryQuery) -> Result<Vec<RegistryTrial>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let headers = crate::default_headers(&cfg.default_headers)?;
	let params = query.params(cfg.page_size);

	crate::bounded("registry", cfg.timeout_ms, async move {
		let res = client.get(url).headers(headers).query(&params).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_search_response(json)
	})
	.await
}

/// Fetches the full record. Unknown identifiers yield `Ok(None)`.
pub async fn get_by_identifier(
	cfg: &RegistryProviderConfig,
	nct_id: &str,
) -> Result<Option<TrialDetail>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}/{}", crate::endpoint(&cfg.api_base, &cfg.path), nct_id.trim());
	let headers = crate::default_headers(&cfg.default_headers)?;

	crate::bounded("registry", cfg.timeout_ms, async move {
		let res = client.get(url).headers(headers).query(&[("format", "json")]).send().await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let json: Value = res.error_for_status()?.json().await?;
		let study: Study = serde_json::from_value(json)?;

		Ok::<_, crate::Error>(study.into_detail())
	})
	.await
}

fn parse_search_response(json: Value) -> Result<Vec<RegistryTrial>> {
	let page: SearchPage = serde_json::from_value(json)?;

	Ok(page.studies.into_iter().filter_map(Study::into_trial).collect())
}

#[derive(Deserialize)]
struct SearchPage {
	#[serde(default)]
	studies: Vec<Study>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Study {
	#[serde(default)]
	protocol_section: ProtocolSection,
}
impl Study {
	fn into_trial(self) -> Option<RegistryTrial> {
		let section = self.protocol_section;
		let identification = section.identification_module;
		let nct_id = identification.nct_id.filter(|id| !id.trim().is_empty())?;
		let title = identification
			.brief_title
			.or(identification.official_title)
			.unwrap_or_else(|| nct_id.clone());

		Some(RegistryTrial {
			nct_id,
			title,
			status: section
				.status_module
				.overall_status
				.as_deref()
				.map(TrialStatus::parse)
				.unwrap_or(TrialStatus::Unknown),
			phases: section.design_module.phases,
			conditions: section.conditions_module.conditions,
			sponsor: section.sponsor_collaborators_module.lead_sponsor.and_then(|lead| lead.name),
			locations: section
				.contacts_locations_module
				.locations
				.into_iter()
				.map(StudyLocation::into_location)
				.collect(),
		})
	}

	fn into_detail(self) -> Option<TrialDetail> {
		let section = self.protocol_section;
		let identification = section.identification_module;
		let nct_id = identification.nct_id.filter(|id| !id.trim().is_empty())?;
		let eligibility = section.eligibility_module;

		Some(TrialDetail {
			title: identification
				.brief_title
				.or(identification.official_title)
				.unwrap_or_else(|| nct_id.clone()),
			nct_id,
			summary: section.description_module.brief_summary,
			eligibility_criteria: eligibility.eligibility_criteria,
			minimum_age: eligibility.minimum_age,
			maximum_age: eligibility.maximum_age,
			sex: eligibility.sex,
			conditions: section.conditions_module.conditions,
			interventions: section
				.arms_interventions_module
				.interventions
				.into_iter()
				.filter_map(|intervention| intervention.name)
				.collect(),
		})
	}
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProtocolSection {
	identification_module: IdentificationModule,
	status_module: StatusModule,
	design_module: DesignModule,
	conditions_module: ConditionsModule,
	sponsor_collaborators_module: SponsorModule,
	contacts_locations_module: LocationsModule,
	description_module: DescriptionModule,
	eligibility_module: EligibilityModule,
	arms_interventions_module: InterventionsModule,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IdentificationModule {
	nct_id: Option<String>,
	brief_title: Option<String>,
	official_title: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatusModule {
	overall_status: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct DesignModule {
	phases: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ConditionsModule {
	conditions: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SponsorModule {
	lead_sponsor: Option<NamedValue>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct NamedValue {
	name: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LocationsModule {
	locations: Vec<StudyLocation>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StudyLocation {
	facility: Option<String>,
	city: Option<String>,
	state: Option<String>,
	country: Option<String>,
	geo_point: Option<Value>,
}
impl StudyLocation {
	fn into_location(self) -> TrialLocation {
		let coordinates = self.geo_point.as_ref().and_then(|point| {
			Some(Coordinates {
				lat: crate::coordinate(point.get("lat"))?,
				lng: crate::coordinate(point.get("lon"))?,
			})
		});

		TrialLocation {
			facility: self.facility,
			city: self.city,
			state: self.state,
			country: self.country,
			coordinates,
		}
	}
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DescriptionModule {
	brief_summary: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EligibilityModule {
	eligibility_criteria: Option<String>,
	minimum_age: Option<String>,
	maximum_age: Option<String>,
	sex: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct InterventionsModule {
	interventions: Vec<NamedValue>,
}

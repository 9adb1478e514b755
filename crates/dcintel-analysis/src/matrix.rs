//! Feature matrix builder: normalized records to one feature vector per country.
//!
//! Domains merge in canonical order. Within one domain, several records for
//! the same entity merge field by field and the first available value wins,
//! ordered by catalog tool order and then input order.

use dcintel_core::{Domain, FeatureVector, Metric, NormalizedRecord, ToolId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of a build: kept vectors plus entities dropped for having no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub vectors: BTreeMap<String, FeatureVector>,
    pub excluded: Vec<String>,
}

/// Build feature vectors, dropping entities with zero available features.
pub fn build(records: &[NormalizedRecord]) -> BTreeMap<String, FeatureVector> {
    build_matrix(records).vectors
}

pub fn build_matrix(records: &[NormalizedRecord]) -> FeatureMatrix {
    let mut by_entity: BTreeMap<&str, Vec<(usize, &NormalizedRecord)>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        by_entity
            .entry(record.entity_key.as_str())
            .or_default()
            .push((index, record));
    }

    let mut matrix = FeatureMatrix::default();
    for (entity, mut group) in by_entity {
        group.sort_by_key(|(index, record)| (tool_rank(record.source_tool), *index));
        let ordered: Vec<&NormalizedRecord> = group.into_iter().map(|(_, r)| r).collect();
        let vector = merge(entity, &ordered);

        if vector.available_count() == 0 {
            tracing::warn!(
                entity,
                records = ordered.len(),
                "entity excluded: no available features"
            );
            matrix.excluded.push(entity.to_string());
        } else {
            matrix.vectors.insert(entity.to_string(), vector);
        }
    }
    matrix
}

fn tool_rank(tool: ToolId) -> usize {
    ToolId::ALL
        .iter()
        .position(|t| *t == tool)
        .unwrap_or(usize::MAX)
}

fn merge(entity: &str, records: &[&NormalizedRecord]) -> FeatureVector {
    let mut vector = FeatureVector::new(entity);
    let mut owner: BTreeMap<&'static str, Domain> = BTreeMap::new();

    for domain in Domain::ALL {
        let of_domain: Vec<&NormalizedRecord> = records
            .iter()
            .copied()
            .filter(|r| r.domain == domain)
            .collect();

        let mut contributed = false;
        for spec in domain.fields() {
            if let Some(first) = owner.get(spec.name) {
                tracing::warn!(
                    entity,
                    field = spec.name,
                    kept = %first,
                    dropped = %domain,
                    "feature name collision"
                );
                continue;
            }
            owner.insert(spec.name, domain);

            let value = of_domain
                .iter()
                .map(|r| r.get(spec.name))
                .find(Metric::is_available)
                .unwrap_or(Metric::Unavailable);
            contributed |= value.is_available();
            vector.set(spec.name, value);
        }

        for record in &of_domain {
            vector.warnings.extend(
                record
                    .warnings
                    .iter()
                    .map(|w| format!("{domain}/{}: {w}", record.source_tool)),
            );
            if let Some(error) = &record.error {
                vector
                    .warnings
                    .push(format!("{domain}/{}: {error}", record.source_tool));
            }
        }
        if !contributed {
            vector.unavailable_domains.insert(domain);
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcintel_core::field::*;

    fn record(domain: Domain, key: &str, tool: ToolId, values: &[(&str, f64)]) -> NormalizedRecord {
        let mut r = NormalizedRecord::empty(domain, key, tool);
        for (name, v) in values {
            r.fields.insert(name.to_string(), Metric::Value(*v));
        }
        r
    }

    #[test]
    fn earlier_tool_wins_within_a_domain() {
        let detail = record(
            Domain::Facility,
            "DE",
            ToolId::GetFacility,
            &[(FACILITY_COUNT, 1.0), (TOTAL_CAPACITY_MW, 24.0)],
        );
        let search = record(
            Domain::Facility,
            "DE",
            ToolId::SearchFacilities,
            &[(FACILITY_COUNT, 40.0)],
        );
        let site = record(
            Domain::Facility,
            "DE",
            ToolId::GetSiteScore,
            &[(SITE_SCORE, 66.0)],
        );
        let vectors = build(&[detail, search, site]);
        let de = &vectors["DE"];
        assert_eq!(de.get(FACILITY_COUNT), Some(40.0));
        assert_eq!(de.get(TOTAL_CAPACITY_MW), Some(24.0));
        assert_eq!(de.get(SITE_SCORE), Some(66.0));
        assert_eq!(de.get(CONNECTIVITY_SCORE), None);
    }

    #[test]
    fn missing_domains_are_listed() {
        let mut failed = NormalizedRecord::empty(Domain::Carbon, "SG", ToolId::GetCarbonIntensity);
        failed.error = Some("HTTP 503 (after 3 attempts)".into());
        let energy = record(
            Domain::Energy,
            "SG",
            ToolId::GetEnergyPrices,
            &[(POWER_PRICE_USD_MWH, 120.0)],
        );
        let vectors = build(&[failed, energy]);
        let sg = &vectors["SG"];
        assert!(sg.unavailable_domains.contains(&Domain::Carbon));
        assert!(sg.unavailable_domains.contains(&Domain::WaterStress));
        assert!(!sg.unavailable_domains.contains(&Domain::Energy));
        assert_eq!(sg.unavailable_domains.len(), 9);
        assert!(sg.warnings.iter().any(|w| w.starts_with("carbon/get_carbon_intensity")));
        // Every schema field is present, available or not.
        let total: usize = Domain::ALL.iter().map(|d| d.fields().len()).sum();
        assert_eq!(sg.features.len(), total);
    }

    #[test]
    fn entities_without_features_are_excluded() {
        let empty = NormalizedRecord::empty(Domain::News, "XX", ToolId::GetNews);
        let us = record(
            Domain::WaterStress,
            "US",
            ToolId::GetWaterStress,
            &[(WATER_STRESS_PCT, 35.0)],
        );
        let matrix = build_matrix(&[empty, us]);
        assert_eq!(matrix.excluded, vec!["XX".to_string()]);
        assert_eq!(matrix.vectors.keys().collect::<Vec<_>>(), vec!["US"]);
    }

    #[test]
    fn input_order_breaks_ties_for_the_same_tool() {
        let a = record(Domain::News, "SG", ToolId::GetNews, &[(NEWS_SENTIMENT_INDEX, 40.0)]);
        let b = record(Domain::News, "SG", ToolId::GetNews, &[(NEWS_SENTIMENT_INDEX, 70.0)]);
        assert_eq!(build(&[a.clone(), b.clone()])["SG"].get(NEWS_SENTIMENT_INDEX), Some(40.0));
        assert_eq!(build(&[b, a])["SG"].get(NEWS_SENTIMENT_INDEX), Some(70.0));
    }
}

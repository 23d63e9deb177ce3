use serde::{Deserialize, Serialize};

use crate::models::{Entity, EntityStatus};

/// Operator-side narrowing of the fleet list.
///
/// Blank fields are ignored, so `FleetFilter::default()` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetFilter {
    /// Case-insensitive substring of the display label.
    pub label: Option<String>,
    pub category: Option<String>,
    pub status: Option<EntityStatus>,
}

impl FleetFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(needle) = self.label_needle() {
            if !entity.display_label.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if entity.category != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if entity.status != status {
                return false;
            }
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.label_needle().is_some()
            || self.category.as_deref().is_some_and(|c| !c.is_empty())
            || self.status.is_some()
    }

    pub fn apply<'a, I>(&self, entities: I) -> Vec<&'a Entity>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        entities.into_iter().filter(|e| self.matches(e)).collect()
    }

    fn label_needle(&self) -> Option<String> {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Distinct categories, sorted.
pub fn category_options<'a, I>(entities: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut categories: Vec<String> = entities
        .into_iter()
        .map(|e| e.category.clone())
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Vec<Entity> {
        vec![
            Entity {
                id: "001".to_string(),
                display_label: "京A12345".to_string(),
                category: "truck".to_string(),
                status: EntityStatus::Active,
            },
            Entity {
                id: "002".to_string(),
                display_label: "京B67890".to_string(),
                category: "bus".to_string(),
                status: EntityStatus::Idle,
            },
            Entity {
                id: "003".to_string(),
                display_label: "京C11111".to_string(),
                category: "truck".to_string(),
                status: EntityStatus::Offline,
            },
        ]
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let f = FleetFilter::default();
        assert!(!f.is_active());
        assert_eq!(f.apply(&fleet()).len(), 3);
    }

    #[test]
    fn test_blank_fields_are_ignored() {
        let f = FleetFilter {
            label: Some("   ".to_string()),
            category: Some(String::new()),
            status: None,
        };
        assert!(!f.is_active());
        assert_eq!(f.apply(&fleet()).len(), 3);
    }

    #[test]
    fn test_label_is_case_insensitive_and_trimmed() {
        let f = FleetFilter {
            label: Some(" b678 ".to_string()),
            ..Default::default()
        };
        let fleet = fleet();
        let hits = f.apply(&fleet);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "002");
    }

    #[test]
    fn test_category_and_status_combine() {
        let f = FleetFilter {
            label: None,
            category: Some("truck".to_string()),
            status: Some(EntityStatus::Offline),
        };
        let fleet = fleet();
        let hits = f.apply(&fleet);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "003");
    }

    #[test]
    fn test_category_options_sorted_unique() {
        assert_eq!(category_options(&fleet()), vec!["bus", "truck"]);
    }
}

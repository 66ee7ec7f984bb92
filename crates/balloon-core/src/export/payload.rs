use serde::{Deserialize, Serialize};

use crate::store::{Balloon, BalloonId};

/// One row of the report mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub id: BalloonId,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Report rows in display order
pub fn build_mapping(balloons: &[Balloon], separator: &str) -> Vec<MappingEntry> {
    balloons
        .iter()
        .map(|b| MappingEntry {
            id: b.id,
            kind: b.kind.clone(),
            text: b.export_text(separator),
        })
        .collect()
}

/// Placeholder token a template uses for a balloon, e.g. `{{B3}}`
pub fn placeholder_key(id: BalloonId) -> String {
    format!("{{{{B{}}}}}", id)
}

/// `{{Bn}}` → text pairs for placeholder-style templates, in display order
pub fn placeholder_mapping(mapping: &[MappingEntry]) -> Vec<(String, String)> {
    mapping
        .iter()
        .map(|entry| (placeholder_key(entry.id), entry.text.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::DocPoint;
    use crate::store::BalloonStore;
    use pretty_assertions::assert_eq;

    fn sample_store() -> BalloonStore {
        let mut store = BalloonStore::default();
        let generation = store.place("Diameter", DocPoint::new(0.1, 0.1)).generation();
        store.merge_resolution(1, generation, vec!["Ø".into(), "14.76".into()]);
        store.place("Length", DocPoint::new(0.2, 0.2));
        store.place("Angle", DocPoint::new(0.3, 0.3));
        store.set_label(3, Some("45°".into()));
        store
    }

    #[test]
    fn test_mapping_uses_label_then_candidates_then_fallback() {
        let store = sample_store();
        let mapping = build_mapping(store.balloons(), " ");
        assert_eq!(
            mapping,
            vec![
                MappingEntry {
                    id: 1,
                    kind: "Diameter".into(),
                    text: "Ø 14.76".into()
                },
                MappingEntry {
                    id: 2,
                    kind: "Length".into(),
                    text: "Balloon 2".into()
                },
                MappingEntry {
                    id: 3,
                    kind: "Angle".into(),
                    text: "45°".into()
                },
            ]
        );
    }

    #[test]
    fn test_mapping_keeps_ids_after_removal() {
        let mut store = sample_store();
        store.remove(2);
        let ids: Vec<_> = build_mapping(store.balloons(), " ")
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_entry_serializes_type_key() {
        let entry = MappingEntry {
            id: 7,
            kind: "Radius".into(),
            text: "R5".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"id":7,"type":"Radius","text":"R5"}"#);
    }

    #[test]
    fn test_placeholder_keys() {
        assert_eq!(placeholder_key(12), "{{B12}}");
        let store = sample_store();
        let pairs = placeholder_mapping(&build_mapping(store.balloons(), ", "));
        assert_eq!(pairs[0], ("{{B1}}".to_string(), "Ø, 14.76".to_string()));
        assert_eq!(pairs.len(), 3);
    }
}

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Label -> probability map that keeps class-label order.
///
/// Serialized as a JSON object whose keys appear in label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelScores(Vec<(String, f32)>);

impl LabelScores {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Pair labels with a row of values. Extra entries on either side are dropped.
    pub fn from_row(labels: &[String], values: &[f32]) -> Self {
        Self(
            labels
                .iter()
                .cloned()
                .zip(values.iter().copied())
                .collect(),
        )
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(l, v)| (l.as_str(), *v))
    }

    /// Highest-scoring label (first one wins on ties)
    pub fn top(&self) -> Option<(&str, f32)> {
        self.iter().fold(None, |best, (label, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((label, value)),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for LabelScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

struct LabelScoresVisitor;

impl<'de> Visitor<'de> for LabelScoresVisitor {
    type Value = LabelScores;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of class label to probability")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((label, value)) = access.next_entry::<String, f32>()? {
            entries.push((label, value));
        }
        Ok(LabelScores(entries))
    }
}

impl<'de> Deserialize<'de> for LabelScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LabelScoresVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_json_keeps_label_order() {
        let scores = LabelScores::from_row(&labels(&["techno", "ambient", "house"]), &[0.5, 0.25, 0.75]);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"techno":0.5,"ambient":0.25,"house":0.75}"#);

        let parsed: LabelScores = serde_json::from_str(&json).unwrap();
        let order: Vec<&str> = parsed.iter().map(|(l, _)| l).collect();
        assert_eq!(order, vec!["techno", "ambient", "house"]);
    }

    #[test]
    fn test_top_label() {
        let scores = LabelScores::from_row(&labels(&["a", "b", "c"]), &[0.1, 0.7, 0.7]);
        assert_eq!(scores.top(), Some(("b", 0.7)));
        assert_eq!(LabelScores::new().top(), None);
    }
}

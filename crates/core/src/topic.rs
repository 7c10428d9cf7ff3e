use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic used when neither the utterance nor the trainee profile names one.
pub const DEFAULT_TOPIC: &str = "玻尿酸";

/// A treatment the trainer recognises by keyword.
///
/// Topics are carried around as plain labels so that unknown ones (a weak
/// area such as "价格谈判", or free text from the trainee) still flow through
/// the system; `TopicKind` is only the closed set the catalog can key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TopicKind {
    #[serde(rename = "玻尿酸")]
    HyaluronicAcid,
    #[serde(rename = "超声炮")]
    UltrasoundLift,
    #[serde(rename = "热玛吉")]
    Thermage,
    #[serde(rename = "水光针")]
    SkinBooster,
    #[serde(rename = "种植牙")]
    DentalImplant,
    #[serde(rename = "矫正")]
    Orthodontics,
    #[serde(rename = "双眼皮")]
    DoubleEyelid,
    #[serde(rename = "隆鼻")]
    Rhinoplasty,
}

impl TopicKind {
    /// Keyword match order used when extracting a topic from an utterance.
    pub const ALL: [TopicKind; 8] = [
        TopicKind::HyaluronicAcid,
        TopicKind::UltrasoundLift,
        TopicKind::Thermage,
        TopicKind::SkinBooster,
        TopicKind::DentalImplant,
        TopicKind::Orthodontics,
        TopicKind::DoubleEyelid,
        TopicKind::Rhinoplasty,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TopicKind::HyaluronicAcid => "玻尿酸",
            TopicKind::UltrasoundLift => "超声炮",
            TopicKind::Thermage => "热玛吉",
            TopicKind::SkinBooster => "水光针",
            TopicKind::DentalImplant => "种植牙",
            TopicKind::Orthodontics => "矫正",
            TopicKind::DoubleEyelid => "双眼皮",
            TopicKind::Rhinoplasty => "隆鼻",
        }
    }

    /// Exact label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the first known topic mentioned anywhere in the utterance.
pub fn extract_topic(utterance: &str) -> Option<TopicKind> {
    TopicKind::ALL
        .into_iter()
        .find(|kind| utterance.contains(kind.label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_topic_from_sentence() {
        assert_eq!(extract_topic("我想练习超声炮"), Some(TopicKind::UltrasoundLift));
        assert_eq!(extract_topic("练习种植牙的价格谈判"), Some(TopicKind::DentalImplant));
        assert_eq!(extract_topic("开始训练"), None);
    }

    #[test]
    fn test_extract_topic_uses_match_order() {
        // Both mentioned: 玻尿酸 comes first in the lookup order.
        assert_eq!(
            extract_topic("隆鼻还是玻尿酸好"),
            Some(TopicKind::HyaluronicAcid)
        );
    }

    #[test]
    fn test_label_round_trip_for_every_kind() {
        for kind in TopicKind::ALL {
            assert_eq!(TopicKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(TopicKind::from_label("价格谈判"), None);
    }

    #[test]
    fn test_serde_uses_chinese_labels() {
        let json = serde_json::to_string(&TopicKind::Thermage).unwrap();
        assert_eq!(json, "\"热玛吉\"");
        let parsed: TopicKind = serde_json::from_str("\"矫正\"").unwrap();
        assert_eq!(parsed, TopicKind::Orthodontics);
        assert!(serde_json::from_str::<TopicKind>("\"美白\"").is_err());
    }
}

//! Scenario Generation
//!
//! Builds the simulated patient for a training session: identity, archetype,
//! concern, an opening line and the four-stage flow outline used in reports.
//! Generation draws from an injected random source so tests can seed it, and
//! never fails: topics without a catalog profile use the fallback profile.

use crate::catalog::{Archetype, Catalog, NameConvention};
use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "女")]
    Female,
    #[serde(rename = "男")]
    Male,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => f.write_str("女"),
            Gender::Male => f.write_str("男"),
        }
    }
}

/// The simulated patient. Immutable once generated for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub archetype: Archetype,
    pub traits: Vec<String>,
    /// Archetype questions followed by topic questions.
    pub questions: Vec<String>,
    /// Archetype objections followed by topic objections.
    pub objections: Vec<String>,
    pub concern: String,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "需求挖掘")]
    NeedDiscovery,
    #[serde(rename = "产品介绍")]
    SolutionPresentation,
    #[serde(rename = "异议处理")]
    ObjectionHandling,
    #[serde(rename = "促成转化")]
    Close,
}

/// One step of the expected dialogue outline. Reporting scaffolding only;
/// the dialogue itself does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStage {
    pub turn: u32,
    pub stage: Stage,
    pub patient_goal: String,
    pub trainee_goal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub persona: Persona,
    pub opening: String,
    pub expected_flow: Vec<FlowStage>,
    pub context: String,
}

/// Picks the archetype for a trainee: the first weak-area label with a known
/// mapping decides, otherwise uniformly at random.
pub fn select_archetype<R: Rng + ?Sized>(weak_areas: &[String], rng: &mut R) -> Archetype {
    weak_areas
        .iter()
        .find_map(|label| Archetype::for_weak_area(label))
        .unwrap_or_else(|| {
            Archetype::ALL
                .choose(rng)
                .copied()
                .unwrap_or(Archetype::Hesitant)
        })
}

/// Fills `{name}`, `{age}`, `{topic}` and `{concern}` in a catalog template.
pub fn fill_template(template: &str, persona: &Persona) -> String {
    template
        .replace("{name}", &persona.name)
        .replace("{age}", &persona.age.to_string())
        .replace("{topic}", &persona.topic)
        .replace("{concern}", &persona.concern)
}

pub(crate) fn pick<'a, R: Rng + ?Sized>(items: &'a [String], rng: &mut R) -> &'a str {
    items.choose(rng).map(String::as_str).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    catalog: Arc<Catalog>,
}

impl ScenarioGenerator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Generates a fresh scenario for `topic`, steering the archetype towards
    /// the trainee's weak areas.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        topic: &str,
        weak_areas: &[String],
        rng: &mut R,
    ) -> Scenario {
        let archetype = select_archetype(weak_areas, rng);
        let personality = self.catalog.archetype(archetype);
        let profile = self.catalog.topic(topic);
        let names = self.catalog.names();

        let (gender, pool) = match profile.names {
            NameConvention::Female => (Gender::Female, &names.female),
            NameConvention::Male => (Gender::Male, &names.male),
            NameConvention::Either => {
                if rng.random_bool(0.5) {
                    (Gender::Female, &names.female)
                } else {
                    (Gender::Male, &names.male)
                }
            }
        };
        let name = pick(pool, rng).to_string();
        let age = rng.random_range(profile.age.min..=profile.age.max);
        let concern = pick(&profile.concerns, rng).to_string();

        let persona = Persona {
            name,
            age,
            gender,
            archetype,
            traits: personality.traits.clone(),
            questions: [personality.questions.as_slice(), profile.questions.as_slice()].concat(),
            objections: [personality.objections.as_slice(), profile.objections.as_slice()]
                .concat(),
            concern,
            topic: topic.to_string(),
        };

        let opening = fill_template(pick(&personality.openings, rng), &persona);
        let context = format!(
            "患者{}，{}岁，主要诉求是改善{}。性格属于{}，{}。",
            persona.name,
            persona.age,
            persona.concern,
            archetype,
            pick(&persona.traits, rng)
        );

        Scenario {
            expected_flow: expected_flow(archetype),
            persona,
            opening,
            context,
        }
    }
}

fn expected_flow(archetype: Archetype) -> Vec<FlowStage> {
    let step = |turn, stage, patient_goal: String, trainee_goal: &str| FlowStage {
        turn,
        stage,
        patient_goal,
        trainee_goal: trainee_goal.to_string(),
    };
    vec![
        step(1, Stage::NeedDiscovery, "表达诉求和顾虑".into(), "了解需求，建立信任"),
        step(2, Stage::SolutionPresentation, "了解方案详情".into(), "专业介绍，消除顾虑"),
        step(
            3,
            Stage::ObjectionHandling,
            format!("提出{archetype}典型顾虑"),
            "有效回应异议",
        ),
        step(4, Stage::Close, "决定是否预约".into(), "引导下一步行动"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn generator() -> ScenarioGenerator {
        ScenarioGenerator::new(Arc::new(Catalog::builtin().unwrap()))
    }

    #[test]
    fn test_weak_area_selects_archetype_deterministically() {
        let generator = generator();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let scenario = generator.generate(
                "玻尿酸",
                &["产品知识".to_string(), "价格谈判".to_string(), "异议处理".to_string()],
                &mut rng,
            );
            assert_eq!(scenario.persona.archetype, Archetype::PriceSensitive);
        }
    }

    #[test]
    fn test_same_seed_reproduces_scenario() {
        let generator = generator();
        let a = generator.generate("超声炮", &[], &mut StdRng::seed_from_u64(7));
        let b = generator.generate("超声炮", &[], &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_persona_fields_come_from_topic_profile() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let generator = ScenarioGenerator::new(catalog.clone());
        let profile = catalog.topic("热玛吉");
        for seed in 0..30 {
            let scenario = generator.generate("热玛吉", &[], &mut StdRng::seed_from_u64(seed));
            let persona = &scenario.persona;
            assert!((profile.age.min..=profile.age.max).contains(&persona.age));
            assert!(profile.concerns.contains(&persona.concern));
            assert_eq!(persona.gender, Gender::Female);
            assert!(catalog.names().female.contains(&persona.name));
            assert!(persona.questions.ends_with(&profile.questions));
            assert!(persona.objections.ends_with(&profile.objections));
        }
    }

    #[test]
    fn test_either_convention_yields_both_genders() {
        let generator = generator();
        let genders: Vec<Gender> = (0..60)
            .map(|seed| {
                generator
                    .generate("种植牙", &[], &mut StdRng::seed_from_u64(seed))
                    .persona
                    .gender
            })
            .collect();
        assert!(genders.contains(&Gender::Female));
        assert!(genders.contains(&Gender::Male));
    }

    #[test]
    fn test_unknown_topic_never_fails() {
        let generator = generator();
        for seed in 0..20 {
            let scenario =
                generator.generate("完全陌生的项目", &[], &mut StdRng::seed_from_u64(seed));
            let persona = &scenario.persona;
            assert!(!scenario.opening.is_empty());
            assert!(!scenario.opening.contains('{'));
            assert!(!persona.name.is_empty());
            assert!((25..=50).contains(&persona.age));
            assert_eq!(persona.concern, "有改善需求");
            assert_eq!(persona.topic, "完全陌生的项目");
            assert!(!persona.traits.is_empty());
        }
    }

    #[test]
    fn test_expected_flow_has_four_ordered_stages() {
        let scenario = generator().generate(
            "矫正",
            &["促成技巧".to_string()],
            &mut StdRng::seed_from_u64(1),
        );
        let stages: Vec<Stage> = scenario.expected_flow.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::NeedDiscovery,
                Stage::SolutionPresentation,
                Stage::ObjectionHandling,
                Stage::Close
            ]
        );
        assert_eq!(scenario.expected_flow[2].patient_goal, "提出理性型典型顾虑");
        assert!(scenario.context.contains("理性型"));
    }

    #[test]
    fn test_fill_template() {
        let persona = Persona {
            name: "王女士".into(),
            age: 30,
            gender: Gender::Female,
            archetype: Archetype::Hesitant,
            traits: vec![],
            questions: vec![],
            objections: vec![],
            concern: "法令纹明显".into(),
            topic: "玻尿酸".into(),
        };
        assert_eq!(
            fill_template("我是{name}，{age}岁，想用{topic}改善{concern}", &persona),
            "我是王女士，30岁，想用玻尿酸改善法令纹明显"
        );
    }
}

//! Patient Responder
//!
//! Produces the simulated patient's next line. The policy is a transition
//! table from (archetype, turn stage, keyword class of the trainee's last
//! message) to a set of response templates; one template is drawn from the
//! set and filled with persona fields. The reply is then checked for
//! end-signal substrings, which is the only way the patient closes a dialogue.

use crate::catalog::Archetype;
use crate::scenario::{fill_template, pick};
use crate::session::Session;
use rand::{Rng, seq::IndexedRandom};

/// Substrings in a patient line that close the dialogue naturally.
pub const END_SIGNALS: [&str; 5] = ["确定要做", "预约", "考虑一下", "再对比", "决定了"];

const CLOSING_LINES: &[&str] = &[
    "好的，那帮我预约吧。",
    "行，那我先考虑一下，回头联系你。",
    "可以，我想先看看案例再决定。",
    "这个价格还是有点贵，我再对比对比。",
];

/// Topic of the trainee's last message, as far as the patient reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordClass {
    Price,
    Effectiveness,
    Safety,
    Other,
}

impl KeywordClass {
    /// Price wins over effectiveness, which wins over safety.
    pub fn of(text: &str) -> Self {
        if text.contains("价格") || text.contains('钱') {
            KeywordClass::Price
        } else if text.contains("效果") {
            KeywordClass::Effectiveness
        } else if text.contains("安全") || text.contains("放心") {
            KeywordClass::Safety
        } else {
            KeywordClass::Other
        }
    }
}

/// Dialogue phase derived from the turn index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    /// Turn 1: restate the concern.
    Concern,
    /// Turn 2: react to what the trainee talked about.
    Probe,
    /// Turn 3: raise an objection or signal readiness.
    Objection,
    /// Turn 4 and later.
    Closing,
}

impl TurnStage {
    pub fn from_turn(turn: u32) -> Self {
        match turn {
            0 | 1 => TurnStage::Concern,
            2 => TurnStage::Probe,
            3 => TurnStage::Objection,
            _ => TurnStage::Closing,
        }
    }
}

/// What the patient may say in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTemplates {
    /// One of these lines, with persona placeholders filled.
    Lines(&'static [&'static str]),
    /// One of the persona's stock questions.
    PersonaQuestion,
    /// One of the persona's objections followed by `suffix`.
    PersonaObjection { suffix: &'static str },
}

/// The response transition table.
pub fn transition(archetype: Archetype, stage: TurnStage, class: KeywordClass) -> ResponseTemplates {
    use Archetype::*;
    use ResponseTemplates::*;

    match (stage, archetype, class) {
        (TurnStage::Concern, PriceSensitive, _) => Lines(&["我主要是想改善{concern}，大概多少钱啊？"]),
        (TurnStage::Concern, Hesitant, _) => Lines(&["{concern}困扰我很久了，但怕疼，也怕效果不好..."]),
        (TurnStage::Concern, _, _) => Lines(&["{concern}比较明显，想了解一下{topic}的效果。"]),

        (TurnStage::Probe, _, KeywordClass::Price) => Lines(&["这个价格有点超预算，有没有优惠或者分期？"]),
        (TurnStage::Probe, _, KeywordClass::Effectiveness) => Lines(&["能维持多久？需要经常补打吗？"]),
        (TurnStage::Probe, _, KeywordClass::Safety) => Lines(&["那具体怎么操作？疼不疼？"]),
        (TurnStage::Probe, _, KeywordClass::Other) => PersonaQuestion,

        (TurnStage::Objection, Hesitant, _) => PersonaObjection { suffix: "，我想再考虑考虑。" },
        (TurnStage::Objection, PriceSensitive, _) => PersonaObjection { suffix: "，能不能再便宜点？" },
        (TurnStage::Objection, _, _) => Lines(&["听起来不错，那什么时候可以安排？"]),

        (TurnStage::Closing, _, _) => Lines(CLOSING_LINES),
    }
}

/// Whether a patient line closes the dialogue.
pub fn is_end_signal(patient_text: &str) -> bool {
    END_SIGNALS.iter().any(|signal| patient_text.contains(signal))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientReply {
    pub text: String,
    pub ends_dialogue: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatientResponder;

impl PatientResponder {
    pub fn new() -> Self {
        Self
    }

    /// Produces the patient's reply to `latest`, the trainee message that was
    /// just appended as turn `session.turn_count`.
    pub fn respond<R: Rng + ?Sized>(&self, session: &Session, latest: &str, rng: &mut R) -> PatientReply {
        let persona = &session.scenario.persona;
        let stage = TurnStage::from_turn(session.turn_count);
        let templates = transition(persona.archetype, stage, KeywordClass::of(latest));

        let text = match templates {
            ResponseTemplates::Lines(lines) => {
                let line = lines.choose(rng).copied().unwrap_or_default();
                fill_template(line, persona)
            }
            ResponseTemplates::PersonaQuestion => pick(&persona.questions, rng).to_string(),
            ResponseTemplates::PersonaObjection { suffix } => {
                format!("{}{}", pick(&persona.objections, rng), suffix)
            }
        };

        PatientReply {
            ends_dialogue: is_end_signal(&text),
            text,
        }
    }
}

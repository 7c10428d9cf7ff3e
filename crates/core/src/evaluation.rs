//! Evaluation Engine
//!
//! Scores a finished transcript on four rubric dimensions. Each dimension
//! starts from a base score, is adjusted by additive marker rules over the
//! trainee's text, and is clamped to `0..=25`. The weighted total, canned
//! highlights, improvements and a suggested phrasing are derived from the
//! dimension scores and the text.

use crate::knowledge::KnowledgeProvider;
use crate::session::{Role, Transcript};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;

pub const DIMENSION_MAX: u8 = 25;
const MAX_FEEDBACK_ITEMS: usize = 3;

const CAUSAL_MARKERS: [&str; 4] = ["因为", "原理是", "原因是", "作用是"];
const EMPATHY_MARKERS: [&str; 8] = ["理解", "明白", "担心", "顾虑", "放心", "别着急", "慢慢来", "确实"];
const WORRY_MARKERS: [&str; 5] = ["担心", "怕", "疼", "贵", "效果"];
const ACKNOWLEDGE_MARKERS: [&str; 4] = ["理解", "确实", "放心", "说明"];
const RESPECT_MARKERS: [&str; 3] = ["您", "咱们", "一起"];
const CONFRONT_MARKERS: [&str; 3] = ["不对", "不是", "你错了"];
const COMMITMENT_MARKERS: [&str; 12] = [
    "预约", "安排", "确定", "现在就", "今天", "下次", "来院", "面诊", "设计", "方案", "体验一下",
    "试试看",
];
const NEXT_STEP_MARKERS: [&str; 4] = ["下一步", "接下来", "然后", "之后"];
const OBJECTION_MARKERS: [&str; 3] = ["贵", "考虑", "再想想"];
const CLOSING_MARKERS: [&str; 5] = ["预约", "确定", "现在", "今天", "来院"];
const ABSOLUTE_MARKERS: [&str; 6] = ["一定", "肯定", "绝对", "保证", "100%", "百分百"];
const GUARANTEE_MARKERS: [&str; 5] = ["治愈", "根治", "包好", "肯定好", "绝对有效"];

/// Trainee replies to an objection longer than this count as handling it.
const OBJECTION_REPLY_MIN_CHARS: usize = 20;

static FIGURES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+%|\d+年|\d+个月|百分之").expect("static regex"));
static EVIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+%|\d+例|\d+年经验").expect("static regex"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RubricError {
    #[error("Dimension weights must sum to 100, got {0}")]
    WeightSum(u32),
    #[error("Expected 4 dimension weights, got {0}")]
    WeightCount(usize),
    #[error("Maximum turn count must be at least 1")]
    ZeroMaxTurns,
    #[error("Denylist contains an empty term")]
    EmptyDenylistTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "专业度")]
    Professionalism,
    #[serde(rename = "共情力")]
    Empathy,
    #[serde(rename = "转化力")]
    Conversion,
    #[serde(rename = "合规性")]
    Compliance,
}

impl Dimension {
    /// Iteration order; also the tie-break order for the weakest dimension.
    pub const ALL: [Dimension; 4] = [
        Dimension::Professionalism,
        Dimension::Empathy,
        Dimension::Conversion,
        Dimension::Compliance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Professionalism => "专业度",
            Dimension::Empathy => "共情力",
            Dimension::Conversion => "转化力",
            Dimension::Compliance => "合规性",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-dimension weights, validated to sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionWeights([u32; 4]);

impl DimensionWeights {
    pub fn new(weights: [u32; 4]) -> Result<Self, RubricError> {
        let sum: u32 = weights.iter().sum();
        if sum != 100 {
            return Err(RubricError::WeightSum(sum));
        }
        Ok(Self(weights))
    }

    pub fn from_slice(weights: &[u32]) -> Result<Self, RubricError> {
        let array: [u32; 4] = weights
            .try_into()
            .map_err(|_| RubricError::WeightCount(weights.len()))?;
        Self::new(array)
    }

    pub fn weight(&self, dimension: Dimension) -> u32 {
        self.0[dimension as usize]
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self([25; 4])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScores {
    #[serde(rename = "专业度")]
    pub professionalism: u8,
    #[serde(rename = "共情力")]
    pub empathy: u8,
    #[serde(rename = "转化力")]
    pub conversion: u8,
    #[serde(rename = "合规性")]
    pub compliance: u8,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> u8 {
        match dimension {
            Dimension::Professionalism => self.professionalism,
            Dimension::Empathy => self.empathy,
            Dimension::Conversion => self.conversion,
            Dimension::Compliance => self.compliance,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, u8)> + '_ {
        Dimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Lowest-scoring dimension; the first in iteration order wins ties.
    pub fn weakest(&self) -> Dimension {
        self.iter()
            .fold(None, |lowest: Option<(Dimension, u8)>, (d, score)| match lowest {
                Some((_, min)) if min <= score => lowest,
                _ => Some((d, score)),
            })
            .map(|(d, _)| d)
            .unwrap_or(Dimension::Professionalism)
    }
}

/// Result of scoring one finished dialogue. Never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub total_score: u8,
    pub dimensions: DimensionScores,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    pub suggestion: String,
    pub transcript_text: String,
}

pub struct Evaluator {
    weights: DimensionWeights,
    knowledge: Arc<dyn KnowledgeProvider>,
}

impl Evaluator {
    pub fn new(weights: DimensionWeights, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        Self { weights, knowledge }
    }

    pub fn evaluate(&self, transcript: &Transcript, topic: &str, denylist: &[String]) -> Evaluation {
        let trainee: Vec<&str> = transcript.trainee_texts().collect();
        let text = trainee.join(" ");
        let technical_terms = self.knowledge.lookup(topic).technical_terms;

        let dimensions = DimensionScores {
            professionalism: professionalism(&text, &technical_terms),
            empathy: empathy(&text, transcript),
            conversion: conversion(&text, trainee.last().copied(), transcript),
            compliance: compliance(&text, denylist),
        };
        let total_score = self.total(&dimensions);
        debug!(topic, total_score, ?dimensions, "Transcript evaluated");

        Evaluation {
            total_score,
            highlights: highlights(&text),
            improvements: improvements(&dimensions),
            suggestion: suggestion(dimensions.weakest(), topic),
            dimensions,
            transcript_text: transcript.render(),
        }
    }

    fn total(&self, scores: &DimensionScores) -> u8 {
        let weighted: f64 = scores
            .iter()
            .map(|(d, score)| f64::from(score) * f64::from(self.weights.weight(d)) / 25.0)
            .sum();
        weighted.round().clamp(0.0, 100.0) as u8
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

fn count_present(text: &str, markers: impl IntoIterator<Item = impl AsRef<str>>) -> i32 {
    markers
        .into_iter()
        .filter(|m| text.contains(m.as_ref()))
        .count() as i32
}

fn clamp(score: i32) -> u8 {
    score.clamp(0, i32::from(DIMENSION_MAX)) as u8
}

/// Patient entries matching `patient` paired with the trainee entry that
/// immediately follows them. The scripted opening line is not part of the
/// exchange and is never paired.
fn patient_then_trainee<'a>(
    transcript: &'a Transcript,
    patient: &'a [&'a str],
) -> impl Iterator<Item = &'a str> + 'a {
    let entries = transcript.entries();
    let exchange = match entries.first() {
        Some(opening) if opening.role == Role::Patient => &entries[1..],
        _ => entries,
    };
    exchange.windows(2).filter_map(move |pair| {
        let (asked, answered) = (&pair[0], &pair[1]);
        (asked.role == Role::Patient
            && answered.role == Role::Trainee
            && contains_any(&asked.text, patient))
        .then_some(answered.text.as_str())
    })
}

fn professionalism(text: &str, technical_terms: &[String]) -> u8 {
    let mut score = 15 + count_present(text, technical_terms).min(5);
    if contains_any(text, &CAUSAL_MARKERS) {
        score += 3;
    }
    if FIGURES.is_match(text) {
        score += 2;
    }
    clamp(score)
}

fn empathy(text: &str, transcript: &Transcript) -> u8 {
    let mut score = 12 + (count_present(text, EMPATHY_MARKERS) * 2).min(6);
    score += 2 * patient_then_trainee(transcript, &WORRY_MARKERS)
        .filter(|reply| contains_any(reply, &ACKNOWLEDGE_MARKERS))
        .count() as i32;
    if contains_any(text, &RESPECT_MARKERS) {
        score += 2;
    }
    if contains_any(text, &CONFRONT_MARKERS) {
        score -= 3;
    }
    clamp(score)
}

fn conversion(text: &str, last_trainee: Option<&str>, transcript: &Transcript) -> u8 {
    let mut score = 10;
    if contains_any(text, &COMMITMENT_MARKERS) {
        score += 2;
    }
    if contains_any(text, &NEXT_STEP_MARKERS) {
        score += 3;
    }
    if patient_then_trainee(transcript, &OBJECTION_MARKERS)
        .any(|reply| reply.chars().count() > OBJECTION_REPLY_MIN_CHARS)
    {
        score += 5;
    }
    if last_trainee.is_some_and(|last| contains_any(last, &CLOSING_MARKERS)) {
        score += 5;
    }
    clamp(score)
}

fn compliance(text: &str, denylist: &[String]) -> u8 {
    let score = i32::from(DIMENSION_MAX)
        - 5 * count_present(text, denylist)
        - 2 * count_present(text, ABSOLUTE_MARKERS)
        - 5 * count_present(text, GUARANTEE_MARKERS);
    clamp(score)
}

fn highlights(text: &str) -> Vec<String> {
    let checks = [
        (
            contains_any(text, &["原理", "技术", "层次", "结构"]),
            "专业术语使用准确，体现了专业度",
        ),
        (
            contains_any(text, &["理解您的", "明白您的", "确实"]),
            "善于使用共情语言，让患者感到被理解",
        ),
        (
            contains_any(text, &["首先", "其次", "最后", "第一", "第二"]),
            "表达条理清晰，逻辑性强",
        ),
        (EVIDENCE.is_match(text), "善用数据增强说服力"),
        (contains_any(text, &["预约", "安排", "确定"]), "有主动促成的意识"),
    ];
    collect_feedback(&checks, "完成了一次完整的对话练习")
}

fn improvements(scores: &DimensionScores) -> Vec<String> {
    let checks = [
        (
            scores.professionalism < 20,
            "可以增加更多专业术语和原理说明，提升专业形象",
        ),
        (
            scores.empathy < 20,
            "多使用'我理解您'、'确实'等共情词汇，先认同再引导",
        ),
        (
            scores.conversion < 18,
            "在合适时机提出明确的下一步行动，如'我帮您预约一下？'",
        ),
        (
            scores.compliance < DIMENSION_MAX,
            "避免使用'绝对'、'保证'等过度承诺词汇，用'一般来说'、'大部分顾客'代替",
        ),
    ];
    collect_feedback(&checks, "继续保持，可以尝试在更复杂的异议场景下练习")
}

fn collect_feedback(checks: &[(bool, &str)], fallback: &str) -> Vec<String> {
    let items: Vec<String> = checks
        .iter()
        .filter(|(triggered, _)| *triggered)
        .take(MAX_FEEDBACK_ITEMS)
        .map(|(_, message)| message.to_string())
        .collect();
    if items.is_empty() {
        vec![fallback.to_string()]
    } else {
        items
    }
}

fn suggestion(weakest: Dimension, topic: &str) -> String {
    match weakest {
        Dimension::Professionalism => format!(
            "我们使用的是进口{topic}，分子结构稳定，维持时间通常在6-12个月，具体要看个人代谢情况。"
        ),
        Dimension::Empathy => "我完全理解您的担心，很多顾客第一次来都会有类似的顾虑。要不我先带您看看我们之前的案例效果？".to_string(),
        Dimension::Conversion => "您看这样，我帮您安排一下面诊，让医生给您做个详细的设计方案，到时候您再决定做不做，好吗？".to_string(),
        Dimension::Compliance => "根据大多数顾客的反馈，效果是比较满意的，但具体还是要看个人情况。我们建议您先来面诊看看。".to_string(),
    }
}

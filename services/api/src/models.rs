//! API Models
//!
//! Request and response bodies of the REST API, documented with `utoipa`.
//! Core types are mirrored here instead of deriving schemas in the engine
//! crate, so the engine stays free of HTTP concerns.

use chrono::{DateTime, Utc};
use coach_core::{
    CoachReply,
    knowledge::{Faq, ObjectionResponse},
    profile::TraineeProfile,
    recorder::TrainingRecord,
    report::{Grade, TeamOverview},
    session::Session,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatPayload {
    #[schema(example = "zhang_san")]
    pub trainee_id: String,
    #[schema(example = "我想练习玻尿酸")]
    pub message: String,
    /// Transport hint; `wecom` also pushes the reply to the WeCom robot.
    #[serde(default)]
    #[schema(example = "web")]
    pub channel: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct StartTrainingPayload {
    #[schema(example = "zhang_san")]
    pub trainee_id: String,
    #[serde(default)]
    #[schema(example = "超声炮")]
    pub topic: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub success: bool,
    pub trainee_id: String,
    #[schema(example = "start_training")]
    pub intent: String,
    pub response: String,
    pub session_ended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ChatResponse {
    pub fn from_reply(trainee_id: &str, reply: CoachReply) -> Self {
        Self {
            success: true,
            trainee_id: trainee_id.to_string(),
            intent: reply.intent.to_string(),
            response: reply.text,
            session_ended: reply.session_ended,
            warning: reply.warning,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    #[schema(example = "patient")]
    pub role: String,
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub trainee_id: String,
    pub topic: String,
    pub patient_name: String,
    pub patient_age: u8,
    #[schema(example = "犹豫型")]
    pub archetype: String,
    pub concern: String,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub transcript: Vec<TranscriptLine>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        let persona = &session.scenario.persona;
        Self {
            session_id: session.id.clone(),
            trainee_id: session.trainee_id.clone(),
            topic: session.topic.clone(),
            patient_name: persona.name.clone(),
            patient_age: persona.age,
            archetype: persona.archetype.to_string(),
            concern: persona.concern.clone(),
            turn_count: session.turn_count,
            created_at: session.created_at,
            transcript: session
                .transcript
                .entries()
                .iter()
                .map(|entry| TranscriptLine {
                    role: entry.role.to_string(),
                    speaker: entry.role.speaker().to_string(),
                    text: entry.text.clone(),
                    timestamp: entry.timestamp,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ProfileResponse {
    pub trainee_id: String,
    pub display_name: String,
    pub team: Option<String>,
    pub is_manager: bool,
    pub weak_area: Option<String>,
    pub weaknesses: Vec<String>,
}

impl From<TraineeProfile> for ProfileResponse {
    fn from(profile: TraineeProfile) -> Self {
        Self {
            trainee_id: profile.trainee_id,
            display_name: profile.display_name,
            team: profile.team,
            is_manager: profile.is_manager,
            weak_area: profile.weak_area,
            weaknesses: profile.weaknesses,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct UpdateProfilePayload {
    #[schema(example = "张三")]
    pub display_name: String,
    #[serde(default)]
    #[schema(example = "皮肤科")]
    pub team: Option<String>,
    #[serde(default)]
    pub is_manager: bool,
    #[serde(default)]
    #[schema(example = "超声炮")]
    pub weak_area: Option<String>,
    #[serde(default)]
    #[schema(example = json!(["价格谈判", "促成技巧"]))]
    pub weaknesses: Vec<String>,
}

impl UpdateProfilePayload {
    pub fn into_profile(self, trainee_id: &str) -> TraineeProfile {
        TraineeProfile {
            trainee_id: trainee_id.to_string(),
            display_name: self.display_name,
            team: self.team,
            is_manager: self.is_manager,
            weak_area: self.weak_area,
            weaknesses: self.weaknesses,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Look-back window in days (default 7).
    pub days: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct DimensionBreakdown {
    pub professionalism: u8,
    pub empathy: u8,
    pub conversion: u8,
    pub compliance: u8,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub session_id: String,
    pub topic: String,
    pub archetype: String,
    pub turn_count: u32,
    pub total_score: u8,
    #[schema(example = "A")]
    pub grade: String,
    pub dimensions: DimensionBreakdown,
    pub ended_at: DateTime<Utc>,
}

impl From<&TrainingRecord> for HistoryEntry {
    fn from(record: &TrainingRecord) -> Self {
        let scores = &record.evaluation.dimensions;
        Self {
            session_id: record.session_id.clone(),
            topic: record.topic.clone(),
            archetype: record.archetype.to_string(),
            turn_count: record.turn_count,
            total_score: record.evaluation.total_score,
            grade: Grade::from_score(record.evaluation.total_score).to_string(),
            dimensions: DimensionBreakdown {
                professionalism: scores.professionalism,
                empathy: scores.empathy,
                conversion: scores.conversion,
                compliance: scores.compliance,
            },
            ended_at: record.ended_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub trainee_id: String,
    pub days: i64,
    pub count: usize,
    pub average_score: Option<f64>,
    pub records: Vec<HistoryEntry>,
}

impl HistoryResponse {
    pub fn new(trainee_id: &str, days: i64, records: &[TrainingRecord]) -> Self {
        let average_score = (!records.is_empty()).then(|| {
            records
                .iter()
                .map(|r| f64::from(r.evaluation.total_score))
                .sum::<f64>()
                / records.len() as f64
        });
        Self {
            trainee_id: trainee_id.to_string(),
            days,
            count: records.len(),
            average_score,
            records: records.iter().map(HistoryEntry::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct TeamDashboard {
    pub team: String,
    pub active_count: usize,
    pub total_count: usize,
    pub avg_sessions: f64,
    pub avg_score: f64,
    pub weakest_dimension: Option<String>,
    pub concerns: Vec<String>,
    pub suggestion: String,
    /// The same overview rendered as chat text.
    pub report: String,
}

impl From<TeamOverview> for TeamDashboard {
    fn from(overview: TeamOverview) -> Self {
        let report = coach_core::report::team_report(&overview);
        Self {
            team: overview.team,
            active_count: overview.active_count,
            total_count: overview.total_count,
            avg_sessions: overview.avg_sessions,
            avg_score: overview.avg_score,
            weakest_dimension: overview.weakest.map(|d| d.to_string()),
            concerns: overview.concerns,
            suggestion: overview.suggestion,
            report,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ReminderResponse {
    pub trainee_id: String,
    pub message: String,
    /// Whether the reminder was handed to the delivery channel.
    pub queued: bool,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct FaqQuery {
    /// Text to look for in FAQ questions and answers.
    pub q: String,
    /// Maximum number of entries (default 5).
    pub top_k: Option<usize>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct FaqEntry {
    #[schema(example = "玻尿酸")]
    pub topic: String,
    pub question: String,
    pub answer: String,
}

impl From<(String, Faq)> for FaqEntry {
    fn from((topic, faq): (String, Faq)) -> Self {
        Self {
            topic,
            question: faq.question,
            answer: faq.answer,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct ObjectionQuery {
    /// Objection category, e.g. `价格` or `效果`.
    pub kind: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ObjectionReply {
    #[schema(example = "价格")]
    pub kind: String,
    pub response: String,
}

impl From<ObjectionResponse> for ObjectionReply {
    fn from(objection: ObjectionResponse) -> Self {
        Self {
            kind: objection.kind,
            response: objection.response,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::{
        DimensionScores, Evaluation, Intent, catalog::Archetype, catalog::Catalog,
        scenario::ScenarioGenerator,
    };
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Arc;

    fn record(total: u8) -> TrainingRecord {
        let now = Utc::now();
        TrainingRecord {
            session_id: "zhang_20250101120000".into(),
            trainee_id: "zhang".into(),
            topic: "玻尿酸".into(),
            archetype: Archetype::Analytical,
            turn_count: 4,
            started_at: now,
            ended_at: now,
            evaluation: Evaluation {
                total_score: total,
                dimensions: DimensionScores {
                    professionalism: 18,
                    empathy: 20,
                    conversion: 17,
                    compliance: 25,
                },
                highlights: vec![],
                improvements: vec![],
                suggestion: String::new(),
                transcript_text: String::new(),
            },
        }
    }

    #[test]
    fn test_chat_payload_channel_is_optional() {
        let json = r#"{"trainee_id": "zhang", "message": "帮助"}"#;
        let payload: ChatPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.trainee_id, "zhang");
        assert_eq!(payload.message, "帮助");
        assert!(payload.channel.is_none());
    }

    #[test]
    fn test_chat_payload_requires_message() {
        let json = r#"{"trainee_id": "zhang"}"#;
        assert!(serde_json::from_str::<ChatPayload>(json).is_err());
    }

    #[test]
    fn test_chat_response_omits_empty_warning() {
        let reply = CoachReply {
            text: "你好".into(),
            intent: Intent::StartTraining,
            session_ended: false,
            warning: None,
        };
        let json = serde_json::to_value(ChatResponse::from_reply("zhang", reply)).unwrap();
        assert_eq!(json["intent"], "start_training");
        assert_eq!(json["success"], true);
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn test_chat_response_carries_warning() {
        let reply = CoachReply {
            text: "📊 训练完成！".into(),
            intent: Intent::ContinueDialogue,
            session_ended: true,
            warning: Some("训练记录保存失败".into()),
        };
        let json = serde_json::to_value(ChatResponse::from_reply("zhang", reply)).unwrap();
        assert_eq!(json["session_ended"], true);
        assert_eq!(json["warning"], "训练记录保存失败");
    }

    #[test]
    fn test_session_snapshot_from_session() {
        let scenario = ScenarioGenerator::new(Arc::new(Catalog::builtin().unwrap())).generate(
            "种植牙",
            &[],
            &mut StdRng::seed_from_u64(5),
        );
        let mut session = Session::open("zhang", "种植牙", scenario);
        session.push_trainee_turn("您好");

        let snapshot = SessionSnapshot::from(&session);
        assert_eq!(snapshot.trainee_id, "zhang");
        assert_eq!(snapshot.turn_count, 1);
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[0].role, "patient");
        assert_eq!(snapshot.transcript[0].speaker, "患者");
        assert_eq!(snapshot.transcript[1].speaker, "咨询师");
        assert_eq!(snapshot.patient_name, session.scenario.persona.name);
    }

    #[test]
    fn test_history_response_summarises_records() {
        let records = vec![record(81), record(70)];
        let history = HistoryResponse::new("zhang", 7, &records);
        assert_eq!(history.count, 2);
        assert_eq!(history.average_score, Some(75.5));
        assert_eq!(history.records[0].grade, "A");
        assert_eq!(history.records[1].grade, "B");
        assert_eq!(history.records[0].archetype, "理性型");
        assert_eq!(history.records[0].dimensions.empathy, 20);

        let empty = HistoryResponse::new("zhang", 7, &[]);
        assert_eq!(empty.average_score, None);
    }

    #[test]
    fn test_update_profile_payload_defaults() {
        let json = r#"{"display_name": "张三"}"#;
        let profile = serde_json::from_str::<UpdateProfilePayload>(json)
            .unwrap()
            .into_profile("zhang");
        assert_eq!(profile.trainee_id, "zhang");
        assert_eq!(profile.display_name, "张三");
        assert!(!profile.is_manager);
        assert!(profile.weaknesses.is_empty());
    }

    #[test]
    fn test_team_dashboard_renders_report() {
        let overview = TeamOverview::compute("皮肤科", &[], &[]);
        let dashboard = TeamDashboard::from(overview);
        assert_eq!(dashboard.total_count, 0);
        assert!(dashboard.report.starts_with("📊 团队概览"));
        assert_eq!(dashboard.weakest_dimension, None);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "trainee_id is required".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"trainee_id is required"}"#);
    }
}

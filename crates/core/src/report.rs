//! Trainee-facing text.
//!
//! Everything the coach says that is not a patient line is formatted here:
//! scenario introductions, turn prompts, evaluation reports, history and team
//! summaries, help and reminders. The aggregation behind the summaries lives
//! here as well so it can be tested without a recorder.

use crate::evaluation::{Dimension, Evaluation};
use crate::profile::TraineeProfile;
use crate::recorder::TrainingRecord;
use crate::scenario::Scenario;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const APOLOGY: &str = "抱歉，系统暂时繁忙，请稍后再试。";
pub const NO_TEAM_PERMISSION: &str = "你没有权限查看团队数据";
pub const NO_HISTORY: &str = "你还没有训练记录，回复\"练习\"开始你的第一次训练吧！";
pub const TURN_PROMPT: &str = "你怎么回应？（回复'结束'可查看评估报告）";
/// Days without practice after which a reminder replaces the daily tip.
pub const IDLE_REMINDER_DAYS: i64 = 3;
/// Focus recommended when nothing is known about the trainee yet.
pub const DEFAULT_FOCUS: &str = "价格异议处理";
const MAX_CONCERNS: usize = 3;

pub const HELP_TEXT: &str = "\
🎓 话术教练 Agent 使用指南

【开始训练】
• \"我想练习玻尿酸\"
• \"练习超声炮\"
• \"开始训练\"

【查看成绩】
• \"我练得怎么样\"
• \"查看报告\"
• \"我的数据\"

【其他】
• \"帮助\" - 查看使用指南
• \"结束\" - 提前结束训练

随时发送消息即可开始练习！";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
}

impl Grade {
    pub fn from_score(total: u8) -> Self {
        match total {
            90.. => Grade::S,
            80..=89 => Grade::A,
            70..=79 => Grade::B,
            _ => Grade::C,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        };
        f.write_str(letter)
    }
}

fn bullets(items: &[String], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .map(|item| format!("• {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn scenario_intro(topic: &str, scenario: &Scenario, knowledge_intro: &str) -> String {
    let persona = &scenario.persona;
    format!(
        "好的！为你准备【{topic}】训练场景\n\n\
         📖 {knowledge_intro}\n\n\
         👤 患者角色：\n\
         姓名：{}\n\
         年龄：{}岁\n\
         类型：{}\n\
         诉求：{}\n\
         性格：{}\n\n\
         💬 患者说：\n\
         \"{}\"\n\n\
         请输入你的回复 👇",
        persona.name,
        persona.age,
        persona.archetype,
        persona.concern,
        persona.traits.join("、"),
        scenario.opening,
    )
}

pub fn patient_turn(patient_line: &str) -> String {
    format!("患者说：\"{patient_line}\"\n\n{TURN_PROMPT}")
}

pub fn evaluation_report(evaluation: &Evaluation) -> String {
    let dimensions = evaluation
        .dimensions
        .iter()
        .map(|(d, score)| format!("• {d}：{score}/25"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "📊 训练完成！\n\n\
         综合得分：{total}/100  评级：{grade}\n\n\
         维度分析：\n{dimensions}\n\n\
         ✨ 亮点：\n{highlights}\n\n\
         ⚠️ 改进点：\n{improvements}\n\n\
         💡 更好的说法：\n\"{suggestion}\"\n\n\
         回复\"继续\"开始新的训练，或回复\"报告\"查看历史成绩",
        total = evaluation.total_score,
        grade = Grade::from_score(evaluation.total_score),
        highlights = bullets(&evaluation.highlights, 3),
        improvements = bullets(&evaluation.improvements, 3),
        suggestion = evaluation.suggestion,
    )
}

/// Average score per dimension across `records`, in dimension order.
pub fn dimension_averages(records: &[TrainingRecord]) -> Vec<(Dimension, f64)> {
    if records.is_empty() {
        return Vec::new();
    }
    let count = records.len() as f64;
    Dimension::ALL
        .into_iter()
        .map(|d| {
            let sum: f64 = records
                .iter()
                .map(|r| f64::from(r.evaluation.dimensions.get(d)))
                .sum();
            (d, sum / count)
        })
        .collect()
}

/// First maximum and first minimum of the averages.
fn extremes(averages: &[(Dimension, f64)]) -> Option<((Dimension, f64), (Dimension, f64))> {
    let first = *averages.first()?;
    Some(averages.iter().skip(1).fold((first, first), |(best, worst), &cur| {
        (
            if cur.1 > best.1 { cur } else { best },
            if cur.1 < worst.1 { cur } else { worst },
        )
    }))
}

fn average_total(records: &[TrainingRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records
        .iter()
        .map(|r| f64::from(r.evaluation.total_score))
        .sum();
    sum / records.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalSummary {
    pub sessions: usize,
    pub average_score: f64,
    pub strongest: (Dimension, f64),
    pub weakest: (Dimension, f64),
}

impl PersonalSummary {
    pub fn from_records(records: &[TrainingRecord]) -> Option<Self> {
        let (strongest, weakest) = extremes(&dimension_averages(records))?;
        Some(Self {
            sessions: records.len(),
            average_score: average_total(records),
            strongest,
            weakest,
        })
    }
}

pub fn personal_report(summary: Option<&PersonalSummary>) -> String {
    let Some(summary) = summary else {
        return NO_HISTORY.to_string();
    };
    let (strong, strong_avg) = summary.strongest;
    let (weak, weak_avg) = summary.weakest;
    format!(
        "📈 你的训练报告（近7天）\n\n\
         总练习次数：{}次\n\
         平均得分：{:.1}分\n\n\
         能力分析：\n\
         • 最强项：{strong}（{strong_avg:.1}分）\n\
         • 待提升：{weak}（{weak_avg:.1}分）\n\n\
         建议：\n\
         本周重点练习【{weak}】相关场景\n\n\
         回复\"练习\"开始针对性训练",
        summary.sessions, summary.average_score,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOverview {
    pub team: String,
    pub active_count: usize,
    pub total_count: usize,
    pub avg_sessions: f64,
    pub avg_score: f64,
    pub weakest: Option<Dimension>,
    pub concerns: Vec<String>,
    pub suggestion: String,
}

impl TeamOverview {
    /// Aggregates `records` over the given team `members`; records of other
    /// trainees are ignored.
    pub fn compute(team: &str, members: &[TraineeProfile], records: &[TrainingRecord]) -> Self {
        let mut per_member: HashMap<&str, usize> = HashMap::new();
        let team_records: Vec<TrainingRecord> = records
            .iter()
            .filter(|r| members.iter().any(|m| m.trainee_id == r.trainee_id))
            .cloned()
            .collect();
        for record in &team_records {
            *per_member.entry(record.trainee_id.as_str()).or_default() += 1;
        }

        let weakest = extremes(&dimension_averages(&team_records)).map(|(_, (d, _))| d);
        let mut concerns: Vec<String> = members
            .iter()
            .filter(|m| per_member.get(m.trainee_id.as_str()).copied().unwrap_or(0) < 2)
            .map(|m| format!("{}练习次数偏少", m.name()))
            .collect();
        if let Some(dimension) = weakest {
            concerns.push(format!("{dimension}整体较弱"));
        }
        concerns.truncate(MAX_CONCERNS);

        let suggestion = match weakest {
            Some(dimension) => format!("建议安排【{dimension}】专项培训"),
            None => "建议鼓励团队成员开始练习".to_string(),
        };
        let total_count = members.len();

        Self {
            team: team.to_string(),
            active_count: per_member.len(),
            total_count,
            avg_sessions: if total_count == 0 {
                0.0
            } else {
                team_records.len() as f64 / total_count as f64
            },
            avg_score: average_total(&team_records),
            weakest,
            concerns,
            suggestion,
        }
    }
}

pub fn team_report(overview: &TeamOverview) -> String {
    let concerns = if overview.concerns.is_empty() {
        "• 暂无".to_string()
    } else {
        bullets(&overview.concerns, MAX_CONCERNS)
    };
    format!(
        "📊 团队概览\n\n\
         本周活跃：{}/{}人\n\
         人均练习：{:.1}次\n\
         平均得分：{:.1}分\n\n\
         ⚠️ 需关注：\n{concerns}\n\n\
         建议：\n{}",
        overview.active_count,
        overview.total_count,
        overview.avg_sessions,
        overview.avg_score,
        overview.suggestion,
    )
}

/// Practice nudge: a reminder after [`IDLE_REMINDER_DAYS`] idle days,
/// otherwise a recommendation to practise `focus`.
pub fn reminder(idle_days: Option<i64>, focus: &str) -> String {
    match idle_days {
        Some(days) if days >= IDLE_REMINDER_DAYS => format!(
            "📢 练习提醒\n\n你已经{days}天没有练习了！\n\n\
             保持手感很重要，今天花5分钟练习一下吧 💪\n\n回复'练习'开始训练"
        ),
        _ => format!("🌟 今日练习推荐\n\n根据你的薄弱点，建议今天练习【{focus}】\n\n回复'练习'开始！"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::DimensionScores;
    use crate::recorder::tests::record_for;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_score(100), Grade::S);
        assert_eq!(Grade::from_score(90), Grade::S);
        assert_eq!(Grade::from_score(89), Grade::A);
        assert_eq!(Grade::from_score(80), Grade::A);
        assert_eq!(Grade::from_score(79), Grade::B);
        assert_eq!(Grade::from_score(70), Grade::B);
        assert_eq!(Grade::from_score(69), Grade::C);
        assert_eq!(Grade::from_score(0), Grade::C);
    }

    fn evaluation(total: u8) -> Evaluation {
        Evaluation {
            total_score: total,
            dimensions: DimensionScores {
                professionalism: 15,
                empathy: 16,
                conversion: 17,
                compliance: 25,
            },
            highlights: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            improvements: vec!["改进".into()],
            suggestion: "您看这样".into(),
            transcript_text: String::new(),
        }
    }

    #[test]
    fn test_evaluation_report_shows_grade_at_boundaries() {
        assert!(evaluation_report(&evaluation(90)).contains("综合得分：90/100  评级：S"));
        assert!(evaluation_report(&evaluation(89)).contains("评级：A"));
        assert!(evaluation_report(&evaluation(70)).contains("评级：B"));
        assert!(evaluation_report(&evaluation(69)).contains("评级：C"));
    }

    #[test]
    fn test_evaluation_report_layout() {
        let report = evaluation_report(&evaluation(73));
        assert!(report.contains("• 专业度：15/25\n• 共情力：16/25\n• 转化力：17/25\n• 合规性：25/25"));
        assert!(report.contains("• c"));
        assert!(!report.contains("• d"));
        assert!(report.contains("💡 更好的说法：\n\"您看这样\""));
    }

    #[test]
    fn test_personal_summary_first_wins_ties() {
        let records = vec![
            record_for("u1", 1, 70, [20, 20, 10, 10]),
            record_for("u1", 2, 80, [20, 20, 10, 10]),
        ];
        let summary = PersonalSummary::from_records(&records).unwrap();
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.average_score, 75.0);
        assert_eq!(summary.strongest.0, Dimension::Professionalism);
        assert_eq!(summary.weakest.0, Dimension::Conversion);

        let report = personal_report(Some(&summary));
        assert!(report.contains("总练习次数：2次"));
        assert!(report.contains("平均得分：75.0分"));
        assert!(report.contains("本周重点练习【转化力】相关场景"));
    }

    #[test]
    fn test_personal_report_without_history() {
        assert_eq!(PersonalSummary::from_records(&[]), None);
        assert_eq!(personal_report(None), NO_HISTORY);
    }

    fn member(id: &str) -> TraineeProfile {
        TraineeProfile {
            trainee_id: id.into(),
            display_name: format!("小{id}"),
            team: Some("皮肤科".into()),
            ..TraineeProfile::default()
        }
    }

    #[test]
    fn test_team_overview_aggregates_members_only() {
        let members = vec![member("a"), member("b"), member("c")];
        let records = vec![
            record_for("a", 1, 80, [20, 18, 15, 25]),
            record_for("a", 2, 70, [18, 16, 13, 25]),
            record_for("b", 1, 60, [15, 14, 12, 20]),
            record_for("outsider", 1, 10, [0, 0, 0, 0]),
        ];
        let overview = TeamOverview::compute("皮肤科", &members, &records);
        assert_eq!(overview.active_count, 2);
        assert_eq!(overview.total_count, 3);
        assert_eq!(overview.avg_sessions, 1.0);
        assert_eq!(overview.avg_score, 70.0);
        assert_eq!(overview.weakest, Some(Dimension::Conversion));
        assert_eq!(
            overview.concerns,
            vec!["小b练习次数偏少", "小c练习次数偏少", "转化力整体较弱"]
        );
        assert_eq!(overview.suggestion, "建议安排【转化力】专项培训");

        let text = team_report(&overview);
        assert!(text.contains("本周活跃：2/3人"));
        assert!(text.contains("人均练习：1.0次"));
    }

    #[test]
    fn test_team_overview_without_records() {
        let overview = TeamOverview::compute("空", &[], &[]);
        assert_eq!(overview.total_count, 0);
        assert_eq!(overview.avg_sessions, 0.0);
        assert!(overview.concerns.is_empty());
        assert!(team_report(&overview).contains("• 暂无"));
    }

    #[test]
    fn test_reminder_switches_on_idle_days() {
        assert!(reminder(Some(3), "合规性").contains("你已经3天没有练习了"));
        assert!(reminder(Some(2), "合规性").contains("建议今天练习【合规性】"));
        assert!(reminder(None, DEFAULT_FOCUS).contains("【价格异议处理】"));
    }

    #[test]
    fn test_patient_turn_appends_prompt() {
        assert_eq!(
            patient_turn("多少钱？"),
            "患者说：\"多少钱？\"\n\n你怎么回应？（回复'结束'可查看评估报告）"
        );
    }
}

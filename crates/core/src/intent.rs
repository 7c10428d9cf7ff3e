//! Intent classification for inbound trainee messages.
//!
//! Classification is keyword membership with a fixed precedence. It never
//! looks at session state: a message that matches nothing is
//! `ContinueDialogue` whether or not the trainee has an active session, and
//! the orchestrator decides what that means.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    StartTraining,
    ContinueDialogue,
    ViewReport,
    ViewTeamData,
    Help,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::StartTraining => "start_training",
            Intent::ContinueDialogue => "continue_dialogue",
            Intent::ViewReport => "view_report",
            Intent::ViewTeamData => "view_team_data",
            Intent::Help => "help",
        };
        f.write_str(name)
    }
}

const START_TRAINING_KEYWORDS: &[&str] = &["练习", "训练", "开始", "练", "想学", "陪练", "roleplay"];
const VIEW_REPORT_KEYWORDS: &[&str] = &["报告", "成绩", "得分", "练得怎么样", "数据", "统计"];
const VIEW_TEAM_KEYWORDS: &[&str] = &["团队", "科室", "大家", "整体", "所有人"];
const HELP_KEYWORDS: &[&str] = &["帮助", "怎么用", "help", "?", "？"];

/// Precedence order; the first group with a hit wins.
const RULES: &[(Intent, &[&str])] = &[
    (Intent::StartTraining, START_TRAINING_KEYWORDS),
    (Intent::ViewReport, VIEW_REPORT_KEYWORDS),
    (Intent::ViewTeamData, VIEW_TEAM_KEYWORDS),
    (Intent::Help, HELP_KEYWORDS),
];

/// Maps a raw utterance to exactly one intent.
pub fn classify(utterance: &str) -> Intent {
    let normalized = utterance.trim().to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| normalized.contains(kw)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::ContinueDialogue)
}

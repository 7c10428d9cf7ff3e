//! Coach Orchestrator
//!
//! The single entry point of the engine. An inbound utterance is classified,
//! then routed through the session state machine:
//!
//! - start training: resolve a topic, generate a scenario, replace any
//!   active session for the trainee and introduce the patient;
//! - continue dialogue: append the trainee turn, then either end the dialogue
//!   (stop token or turn limit) or let the patient answer, ending on a
//!   patient end signal;
//! - end dialogue (internal): remove the session, evaluate it, hand the
//!   record to the recorder and return the report.
//!
//! Reports, team data and help are answered without touching sessions.
//! Collaborator failures never reach the trainee as error details.

use crate::catalog::Catalog;
use crate::config::CoachConfig;
use crate::evaluation::Evaluator;
use crate::intent::{Intent, classify};
use crate::knowledge::KnowledgeProvider;
use crate::profile::ProfileDirectory;
use crate::recorder::{RecordError, TrainingRecord, TrainingRecorder};
use crate::report::{
    self, APOLOGY, DEFAULT_FOCUS, HELP_TEXT, NO_TEAM_PERMISSION, PersonalSummary, TeamOverview,
};
use crate::responder::PatientResponder;
use crate::scenario::ScenarioGenerator;
use crate::session::{Session, SessionStore};
use crate::topic::{DEFAULT_TOPIC, extract_topic};
use chrono::{DateTime, Duration, Utc};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Span, error, info, instrument, warn};

/// Utterances that end the dialogue when sent verbatim.
pub const STOP_TOKENS: [&str; 3] = ["结束", "finish", "done"];
/// Window used by personal and team reports.
pub const REPORT_WINDOW_DAYS: i64 = 7;
pub const RECORD_WARNING: &str = "训练记录保存失败，本次成绩可能不会计入历史报告。";

/// What the transport layer relays back to the trainee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachReply {
    pub text: String,
    /// The intent that was actually served.
    pub intent: Intent,
    pub session_ended: bool,
    /// Non-fatal problem the caller may surface, e.g. a lost training record.
    pub warning: Option<String>,
}

impl CoachReply {
    fn text(intent: Intent, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent,
            session_ended: false,
            warning: None,
        }
    }
}

enum TurnOutcome {
    PatientReplied(String),
    Finished,
}

pub struct Coach {
    config: CoachConfig,
    generator: ScenarioGenerator,
    responder: PatientResponder,
    evaluator: Evaluator,
    sessions: SessionStore,
    knowledge: Arc<dyn KnowledgeProvider>,
    profiles: Arc<dyn ProfileDirectory>,
    recorder: Arc<dyn TrainingRecorder>,
    rng: Mutex<StdRng>,
}

impl Coach {
    pub fn new(
        config: CoachConfig,
        catalog: Arc<Catalog>,
        knowledge: Arc<dyn KnowledgeProvider>,
        profiles: Arc<dyn ProfileDirectory>,
        recorder: Arc<dyn TrainingRecorder>,
    ) -> Self {
        Self {
            generator: ScenarioGenerator::new(catalog),
            responder: PatientResponder::new(),
            evaluator: Evaluator::new(config.weights(), knowledge.clone()),
            sessions: SessionStore::new(),
            config,
            knowledge,
            profiles,
            recorder,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replaces the session store, e.g. with a pre-populated one.
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    /// Makes scenario generation and patient replies reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn profiles(&self) -> &dyn ProfileDirectory {
        self.profiles.as_ref()
    }

    /// Snapshot of the trainee's active session.
    pub fn session(&self, trainee_id: &str) -> Option<Session> {
        self.sessions.get(trainee_id)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Handles one inbound utterance and returns plain text for the trainee.
    ///
    /// # Arguments
    ///
    /// * `trainee_id` - Key of the trainee's session.
    /// * `utterance` - The raw message; stop tokens must match it exactly.
    /// * `channel` - Transport hint, used for logging only.
    #[instrument(name = "coach_message", skip_all, fields(trainee_id = %trainee_id, channel = %channel, intent))]
    pub async fn handle_message(&self, trainee_id: &str, utterance: &str, channel: &str) -> CoachReply {
        let intent = classify(utterance);
        Span::current().record("intent", tracing::field::display(intent));

        match intent {
            Intent::StartTraining => self.start_training(trainee_id, utterance),
            Intent::ContinueDialogue => self.continue_dialogue(trainee_id, utterance).await,
            Intent::ViewReport => self.view_report(trainee_id).await,
            Intent::ViewTeamData => self.view_team_data(trainee_id).await,
            Intent::Help => CoachReply::text(Intent::Help, HELP_TEXT),
        }
    }

    fn start_training(&self, trainee_id: &str, utterance: &str) -> CoachReply {
        let profile = self.profiles.profile(trainee_id);
        let topic = extract_topic(utterance)
            .map(|t| t.label().to_string())
            .or_else(|| profile.weak_area.clone())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        let scenario = self.with_rng(|rng| self.generator.generate(&topic, &profile.weak_areas(), rng));
        let knowledge = self.knowledge.lookup(&topic);
        let text = report::scenario_intro(&topic, &scenario, &knowledge.introduction);
        let archetype = scenario.persona.archetype;

        let session = Session::open(trainee_id, &topic, scenario);
        let session_id = session.id.clone();
        if let Some(abandoned) = self.sessions.insert(session) {
            info!(
                abandoned = %abandoned.id,
                turns = abandoned.turn_count,
                "Replacing unfinished session"
            );
        }
        info!(session_id = %session_id, topic = %topic, %archetype, "Training session started");

        CoachReply::text(Intent::StartTraining, text)
    }

    async fn continue_dialogue(&self, trainee_id: &str, utterance: &str) -> CoachReply {
        let max_turns = self.config.max_turns();
        let outcome = self.sessions.update(trainee_id, |session| {
            let turn = session.push_trainee_turn(utterance);
            if STOP_TOKENS.contains(&utterance) || turn >= max_turns {
                return TurnOutcome::Finished;
            }
            let reply = self.with_rng(|rng| self.responder.respond(session, utterance, rng));
            session.push_patient_line(&reply.text);
            if reply.ends_dialogue {
                TurnOutcome::Finished
            } else {
                TurnOutcome::PatientReplied(reply.text)
            }
        });

        match outcome {
            None => {
                info!(trainee_id, "No active session, treating message as a start request");
                self.start_training(trainee_id, utterance)
            }
            Some(TurnOutcome::PatientReplied(line)) => {
                CoachReply::text(Intent::ContinueDialogue, report::patient_turn(&line))
            }
            Some(TurnOutcome::Finished) => self.end_dialogue(trainee_id).await,
        }
    }

    async fn end_dialogue(&self, trainee_id: &str) -> CoachReply {
        // Removal happens first; whoever takes the session evaluates it.
        let Some(session) = self.sessions.take(trainee_id) else {
            warn!(trainee_id, "Session vanished before it could be evaluated");
            return CoachReply::text(Intent::ContinueDialogue, APOLOGY);
        };

        let evaluation =
            self.evaluator
                .evaluate(&session.transcript, &session.topic, self.config.denylist());
        let text = report::evaluation_report(&evaluation);
        info!(
            session_id = %session.id,
            turns = session.turn_count,
            total_score = evaluation.total_score,
            "Training session finished"
        );

        let record = TrainingRecord {
            session_id: session.id,
            trainee_id: session.trainee_id,
            topic: session.topic,
            archetype: session.scenario.persona.archetype,
            turn_count: session.turn_count,
            started_at: session.created_at,
            ended_at: Utc::now(),
            evaluation,
        };
        let warning = match self.recorder.record(record).await {
            Ok(()) => None,
            Err(e) => {
                warn!(trainee_id, error = %e, "Failed to persist training record");
                Some(RECORD_WARNING.to_string())
            }
        };

        CoachReply {
            text,
            intent: Intent::ContinueDialogue,
            session_ended: true,
            warning,
        }
    }

    async fn view_report(&self, trainee_id: &str) -> CoachReply {
        let text = match self.history(trainee_id, REPORT_WINDOW_DAYS).await {
            Ok(records) => report::personal_report(PersonalSummary::from_records(&records).as_ref()),
            Err(e) => {
                error!(trainee_id, error = %e, "Failed to load training history");
                APOLOGY.to_string()
            }
        };
        CoachReply::text(Intent::ViewReport, text)
    }

    async fn view_team_data(&self, trainee_id: &str) -> CoachReply {
        let profile = self.profiles.profile(trainee_id);
        if !profile.is_manager {
            return CoachReply::text(Intent::ViewTeamData, NO_TEAM_PERMISSION);
        }
        let team = profile.team.unwrap_or_default();
        let text = match self.team_overview(&team).await {
            Ok(overview) => report::team_report(&overview),
            Err(e) => {
                error!(trainee_id, team = %team, error = %e, "Failed to load team records");
                APOLOGY.to_string()
            }
        };
        CoachReply::text(Intent::ViewTeamData, text)
    }

    /// The trainee's records from the last `days` days, oldest first.
    pub async fn history(&self, trainee_id: &str, days: i64) -> Result<Vec<TrainingRecord>, RecordError> {
        self.recorder.history(trainee_id, window_start(days)).await
    }

    /// Team aggregate over the report window.
    pub async fn team_overview(&self, team: &str) -> Result<TeamOverview, RecordError> {
        let members = self.profiles.team_members(team);
        let records = self.recorder.all_since(window_start(REPORT_WINDOW_DAYS)).await?;
        Ok(TeamOverview::compute(team, &members, &records))
    }

    /// Practice nudge for the trainee: a reminder when idle for a while,
    /// otherwise a recommendation for their weakest area.
    pub async fn reminder(&self, trainee_id: &str) -> Result<String, RecordError> {
        let records = self.recorder.history(trainee_id, DateTime::<Utc>::UNIX_EPOCH).await?;
        let idle_days = records
            .iter()
            .map(|r| r.ended_at)
            .max()
            .map(|last| (Utc::now() - last).num_days());

        let recent_start = window_start(REPORT_WINDOW_DAYS);
        let recent: Vec<TrainingRecord> = records
            .into_iter()
            .filter(|r| r.ended_at >= recent_start)
            .collect();
        let focus = PersonalSummary::from_records(&recent)
            .map(|summary| summary.weakest.0.label().to_string())
            .or_else(|| self.profiles.profile(trainee_id).weak_area)
            .unwrap_or_else(|| DEFAULT_FOCUS.to_string());

        Ok(report::reminder(idle_days, &focus))
    }
}

fn window_start(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

//! Per-trainee session state and the store that owns it.

use crate::scenario::Scenario;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainee,
    Patient,
}

impl Role {
    /// Speaker label used in rendered transcripts.
    pub fn speaker(self) -> &'static str {
        match self {
            Role::Trainee => "咨询师",
            Role::Patient => "患者",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Trainee => write!(f, "trainee"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only dialogue log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Texts authored by the trainee, in order.
    pub fn trainee_texts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.role == Role::Trainee)
            .map(|e| e.text.as_str())
    }

    pub fn trainee_turns(&self) -> usize {
        self.trainee_texts().count()
    }

    /// One `speaker：text` line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}：{}", e.role.speaker(), e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An active training dialogue for one trainee.
///
/// Created only by starting training, mutated only by continuing the
/// dialogue, destroyed when the dialogue ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// `{trainee_id}_{YYYYmmddHHMMSS}`; record-keeping only.
    pub id: String,
    pub trainee_id: String,
    pub topic: String,
    pub scenario: Scenario,
    pub transcript: Transcript,
    /// Always equals the number of trainee entries in `transcript`.
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Opens a session whose transcript starts with the patient's opening line.
    pub fn open(trainee_id: &str, topic: &str, scenario: Scenario) -> Self {
        let created_at = Utc::now();
        let mut transcript = Transcript::new();
        transcript.push(Role::Patient, scenario.opening.clone());
        Self {
            id: format!("{}_{}", trainee_id, created_at.format("%Y%m%d%H%M%S")),
            trainee_id: trainee_id.to_string(),
            topic: topic.to_string(),
            scenario,
            transcript,
            turn_count: 0,
            created_at,
        }
    }

    /// Appends a trainee turn and returns the new turn index (1-based).
    pub fn push_trainee_turn(&mut self, text: &str) -> u32 {
        self.transcript.push(Role::Trainee, text);
        self.turn_count += 1;
        self.turn_count
    }

    pub fn push_patient_line(&mut self, text: &str) {
        self.transcript.push(Role::Patient, text);
    }
}

/// Holds at most one session per trainee id.
///
/// Constructed once and shared by reference; the backing map can be injected
/// so tests get isolated stores. Entries are replaced atomically and a
/// racing pair of requests for the same trainee resolves last-write-wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(sessions: HashMap<String, Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a session, returning the one it replaced.
    pub fn insert(&self, session: Session) -> Option<Session> {
        self.lock().insert(session.trainee_id.clone(), session)
    }

    /// Runs `f` against the trainee's session while holding the store lock.
    pub fn update<T>(&self, trainee_id: &str, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        self.lock().get_mut(trainee_id).map(f)
    }

    /// Removes and returns the trainee's session.
    pub fn take(&self, trainee_id: &str) -> Option<Session> {
        self.lock().remove(trainee_id)
    }

    pub fn get(&self, trainee_id: &str) -> Option<Session> {
        self.lock().get(trainee_id).cloned()
    }

    pub fn contains(&self, trainee_id: &str) -> bool {
        self.lock().contains_key(trainee_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

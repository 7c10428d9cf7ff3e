//! Trainee profiles: team membership, role and known weak areas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineeProfile {
    pub trainee_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub is_manager: bool,
    /// Preferred practice topic or skill, used when a start request names none.
    #[serde(default)]
    pub weak_area: Option<String>,
    /// Skill labels steering archetype selection, e.g. "价格谈判".
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

impl TraineeProfile {
    /// Profile for a trainee nobody has registered yet.
    pub fn unknown(trainee_id: &str) -> Self {
        Self {
            trainee_id: trainee_id.to_string(),
            display_name: trainee_id.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.trainee_id
        } else {
            &self.display_name
        }
    }

    /// Weak-area labels in priority order: the primary weak area first.
    pub fn weak_areas(&self) -> Vec<String> {
        self.weak_area
            .iter()
            .chain(self.weaknesses.iter())
            .cloned()
            .collect()
    }
}

pub trait ProfileDirectory: Send + Sync {
    /// The trainee's profile, or a default one for unknown trainees.
    fn profile(&self, trainee_id: &str) -> TraineeProfile;
    fn team_members(&self, team: &str) -> Vec<TraineeProfile>;
    fn upsert(&self, profile: TraineeProfile);
}

#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    profiles: RwLock<BTreeMap<String, TraineeProfile>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = TraineeProfile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|p| (p.trainee_id.clone(), p))
                    .collect(),
            ),
        }
    }
}

impl ProfileDirectory for InMemoryProfiles {
    fn profile(&self, trainee_id: &str) -> TraineeProfile {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(trainee_id)
            .cloned()
            .unwrap_or_else(|| TraineeProfile::unknown(trainee_id))
    }

    fn team_members(&self, team: &str) -> Vec<TraineeProfile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|p| p.team.as_deref() == Some(team))
            .cloned()
            .collect()
    }

    fn upsert(&self, profile: TraineeProfile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.trainee_id.clone(), profile);
    }
}

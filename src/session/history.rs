use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Most-recent-last transcript of one session, capped in length.
#[derive(Debug, Clone)]
pub struct TranscriptHistory {
    pub session_id: String,
    entries: VecDeque<TranscriptEntry>,
    cap: usize,
}

impl TranscriptHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>, confidence: Option<f32>) {
        self.entries.push_back(TranscriptEntry {
            id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now(),
            speaker,
            text: text.into(),
            confidence,
        });
        self.trim();
    }

    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&TranscriptEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

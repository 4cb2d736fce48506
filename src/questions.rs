//! The question pool, the ask-history log, and the weighted sampler.
//!
//! The pool is loaded once at startup from a JSON file. Every round start
//! appends a `{"question", "asked_at"}` line to the history log, and every
//! game draw reads that log back so recently-asked questions are strongly
//! deprioritized without ever becoming impossible.

use crate::types::Question;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Questions asked within this window get a reduced sampling weight,
/// proportional to how recently they came up.
const RECENT_WINDOW_SECONDS: f64 = 6.0 * 60.0 * 60.0;
/// Weight floor so a just-asked question stays drawable in small pools.
const MIN_WEIGHT: f64 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("failed to read question pool: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question pool: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question pool is empty")]
    Empty,

    #[error("question {0:?} has no answer at its correct index")]
    BadCorrectIndex(String),
}

#[derive(Debug, Deserialize)]
struct PoolFile {
    questions: Vec<Question>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEntry {
    question: String,
    asked_at: i64,
}

#[derive(Debug, Clone)]
pub struct QuestionBank {
    pool: Vec<Question>,
    history_path: PathBuf,
}

impl QuestionBank {
    /// Load a `{"questions": [...]}` pool file and validate every entry.
    pub fn load(
        pool_path: impl AsRef<Path>,
        history_path: impl Into<PathBuf>,
    ) -> Result<Self, BankError> {
        let raw = std::fs::read_to_string(pool_path)?;
        let file: PoolFile = serde_json::from_str(&raw)?;
        Self::from_pool(file.questions, history_path)
    }

    /// Build a bank from an already-assembled pool, with the same
    /// validation as [`QuestionBank::load`].
    pub fn from_pool(
        pool: Vec<Question>,
        history_path: impl Into<PathBuf>,
    ) -> Result<Self, BankError> {
        if pool.is_empty() {
            return Err(BankError::Empty);
        }
        for q in &pool {
            if q.answers.get(q.correct).is_none() {
                return Err(BankError::BadCorrectIndex(q.question.clone()));
            }
        }
        Ok(Self {
            pool,
            history_path: history_path.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Draw `n` distinct questions, deprioritizing recent asks. Asking for
    /// more than the pool holds returns the whole pool.
    pub async fn select(&self, n: usize) -> Vec<Question> {
        let history = self.last_asked().await;
        let now = Utc::now().timestamp();
        select_weighted(&self.pool, &history, now, n, &mut rand::rng())
    }

    /// Append an ask record for `question`. Best effort: the write runs on
    /// its own task and failures are logged, never surfaced.
    pub fn record_ask(&self, question: &Question) {
        let entry = HistoryEntry {
            question: question.question.clone(),
            asked_at: Utc::now().timestamp(),
        };
        let path = self.history_path.clone();
        tokio::spawn(async move {
            if let Err(e) = append_history(&path, &entry).await {
                tracing::warn!("failed to append question history: {e}");
            }
        });
    }

    /// Most recent recorded ask per question text. A missing log means
    /// nothing was asked yet; unparseable lines are skipped.
    async fn last_asked(&self) -> HashMap<String, i64> {
        let raw = match tokio::fs::read_to_string(&self.history_path).await {
            Ok(raw) => raw,
            Err(_) => return HashMap::new(),
        };
        let mut seen: HashMap<String, i64> = HashMap::new();
        for line in raw.lines() {
            let Ok(entry) = serde_json::from_str::<HistoryEntry>(line) else {
                continue;
            };
            let latest = seen.entry(entry.question).or_insert(entry.asked_at);
            if entry.asked_at > *latest {
                *latest = entry.asked_at;
            }
        }
        seen
    }
}

async fn append_history(path: &Path, entry: &HistoryEntry) -> std::io::Result<()> {
    let mut line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Sampling weight for one question: 1.0 if never asked, otherwise the
/// fraction of the recency window that has elapsed, floored at
/// [`MIN_WEIGHT`].
fn ask_weight(last_asked: Option<i64>, now: i64) -> f64 {
    match last_asked {
        None => 1.0,
        Some(ts) => {
            let age = (now - ts) as f64;
            (age / RECENT_WINDOW_SECONDS).clamp(MIN_WEIGHT, 1.0)
        }
    }
}

/// Weighted draw without replacement: pick against cumulative weights,
/// remove the hit, recompute, repeat.
fn select_weighted(
    pool: &[Question],
    history: &HashMap<String, i64>,
    now: i64,
    n: usize,
    rng: &mut impl Rng,
) -> Vec<Question> {
    if n >= pool.len() {
        let mut all = pool.to_vec();
        all.shuffle(rng);
        return all;
    }

    let mut remaining: Vec<(f64, &Question)> = pool
        .iter()
        .map(|q| (ask_weight(history.get(&q.question).copied(), now), q))
        .collect();
    let mut picked = Vec::with_capacity(n);
    while picked.len() < n && !remaining.is_empty() {
        let total: f64 = remaining.iter().map(|(w, _)| w).sum();
        let mut draw = rng.random_range(0.0..total);
        let mut hit = remaining.len() - 1;
        for (i, (weight, _)) in remaining.iter().enumerate() {
            if draw < *weight {
                hit = i;
                break;
            }
            draw -= weight;
        }
        picked.push(remaining.remove(hit).1.clone());
    }
    picked
}

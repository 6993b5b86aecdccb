use anyhow::{Context, Result};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::{collections::HashMap, str};
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::feedback::{CommentEntry, FeedbackRecord, FeedbackUpdate};

const FEEDBACK_PREFIX: &str = "feedback:";

/// Review state keyed by message id.
///
/// Writes are read-modify-write on a single key, so they go through `write_lock`.
pub struct DBLayer {
    db: DB,
    write_lock: Mutex<()>,
}

impl DBLayer {
    pub fn new(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).with_context(|| format!("opening feedback store at {path}"))?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn feedback_key(message_id: &str) -> String {
        format!("{FEEDBACK_PREFIX}{message_id}")
    }

    fn get_record(&self, message_id: &str) -> Result<Option<FeedbackRecord>> {
        match self.db.get(Self::feedback_key(message_id))? {
            Some(val) => Ok(Some(serde_json::from_slice(&val).with_context(|| {
                format!("decoding feedback record for {message_id}")
            })?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &FeedbackRecord) -> Result<()> {
        let val = serde_json::to_vec(record)?;
        self.db.put(Self::feedback_key(&record.message_id), val)?;
        Ok(())
    }

    pub async fn load_feedback(&self, message_id: &str) -> Result<Option<FeedbackRecord>> {
        self.get_record(message_id)
    }

    /// Records for the ids that have one.
    pub async fn load_many(&self, message_ids: &[String]) -> Result<HashMap<String, FeedbackRecord>> {
        let mut out = HashMap::with_capacity(message_ids.len());
        for id in message_ids {
            if let Some(record) = self.get_record(id)? {
                out.insert(id.clone(), record);
            }
        }
        Ok(out)
    }

    /// Creates empty records for ids that have none. Existing records are untouched.
    pub async fn ensure_records(&self, message_ids: &[String]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut created = 0;
        for id in message_ids {
            if self.db.get(Self::feedback_key(id))?.is_none() {
                self.put_record(&FeedbackRecord::empty(id))?;
                created += 1;
            }
        }
        if created > 0 {
            debug!(created, "default feedback records created");
        }
        Ok(created)
    }

    /// Upserts one record: appends a non-blank comment and sets (or clears) the rating.
    pub async fn apply_update(
        &self,
        message_id: &str,
        update: &FeedbackUpdate,
    ) -> Result<FeedbackRecord> {
        let _guard = self.write_lock.lock().await;

        let mut record = self
            .get_record(message_id)?
            .unwrap_or_else(|| FeedbackRecord::empty(message_id));
        let now = chrono::Utc::now().timestamp();

        if let Some(text) = update.comment.as_deref().filter(|t| !t.trim().is_empty()) {
            record.comments.push(CommentEntry {
                text: text.to_string(),
                ts: now,
            });
        }
        if let Some(rating) = update.rating {
            record.feedback = rating;
        }
        record.updated_ts = now;

        self.put_record(&record)?;
        debug!(
            message_id,
            rating = ?record.feedback,
            comments = record.comments.len(),
            "feedback saved"
        );
        Ok(record)
    }

    pub async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let mut out = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(FEEDBACK_PREFIX.as_bytes(), Direction::Forward))
        {
            let (key, val) = item?;
            let k = str::from_utf8(&key)?;
            if !k.starts_with(FEEDBACK_PREFIX) {
                break;
            }
            out.push(serde_json::from_slice(&val)?);
        }
        Ok(out)
    }
}

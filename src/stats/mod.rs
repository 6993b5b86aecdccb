//! Dashboard aggregates computed from the archive and the feedback store.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ChatArchive;
use crate::model::{FeedbackRecord, Interaction, Rating};
use crate::timestamp::{from_epoch, parse_timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// `YYYY-MM-DD`, ISO `YYYY-Www` or `YYYY-MM`; these sort chronologically as strings.
    pub fn label(&self, at: &DateTime<Utc>) -> String {
        match self {
            Period::Day => at.format("%Y-%m-%d").to_string(),
            Period::Week => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Period::Month => at.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            other => Err(format!("unknown period: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_interactions: usize,
    pub active_users: usize,
    pub total_sessions: usize,
    pub total_messages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCounts {
    pub good: usize,
    pub bad: usize,
    pub neutral: usize,
}

impl RatingCounts {
    fn record(&mut self, rating: Option<Rating>) {
        match rating {
            Some(Rating::Good) => self.good += 1,
            Some(Rating::Bad) => self.bad += 1,
            None => self.neutral += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.good + self.bad + self.neutral
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub date: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRatio {
    pub user_id: String,
    pub good: usize,
    pub bad: usize,
    pub neutral: usize,
    pub total: usize,
    /// good / (good + bad); 0 when nothing is rated.
    pub good_ratio: f64,
}

/// Active users are those with at least one normalized message.
pub fn overall(archive: &ChatArchive, interactions: &[Interaction]) -> OverallStats {
    let mut per_user: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_messages = 0;
    for (user_id, session_id, _) in archive.sessions_iter() {
        let count = archive
            .messages(user_id, session_id)
            .map(|m| m.len())
            .unwrap_or(0);
        total_messages += count;
        *per_user.entry(user_id).or_default() += count;
    }

    OverallStats {
        total_interactions: interactions.len(),
        active_users: per_user.values().filter(|n| **n > 0).count(),
        total_sessions: archive.session_count(),
        total_messages,
    }
}

pub fn ratings(interactions: &[Interaction]) -> RatingCounts {
    let mut counts = RatingCounts::default();
    for interaction in interactions {
        counts.record(interaction.rating);
    }
    counts
}

fn into_buckets(counts: BTreeMap<String, usize>) -> Vec<Bucket> {
    counts
        .into_iter()
        .map(|(date, value)| Bucket { date, value })
        .collect()
}

/// Interactions per period; unparseable timestamps are skipped.
pub fn interactions_over_time(interactions: &[Interaction], period: Period) -> Vec<Bucket> {
    let mut counts = BTreeMap::new();
    for at in interactions.iter().filter_map(|i| parse_timestamp(&i.timestamp)) {
        *counts.entry(period.label(&at)).or_insert(0) += 1;
    }
    into_buckets(counts)
}

/// Comments written per period, by comment time.
pub fn comment_activity(records: &[FeedbackRecord], period: Period) -> Vec<Bucket> {
    let mut counts = BTreeMap::new();
    let times = records
        .iter()
        .flat_map(|r| r.comments.iter())
        .filter_map(|c| from_epoch(c.ts));
    for at in times {
        *counts.entry(period.label(&at)).or_insert(0) += 1;
    }
    into_buckets(counts)
}

pub fn user_ratios(interactions: &[Interaction]) -> Vec<UserRatio> {
    let mut per_user: BTreeMap<String, RatingCounts> = BTreeMap::new();
    for interaction in interactions {
        let user = interaction
            .user_name()
            .map(str::to_string)
            .or_else(|| interaction.id.split('_').next().map(str::to_string))
            .unwrap_or_default();
        per_user.entry(user).or_default().record(interaction.rating);
    }

    per_user
        .into_iter()
        .map(|(user_id, c)| {
            let rated = c.good + c.bad;
            UserRatio {
                good_ratio: if rated == 0 {
                    0.0
                } else {
                    c.good as f64 / rated as f64
                },
                total: c.total(),
                user_id,
                good: c.good,
                bad: c.bad,
                neutral: c.neutral,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommentEntry, InteractionUser};
    use serde_json::json;

    fn interaction(user: &str, ts: &str, rating: Option<Rating>) -> Interaction {
        Interaction {
            id: format!("{user}_s_0"),
            user_prompt: "q".into(),
            ai_response: "a".into(),
            timestamp: ts.into(),
            agents: Vec::new(),
            rating,
            comments: Vec::new(),
            user: Some(InteractionUser {
                name: user.into(),
                avatar: String::new(),
            }),
            sequence: 0,
        }
    }

    fn sample() -> Vec<Interaction> {
        vec![
            interaction("alice", "2024-01-30T10:00:00Z", Some(Rating::Good)),
            interaction("alice", "2024-02-01T10:00:00Z", Some(Rating::Bad)),
            interaction("alice", "2024-02-01T12:00:00Z", Some(Rating::Good)),
            interaction("bob", "Unknown time", None),
        ]
    }

    #[test]
    fn rating_distribution() {
        assert_eq!(
            ratings(&sample()),
            RatingCounts {
                good: 2,
                bad: 1,
                neutral: 1
            }
        );
    }

    #[test]
    fn buckets_by_period() {
        let monthly = interactions_over_time(&sample(), Period::Month);
        assert_eq!(
            monthly,
            vec![
                Bucket { date: "2024-01".into(), value: 1 },
                Bucket { date: "2024-02".into(), value: 2 },
            ]
        );

        let daily = interactions_over_time(&sample(), Period::Day);
        assert_eq!(daily.last().unwrap().date, "2024-02-01");
        assert_eq!(daily.last().unwrap().value, 2);

        // 2024-01-30 and 2024-02-01 fall in the same ISO week
        let weekly = interactions_over_time(&sample(), Period::Week);
        assert_eq!(weekly, vec![Bucket { date: "2024-W05".into(), value: 3 }]);
    }

    #[test]
    fn iso_week_crosses_year() {
        let at = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        assert_eq!(Period::Week.label(&at), "2020-W53");
    }

    #[test]
    fn comment_activity_uses_comment_time() {
        let ts = parse_timestamp("2024-03-05T08:00:00Z").unwrap().timestamp();
        let record = FeedbackRecord {
            message_id: "m".into(),
            feedback: None,
            comments: vec![
                CommentEntry { text: "a".into(), ts },
                CommentEntry { text: "b".into(), ts: ts + 86_400 },
            ],
            updated_ts: ts,
        };
        let buckets = comment_activity(&[record], Period::Day);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].date, "2024-03-05");
        assert_eq!(buckets[1].date, "2024-03-06");
    }

    #[test]
    fn ratios_per_user() {
        let ratios = user_ratios(&sample());
        assert_eq!(ratios.len(), 2);
        let alice = &ratios[0];
        assert_eq!(alice.user_id, "alice");
        assert_eq!((alice.good, alice.bad, alice.total), (2, 1, 3));
        assert!((alice.good_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(ratios[1].good_ratio, 0.0);
    }

    #[test]
    fn overall_counts_archive() {
        let archive = ChatArchive::from_value(json!({
            "alice": {"s1": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "yo"}]},
            "idle": {"s0": []}
        }));
        let interactions = archive.interactions();
        let stats = overall(&archive, &interactions);
        assert_eq!(
            stats,
            OverallStats {
                total_interactions: 1,
                active_users: 1,
                total_sessions: 2,
                total_messages: 2,
            }
        );
    }

    #[test]
    fn parses_periods() {
        assert_eq!("WEEK".parse::<Period>(), Ok(Period::Week));
        assert!("year".parse::<Period>().is_err());
        assert_eq!(Period::default(), Period::Month);
    }
}

//! UCBSelector: chooses the (template, time-slot) pair for the day's auto
//! post using a UCB1 multi-armed bandit over each template's historical
//! `avg_engagement_rate`, then materializes that choice as a
//! `DailyAutoSchedule` row, a DRAFT post, and a `generate` job.
//!
//! A template with fewer uses than the persisted `minTrialsPerTemplate` is
//! always selected (forced exploration) before the UCB1 formula is
//! consulted, so every template gets a fair initial sample of real
//! engagement data. Both that threshold and the exploration coefficient
//! `c` live on the `scheduler_config` singleton row, not as constants, so
//! an admin can retune exploration without a redeploy.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use uuid::Uuid;

use crate::error::{PreconditionError, WorkflowError};
use crate::queue::payloads::GenerateJobPayload;
use crate::queue::{self, EnqueueOptions};
use crate::store::templates::Template;
use crate::store::time_slots::TimeSlot;
use crate::store::{daily_auto_schedules, posts, scheduler_config, templates, time_slots, DbPool};

/// The template/time-slot pair chosen for one day, and the post it was
/// materialized into.
#[derive(Debug, Clone, PartialEq)]
pub struct UcbSelection {
    pub schedule_id: String,
    pub post_id: String,
    pub template_id: String,
    pub time_slot_id: String,
    pub scheduled_time: String,
    pub score: f64,
    pub was_exploration: bool,
}

/// Selects and materializes the daily auto-post schedule.
pub struct UcbSelector {
    pool: DbPool,
    timezone: Tz,
}

impl UcbSelector {
    pub fn new(pool: DbPool, timezone: Tz) -> Self {
        Self { pool, timezone }
    }

    /// Select a (template, time-slot) pair for `schedule_date`
    /// (`YYYY-MM-DD`, in the configured timezone) and persist it as a
    /// PENDING `DailyAutoSchedule`, a DRAFT post attached to it, and an
    /// enqueued `generate` job.
    pub async fn select_for_date(&self, schedule_date: &str) -> Result<UcbSelection, WorkflowError> {
        let date = NaiveDate::parse_from_str(schedule_date, "%Y-%m-%d").map_err(|_| {
            WorkflowError::Precondition(PreconditionError::Conflict {
                message: format!("invalid schedule_date '{schedule_date}'"),
            })
        })?;

        let candidates = templates::list_enabled(&self.pool).await?;
        if candidates.is_empty() {
            return Err(WorkflowError::Precondition(PreconditionError::Conflict {
                message: "no enabled templates to select from".to_string(),
            }));
        }

        let config = scheduler_config::get(&self.pool).await?;
        let min_trials = config.min_trials_per_template.max(0) as u32;
        let (template, score, was_exploration) = select_template(&candidates, min_trials, config.exploration_factor);

        let day_of_week = date.weekday().number_from_monday() as i64;
        let mut slots = time_slots::enabled_for_day(&self.pool, day_of_week).await?;
        if slots.is_empty() {
            slots = time_slots::list(&self.pool)
                .await?
                .into_iter()
                .filter(|s| s.enabled)
                .collect();
        }
        let slot = slots.first().cloned().ok_or_else(|| {
            WorkflowError::Precondition(PreconditionError::Conflict {
                message: "no enabled time slots configured".to_string(),
            })
        })?;

        let scheduled_time = self.instant_within_slot(date, &slot);
        let selection_reason = if was_exploration { "forced-exploration" } else { "ucb1" };

        let schedule_id = Uuid::new_v4().to_string();
        daily_auto_schedules::create(
            &self.pool,
            daily_auto_schedules::NewDailyAutoSchedule {
                id: &schedule_id,
                schedule_date,
                scheduled_time: &scheduled_time,
                selected_time_slot_id: &slot.id,
                selected_template_id: &template.id,
                ucb_score: score,
                selection_reason,
            },
        )
        .await?;

        let post_id = Uuid::new_v4().to_string();
        posts::create(
            &self.pool,
            posts::NewPost {
                id: &post_id,
                created_by: "ucb",
                template_id: Some(&template.id),
                threads_account_id: None,
                is_ai_generated: true,
                tags: &[],
                context: None,
                scheduled_for: Some(&scheduled_time),
            },
        )
        .await?;
        daily_auto_schedules::attach_post(&self.pool, &schedule_id, &post_id).await?;

        queue::enqueue(
            &self.pool,
            &Uuid::new_v4().to_string(),
            "generate",
            &GenerateJobPayload {
                post_id: post_id.clone(),
                style_preset: template.prompt.clone(),
                from_status: "DRAFT".to_string(),
                scheduled_time: Some(scheduled_time.clone()),
            },
            EnqueueOptions::default(),
        )
        .await?;

        Ok(UcbSelection {
            schedule_id,
            post_id,
            template_id: template.id.clone(),
            time_slot_id: slot.id.clone(),
            scheduled_time,
            score,
            was_exploration,
        })
    }

    /// Record a published post's observed engagement rate against its
    /// template, updating the running mean UCB1 reads on the next selection.
    pub async fn record_feedback(&self, template_id: &str, engagement_rate: f64) -> Result<(), WorkflowError> {
        templates::record_engagement(&self.pool, template_id, engagement_rate).await?;
        Ok(())
    }

    /// Pick a random minute within `slot`'s window on `date`, in the
    /// configured timezone, converted to UTC. If that instant has already
    /// passed, advance to the same slot the following day.
    fn instant_within_slot(&self, date: NaiveDate, slot: &TimeSlot) -> String {
        let window_minutes = ((slot.end_hour - slot.start_hour) * 60 + (slot.end_minute - slot.start_minute)).max(1);
        let offset = rand::thread_rng().gen_range(0..window_minutes);
        let total_minutes = slot.start_hour * 60 + slot.start_minute + offset;
        let hour = (total_minutes / 60).rem_euclid(24) as u32;
        let minute = (total_minutes % 60) as u32;

        let naive_time = date.and_hms_opt(hour, minute, 0).expect("hour/minute are bounds-checked");
        let local = self
            .timezone
            .from_local_datetime(&naive_time)
            .single()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&naive_time));
        let mut instant = local.with_timezone(&Utc);

        if instant <= Utc::now() {
            instant += Duration::days(1);
        }

        instant.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
    }
}

/// Choose the highest-scoring template, forcing exploration for any
/// template below `min_trials_per_template` uses. Ties are broken by
/// lowest `total_uses`, then lexicographically by id.
fn select_template(candidates: &[Template], min_trials_per_template: u32, exploration_c: f64) -> (&Template, f64, bool) {
    let total_pulls: i64 = candidates.iter().map(|t| t.total_uses).sum::<i64>() + 1;

    let mut best: Option<(&Template, f64, bool)> = None;
    for template in candidates {
        let (score, was_exploration) = if (template.total_uses as u32) < min_trials_per_template {
            (f64::INFINITY, true)
        } else {
            let exploration_bonus = exploration_c * ((total_pulls as f64).ln() / template.total_uses as f64).sqrt();
            (template.avg_engagement_rate + exploration_bonus, false)
        };

        best = Some(match best {
            None => (template, score, was_exploration),
            Some((current, current_score, current_exploration)) => {
                if score > current_score
                    || (score == current_score && template.total_uses < current.total_uses)
                    || (score == current_score && template.total_uses == current.total_uses && template.id < current.id)
                {
                    (template, score, was_exploration)
                } else {
                    (current, current_score, current_exploration)
                }
            }
        });
    }

    best.expect("candidates is non-empty, checked by caller")
}

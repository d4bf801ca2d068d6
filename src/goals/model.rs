use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::FieldErrors,
    resources::{
        fields::{self, nullable, Field},
        repo::Repository,
        PgQueryAs, Resource,
    },
    state::AppState,
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FitnessGoal {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub goal_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// `created_at` and `completed_at` are server-managed and not accepted.
#[derive(Debug, Default, Deserialize)]
pub struct GoalPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub goal_text: Field<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub completed: Field<bool>,
}

impl FitnessGoal {
    /// `completed_at` is set iff `completed`; the first completion time sticks
    /// until the goal is reopened.
    fn settle_completion(&mut self, now: OffsetDateTime) {
        if !self.completed {
            self.completed_at = None;
        } else if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }
}

impl Resource for FitnessGoal {
    type Payload = GoalPayload;

    const NAME: &'static str = "goal";
    const PATH: &'static str = "goals";
    const TABLE: &'static str = "fitness_goals";
    const COLUMNS: &'static [&'static str] = &["goal_text", "created_at", "completed", "completed_at"];
    const ORDER_BY: &'static str = "created_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.user_id
    }

    fn blank(id: Uuid, owner: Uuid, now: OffsetDateTime) -> Self {
        Self {
            id,
            user_id: owner,
            goal_text: String::new(),
            created_at: now,
            completed: false,
            completed_at: None,
        }
    }

    fn apply(&mut self, payload: GoalPayload, partial: bool, now: OffsetDateTime) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        let goal_text = fields::required(&mut errors, "goal_text", payload.goal_text, partial)
            .and_then(|t| fields::text(&mut errors, "goal_text", t, None));
        let completed = fields::optional(&mut errors, "completed", payload.completed);

        errors.into_result()?;
        if let Some(goal_text) = goal_text {
            self.goal_text = goal_text;
        }
        if let Some(completed) = completed {
            self.completed = completed;
        }
        self.settle_completion(now);
        Ok(())
    }

    fn bind_columns<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.goal_text.clone())
            .bind(self.created_at)
            .bind(self.completed)
            .bind(self.completed_at)
    }

    fn repository(state: &AppState) -> &Arc<dyn Repository<Self>> {
        &state.goals
    }

    fn ordered_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

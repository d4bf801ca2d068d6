use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::FieldErrors,
    resources::{
        fields::{self, nullable, Field, Rfc3339},
        repo::Repository,
        PgQueryAs, Resource,
    },
    state::AppState,
};

const NAME_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
    pub calories: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct MealPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub name: Field<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub calories: Field<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: Field<Rfc3339>,
}

impl Resource for Meal {
    type Payload = MealPayload;

    const NAME: &'static str = "meal";
    const PATH: &'static str = "meals";
    const TABLE: &'static str = "meals";
    const COLUMNS: &'static [&'static str] = &["name", "calories", "timestamp"];
    const ORDER_BY: &'static str = "timestamp";

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
            name: String::new(),
            calories: 0,
            timestamp: now,
        }
    }

    fn apply(&mut self, payload: MealPayload, partial: bool, _now: OffsetDateTime) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = fields::required(&mut errors, "name", payload.name, partial)
            .and_then(|n| fields::text(&mut errors, "name", n, Some(NAME_MAX_LEN)));
        let calories = fields::required(&mut errors, "calories", payload.calories, partial)
            .and_then(|c| fields::count(&mut errors, "calories", c));
        let timestamp = fields::optional(&mut errors, "timestamp", payload.timestamp);

        errors.into_result()?;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(calories) = calories {
            self.calories = calories;
        }
        if let Some(Rfc3339(ts)) = timestamp {
            self.timestamp = ts;
        }
        Ok(())
    }

    fn bind_columns<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.name.clone())
            .bind(self.calories)
            .bind(self.timestamp)
    }

    fn repository(state: &AppState) -> &Arc<dyn Repository<Self>> {
        &state.meals
    }

    fn ordered_at(&self) -> OffsetDateTime {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn payload(json: &str) -> MealPayload {
        serde_json::from_str(json).unwrap()
    }

    fn blank() -> Meal {
        Meal::blank(Uuid::new_v4(), Uuid::new_v4(), datetime!(2024-05-01 12:00 UTC))
    }

    #[test]
    fn create_requires_name_and_calories() {
        let errors = blank().apply(payload("{}"), false, OffsetDateTime::now_utc()).unwrap_err();
        assert_eq!(errors.get("name").unwrap(), [fields::REQUIRED]);
        assert_eq!(errors.get("calories").unwrap(), [fields::REQUIRED]);
    }

    #[test]
    fn create_keeps_default_timestamp_unless_given() {
        let mut meal = blank();
        meal.apply(payload(r#"{"name": " Lunch ", "calories": 650}"#), false, OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(meal.name, "Lunch");
        assert_eq!(meal.calories, 650);
        assert_eq!(meal.timestamp, datetime!(2024-05-01 12:00 UTC));

        meal.apply(payload(r#"{"timestamp": "2024-05-02T08:30:00Z"}"#), true, OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(meal.timestamp, datetime!(2024-05-02 08:30 UTC));
    }

    #[test]
    fn negative_calories_and_blank_name_are_rejected() {
        let mut meal = blank();
        let errors = meal
            .apply(payload(r#"{"name": "  ", "calories": -10}"#), false, OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(errors.get("name").unwrap(), [fields::NOT_BLANK]);
        assert!(errors.get("calories").is_some());
        assert_eq!(meal.name, "");
    }

    #[test]
    fn failed_update_leaves_record_untouched() {
        let mut meal = blank();
        meal.apply(payload(r#"{"name": "Dinner", "calories": 800}"#), false, OffsetDateTime::now_utc())
            .unwrap();
        let err = meal.apply(payload(r#"{"name": "Snack", "calories": null}"#), true, OffsetDateTime::now_utc());
        assert!(err.is_err());
        assert_eq!(meal.name, "Dinner");
        assert_eq!(meal.calories, 800);
    }

    #[test]
    fn serialized_meal_hides_owner_id() {
        let meal = blank();
        let json = serde_json::to_value(&meal).unwrap();
        assert!(json.get("user_id").is_none());
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}

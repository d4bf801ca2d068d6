use std::sync::Arc;

use rust_decimal::Decimal;
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

// NUMERIC(5, 2)
const WEIGHT_DIGITS: u32 = 5;
const WEIGHT_PLACES: u32 = 2;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthMetric {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub weight: Option<Decimal>,
    pub steps: Option<i32>,
    pub heart_rate: Option<i32>, // beats per minute
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub weight: Field<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub steps: Field<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub heart_rate: Field<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: Field<Rfc3339>,
}

impl Resource for HealthMetric {
    type Payload = MetricPayload;

    const NAME: &'static str = "metric";
    const PATH: &'static str = "metrics";
    const TABLE: &'static str = "health_metrics";
    const COLUMNS: &'static [&'static str] = &["weight", "steps", "heart_rate", "timestamp"];
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
            weight: None,
            steps: None,
            heart_rate: None,
            timestamp: now,
        }
    }

    // Every measurement is optional and nullable, so `partial` changes nothing here.
    fn apply(&mut self, payload: MetricPayload, _partial: bool, _now: OffsetDateTime) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        let weight = payload.weight.map(|w| {
            w.and_then(|w| fields::decimal(&mut errors, "weight", w, WEIGHT_DIGITS, WEIGHT_PLACES))
        });
        let steps = payload
            .steps
            .map(|s| s.and_then(|s| fields::count(&mut errors, "steps", s)));
        let heart_rate = payload
            .heart_rate
            .map(|h| h.and_then(|h| fields::count(&mut errors, "heart_rate", h)));
        let timestamp = fields::optional(&mut errors, "timestamp", payload.timestamp);

        errors.into_result()?;
        if let Some(weight) = weight {
            self.weight = weight;
        }
        if let Some(steps) = steps {
            self.steps = steps;
        }
        if let Some(heart_rate) = heart_rate {
            self.heart_rate = heart_rate;
        }
        if let Some(Rfc3339(ts)) = timestamp {
            self.timestamp = ts;
        }
        Ok(())
    }

    fn bind_columns<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.weight)
            .bind(self.steps)
            .bind(self.heart_rate)
            .bind(self.timestamp)
    }

    fn repository(state: &AppState) -> &Arc<dyn Repository<Self>> {
        &state.metrics
    }

    fn ordered_at(&self) -> OffsetDateTime {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> MetricPayload {
        serde_json::from_str(json).unwrap()
    }

    fn blank() -> HealthMetric {
        HealthMetric::blank(Uuid::new_v4(), Uuid::new_v4(), OffsetDateTime::now_utc())
    }

    #[test]
    fn empty_metric_is_valid() {
        let mut metric = blank();
        metric.apply(payload("{}"), false, OffsetDateTime::now_utc()).unwrap();
        assert!(metric.weight.is_none() && metric.steps.is_none() && metric.heart_rate.is_none());
    }

    #[test]
    fn negative_steps_are_rejected() {
        let errors = blank()
            .apply(payload(r#"{"steps": -5}"#), false, OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(
            errors.get("steps").unwrap(),
            ["Ensure this value is greater than or equal to 0."]
        );
    }

    #[test]
    fn weight_accepts_number_or_string_and_keeps_two_places() {
        let mut metric = blank();
        metric.apply(payload(r#"{"weight": 72.5}"#), false, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(metric.weight.unwrap().to_string(), "72.50");

        metric.apply(payload(r#"{"weight": "80.1"}"#), true, OffsetDateTime::now_utc()).unwrap();
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["weight"], "80.10");
    }

    #[test]
    fn explicit_null_clears_a_measurement() {
        let mut metric = blank();
        metric.apply(payload(r#"{"steps": 9000, "heart_rate": 61}"#), false, OffsetDateTime::now_utc())
            .unwrap();
        metric.apply(payload(r#"{"steps": null}"#), true, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(metric.steps, None);
        assert_eq!(metric.heart_rate, Some(61));
    }

    #[test]
    fn timestamp_may_not_be_null() {
        let errors = blank()
            .apply(payload(r#"{"timestamp": null}"#), true, OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(errors.get("timestamp").unwrap(), [fields::NOT_NULL]);
    }
}

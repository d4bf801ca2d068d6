pub mod model;

pub use model::FitnessGoal;

use crate::{resources::handlers, state::AppState};
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::router::<FitnessGoal>()
}

pub mod model;

pub use model::Meal;

use crate::{resources::handlers, state::AppState};
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::router::<Meal>()
}

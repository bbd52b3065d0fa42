pub mod routes;
pub mod state;
pub mod view;

use axum::Router;
use calc::Calculator;

pub fn app(calculator: Calculator) -> Router {
    routes::router(state::AppState::new(calculator))
}

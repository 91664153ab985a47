//! Department catalog.

use axum::{Router, routing::get};
use janta_db::entities::Department;

use crate::{middleware::AppState, response::ApiResponse};

async fn list_departments() -> ApiResponse<Vec<&'static str>> {
    ApiResponse::ok(Department::ALL.iter().map(|d| d.display_name()).collect())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_departments))
}

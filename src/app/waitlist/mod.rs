use axum::{
    routing::{delete, get, post},
    Router,
};

use super::AppState;

mod bulk;
pub mod route;
pub mod schema;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/waitlist/join", post(route::join))
        .route("/waitlist/count", get(route::count))
        .route("/waitlist/subscribers", get(route::list_subscribers))
        .route("/waitlist/subscriber", delete(route::delete_without_email))
        .route("/waitlist/subscriber/:email", delete(route::delete_subscriber))
        .route("/waitlist/bulk-email", post(route::bulk_email))
}

pub mod auth;
pub mod campaigns;
pub mod events;
pub mod leads;
pub mod shuffle;
pub mod users;

use axum::Json;

use super::response::ApiMessage;

pub async fn health() -> Json<ApiMessage> {
    ApiMessage::ok("ok")
}

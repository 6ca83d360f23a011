use crate::research::{EventSink, ResearchEvent, ResearchRequest};
use crate::server::ServerState;
use rocket::http::Status;
use rocket::post;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResearchErrorResponse {
    pub message: String,
    pub error_type: String,
}

#[post("/research", format = "json", data = "<request>")]
pub async fn handle_research(
    state: &State<ServerState>,
    request: Json<ResearchRequest>,
) -> Result<EventStream![], (Status, Json<ResearchErrorResponse>)> {
    let request = request.into_inner();
    if let Err(e) = request.validate(state.max_depth, state.max_breadth) {
        tracing::debug!(error = %e, "rejected research request");
        return Err((
            Status::BadRequest,
            Json(ResearchErrorResponse {
                message: e.to_string(),
                error_type: "invalid_request".to_string(),
            }),
        ));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ResearchEvent>();
    let failure_tx = tx.clone();
    let researcher = state.researcher.clone();
    let run = tokio::spawn(async move {
        // Failures were already streamed as an `error` event.
        let _ = researcher.start_research(&request, &tx).await;
    });
    // A panicking run never reaches its own `error` event.
    tokio::spawn(async move {
        if let Err(e) = run.await {
            tracing::error!(error = %e, "research run aborted");
            failure_tx.emit(ResearchEvent::Error(
                "Research run aborted unexpectedly".to_string(),
            ));
        }
    });

    Ok(EventStream! {
        while let Some(event) = rx.recv().await {
            yield Event::json(&event).event(event.event_type());
        }
    })
}

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Tilebeat API.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::session::create_game,
        crate::routes::session::process_game_prompt,
        crate::routes::session::join_game,
        crate::routes::session::start_game,
        crate::routes::session::submit_answer,
        crate::routes::session::end_game,
        crate::routes::session::get_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateGameRequest,
            crate::dto::session::PromptGameRequest,
            crate::dto::session::GameIdRequest,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::SessionView,
            crate::dto::session::TileView,
            crate::dto::session::PlayerView,
            crate::dto::session::SubmitAnswerResponse,
            crate::dto::session::EndedGame,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::PlayerPresence,
            crate::dto::ws::ErrorPayload,
            crate::state::session::Difficulty,
            crate::state::state_machine::SessionState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session lifecycle actions"),
        (name = "realtime", description = "WebSocket session updates"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_action() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/create-game",
            "/api/process-game-prompt",
            "/api/join-game",
            "/api/start-game",
            "/api/submit-answer",
            "/api/end-game",
            "/api/game",
            "/healthcheck",
            "/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

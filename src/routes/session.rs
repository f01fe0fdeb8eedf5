use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::session::{
        ApiResponse, CreateGameRequest, EndedGame, GameIdRequest, GameQuery, PromptGameRequest,
        SessionView, SubmitAnswerRequest, SubmitAnswerResponse,
    },
    error::AppError,
    routes::extract::{PlayerHeaders, ValidJson, ValidQuery},
    services::session_service,
    state::SharedState,
};

/// Session actions. The caller is identified by the `player-id` header.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/create-game", post(create_game))
        .route("/api/process-game-prompt", post(process_game_prompt))
        .route("/api/join-game", post(join_game))
        .route("/api/start-game", post(start_game))
        .route("/api/submit-answer", post(submit_answer))
        .route("/api/end-game", post(end_game))
        .route("/api/game", get(get_game))
}

/// Build a board from explicit filters and open a new session.
#[utoipa::path(
    post,
    path = "/api/create-game",
    tag = "session",
    request_body = CreateGameRequest,
    params(
        ("player-id" = String, Header, description = "Identifier of the creator"),
        ("player-name" = Option<String>, Header, description = "Display name of the creator")
    ),
    responses(
        (status = 200, description = "Session created", body = ApiResponse<SessionView>),
        (status = 400, description = "Invalid filters"),
        (status = 502, description = "No tracks could be acquired")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidJson(payload): ValidJson<CreateGameRequest>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let session =
        session_service::create_session(&state, payload.into(), &player.id, &player.name).await?;
    let view = session_service::to_view(&session, &player.id);
    Ok(Json(ApiResponse::ok("Game created", view)))
}

/// Build a board from a free-text description and open a new session.
#[utoipa::path(
    post,
    path = "/api/process-game-prompt",
    tag = "session",
    request_body = PromptGameRequest,
    params(
        ("player-id" = String, Header, description = "Identifier of the creator"),
        ("player-name" = Option<String>, Header, description = "Display name of the creator")
    ),
    responses(
        (status = 200, description = "Session created", body = ApiResponse<SessionView>),
        (status = 502, description = "No tracks could be acquired")
    )
)]
pub async fn process_game_prompt(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidJson(payload): ValidJson<PromptGameRequest>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let session = session_service::create_session_from_prompt(
        &state,
        &payload.prompt,
        &player.id,
        &player.name,
    )
    .await?;
    let view = session_service::to_view(&session, &player.id);
    Ok(Json(ApiResponse::ok("Game created", view)))
}

/// Join an unstarted session.
#[utoipa::path(
    post,
    path = "/api/join-game",
    tag = "session",
    request_body = GameIdRequest,
    params(
        ("player-id" = String, Header, description = "Identifier of the joining player"),
        ("player-name" = Option<String>, Header, description = "Display name of the joining player")
    ),
    responses(
        (status = 200, description = "Joined", body = ApiResponse<SessionView>),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session started or full")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidJson(payload): ValidJson<GameIdRequest>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let session =
        session_service::join_session(&state, payload.game_id, &player.id, &player.name).await?;
    let view = session_service::to_view(&session, &player.id);
    Ok(Json(ApiResponse::ok("Joined game", view)))
}

/// Start the session. Creator only.
#[utoipa::path(
    post,
    path = "/api/start-game",
    tag = "session",
    request_body = GameIdRequest,
    params(("player-id" = String, Header, description = "Identifier of the creator")),
    responses(
        (status = 200, description = "Started", body = ApiResponse<SessionView>),
        (status = 403, description = "Caller is not the creator"),
        (status = 409, description = "Session already started")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidJson(payload): ValidJson<GameIdRequest>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let session = session_service::start_session(&state, payload.game_id, &player.id).await?;
    let view = session_service::to_view(&session, &player.id);
    Ok(Json(ApiResponse::ok("Game started", view)))
}

/// Answer a tile on the caller's turn.
#[utoipa::path(
    post,
    path = "/api/submit-answer",
    tag = "session",
    request_body = SubmitAnswerRequest,
    params(("player-id" = String, Header, description = "Identifier of the answering player")),
    responses(
        (status = 200, description = "Answer recorded", body = ApiResponse<SubmitAnswerResponse>),
        (status = 404, description = "Unknown session or tile"),
        (status = 409, description = "Out of turn, tile closed or session not in progress")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidJson(payload): ValidJson<SubmitAnswerRequest>,
) -> Result<Json<ApiResponse<SubmitAnswerResponse>>, AppError> {
    let (session, is_correct) = session_service::submit_answer(
        &state,
        payload.game_id,
        &player.id,
        &payload.tile_id,
        &payload.answer,
    )
    .await?;
    let message = if is_correct {
        "Correct answer"
    } else {
        "Incorrect answer"
    };
    let response = SubmitAnswerResponse {
        board: session_service::to_view(&session, &player.id),
        is_correct,
    };
    Ok(Json(ApiResponse::ok(message, response)))
}

/// Delete the session. Ending an unknown session succeeds.
#[utoipa::path(
    post,
    path = "/api/end-game",
    tag = "session",
    request_body = GameIdRequest,
    responses((status = 200, description = "Session deleted", body = ApiResponse<EndedGame>))
)]
pub async fn end_game(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<GameIdRequest>,
) -> Result<Json<ApiResponse<EndedGame>>, AppError> {
    session_service::end_session(&state, payload.game_id).await?;
    let ended = EndedGame {
        game_id: payload.game_id,
    };
    Ok(Json(ApiResponse::ok("Game ended", ended)))
}

/// Current view of a session for the caller.
#[utoipa::path(
    get,
    path = "/api/game",
    tag = "session",
    params(
        ("gameId" = uuid::Uuid, Query, description = "Identifier of the session"),
        ("player-id" = String, Header, description = "Identifier of the viewer")
    ),
    responses(
        (status = 200, description = "Session view", body = ApiResponse<SessionView>),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    player: PlayerHeaders,
    ValidQuery(query): ValidQuery<GameQuery>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let view = session_service::get_session(&state, query.game_id, &player.id).await?;
    Ok(Json(ApiResponse::ok("Game loaded", view)))
}

/// Track acquisition, preview resolution and difficulty tiering.
pub mod board;
/// Fan-out of session events to WebSocket subscribers.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Fuzzy answer matching.
pub mod matcher;
/// Session lifecycle, turns and scoring.
pub mod session_service;
/// KV backend connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;

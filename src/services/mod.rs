/// Single-writer queue feeding game commands to one worker.
pub mod command_queue;
/// OpenAPI documentation generation.
pub mod documentation;
/// Session lifecycle: start, rounds, answers and scoring.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Participant registry management.
pub mod participant_service;
/// Public service for read-only game information.
pub mod public_service;
/// Theme and question bank management.
pub mod question_service;
/// Per-round countdown task.
pub mod round_timer;
/// Broadcast gateway mapping domain changes to SSE events.
pub mod sse_events;
/// Server-Sent Events subscription and admin token handling.
pub mod sse_service;
/// Score aggregator over archived sessions.
pub mod stats_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
/// Player WebSocket connection handling.
pub mod websocket_service;

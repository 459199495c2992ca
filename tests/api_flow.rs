use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use trivia_show_back::{
    config::AppConfig,
    dao::game_store::MemoryGameStore,
    routes,
    services::command_queue,
    state::{AppState, SharedState},
};

async fn app() -> (Router, SharedState) {
    let config = AppConfig::from_json(
        r#"{ "total_rounds": 1, "question_duration_ms": 60000, "timer_tick_ms": 5000 }"#,
    )
    .unwrap();
    let state = AppState::new(config);
    state
        .install_game_store(Arc::new(MemoryGameStore::new()))
        .await;
    command_queue::spawn_worker(state.clone()).unwrap();
    (routes::router(state.clone()), state)
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Open the admin stream and pull the token out of its first event.
async fn claim_admin_token(router: &Router) -> (String, Body) {
    let response = send(router, get("/sse/admin", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();

    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("admin stream produced an event")
        .unwrap()
        .unwrap();
    let chunk = frame.into_data().unwrap();
    let text = std::str::from_utf8(&chunk).unwrap().to_string();
    assert!(text.contains("event: admin_token"), "unexpected frame {text}");

    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let envelope: Value = serde_json::from_str(data).unwrap();
    let token = envelope["data"]["token"].as_str().unwrap().to_string();
    (token, body)
}

#[tokio::test]
async fn admin_routes_require_the_stream_token() {
    let (router, _state) = app().await;

    let missing = send(&router, get("/admin/participants", None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let (token, _stream) = claim_admin_token(&router).await;
    let wrong = send(&router, get("/admin/participants", Some("not-the-token"))).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = send(&router, get("/admin/participants", Some(&token))).await;
    assert_eq!(ok.status(), StatusCode::OK);

    let second = send(&router, get("/sse/admin", None)).await;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_one_round_show_from_registration_to_statistics() {
    let (router, _state) = app().await;
    let (token, _stream) = claim_admin_token(&router).await;
    let token = Some(token.as_str());

    let mut participant_ids = Vec::new();
    for name in ["Ana", "Bia", "Caio"] {
        let response = send(
            &router,
            json_request(
                Method::POST,
                "/admin/participants",
                token,
                json!({ "name": name, "city": "Recife", "state": "PE" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        participant_ids.push(body_json(response).await["id"].as_str().unwrap().to_string());
    }

    let blank = send(
        &router,
        json_request(
            Method::POST,
            "/admin/participants",
            token,
            json!({ "name": "   ", "city": "Recife", "state": "PE" }),
        ),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let question = send(
        &router,
        json_request(
            Method::POST,
            "/admin/questions",
            token,
            json!({
                "text": "Capital of Pernambuco?",
                "option_a": "Recife",
                "option_b": "Natal",
                "option_c": "Maceio",
                "correct_answer": "A",
                "difficulty": "easy"
            }),
        ),
    )
    .await;
    assert_eq!(question.status(), StatusCode::CREATED);

    let too_few = send(
        &router,
        json_request(
            Method::POST,
            "/admin/game/start",
            token,
            json!({ "participant_ids": &participant_ids[..2] }),
        ),
    )
    .await;
    assert_eq!(too_few.status(), StatusCode::BAD_REQUEST);

    let started = send(
        &router,
        json_request(
            Method::POST,
            "/admin/game/start",
            token,
            json!({ "participant_ids": participant_ids }),
        ),
    )
    .await;
    assert_eq!(started.status(), StatusCode::CREATED);
    let session = body_json(started).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["status"], "active");
    assert_eq!(session["participants"][0]["name"], "Ana");

    let conflict = send(
        &router,
        json_request(
            Method::DELETE,
            &format!("/admin/participants/{}", participant_ids[0]),
            token,
            Value::Null,
        ),
    )
    .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let round = send(
        &router,
        json_request(
            Method::POST,
            &format!("/admin/game/{session_id}/rounds"),
            token,
            json!({ "round_number": 1 }),
        ),
    )
    .await;
    assert_eq!(round.status(), StatusCode::OK);
    let round = body_json(round).await;
    assert_eq!(round["round_status"], "active");
    let question_id = round["current_question"]["id"].as_str().unwrap().to_string();
    assert_eq!(round["current_question"]["correct_answer"], "A");

    let public = body_json(send(&router, get("/public/state", None)).await).await;
    assert!(public["current_question"].get("correct_answer").is_none());

    let answer = |participant: &str, choice: &str| {
        json_request(
            Method::POST,
            "/public/answers",
            None,
            json!({ "participant_id": participant, "question_id": question_id, "answer": choice }),
        )
    };

    let accepted = send(&router, answer(participant_ids[0].as_str(), "A")).await;
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(body_json(accepted).await["question_id"], question_id.as_str());

    let duplicate = send(&router, answer(participant_ids[0].as_str(), "B")).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let duplicate = body_json(duplicate).await;
    assert_eq!(duplicate["type"], "answer:rejected");
    assert_eq!(duplicate["reason"], "duplicate");

    let second = send(&router, answer(participant_ids[1].as_str(), "B")).await;
    assert_eq!(second.status(), StatusCode::OK);
    // The last answer closes the round, and the only round closes the game.
    let third = send(&router, answer(participant_ids[2].as_str(), "A")).await;
    assert_eq!(third.status(), StatusCode::OK);

    let no_session = send(&router, get("/public/state", None)).await;
    assert_eq!(no_session.status(), StatusCode::NOT_FOUND);

    let phase = body_json(send(&router, get("/public/phase", None)).await).await;
    assert_eq!(phase["phase"], "finished");

    let archived = body_json(
        send(
            &router,
            get(&format!("/public/sessions/{session_id}/state"), None),
        )
        .await,
    )
    .await;
    assert_eq!(archived["status"], "finished");
    assert_eq!(archived["winner_id"], participant_ids[0].as_str());
    let scores: Vec<u64> = archived["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|seat| seat["score"].as_u64().unwrap())
        .collect();
    assert_eq!(scores, vec![10, 0, 10]);

    let stats = body_json(send(&router, get("/public/statistics", None)).await).await;
    assert_eq!(stats["global"]["sessions"], 1);
    assert_eq!(stats["global"]["highest_score"], 10);
    assert_eq!(stats["participants"].as_array().unwrap().len(), 3);
    assert_eq!(stats["participants"][0]["wins"], 1);

    let listed = body_json(send(&router, get("/admin/sessions?status=finished", token)).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn healthcheck_reports_the_store_state() {
    let (router, _state) = app().await;
    let health = body_json(send(&router, get("/healthcheck", None)).await).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["active_session_id"], Value::Null);
}

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        app::{app_handler, shared_handler},
        assessments::assessments_handler,
        auth::auth_handler,
        questions::questions_handler,
        reports::reports_handler,
        users::users_handler,
    },
    middleware::auth,
};

pub fn create_router(app_state: AppState) -> Router {
    let authenticated = Router::new()
        .nest("/users", users_handler())
        .nest("/questions", questions_handler())
        .nest("/assessments", assessments_handler())
        .nest("/reports", reports_handler())
        .nest("/app", app_handler())
        .layer(middleware::from_fn_with_state(app_state.clone(), auth));

    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/shared", shared_handler())
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::{ReportExt, UserExt},
        mail::Mailer,
        models::{User, UserRole},
        service::{
            self,
            fixtures::{World, world},
        },
        storage::SnapshotStore,
        utils::{password, token},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    struct TestApp {
        router: Router,
        world: World,
        state: AppState,
        _uploads: TempDir,
    }

    fn test_config(uploads_dir: &str) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: SECRET.to_string(),
            jwt_maxage: 900,
            port: 8000,
            frontend_url: "http://localhost:3000".to_string(),
            uploads_dir: uploads_dir.to_string(),
            default_user: "admin".to_string(),
            default_email: "admin@example.com".to_string(),
            default_password: "a long password!".to_string(),
            smtp: None,
        }
    }

    async fn test_app() -> TestApp {
        let world = world().await;
        let uploads = tempfile::tempdir().unwrap();
        let config = test_config(&uploads.path().to_string_lossy());
        let state = AppState {
            env: Arc::new(config),
            db_client: world.db.clone(),
            mailer: Mailer::default(),
            store: SnapshotStore::new(uploads.path()),
        };
        TestApp {
            router: create_router(state.clone()),
            world,
            state,
            _uploads: uploads,
        }
    }

    fn bearer(user: &User) -> String {
        let access_token = token::create_token(&user.id, SECRET.as_bytes(), 900).unwrap();
        format!("Bearer {}", access_token)
    }

    fn request(
        method: &str,
        uri: &str,
        actor: Option<&User>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(header::AUTHORIZATION, bearer(actor));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = test_app().await;
        let (status, body) = send(&app.router, request("GET", "/api/users/me", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "fail");

        let mut req = request("GET", "/api/users/me", None, None);
        req.headers_mut()
            .insert(header::AUTHORIZATION, "Bearer not-a-token".parse().unwrap());
        let (status, _) = send(&app.router, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_hides_the_password_hash() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            request("GET", "/api/users/me", Some(&app.world.alice), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn login_sets_cookie_and_token_check_reads_it() {
        let app = test_app().await;
        let hashed = password::hash("a long password!").unwrap();
        app.world
            .db
            .save_user("root", "root@example.com", &hashed, UserRole::Admin)
            .await
            .unwrap();

        let response = app
            .router
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"identifier": "root@example.com", "password": "a long password!"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("access_token="));
        assert!(cookie.contains("HttpOnly"));

        let pair = cookie.split(';').next().unwrap().to_string();
        let check = Request::builder()
            .uri("/api/auth/token-check")
            .header(header::COOKIE, pair)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, check).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_status"], "ok");
    }

    #[tokio::test]
    async fn wrong_password_is_bad_request() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"identifier": "alice", "password": "nope"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email or password is wrong");
    }

    #[tokio::test]
    async fn deleted_user_token_is_not_renewed() {
        let app = test_app().await;
        let bob = &app.world.bob;
        let (status, _) = send(
            &app.router,
            request("GET", "/api/auth/token-renew", Some(bob), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        app.world.db.delete_user(&bob.id).await.unwrap();
        let (status, _) = send(&app.router, request("GET", "/api/users/me", Some(bob), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = send(
            &app.router,
            request("GET", "/api/auth/token-renew", Some(bob), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("access_token").is_none());
    }

    #[tokio::test]
    async fn plain_users_are_kept_out_of_manager_routes() {
        let app = test_app().await;
        let alice = &app.world.alice;
        for uri in ["/api/questions/categories", "/api/users", "/api/assessments", "/api/reports"] {
            let (status, _) = send(&app.router, request("GET", uri, Some(alice), None)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }

        let (status, _) = send(
            &app.router,
            request(
                "POST",
                "/api/assessments",
                Some(alice),
                Some(json!({"name": "Mine", "owner_id": alice.id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_body_is_rejected_before_the_service() {
        let app = test_app().await;
        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/api/assessments",
                Some(&app.world.coach),
                Some(json!({"name": "", "owner_id": app.world.alice.id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn questionnaire_walkthrough_over_http() {
        let app = test_app().await;
        let (coach, alice, bob) = (&app.world.coach, &app.world.alice, &app.world.bob);

        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/api/assessments",
                Some(coach),
                Some(json!({"name": "Q1 Review", "owner_id": alice.id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let assessment_id = body["assessment"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/assessments/{assessment_id}/questions/0/1");
        let (status, body) = send(&app.router, request("GET", &uri, Some(alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["previous"].is_null());
        assert_eq!(body["next"], json!({"category_order": 0, "question_order": 2}));
        let answer_id = body["current"]["answer_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app.router,
            request(
                "PUT",
                &format!("/api/assessments/answers/{answer_id}"),
                Some(alice),
                Some(json!({"answer_option": "yes", "answer_description": "done"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"]["answer_option"], "yes");

        let uri = format!("/api/assessments/{assessment_id}/categories/12");
        let (status, body) = send(&app.router, request("GET", &uri, Some(alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"].as_array().unwrap().len(), 4);
        assert_eq!(body["previous_category"], 11);
        assert!(body["next_category"].is_null());

        let (status, _) = send(
            &app.router,
            request("GET", &format!("/api/assessments/{assessment_id}"), Some(bob), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app.router, request("GET", "/api/app/assessments", Some(alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], 1);
        assert_eq!(body["assessments"][0]["has_reports"], false);
    }

    #[tokio::test]
    async fn note_null_clears_content() {
        let app = test_app().await;
        let coach = &app.world.coach;
        let assessment =
            service::assessment::create(&app.world.db, "A", &app.world.alice.id, coach)
                .await
                .unwrap();

        let uri = format!("/api/assessments/{}/notes/3", assessment.id);
        let (_, body) = send(&app.router, request("GET", &uri, Some(coach), None)).await;
        let note_id = body["note"]["id"].as_i64().unwrap();
        let uri = format!("/api/assessments/notes/{note_id}");

        let (status, body) = send(
            &app.router,
            request("PUT", &uri, Some(coach), Some(json!({"content": {"text": "hi"}}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["note"]["content"]["text"], "hi");

        let (status, body) = send(&app.router, request("GET", &uri, Some(coach), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["note"]["category_order"], 3);
        assert_eq!(body["note"]["content"]["text"], "hi");

        let (status, _) =
            send(&app.router, request("GET", &uri, Some(&app.world.alice), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app.router,
            request("GET", "/api/assessments/notes/999999", Some(coach), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(
            &app.router,
            request("PUT", &uri, Some(coach), Some(json!({"content": null}))),
        )
        .await;
        assert!(body["note"]["content"].is_null());
    }

    #[tokio::test]
    async fn published_report_is_shared_by_key() {
        let app = test_app().await;
        let (admin, alice, bob) = (&app.world.admin, &app.world.alice, &app.world.bob);
        let assessment = service::assessment::create(&app.world.db, "Q1 Review", &alice.id, admin)
            .await
            .unwrap();

        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/api/reports",
                Some(admin),
                Some(json!({"assessment_id": assessment.id, "name": "Q1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let report_id = body["report"]["id"].as_str().unwrap().to_string();
        let share_key = body["report"]["share_key"].as_str().unwrap().to_string();

        // drafts stay hidden from the owner and from share links
        let shared_uri = format!("/api/shared/{share_key}");
        let (status, _) = send(&app.router, request("GET", &shared_uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app.router,
            request("GET", &format!("/api/app/reports/{report_id}"), Some(alice), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app.router,
            request(
                "PUT",
                &format!("/api/reports/{report_id}/publish"),
                Some(admin),
                Some(json!({"is_public": true})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["is_public"], true);
        // no SMTP in tests
        assert!(body["mail_warning"].is_string());

        let (status, body) = send(
            &app.router,
            request("GET", &format!("/api/app/reports/{report_id}"), Some(alice), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["assessment_name"], "Q1 Review");

        let (status, _) = send(
            &app.router,
            request("GET", &format!("/api/app/reports/{report_id}"), Some(bob), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let response = app
            .router
            .clone()
            .oneshot(request("GET", &format!("/api/shared/{share_key}/wheel"), None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("<svg"));
    }

    #[tokio::test]
    async fn deleted_report_is_gone_with_its_wheel() {
        let app = test_app().await;
        let admin = &app.world.admin;
        let assessment =
            service::assessment::create(&app.world.db, "A", &app.world.alice.id, admin)
                .await
                .unwrap();
        let report =
            service::report::create(&app.world.db, &app.state.store, &assessment.id, "R", admin)
                .await
                .unwrap();
        assert!(app.state.store.exists(&report.wheel_filename).await);

        let (status, _) = send(
            &app.router,
            request("DELETE", &format!("/api/reports/{}", report.id), Some(admin), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!app.state.store.exists(&report.wheel_filename).await);
        assert!(app.world.db.get_report(&report.id).await.is_err());

        let (status, _) = send(
            &app.router,
            request("GET", &format!("/api/reports/{}", report.id), Some(admin), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

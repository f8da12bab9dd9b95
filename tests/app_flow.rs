//! サインアップからログ一覧までの一連の流れを、モックした
//! Supabase プロジェクトに対して検証する

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quran_read_tracker::app::{App, AuthView, SignUpForm};
use quran_read_tracker::config::TrackerConfig;
use quran_read_tracker::location::{FixedPosition, Position};

fn confirmed_user(user_id: &str) -> serde_json::Value {
    json!({
        "id": user_id,
        "email": "reader@example.com",
        "email_confirmed_at": "2024-01-01T00:00:00Z",
        "app_metadata": {},
        "user_metadata": { "full_name": "Test Reader", "its": "40239713" },
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

fn session_for(user_id: &str) -> serde_json::Value {
    json!({
        "access_token": "test_access_token",
        "refresh_token": "test_refresh_token",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": confirmed_user(user_id)
    })
}

#[tokio::test]
async fn sign_up_then_sign_in_submit_and_aggregate() {
    let server = MockServer::start().await;

    // サインアップはメール確認待ちのユーザーを返す
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "reader@example.com",
            "data": { "full_name": "Test Reader", "its": "40239713" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "email": "reader@example.com",
            "email_confirmed_at": null,
            "app_metadata": {},
            "user_metadata": { "full_name": "Test Reader", "its": "40239713" },
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_email_by_its"))
        .and(body_partial_json(json!({ "p_its": "40239713" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("reader@example.com")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_for("user-1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(confirmed_user("user-1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "full_name": "Test Reader",
            "its": "40239713",
            "is_admin": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_all_read_logs_admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // 初回は空、投稿後は3件返す
    Mock::given(method("GET"))
        .and(path("/rest/v1/read_logs"))
        .and(query_param("order", "read_at.desc"))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/read_logs"))
        .and(body_partial_json(json!({
            "user_id": "user-1",
            "juz_number": 3,
            "lat": 24.4539,
            "lng": 54.3773,
            "location_accuracy_m": 12.0
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": 30,
            "user_id": "user-1",
            "juz_number": 3,
            "surah_number": 18,
            "read_at": "2024-03-01T10:00:00Z",
            "lat": 24.4539,
            "lng": 54.3773,
            "location_accuracy_m": 12.0
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/read_logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 30, "user_id": "user-1", "juz_number": 3, "surah_number": 18,
                "read_at": "2024-03-01T10:00:00Z",
                "lat": 24.4539, "lng": 54.3773, "location_accuracy_m": 12.0
            },
            {
                "id": 29, "user_id": "user-1", "juz_number": 3, "surah_number": null,
                "read_at": "2024-02-28T10:00:00Z",
                "lat": null, "lng": null, "location_accuracy_m": null
            },
            {
                "id": 28, "user_id": "user-1", "juz_number": 1, "surah_number": null,
                "read_at": "2024-02-27T10:00:00Z",
                "lat": null, "lng": null, "location_accuracy_m": null
            }
        ])))
        .mount(&server)
        .await;

    let config = TrackerConfig::new(&server.uri(), "test_key")
        .with_redirect_url("https://tracker.example.com");
    let mut app = App::new(config).with_location_provider(Box::new(FixedPosition(Position {
        lat: 24.4539,
        lng: 54.3773,
        accuracy_m: 12.0,
    })));
    app.init().await;

    // 1. サインアップ → 確認メール案内とサインイン画面への遷移
    app.sign_up(&SignUpForm {
        full_name: "Test Reader".to_string(),
        its: "40239713".to_string(),
        email: "Reader@Example.com".to_string(),
        password: "password123".to_string(),
    })
    .await;
    assert!(app.auth_error().is_none());
    assert!(app.auth_info().unwrap().contains("confirmation email"));
    assert_eq!(app.auth_view(), AuthView::SignIn);
    assert!(app.session().is_none());

    // 2. ITSでサインイン → プロフィールと一覧の読み込み
    app.sign_in("40239713", "password123").await;
    assert!(app.auth_error().is_none());
    assert_eq!(app.session().unwrap().user.id, "user-1");
    assert!(app.profile().unwrap().is_admin);
    assert!(app.logs().is_empty());

    // 3. 位置を取得して投稿
    app.capture_location().await;
    assert_eq!(app.status(), Some("Location captured."));

    app.form_mut().juz = 3;
    app.form_mut().surah = Some(18);
    app.submit_log().await;

    assert_eq!(app.status(), Some("Read log saved ✅"));
    assert!(app.form().surah.is_none());
    assert_eq!(app.logs().len(), 3);

    // 4. 集計はジュズ番号の昇順
    assert_eq!(app.counts_by_juz(), vec![(1, 1), (3, 2)]);
}

#[tokio::test]
async fn empty_sign_up_fields_fail_locally() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = TrackerConfig::new(&server.uri(), "test_key");
    let mut app = App::new(config);
    app.init().await;

    app.sign_up(&SignUpForm {
        full_name: "  ".to_string(),
        its: "40239713".to_string(),
        email: "reader@example.com".to_string(),
        password: "password123".to_string(),
    })
    .await;

    assert_eq!(
        app.auth_error(),
        Some("Please enter Full Name, ITS, email, and password.")
    );
}

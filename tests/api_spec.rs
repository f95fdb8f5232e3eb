use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use notebox::api::create_router;
use notebox::db::Database;
use notebox::models::*;
use serde_json::json;

const ALICE: &str = "Bearer alice-session";
const BOB: &str = "Bearer bob-session";

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let expires = Utc::now() + Duration::hours(1);
    db.put_session("alice-session", &OwnerId::new("alice"), expires)
        .expect("Failed to seed session");
    db.put_session("bob-session", &OwnerId::new("bob"), expires)
        .expect("Failed to seed session");
    db.put_session(
        "expired-session",
        &OwnerId::new("alice"),
        Utc::now() - Duration::minutes(5),
    )
    .expect("Failed to seed session");

    let app = create_router(db);
    TestServer::new(app).expect("Failed to create test server")
}

fn draft_input() -> CreateNoteInput {
    CreateNoteInput::from(&Note::draft(OwnerId::new("ignored")))
}

async fn create_test_note(server: &TestServer, auth: &str) -> Note {
    server
        .post("/api/v1/notes")
        .add_header("Authorization", auth)
        .json(&draft_input())
        .await
        .json::<Note>()
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn health_endpoint_is_accessible_without_auth() {
        let server = setup();

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn notes_require_a_session() {
        let server = setup();

        let response = server.get("/api/v1/notes").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_unknown_session() {
        let server = setup();

        let response = server
            .get("/api/v1/notes")
            .add_header("Authorization", "Bearer nobody")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_expired_session() {
        let server = setup();

        let response = server
            .get("/api/v1/notes")
            .add_header("Authorization", "Bearer expired-session")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_malformed_auth_header() {
        let server = setup();

        let response = server
            .get("/api/v1/notes")
            .add_header("Authorization", "Basic dXNlcjpwYXNz")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_without_session_stores_nothing() {
        let server = setup();

        server
            .post("/api/v1/notes")
            .json(&draft_input())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let notes: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .await
            .json();
        assert!(notes.is_empty());
    }
}

mod notes {
    use super::*;

    #[tokio::test]
    async fn creates_note_owned_by_the_session() {
        let server = setup();
        let input = draft_input();

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&input)
            .await;

        response.assert_status(StatusCode::CREATED);
        let note: Note = response.json();
        assert_eq!(note.id, input.id);
        assert_eq!(note.owner_id, OwnerId::new("alice"));
        assert_eq!(note.title.as_deref(), Some(DEFAULT_NOTE_TITLE));
        assert_eq!(note.status, NoteStatus::Active);
    }

    #[tokio::test]
    async fn applies_defaults_to_a_minimal_payload() {
        let server = setup();

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&json!({ "id": "n1", "title": null, "description": null }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let note: Note = response.json();
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);
        assert_eq!(note.status, NoteStatus::Active);
    }

    #[tokio::test]
    async fn rejects_invalid_color() {
        let server = setup();
        let input = CreateNoteInput {
            color: Some("notahex".to_string()),
            ..draft_input()
        };

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&input)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_invalid_id() {
        let server = setup();
        let input = CreateNoteInput {
            id: "not/an/id".to_string(),
            ..draft_input()
        };

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&input)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_duplicate_id() {
        let server = setup();
        let input = draft_input();

        server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&input)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", BOB)
            .json(&input)
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let server = setup();
        let older = create_test_note(&server, ALICE).await;
        let newer = create_test_note(&server, ALICE).await;

        server
            .put(&format!("/api/v1/notes/{}", older.id))
            .add_header("Authorization", ALICE)
            .json(&json!({ "title": "bumped" }))
            .await
            .assert_status_ok();

        let notes: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .await
            .json();

        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![older.id.as_str(), newer.id.as_str()]);
    }

    #[tokio::test]
    async fn accepts_legacy_status_spelling() {
        let server = setup();

        let response = server
            .post("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .json(&json!({
                "id": "legacy",
                "title": "old client",
                "description": "",
                "status": "IN_PROGRESS"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Note>().status, NoteStatus::Active);
    }
}

mod updates {
    use super::*;

    #[tokio::test]
    async fn updates_present_fields_only() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        let response = server
            .put(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", ALICE)
            .json(&json!({ "color": "#ff215d" }))
            .await;

        response.assert_status_ok();
        let updated: Note = response.json();
        assert_eq!(updated.color, "#ff215d");
        assert_eq!(updated.title, note.title);
    }

    #[tokio::test]
    async fn null_clears_description() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        let updated: Note = server
            .put(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", ALICE)
            .json(&json!({ "description": null }))
            .await
            .json();

        assert!(updated.description.is_none());
        assert_eq!(updated.title, note.title);
    }

    #[tokio::test]
    async fn rejects_invalid_color() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        let response = server
            .put(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", ALICE)
            .json(&json!({ "color": "notahex" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn returns_404_for_unknown_note() {
        let server = setup();

        let response = server
            .put("/api/v1/notes/missing")
            .add_header("Authorization", ALICE)
            .json(&json!({ "title": "x" }))
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn cannot_update_another_owners_note() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        server
            .put(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", BOB)
            .json(&json!({ "title": "mine now" }))
            .await
            .assert_status_not_found();

        let notes: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .await
            .json();
        assert_eq!(notes[0].title, note.title);
    }
}

mod trash {
    use super::*;

    #[tokio::test]
    async fn trashes_a_note() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        let response = server
            .post(&format!("/api/v1/notes/{}/trash", note.id))
            .add_header("Authorization", ALICE)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Note>().status, NoteStatus::Trashed);
    }

    #[tokio::test]
    async fn trash_returns_404_for_unknown_note() {
        let server = setup();

        server
            .post("/api/v1/notes/missing/trash")
            .add_header("Authorization", ALICE)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn deletes_a_trashed_note() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;
        server
            .post(&format!("/api/v1/notes/{}/trash", note.id))
            .add_header("Authorization", ALICE)
            .await;

        server
            .delete(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", ALICE)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let notes: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .await
            .json();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn refuses_to_delete_an_active_note() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;

        server
            .delete(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", ALICE)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn refuses_to_delete_another_owners_trash() {
        let server = setup();
        let note = create_test_note(&server, ALICE).await;
        server
            .post(&format!("/api/v1/notes/{}/trash", note.id))
            .add_header("Authorization", ALICE)
            .await;

        server
            .delete(&format!("/api/v1/notes/{}", note.id))
            .add_header("Authorization", BOB)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn empties_the_trash() {
        let server = setup();
        let keep = create_test_note(&server, ALICE).await;
        for _ in 0..2 {
            let note = create_test_note(&server, ALICE).await;
            server
                .post(&format!("/api/v1/notes/{}/trash", note.id))
                .add_header("Authorization", ALICE)
                .await;
        }
        let theirs = create_test_note(&server, BOB).await;
        server
            .post(&format!("/api/v1/notes/{}/trash", theirs.id))
            .add_header("Authorization", BOB)
            .await;

        let response = server
            .delete("/api/v1/trash")
            .add_header("Authorization", ALICE)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<DeletedCount>(), DeletedCount { count: 2 });

        let notes: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", ALICE)
            .await
            .json();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, keep.id);

        let bobs: Vec<Note> = server
            .get("/api/v1/notes")
            .add_header("Authorization", BOB)
            .await
            .json();
        assert_eq!(bobs.len(), 1);
    }
}

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use achievement_api::database::models::{AchievementStatus, NotificationType};
use common::{deans_list, TestApp};

async fn create_draft(app: &TestApp, actor: achievement_api::services::Actor) -> Result<String> {
    let (status, body) = app.call(Method::POST, "/achievements", Some(actor), Some(deans_list())).await?;
    assert_eq!(status, StatusCode::OK, "create failed: {}", body);
    Ok(body["data"]["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn health_and_banner_are_public() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["document_store"], "ok");

    let (status, body) = app.call(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Achievement API");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_bearer_token() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/achievements", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert!(body["data"]["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn student_happy_path() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));

    let (status, body) = app
        .call(
            Method::POST,
            "/achievements",
            Some(student.actor),
            Some(json!({"type": "academic", "title": "Dean's List", "description": "S1", "points": 10})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "draft");
    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(id.len(), 24);

    let (status, body) = app
        .call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");
    assert!(body["data"]["submitted_at"].is_string());

    let (status, body) = app
        .call(Method::POST, &format!("/achievements/{}/verify", id), Some(advisor.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "verified");
    assert_eq!(body["data"]["verified_by"], advisor.actor.user_id.to_string());
    assert!(body["data"]["verified_at"].is_string());

    let (status, body) = app
        .call(Method::GET, &format!("/achievements/{}", id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["status"], "verified");
    assert_eq!(body["data"]["title"], "Dean's List");
    assert_eq!(body["data"]["verified_by"], "Dr. Sari");
    Ok(())
}

#[tokio::test]
async fn reject_requires_note_and_notifies_student() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));

    let id = create_draft(&app, student.actor).await?;
    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;

    let reject_uri = format!("/achievements/{}/reject", id);
    let (status, _) = app
        .call(Method::POST, &reject_uri, Some(advisor.actor), Some(json!({"rejection_note": ""})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            &reject_uri,
            Some(advisor.actor),
            Some(json!({"rejection_note": "incomplete evidence"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["verified_by"], advisor.actor.user_id.to_string());
    assert_eq!(body["data"]["rejection_note"], "incomplete evidence");

    let notes = app.ctx.notifications.for_user(student.actor.user_id);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].notification_type, NotificationType::AchievementRejected);
    assert!(notes[0].message.contains("incomplete evidence"));

    let (status, body) = app
        .call(Method::GET, "/notifications/unread-count", Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    Ok(())
}

#[tokio::test]
async fn cross_advisor_verify_is_forbidden() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (stranger, _) = app.ctx.add_advisor("Dr. Joko");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));

    let id = create_draft(&app, student.actor).await?;
    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;

    let (status, body) = app
        .call(Method::POST, &format!("/achievements/{}/verify", id), Some(stranger.actor), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");

    let reference = app.ctx.references.by_document(&id).expect("reference exists");
    assert_eq!(reference.status, AchievementStatus::Submitted);
    assert!(reference.verified_by.is_none());
    Ok(())
}

#[tokio::test]
async fn attach_after_submit_is_invalid_state() -> Result<()> {
    let app = TestApp::new();
    let (student, _) = app.ctx.add_student("Budi", None);
    let id = create_draft(&app, student.actor).await?;

    let (status, body) = app.upload(&id, student.actor, "bukti juara.pdf", b"%PDF-1.4").await?;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    assert_eq!(body["data"]["file_name"], "bukti juara.pdf");
    assert_eq!(body["data"]["file_type"], "application/pdf");
    let url = body["data"]["file_url"].as_str().unwrap_or_default();
    assert!(url.starts_with("/uploads/") && url.ends_with("-bukti_juara.pdf"));

    let (status, _) = app.upload(&id, student.actor, "virus.exe", b"MZ").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;
    let (status, _) = app.upload(&id, student.actor, "late.pdf", b"%PDF-1.4").await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let doc = app.ctx.documents.raw(&id).expect("document exists");
    assert_eq!(doc.attachments.len(), 1);

    // Rejected uploads do not linger on disk
    let stored = std::fs::read_dir(&app.config.api.upload_dir)?.count();
    assert_eq!(stored, 1);
    Ok(())
}

fn stored_path(app: &TestApp, file_url: &str) -> std::path::PathBuf {
    let name = file_url.trim_start_matches("/uploads/");
    std::path::Path::new(&app.config.api.upload_dir).join(name)
}

#[tokio::test]
async fn rejected_upload_keeps_accepted_file_with_same_name() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));
    let (other, _) = app.ctx.add_student("Ani", None);
    let admin = app.ctx.add_admin("Root");
    let id = create_draft(&app, student.actor).await?;

    let (status, body) = app.upload(&id, student.actor, "cert.pdf", b"%PDF-1.4 original").await?;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    let accepted = stored_path(&app, body["data"]["file_url"].as_str().unwrap_or_default());
    assert!(accepted.exists());

    let (status, _) = app.upload(&id, admin, "cert.pdf", b"%PDF-1.4 admin").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.upload(&id, other.actor, "cert.pdf", b"%PDF-1.4 other").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(std::fs::read(&accepted)?, b"%PDF-1.4 original");
    assert_eq!(std::fs::read_dir(&app.config.api.upload_dir)?.count(), 1);

    // A second accepted upload of the same name lands beside the first
    let (status, body) = app.upload(&id, advisor.actor, "cert.pdf", b"%PDF-1.4 advisor").await?;
    assert_eq!(status, StatusCode::OK, "advisor upload failed: {}", body);
    let second = stored_path(&app, body["data"]["file_url"].as_str().unwrap_or_default());
    assert_ne!(second, accepted);
    assert_eq!(std::fs::read(&accepted)?, b"%PDF-1.4 original");
    assert_eq!(std::fs::read(&second)?, b"%PDF-1.4 advisor");

    let doc = app.ctx.documents.raw(&id).expect("document exists");
    assert_eq!(doc.attachments.len(), 2);
    for attachment in &doc.attachments {
        assert!(stored_path(&app, &attachment.file_url).exists());
    }
    Ok(())
}

#[tokio::test]
async fn delete_only_from_draft() -> Result<()> {
    let app = TestApp::new();
    let (student, _) = app.ctx.add_student("Budi", None);

    let id = create_draft(&app, student.actor).await?;
    let (status, body) = app
        .call(Method::DELETE, &format!("/achievements/{}", id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));

    let reference = app.ctx.references.by_document(&id).expect("reference kept");
    assert_eq!(reference.status, AchievementStatus::Deleted);
    assert!(app.ctx.documents.raw(&id).and_then(|d| d.deleted_at).is_some());

    let (status, _) = app
        .call(Method::GET, &format!("/achievements/{}", id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = create_draft(&app, student.actor).await?;
    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;
    let (status, _) = app
        .call(Method::DELETE, &format!("/achievements/{}", id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn list_pagination() -> Result<()> {
    let app = TestApp::new();
    let (student, _) = app.ctx.add_student("Budi", None);

    let mut ids = Vec::new();
    for _ in 0..25 {
        ids.push(create_draft(&app, student.actor).await?);
    }

    let (status, body) = app
        .call(Method::GET, "/achievements?page=2&limit=10", Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["pagination"],
        json!({"page": 2, "limit": 10, "total": 25, "total_pages": 3})
    );

    let got: Vec<&str> = body["data"]
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["id"].as_str()).collect())
        .unwrap_or_default();
    let expected: Vec<&str> = ids.iter().rev().skip(10).take(10).map(String::as_str).collect();
    assert_eq!(got, expected);
    Ok(())
}

#[tokio::test]
async fn admin_list_rejects_unknown_status() -> Result<()> {
    let app = TestApp::new();
    let admin = app.ctx.add_admin("Root");

    let (status, _) = app
        .call(Method::GET, "/achievements?status=archived", Some(admin), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::GET, "/achievements?status=draft&sort_by=status&sort_order=asc", Some(admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_bad_request() -> Result<()> {
    let app = TestApp::new();
    let (student, _) = app.ctx.add_student("Budi", None);

    let (status, body) = app
        .call(Method::POST, "/achievements", Some(student.actor), Some(json!({"points": "ten"})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = app
        .call(
            Method::POST,
            "/achievements",
            Some(student.actor),
            Some(json!({"type": "sports", "title": "x", "description": "y"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn history_lists_transitions() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));

    let id = create_draft(&app, student.actor).await?;
    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;
    app.call(Method::POST, &format!("/achievements/{}/verify", id), Some(advisor.actor), None)
        .await?;

    let (status, body) = app
        .call(Method::GET, &format!("/achievements/{}/history", id), Some(advisor.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = body["data"]
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["status"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(statuses, vec!["draft", "submitted", "verified"]);
    assert_eq!(body["data"][2]["changed_by_name"], "Dr. Sari");
    Ok(())
}

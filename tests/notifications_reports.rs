mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use common::{deans_list, TestApp};

#[tokio::test]
async fn advisor_inbox_receives_submissions() -> Result<()> {
    let app = TestApp::new();
    let (advisor, _) = app.ctx.add_advisor("Dr. Sari");
    let (student, _) = app.ctx.add_student("Budi", Some(&advisor));

    for _ in 0..2 {
        let (_, body) = app
            .call(Method::POST, "/achievements", Some(student.actor), Some(deans_list()))
            .await?;
        let id = body["data"]["id"].as_str().unwrap_or_default().to_string();
        app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
            .await?;
    }

    let (status, body) = app.call(Method::GET, "/notifications", Some(advisor.actor), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["data"][0]["type"], "achievement_submitted");
    assert_eq!(body["data"][0]["title"], "Prestasi Baru Diajukan");
    let first = body["data"][0]["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = app
        .call(Method::PUT, &format!("/notifications/{}/read", first), Some(advisor.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_read"], true);

    // Someone else's notification is invisible
    let (status, _) = app
        .call(Method::PUT, &format!("/notifications/{}/read", first), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .call(Method::PUT, "/notifications/read-all", Some(advisor.actor), None)
        .await?;
    assert_eq!(body["data"]["updated"], 1);

    let (_, body) = app
        .call(Method::GET, "/notifications/unread-count", Some(advisor.actor), None)
        .await?;
    assert_eq!(body["data"]["count"], 0);
    Ok(())
}

#[tokio::test]
async fn achievement_stats_and_reports() -> Result<()> {
    let app = TestApp::new();
    let (advisor, lecturer) = app.ctx.add_advisor("Dr. Sari");
    let (student, profile) = app.ctx.add_student("Budi", Some(&advisor));
    let admin = app.ctx.add_admin("Root");

    let (_, body) = app
        .call(Method::POST, "/achievements", Some(student.actor), Some(deans_list()))
        .await?;
    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();
    app.call(Method::POST, &format!("/achievements/{}/submit", id), Some(student.actor), None)
        .await?;
    app.call(Method::POST, &format!("/achievements/{}/verify", id), Some(advisor.actor), None)
        .await?;
    app.call(Method::POST, "/achievements", Some(student.actor), Some(deans_list()))
        .await?;

    let (status, body) = app.call(Method::GET, "/achievements/stats", Some(admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["verified"], 1);
    assert_eq!(body["data"]["percentage"], 50);

    let (status, body) = app.call(Method::GET, "/reports/statistics", Some(admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["by_type"][0]["key"], "academic");
    assert_eq!(body["data"]["top_students"][0]["student_name"], "Budi");

    let (status, body) = app
        .call(Method::GET, &format!("/reports/student/{}", profile.id), Some(advisor.actor), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["statistics"]["total_points"], 20);
    assert_eq!(body["data"]["statistics"]["verified_count"], 1);

    let (status, body) = app.call(Method::GET, "/reports/lecturer", Some(advisor.actor), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lecturer"]["id"], lecturer.id.to_string());
    assert_eq!(body["data"]["statistics"]["total_advisees"], 1);

    let (status, _) = app
        .call(Method::GET, &format!("/reports/lecturer/{}", lecturer.id), Some(student.actor), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::GET, "/reports/student/not-a-uuid", Some(admin), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

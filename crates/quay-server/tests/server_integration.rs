//! Server integration tests.
//!
//! These drive the demo routes over real HTTP, carrying the session cookie
//! by hand from one response to the next request.

mod common;

use anyhow::Result;
use serde_json::{Value, json};

use common::{TestServer, session_cookie, set_cookies};

#[tokio::test]
async fn test_health_sets_no_cookie() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.get("/health", None).send().await?;

    assert!(resp.status().is_success());
    assert!(set_cookies(&resp).is_empty());

    let body: Value = resp.json().await?;
    assert_eq!(body["status"], "ok");

    Ok(())
}

#[tokio::test]
async fn test_visits_counter_persists() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.get("/visits", None).send().await?;
    let cookie = session_cookie(&resp).expect("first visit starts a session");
    let body: Value = resp.json().await?;
    assert_eq!(body["visits"], 1);
    assert_eq!(body["new_session"], true);

    let resp = server.get("/visits", Some(&cookie)).send().await?;
    // the cookie is refreshed with the same token
    assert_eq!(session_cookie(&resp).as_deref(), Some(cookie.as_str()));
    let body: Value = resp.json().await?;
    assert_eq!(body["visits"], 2);
    assert_eq!(body["new_session"], false);

    Ok(())
}

#[tokio::test]
async fn test_session_cookie_attributes() -> Result<()> {
    let server =
        TestServer::start_with(quay_session::SessionConfig::default().with_secure(true)).await?;

    let resp = server.get("/visits", None).send().await?;
    let header = set_cookies(&resp).pop().expect("Set-Cookie");

    assert!(header.starts_with("sessionID="));
    assert!(header.contains("Path=/"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));
    assert!(header.contains("Secure"));
    assert!(header.contains("Expires="));

    Ok(())
}

#[tokio::test]
async fn test_flash_survives_redirect_then_disappears() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/flash", None)
        .json(&json!({ "message": "Saved!" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 303);
    assert_eq!(resp.headers()["location"], "/flash");
    let cookie = session_cookie(&resp).expect("flash starts a session");

    let resp = server.get("/flash", Some(&cookie)).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["message"], "Saved!");

    let resp = server.get("/flash", Some(&cookie)).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["message"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_empty_flash_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/flash", None)
        .json(&json!({ "message": "" }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 400);
    assert!(set_cookies(&resp).is_empty());

    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "bad_request");

    Ok(())
}

#[tokio::test]
async fn test_login_renews_identity() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.get("/visits", None).send().await?;
    let anonymous = session_cookie(&resp).unwrap();

    let resp = server
        .post("/login", Some(&anonymous))
        .json(&json!({ "user": "ada" }))
        .send()
        .await?;
    assert!(resp.status().is_success());
    let signed_in = session_cookie(&resp).unwrap();
    assert_ne!(signed_in, anonymous);

    // data carries over to the new identity
    let resp = server.get("/whoami", Some(&signed_in)).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["user"], "ada");

    let resp = server.get("/visits", Some(&signed_in)).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["visits"], 2);

    // the pre-login token no longer reaches anything
    let resp = server.get("/whoami", Some(&anonymous)).send().await?;
    assert!(set_cookies(&resp).is_empty());
    let body: Value = resp.json().await?;
    assert_eq!(body["user"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_logout_expires_cookie() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/login", None)
        .json(&json!({ "user": "ada" }))
        .send()
        .await?;
    let cookie = session_cookie(&resp).unwrap();

    let resp = server.post("/logout", Some(&cookie)).send().await?;
    assert_eq!(resp.status().as_u16(), 204);
    let removal = set_cookies(&resp).pop().expect("removal cookie");
    assert!(removal.starts_with("sessionID=;"));

    let resp = server.get("/whoami", Some(&cookie)).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body["user"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_garbage_cookie_starts_new_session() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .get("/visits", Some("sessionID=not-a-token"))
        .send()
        .await?;

    assert!(resp.status().is_success());
    let cookie = session_cookie(&resp).unwrap();
    assert_ne!(cookie, "sessionID=not-a-token");

    let body: Value = resp.json().await?;
    assert_eq!(body["visits"], 1);
    assert_eq!(body["new_session"], true);

    Ok(())
}

use hyper::header::{AUTHORIZATION, CACHE_CONTROL, LOCATION, WWW_AUTHENTICATE};
use hyper::{Request, StatusCode};

use super::{basic, body_json, run, Fixture};

const BASIC_SIMPLE: &str = r#"
[auth]
scheme = "basic"
realm = "restricted"
identity_headers = true

[auth.backend.simple.users.alice]
password = "secret"
"#;

#[tokio::test]
async fn test_basic_authentication_admits_and_annotates() {
    let fixture = Fixture::new(BASIC_SIMPLE);
    let mut client = fixture.client();

    let response = run(
        &mut client,
        Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, basic("alice:secret")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Remote-User").unwrap(), "alice");

    let body = body_json(response).await;
    assert_eq!(body["identity"]["user"], "alice");
    assert_eq!(body["identity"]["scheme"], "Basic");
}

#[tokio::test]
async fn test_missing_credentials_are_challenged() {
    let fixture = Fixture::new(BASIC_SIMPLE);
    let mut client = fixture.client();

    let response = run(&mut client, Request::builder().uri("/x")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with(r#"Basic realm="restricted""#));
}

#[tokio::test]
async fn test_wrong_password_is_challenged() {
    let fixture = Fixture::new(BASIC_SIMPLE);
    let mut client = fixture.client();

    let response = run(
        &mut client,
        Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, basic("alice:wrong")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_xhr_denial_is_403() {
    let fixture = Fixture::new(BASIC_SIMPLE);
    let mut client = fixture.client();

    let response = run(
        &mut client,
        Request::builder()
            .uri("/x")
            .header("X-Requested-With", "XMLHttpRequest"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_redirect_and_login_page_admission() {
    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "basic"
        redirect = "/login"

        [auth.backend.simple.users.alice]
        password = "secret"
        "#,
    );

    let mut client = fixture.client();
    let response = run(&mut client, Request::builder().uri("/x")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-cache");

    // The login page itself is admitted, not looped back through the
    // redirect.
    let mut client = fixture.client();
    let response = run(&mut client, Request::builder().uri("/login")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_reuse_across_clients() {
    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "basic"
        issue_tokens = true
        identity_headers = true

        [auth.backend.simple.users.alice]
        password = "secret"
        "#,
    );

    let mut first = fixture.client();
    let response = run(
        &mut first,
        Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, basic("alice:secret")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let token = response
        .headers()
        .get("X-Auth-Token")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // A different connection, carrying only the token.
    let mut second = fixture.client();
    let response = run(
        &mut second,
        Request::builder().uri("/y").header("X-Auth-Token", &token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Remote-User").unwrap(), "alice");
}

#[tokio::test]
async fn test_home_redirect_flow() {
    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "basic"
        home_redirect = true
        identity_headers = true

        [auth.backend.simple.users.alice]
        password = "secret"
        home = "/u/alice"
        "#,
    );

    let mut client = fixture.client();

    // First request authenticates; no session existed yet, so no redirect.
    let response = run(
        &mut client,
        Request::builder()
            .uri("/u/alice/welcome")
            .header(AUTHORIZATION, basic("alice:secret")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Outside the home tree: sent back in.
    let response = run(&mut client, Request::builder().uri("/")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/u/alice/");

    // Inside the home tree: no further redirect.
    let response = run(&mut client, Request::builder().uri("/u/alice/index")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[cfg(feature = "authn-digest")]
#[tokio::test]
async fn test_digest_challenge_then_authentication() {
    use crate::hash;

    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "digest"
        realm = "restricted"
        identity_headers = true

        [auth.backend.simple.users.alice]
        password = "secret"
        "#,
    );

    let mut client = fixture.client();

    let response = run(&mut client, Request::builder().uri("/dir/report")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let nonce = challenge
        .split("nonce=\"")
        .nth(1)
        .unwrap()
        .split('"')
        .next()
        .unwrap()
        .to_string();

    let md5 = hash::lookup("md5").unwrap();
    let ha1 = md5.hex_digest(&[b"alice:restricted:secret"]);
    let ha2 = md5.hex_digest(&[b"GET:/dir/report"]);
    let digest_input = format!("{ha1}:{nonce}:00000001:abcdef:auth:{ha2}");
    let digest = md5.hex_digest(&[digest_input.as_bytes()]);

    let credential = format!(
        r#"Digest username="alice", realm="restricted", nonce="{nonce}", uri="/dir/report", qop=auth, nc=00000001, cnonce="abcdef", response="{digest}""#
    );

    let response = run(
        &mut client,
        Request::builder()
            .uri("/dir/report")
            .header(AUTHORIZATION, credential),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Remote-User").unwrap(), "alice");
}

#[cfg(feature = "authn-oauth2")]
#[tokio::test]
async fn test_oauth2_wire_prefix_and_authorize_redirect() {
    use crate::authz::AuthzBackend;

    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "oauth2"
        identity_headers = true

        [auth.backend.simple]

        [auth.oauth2]
        authorize_endpoint = "https://sso.example.com/authorize"
        "#,
    );

    // Seed an access token the way the login service would.
    fixture
        .module
        .backend
        .join("alice", "access-token", 0)
        .await
        .unwrap();

    // Credentials arrive under the oAuth2 authorization prefix.
    let mut client = fixture.client();
    let response = run(
        &mut client,
        Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, "oAuth2 access-token"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Remote-User").unwrap(), "alice");

    // Any other prefix is a different scheme and is discarded; the
    // challenge is a redirect to the authorization endpoint.
    let mut client = fixture.client();
    let response = run(
        &mut client,
        Request::builder()
            .uri("/x")
            .header(AUTHORIZATION, "Bearer access-token"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "https://sso.example.com/authorize"
    );
}

#[cfg(feature = "authz-jwt")]
#[tokio::test]
async fn test_bearer_with_signed_tokens() {
    use hyper::header::SET_COOKIE;

    use crate::authz::AuthzBackend;

    let fixture = Fixture::new(
        r#"
        [auth]
        scheme = "bearer"
        issue_tokens = true
        identity_cookies = true
        expire = 3600

        [auth.backend.jwt]
        secret = "shared-key"
        "#,
    );

    // Mint a token the way a login service sharing the key would.
    let seed = Fixture::new(
        r#"
        [auth]
        scheme = "bearer"

        [auth.backend.jwt]
        secret = "shared-key"
        "#,
    );
    let mut session = crate::auth::session::AuthSession::new("alice", "Bearer");
    session.group = Some("users".to_string());
    let token = seed.module.backend.generate_token(&session, 3600).unwrap();

    let mut client = fixture.client();
    let response = run(
        &mut client,
        Request::builder()
            .uri("/api/data")
            .header(AUTHORIZATION, format!("Bearer {token}")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    // Cookie channel: the identity rides Set-Cookie.
    let cookies: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("X-Remote-User=alice")));
}

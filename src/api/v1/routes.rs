/*
 * Responsibility
 * - URL structure of the API
 * - /health is public; /lists, /subscribe, /unsubscribe sit behind the bearer middleware
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    health::health,
    mailing::{list_mailing_lists, subscribe, unsubscribe},
};
use crate::middleware::auth::access;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/lists", get(list_mailing_lists))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe));

    Router::new()
        .route("/health", get(health))
        .merge(access::apply(protected, state))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::services::auth::key::{PublicKey, test_keys::RSA_PUBLIC_PEM};
    use crate::services::auth::verifier::{VerifierOptions, test_tokens::*};
    use crate::services::auth::AuthService;
    use crate::services::mailing::backend::{
        BackendError, BackendResult, MailingList, SubscriptionBackend,
    };

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        fail_with_not_found: bool,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> BackendResult<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail_with_not_found {
                return Err(BackendError::NotFound("member not found".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SubscriptionBackend for FakeBackend {
        fn backend_name(&self) -> &'static str {
            "fake"
        }

        async fn list_mailing_lists(
            &self,
            include_hidden: bool,
        ) -> BackendResult<Vec<MailingList>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list hidden={include_hidden}"));
            Ok(vec![MailingList {
                address: "news@lists.example.com".into(),
                name: "News".into(),
                description: String::new(),
                access_level: "readonly".into(),
                members_count: 1,
                created_at: String::new(),
                blocked: false,
                hidden: false,
            }])
        }

        async fn subscribe(&self, list: &str, member: &str) -> BackendResult<()> {
            self.record(format!("subscribe {list} {member}"))
        }

        async fn unsubscribe(&self, list: &str, member: &str) -> BackendResult<()> {
            self.record(format!("unsubscribe {list} {member}"))
        }
    }

    fn app(backend: Arc<FakeBackend>) -> Router {
        let key = PublicKey::from_config(RSA_PUBLIC_PEM).unwrap();
        let auth = Arc::new(AuthService::new(key, VerifierOptions::default()));
        let state = AppState::new(auth, backend);
        routes(state.clone()).with_state(state)
    }

    fn token(email: &str, groups: &[&str]) -> String {
        sign(&claims_for(email, groups))
    }

    fn form_post(uri: &str, bearer: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (status, body) = send(
            app(Arc::default()),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn lists_require_a_token() {
        let backend = Arc::new(FakeBackend::default());
        let (status, body) = send(
            app(backend.clone()),
            Request::get("/lists").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], json!("UNAUTHORIZED"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthorized() {
        let req = Request::get("/lists")
            .header(header::AUTHORIZATION, "Token xyz")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(Arc::default()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_and_forged_tokens_look_the_same_to_clients() {
        let mut expired = claims_for("a@x.com", &[]);
        expired["exp"] = json!(now() - 1);
        let expired = sign(&expired);
        let forged = forge(&json!({"alg": "none"}), &claims_for("a@x.com", &["Admin"]), "");

        let mut bodies = Vec::new();
        for bearer in [expired, forged] {
            let req = Request::get("/lists")
                .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(app(Arc::default()), req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            bodies.push(body);
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn member_lists_without_hidden() {
        let backend = Arc::new(FakeBackend::default());
        let req = Request::get("/lists?include_hidden=true")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token("a@x.com", &[])),
            )
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["address"], json!("news@lists.example.com"));
        assert_eq!(body[0]["blocked"], json!(false));
        assert_eq!(backend.calls(), vec!["list hidden=false"]);
    }

    #[tokio::test]
    async fn admin_may_list_hidden() {
        let backend = Arc::new(FakeBackend::default());
        let req = Request::get("/lists?include_hidden=true")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token("root@x.com", &["Admin"])),
            )
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(backend.calls(), vec!["list hidden=true"]);
    }

    #[tokio::test]
    async fn member_subscribes_self() {
        let backend = Arc::new(FakeBackend::default());
        let req = form_post(
            "/subscribe",
            &token("a@x.com", &[]),
            "list=news%40lists.example.com&member=a%40x.com",
        );
        let (status, body) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("subscribed"));
        assert_eq!(backend.calls(), vec!["subscribe news@lists.example.com a@x.com"]);
    }

    #[tokio::test]
    async fn member_cannot_subscribe_someone_else() {
        let backend = Arc::new(FakeBackend::default());
        let req = form_post(
            "/subscribe",
            &token("a@x.com", &["Members"]),
            "list=news%40lists.example.com&member=b%40x.com",
        );
        let (status, body) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"]["message"],
            json!("only admins can (un)subscribe other users")
        );
        // Denial short-circuits: the backend is never called.
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn admin_unsubscribes_someone_else() {
        let backend = Arc::new(FakeBackend::default());
        let req = form_post(
            "/unsubscribe",
            &token("a@x.com", &["Admin"]),
            "list=news%40lists.example.com&member=b%40x.com",
        );
        let (status, body) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("unsubscribed"));
        assert_eq!(
            backend.calls(),
            vec!["unsubscribe news@lists.example.com b@x.com"]
        );
    }

    #[tokio::test]
    async fn missing_form_field_is_bad_request() {
        let backend = Arc::new(FakeBackend::default());
        let req = form_post("/subscribe", &token("a@x.com", &[]), "member=a%40x.com");
        let (status, body) = send(app(backend.clone()), req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], json!("list is required"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn backend_not_found_is_surfaced() {
        let backend = Arc::new(FakeBackend {
            fail_with_not_found: true,
            ..FakeBackend::default()
        });
        let req = form_post(
            "/unsubscribe",
            &token("a@x.com", &[]),
            "list=news%40lists.example.com&member=a%40x.com",
        );
        let (status, _) = send(app(backend), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn token_without_required_claims_is_unauthorized() {
        let mut claims = claims_for("a@x.com", &[]);
        claims.as_object_mut().unwrap().remove("family_name");
        let req = Request::get("/lists")
            .header(header::AUTHORIZATION, format!("Bearer {}", sign(&claims)))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(Arc::default()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

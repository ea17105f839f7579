//! Request guard: credential injection and authorization-failure handling.

use super::CredentialStore;
use crate::api::ApiError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Route the guard navigates to when the session is invalidated.
pub const LOGIN_ROUTE: &str = "/login";

/// HTTP status that denotes an authorization failure.
pub const UNAUTHORIZED: u16 = 401;

/// Destination for navigation requests raised by the guard.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigator that discards requests. Used when no login surface exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: &str) {
        tracing::debug!(route, "Navigation requested with no login surface attached");
    }
}

/// Navigator that forwards routes to a receiver owned by the front end.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    routes: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (routes, rx) = mpsc::unbounded_channel();
        (Self { routes }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: &str) {
        // Receiver gone means the front end has already shut down
        let _ = self.routes.send(route.to_string());
    }
}

/// Wraps every outgoing call with the session credential.
///
/// Before a request is sent the guard adds `Authorization: Bearer <token>`
/// if a credential is present. After the response arrives it inspects only
/// the status code: an authorization failure clears the credential, asks the
/// [`Navigator`] to show the login surface and is still returned to the
/// caller as [`ApiError::Unauthorized`]. Every other outcome passes through
/// untouched.
#[derive(Clone)]
pub struct RequestGuard {
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
}

impl RequestGuard {
    pub fn new(credentials: CredentialStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            credentials,
            navigator,
        }
    }

    /// Guard with an empty session and no login surface.
    pub fn detached() -> Self {
        Self::new(CredentialStore::new(), Arc::new(NoopNavigator))
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Attach the credential to a request, if one is present.
    pub fn attach(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `Authorization` header value for transports that build requests
    /// themselves (the push channel handshake).
    pub fn authorization(&self) -> Option<String> {
        self.credentials.current().map(|c| c.bearer())
    }

    /// Attach the credential, send the request and react to the outcome.
    ///
    /// # Errors
    ///
    /// * `ApiError::Unauthorized` if the server rejected the credential
    ///   (the session has already been invalidated when this is returned).
    /// * `ApiError::Timeout` / `ApiError::Transport` if no response arrived.
    ///
    /// Any other status, successful or not, is returned as `Ok(response)`.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .attach(request)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        self.observe_status(response.status().as_u16(), response.url().as_str())?;
        Ok(response)
    }

    /// React to a response status without inspecting the payload.
    pub fn observe_status(&self, status: u16, url: &str) -> Result<(), ApiError> {
        if status == UNAUTHORIZED {
            self.invalidate(url);
            return Err(ApiError::Unauthorized {
                status,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn invalidate(&self, url: &str) {
        let had_credential = self.credentials.clear();
        tracing::warn!(
            url,
            had_credential,
            "Authorization failure, session invalidated"
        );
        self.navigator.navigate(LOGIN_ROUTE);
    }
}

impl std::fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGuard")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: &str) {
            self.routes.lock().unwrap().push(route.to_string());
        }
    }

    fn guard_with(token: Option<&str>) -> (RequestGuard, Arc<RecordingNavigator>) {
        let store = match token {
            Some(t) => CredentialStore::with_token(t),
            None => CredentialStore::new(),
        };
        let navigator = Arc::new(RecordingNavigator::default());
        (RequestGuard::new(store, navigator.clone()), navigator)
    }

    #[tokio::test]
    async fn test_attaches_exact_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let (guard, _) = guard_with(Some("abc123"));
        let client = reqwest::Client::new();
        let response = guard
            .send(client.get(format!("{}/api/devices", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_no_header_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (guard, _) = guard_with(None);
        let client = reqwest::Client::new();
        guard
            .send(client.get(format!("{}/api/settings", server.uri())))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_clears_and_navigates_once() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/device/5"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (guard, navigator) = guard_with(Some("stale"));
        let client = reqwest::Client::new();
        let result = guard
            .send(client.delete(format!("{}/api/device/5", server.uri())))
            .await;

        assert!(matches!(
            result,
            Err(ApiError::Unauthorized { status: 401, .. })
        ));
        assert!(!guard.credentials().is_authenticated());
        assert_eq!(*navigator.routes.lock().unwrap(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (guard, navigator) = guard_with(Some("t"));
        let client = reqwest::Client::new();
        let response = guard
            .send(client.post(format!("{}/api/settings", server.uri())).body("x"))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 500);
        assert_eq!(response.text().await.unwrap(), "boom");
        assert!(guard.credentials().is_authenticated());
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        let (guard, navigator) = guard_with(Some("t"));
        let client = reqwest::Client::new();
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let result = guard.send(client.get("http://127.0.0.1:9/api/devices")).await;

        assert!(matches!(
            result,
            Err(ApiError::Transport(_)) | Err(ApiError::Timeout)
        ));
        assert!(guard.credentials().is_authenticated());
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_observe_status_non_auth_is_ok() {
        let (guard, navigator) = guard_with(Some("t"));
        assert!(guard.observe_status(200, "http://x/").is_ok());
        assert!(guard.observe_status(403, "http://x/").is_ok());
        assert!(guard.observe_status(500, "http://x/").is_ok());
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_each_failure_navigates_once() {
        let (guard, navigator) = guard_with(Some("t"));
        let _ = guard.observe_status(401, "http://x/api/devices");
        let _ = guard.observe_status(401, "http://x/api/settings");
        assert_eq!(navigator.routes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_authorization_header_value() {
        let (guard, _) = guard_with(Some("abc"));
        assert_eq!(guard.authorization().as_deref(), Some("Bearer abc"));

        let (guard, _) = guard_with(None);
        assert!(guard.authorization().is_none());
    }

    #[tokio::test]
    async fn test_channel_navigator_forwards_route() {
        let (navigator, mut rx) = ChannelNavigator::new();
        navigator.navigate(LOGIN_ROUTE);
        assert_eq!(rx.recv().await.as_deref(), Some("/login"));
    }
}

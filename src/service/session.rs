use crate::common::WatcherError;
use crate::core::AuthContext;
use crate::service::protocol::SessionQuery;
use crate::service::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

pub const USERNAME_HEADER: &str = "x-username";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// An authenticated caller. Credentials come from the `x-username` and
/// `x-session-token` headers, or from the query string when absent.
#[derive(Debug, Clone)]
pub struct Session(pub AuthContext);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

impl FromRequestParts<AppState> for Session {
    type Rejection = WatcherError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let username = header(parts, USERNAME_HEADER);
        let token = header(parts, SESSION_TOKEN_HEADER);
        if username.is_some() && token.is_some() {
            return state.auth.authenticate(username, token).map(Session);
        }

        let query = Query::<SessionQuery>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        state
            .auth
            .authenticate(
                username.or(query.username.as_deref()),
                token.or(query.session_token.as_deref()),
            )
            .map(Session)
    }
}

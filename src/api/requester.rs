use axum::extract::FromRequestParts;
use serde::Deserialize;

use crate::api::response::ApiError;
use crate::vault::Requester;

const GUEST: &str = "guest";

/// The caller of a request, resolved from the `user` query parameter.
///
/// Ids starting with `f` belong to finance, everyone else to eng.
/// `admin` has clearance 3, everyone else 2.
#[derive(Debug, Clone)]
pub struct Caller(pub Requester);

#[derive(Debug, Deserialize)]
struct UserParams {
    #[serde(default)]
    user: Option<String>,
}

pub fn resolve_requester(user: &str) -> Requester {
    let department = if user.starts_with('f') {
        "finance"
    } else {
        "eng"
    };
    let clearance = if user == "admin" { 3 } else { 2 };
    Requester::new(user, department, clearance)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        let params: UserParams = serde_qs::from_str(query)
            .map_err(|e| ApiError::bad_request(format!("Invalid query parameter: {e}")))?;

        let user = params
            .user
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| GUEST.to_string());
        Ok(Caller(resolve_requester(&user)))
    }
}

use axum::Json;
use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::application::trusted::{
    AUTH_ID_HEADER, AUTH_SIG_HEADER, SignedRequest, TrustedWriteError,
};
use crate::infra::http::api::controller::set_json_content_type;
use crate::infra::http::api::error::ApiError;

use super::TrustedState;

const SOURCE: &str = "infra::http::trusted";

pub async fn update_event_matches(
    State(state): State<TrustedState>,
    Path(event_key): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = SignedRequest {
        credential_id: header_str(&headers, AUTH_ID_HEADER),
        signature: header_str(&headers, AUTH_SIG_HEADER),
        path: uri.path(),
        body: &body,
        resource_key: &event_key,
    };

    let mut response = match state.service.update_matches(request).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => trusted_error_to_api(err).into_response(),
    };
    set_json_content_type(&mut response);
    response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Authentication, authorization and parse failures are all 400s that tell
/// the uploader what went wrong; everything else is an internal fault.
fn trusted_error_to_api(err: TrustedWriteError) -> ApiError {
    match err {
        TrustedWriteError::Auth(auth) if auth.is_client_error() => {
            ApiError::bad_request(SOURCE, auth.to_string())
        }
        TrustedWriteError::Parse(parse) => ApiError::bad_request(SOURCE, parse.message),
        other => ApiError::internal(SOURCE, &other),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::application::ingest::ParseInputError;
    use crate::application::repos::RepoError;
    use crate::application::trusted::AuthError;

    #[test]
    fn client_failures_are_bad_requests() {
        let missing = trusted_error_to_api(AuthError::MissingHeader(AUTH_SIG_HEADER).into());
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let scoped = trusted_error_to_api(
            AuthError::ResourceNotAuthorized {
                allowed: vec!["2020ab".to_string()],
            }
            .into(),
        );
        assert_eq!(scoped.status(), StatusCode::BAD_REQUEST);
        assert_eq!(scoped.message(), "Only allowed to edit events: 2020ab");

        let parse = trusted_error_to_api(ParseInputError::new("bad table").into());
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse.message(), "bad table");
    }

    #[test]
    fn store_failures_are_internal() {
        let store = trusted_error_to_api(
            AuthError::Store(RepoError::from_persistence("down")).into(),
        );
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let write = trusted_error_to_api(TrustedWriteError::Repo(RepoError::Timeout));
        assert_eq!(write.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

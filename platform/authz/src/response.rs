//! Renders an [`AuthzError`] the way the caller asked for it: an HTML page
//! or redirect, a JSON error array, or a JSON:API error array.

use axum::{
    Json,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{Map, Value, json};

use crate::error::AuthzError;

/// Cookie carrying the failure code across an HTML redirect.
pub const FLASH_COOKIE: &str = "flash_errors";

const JSON_API: &str = "application/vnd.api+json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Html,
    JsonApi,
    Json,
}

impl Format {
    fn matches(self, media_type: &str) -> bool {
        let (kind, subtype) = media_type.split_once('/').unwrap_or((media_type, "*"));
        match self {
            Format::Html => {
                media_type == "*/*"
                    || (kind == "text" && matches!(subtype, "*" | "html"))
                    || media_type == "application/xhtml+xml"
            }
            Format::JsonApi => media_type == JSON_API || media_type == "application/*",
            Format::Json => media_type == "application/json" || media_type == "*/*",
        }
    }
}

/// Picks the response format from the `Accept` header. Candidates are tried
/// in the order html, JSON:API, json for each accepted range, highest
/// quality first. No header, or nothing acceptable, means HTML.
pub fn negotiate(headers: &HeaderMap) -> Format {
    let mut ranges: Vec<(String, f32)> = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(parse_range)
        .filter(|(_, quality)| *quality > 0.0)
        .collect();
    ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranges
        .iter()
        .find_map(|(media_type, _)| {
            [Format::Html, Format::JsonApi, Format::Json]
                .into_iter()
                .find(|format| format.matches(media_type))
        })
        .unwrap_or(Format::Html)
}

fn parse_range(range: &str) -> Option<(String, f32)> {
    let mut parts = range.split(';').map(str::trim);
    let media_type = parts.next().filter(|media_type| !media_type.is_empty())?;
    let quality = parts
        .filter_map(|param| param.strip_prefix("q="))
        .find_map(|q| q.parse::<f32>().ok())
        .unwrap_or(1.0);
    Some((media_type.to_ascii_lowercase(), quality))
}

/// Builds the response for `err`. In HTML, `back` turns the page into a
/// redirect to that location with the code flashed in [`FLASH_COOKIE`].
pub fn render(err: &AuthzError, format: Format, back: Option<&str>) -> Response {
    let message = err.public_message();
    match format {
        Format::Html => match back {
            Some(location) => {
                let flash = Cookie::build((FLASH_COOKIE, err.code()))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build();
                (CookieJar::new().add(flash), Redirect::to(location)).into_response()
            }
            None => (err.status(), message).into_response(),
        },
        Format::Json => {
            let mut entry = Map::new();
            entry.insert("message".into(), message.into());
            entry.extend(required_lists(err));
            (err.status(), Json(json!({ "errors": [entry] }))).into_response()
        }
        Format::JsonApi => {
            let mut entry = Map::new();
            entry.insert("code".into(), err.code().into());
            entry.insert("title".into(), message.into());
            let meta: Map<String, Value> = required_lists(err).into_iter().collect();
            if !meta.is_empty() {
                entry.insert("meta".into(), meta.into());
            }
            let mut response = (err.status(), Json(json!({ "errors": [entry] }))).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(JSON_API));
            response
        }
    }
}

fn required_lists(err: &AuthzError) -> Vec<(String, Value)> {
    [
        ("requiredPermissions", err.required_permissions()),
        ("requiredRoles", err.required_roles()),
    ]
    .into_iter()
    .filter(|(_, names)| !names.is_empty())
    .map(|(key, names)| (key.to_string(), json!(names)))
    .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, StatusCode};

    use super::*;
    use crate::error::Forbidden;

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn negotiates_by_accept_header() {
        assert_eq!(negotiate(&HeaderMap::new()), Format::Html);
        assert_eq!(negotiate(&accept("text/html,application/xhtml+xml")), Format::Html);
        assert_eq!(negotiate(&accept("application/json")), Format::Json);
        assert_eq!(negotiate(&accept(JSON_API)), Format::JsonApi);
        assert_eq!(negotiate(&accept("*/*")), Format::Html);
        assert_eq!(negotiate(&accept("image/png")), Format::Html);
    }

    #[test]
    fn quality_values_order_candidates() {
        assert_eq!(
            negotiate(&accept("text/html;q=0.5, application/json")),
            Format::Json
        );
        assert_eq!(
            negotiate(&accept("application/json;q=0, text/plain")),
            Format::Html
        );
    }

    #[test]
    fn html_redirects_back_with_flash_cookie() {
        let err = AuthzError::NotAuthenticated;
        let response = render(&err, Format::Html, Some("/articles"));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/articles");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("flash_errors=E_PERMISSION_UNAUTHORIZED_ACCESS"));
    }

    #[test]
    fn html_without_redirect_is_plain_text() {
        let err: AuthzError = Forbidden::for_roles(vec!["admin".into()]).into();
        let response = render(&err, Format::Html, None);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn json_api_sets_its_media_type() {
        let err = AuthzError::MisconfiguredMiddleware;
        let response = render(&err, Format::JsonApi, None);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_API);
    }
}

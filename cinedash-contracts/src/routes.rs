//! Route definitions for the admin REST API.
//!
//! Paths are relative to the configured base URL, which already carries the
//! `/api` prefix.

pub mod admin {
    pub const AUTHENTICATE: &str = "/admin/authenticate";
    pub const REFRESH: &str = "/admin/refresh";
    pub const VERIFY: &str = "/admin/verify";
    pub const LOGOUT: &str = "/admin/logout";
}

pub mod videos {
    pub const COLLECTION: &str = "/videos/all";
    pub const ITEM: &str = "/videos/{id}";
    pub const STREAM: &str = "/videos/{id}/stream";
}

pub mod utils {
    use url::form_urlencoded::byte_serialize;

    /// Percent-encode `value` as a single path segment.
    pub fn encode_segment(value: &str) -> String {
        // `byte_serialize` already escapes a literal `+`, so any `+` left
        // stands for a space.
        byte_serialize(value.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
    }

    /// Replace a single `{param}` placeholder with the encoded value.
    pub fn replace_param(
        route: &str,
        param: &str,
        value: impl AsRef<str>,
    ) -> String {
        route.replace(param, &encode_segment(value.as_ref()))
    }

    /// Append query parameters to the provided route.
    pub fn with_query(route: &str, params: &[(&str, &str)]) -> String {
        if params.is_empty() {
            return route.to_string();
        }
        let query = params
            .iter()
            .map(|(k, v)| {
                let k: String = byte_serialize(k.as_bytes()).collect();
                let v: String = byte_serialize(v.as_bytes()).collect();
                format!("{k}={v}")
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{route}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_route_substitutes_id() {
        assert_eq!(
            utils::replace_param(videos::STREAM, "{id}", "abc123"),
            "/videos/abc123/stream"
        );
    }

    #[test]
    fn query_is_appended_in_order() {
        assert_eq!(
            utils::with_query(videos::COLLECTION, &[("page", "2"), ("limit", "10")]),
            "/videos/all?page=2&limit=10"
        );
        assert_eq!(utils::with_query(admin::VERIFY, &[]), admin::VERIFY);
    }

    #[test]
    fn ids_cannot_escape_their_segment() {
        assert_eq!(
            utils::replace_param(videos::STREAM, "{id}", "a/b?c=d"),
            "/videos/a%2Fb%3Fc%3Dd/stream"
        );
        assert_eq!(
            utils::replace_param(videos::ITEM, "{id}", "my clip+1"),
            "/videos/my%20clip%2B1"
        );
    }

    #[test]
    fn query_values_are_encoded() {
        assert_eq!(
            utils::with_query(videos::COLLECTION, &[("search", "a&b")]),
            "/videos/all?search=a%26b"
        );
    }
}

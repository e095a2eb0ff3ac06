//! Server endpoint derivation.
//!
//! The bridge is given a single base URL. The SSE subscription lives at
//! `<base>/sse` and messages are posted to `<base>/messages/?session_id=<id>`.
//! Trailing slashes on the base are collapsed so the joins never produce `//`.

use url::Url;

use crate::errors::EndpointError;
use crate::session::SessionId;

/// Validated base URL and the endpoints derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    sse: Url,
    messages: Url,
}

impl Endpoints {
    /// Validate `input` as an absolute `http`/`https` URL with a host and
    /// derive the bridge endpoints from it.
    ///
    /// Any query string or fragment on the base is discarded.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let trimmed = input.trim();
        let mut base = Url::parse(trimmed).map_err(|source| EndpointError::Parse {
            input: trimmed.to_owned(),
            source,
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(EndpointError::UnsupportedScheme(base.scheme().to_owned()));
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(EndpointError::MissingHost(trimmed.to_owned()));
        }

        base.set_query(None);
        base.set_fragment(None);

        let root = base.as_str().trim_end_matches('/').to_owned();
        let join = |suffix: &str| {
            let joined = format!("{root}{suffix}");
            Url::parse(&joined).map_err(|source| EndpointError::Parse {
                input: joined,
                source,
            })
        };
        let sse = join("/sse")?;
        let messages = join("/messages/")?;

        Ok(Self {
            base,
            sse,
            messages,
        })
    }

    /// The normalized base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `<base>/sse`.
    pub fn sse_url(&self) -> &Url {
        &self.sse
    }

    /// `<base>/messages/` without a session query.
    pub fn messages_base(&self) -> &Url {
        &self.messages
    }

    /// `<base>/messages/?session_id=<id>`, with the identifier percent-encoded.
    pub fn messages_url(&self, session_id: &SessionId) -> Url {
        let mut url = self.messages.clone();
        let _ = url
            .query_pairs_mut()
            .append_pair("session_id", session_id.as_str());
        url
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn derives_sse_and_messages_from_host_port() {
        let ep = Endpoints::parse("http://localhost:8080").unwrap();
        assert_eq!(ep.sse_url().as_str(), "http://localhost:8080/sse");
        assert_eq!(ep.messages_base().as_str(), "http://localhost:8080/messages/");
        assert_eq!(
            ep.messages_url(&SessionId::new("abc123")).as_str(),
            "http://localhost:8080/messages/?session_id=abc123"
        );
    }

    #[test]
    fn trailing_slash_does_not_double() {
        let ep = Endpoints::parse("https://example.com/").unwrap();
        assert_eq!(ep.sse_url().as_str(), "https://example.com/sse");
        assert_eq!(ep.messages_base().as_str(), "https://example.com/messages/");
    }

    #[test]
    fn base_path_is_preserved() {
        let ep = Endpoints::parse("http://host/api/v1//").unwrap();
        assert_eq!(ep.sse_url().as_str(), "http://host/api/v1/sse");
        assert_eq!(ep.messages_base().as_str(), "http://host/api/v1/messages/");
    }

    #[test]
    fn query_and_fragment_are_discarded() {
        let ep = Endpoints::parse("http://host:9000/?token=x#frag").unwrap();
        assert_eq!(ep.sse_url().as_str(), "http://host:9000/sse");
    }

    #[test]
    fn session_id_is_percent_encoded() {
        let ep = Endpoints::parse("http://host").unwrap();
        let url = ep.messages_url(&SessionId::new("a b&c"));
        assert_eq!(url.as_str(), "http://host/messages/?session_id=a+b%26c");
    }

    #[test]
    fn rejects_non_url() {
        assert_matches!(
            Endpoints::parse("not a url"),
            Err(EndpointError::Parse { .. })
        );
        assert_matches!(Endpoints::parse(""), Err(EndpointError::Parse { .. }));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert_matches!(
            Endpoints::parse("ftp://host/files"),
            Err(EndpointError::UnsupportedScheme(s)) if s == "ftp"
        );
    }

    #[test]
    fn rejects_missing_host() {
        assert!(Endpoints::parse("http://").is_err());
        assert!(Endpoints::parse("file:///tmp/x").is_err());
    }

    proptest! {
        #[test]
        fn derived_endpoints_have_no_double_slashes(
            host in "[a-z][a-z0-9]{0,10}(\\.[a-z]{2,5})?",
            port in proptest::option::of(1u16..=65535),
            segments in proptest::collection::vec("[a-z0-9_-]{1,8}", 0..3),
            trailing in 0usize..3,
        ) {
            let mut base = format!("http://{host}");
            if let Some(p) = port {
                base.push_str(&format!(":{p}"));
            }
            for seg in &segments {
                base.push('/');
                base.push_str(seg);
            }
            base.push_str(&"/".repeat(trailing));

            let ep = Endpoints::parse(&base).unwrap();
            let sse = ep.sse_url().as_str().to_owned();
            let messages = ep.messages_base().as_str().to_owned();
            let root = base.trim_end_matches('/');
            let after_scheme = |s: &str| s["http://".len()..].to_owned();

            prop_assert!(sse.ends_with("/sse"));
            prop_assert!(messages.ends_with("/messages/"));
            prop_assert!(!after_scheme(&sse).contains("//"));
            prop_assert!(!after_scheme(&messages).contains("//"));
            // The url crate drops default ports; otherwise the join is literal.
            if port != Some(80) {
                prop_assert_eq!(sse, format!("{root}/sse"));
                prop_assert_eq!(messages, format!("{root}/messages/"));
            }
        }
    }
}

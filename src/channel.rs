use std::fmt;

use log::debug;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{ScrapeError, report_chain};
use crate::youtube::VideoPlatform;

/// The addressing scheme a channel URL uses, with the value taken from its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelIdentifier {
    /// `youtube.com/@name`
    Handle(String),
    /// `youtube.com/channel/UC...`, already canonical
    ChannelId(String),
    /// `youtube.com/user/name`, legacy username
    User(String),
    /// `youtube.com/c/name`, custom vanity URL
    Custom(String),
}

impl ChannelIdentifier {
    /// Classify a channel URL by its path. Anything but the four known shapes is rejected.
    pub fn parse(channel_url: &str) -> Result<Self, ScrapeError> {
        let invalid = || ScrapeError::InvalidChannelUrl(channel_url.to_string());

        let url = Url::parse(channel_url.trim()).map_err(|_| invalid())?;
        // Segments come back percent-encoded; lookups need the name as typed
        let segments = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8().map(|v| v.into_owned()))
            .collect::<Result<Vec<String>, _>>()
            .map_err(|_| invalid())?;

        let first = segments.first().map(String::as_str).unwrap_or_default();
        let identifier = if let Some(handle) = first.strip_prefix('@') {
            ChannelIdentifier::Handle(handle.to_string())
        } else {
            let value = segments.get(1).cloned().unwrap_or_default();
            match first {
                "channel" => ChannelIdentifier::ChannelId(value),
                "user" => ChannelIdentifier::User(value),
                "c" => ChannelIdentifier::Custom(value),
                _ => return Err(invalid()),
            }
        };

        if identifier.value().is_empty() {
            return Err(invalid());
        }
        Ok(identifier)
    }

    pub fn value(&self) -> &str {
        match self {
            ChannelIdentifier::Handle(v)
            | ChannelIdentifier::ChannelId(v)
            | ChannelIdentifier::User(v)
            | ChannelIdentifier::Custom(v) => v,
        }
    }
}

impl fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelIdentifier::Handle(v) => write!(f, "@{v}"),
            ChannelIdentifier::ChannelId(v) => write!(f, "channel/{v}"),
            ChannelIdentifier::User(v) => write!(f, "user/{v}"),
            ChannelIdentifier::Custom(v) => write!(f, "c/{v}"),
        }
    }
}

/// Turn an identifier into a canonical channel ID with at most one remote call.
///
/// Handles and usernames have direct lookups; custom names only resolve through
/// a channel-type search, so that is the one place search is used.
pub async fn resolve_channel_id<P>(platform: &P, identifier: &ChannelIdentifier) -> Result<String, ScrapeError>
where
    P: VideoPlatform + ?Sized,
{
    debug!("Resolving channel identifier {identifier}");

    let found = match identifier {
        ChannelIdentifier::ChannelId(id) => return Ok(id.clone()),
        ChannelIdentifier::Handle(handle) => platform.channel_id_for_handle(handle).await,
        ChannelIdentifier::User(username) => platform.channel_id_for_username(username).await,
        ChannelIdentifier::Custom(name) => platform.search_channel(name).await,
    }
    .map_err(|e| ScrapeError::ResolutionFailure(report_chain(&e)))?;

    found.ok_or_else(|| ScrapeError::ChannelNotFound(identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::VideoPage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn test_parse_handle() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/@MikeShortsx").unwrap(),
            ChannelIdentifier::Handle("MikeShortsx".to_string())
        );
    }

    #[test]
    fn test_parse_handle_with_tab_suffix() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/@creator/videos").unwrap(),
            ChannelIdentifier::Handle("creator".to_string())
        );
    }

    #[test]
    fn test_parse_channel_id() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/channel/UC_x5XG1OV2P6uZZ5FSM9Ttw").unwrap(),
            ChannelIdentifier::ChannelId("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string())
        );
    }

    #[test]
    fn test_parse_user() {
        assert_eq!(
            ChannelIdentifier::parse("https://youtube.com/user/oldname/").unwrap(),
            ChannelIdentifier::User("oldname".to_string())
        );
    }

    #[test]
    fn test_parse_custom() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/c/Vanity?view=0").unwrap(),
            ChannelIdentifier::Custom("Vanity".to_string())
        );
    }

    #[test]
    fn test_parse_non_ascii_handle() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/@日本語チャンネル").unwrap(),
            ChannelIdentifier::Handle("日本語チャンネル".to_string())
        );
    }

    #[test]
    fn test_parse_non_ascii_custom_name() {
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/c/Café").unwrap(),
            ChannelIdentifier::Custom("Café".to_string())
        );
        assert_eq!(
            ChannelIdentifier::parse("https://www.youtube.com/c/Caf%C3%A9").unwrap(),
            ChannelIdentifier::Custom("Café".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_invalid_utf8_escape() {
        let err = ChannelIdentifier::parse("https://www.youtube.com/@%FF%FE").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidChannelUrl(_)));
    }

    #[test]
    fn test_parse_whitespace_trimming() {
        assert_eq!(
            ChannelIdentifier::parse("  https://www.youtube.com/@spaced  ").unwrap(),
            ChannelIdentifier::Handle("spaced".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/",
            "https://www.youtube.com/channel/",
            "https://www.youtube.com/@",
            "https://www.youtube.com/playlist?list=PL123",
            "not a url",
            "",
        ] {
            let err = ChannelIdentifier::parse(input).unwrap_err();
            assert!(matches!(err, ScrapeError::InvalidChannelUrl(_)), "{input}: {err}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelIdentifier::Handle("a".into()).to_string(), "@a");
        assert_eq!(ChannelIdentifier::Custom("b".into()).to_string(), "c/b");
    }

    /// Records which lookup was used and answers from a fixed table
    #[derive(Default)]
    struct LookupPlatform {
        calls: Mutex<Vec<String>>,
        known: HashMap<String, String>,
        fail: bool,
    }

    impl LookupPlatform {
        fn lookup(&self, kind: &str, key: &str) -> eyre::Result<Option<String>> {
            self.calls.lock().unwrap().push(format!("{kind}:{key}"));
            if self.fail {
                eyre::bail!("network down");
            }
            Ok(self.known.get(key).cloned())
        }
    }

    #[async_trait]
    impl VideoPlatform for LookupPlatform {
        async fn channel_id_for_handle(&self, handle: &str) -> eyre::Result<Option<String>> {
            self.lookup("handle", handle)
        }

        async fn channel_id_for_username(&self, username: &str) -> eyre::Result<Option<String>> {
            self.lookup("user", username)
        }

        async fn search_channel(&self, query: &str) -> eyre::Result<Option<String>> {
            self.lookup("search", query)
        }

        async fn list_videos_page(&self, _: &str, _: usize, _: Option<&str>) -> eyre::Result<VideoPage> {
            unreachable!("resolution never lists videos")
        }

        async fn view_counts(&self, _: &[String]) -> eyre::Result<HashMap<String, u64>> {
            unreachable!("resolution never fetches statistics")
        }
    }

    fn platform_knowing(key: &str, id: &str) -> LookupPlatform {
        LookupPlatform {
            known: HashMap::from([(key.to_string(), id.to_string())]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_channel_id_passes_through() {
        let platform = LookupPlatform::default();
        let id = resolve_channel_id(&platform, &ChannelIdentifier::ChannelId("UC1".into()))
            .await
            .unwrap();
        assert_eq!(id, "UC1");
        assert!(platform.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_each_kind_uses_its_lookup() {
        let cases = [
            (ChannelIdentifier::Handle("h".into()), "handle:h"),
            (ChannelIdentifier::User("u".into()), "user:u"),
            (ChannelIdentifier::Custom("c".into()), "search:c"),
        ];
        for (identifier, expected_call) in cases {
            let platform = platform_knowing(identifier.value(), "UC123");
            let id = resolve_channel_id(&platform, &identifier).await.unwrap();
            assert_eq!(id, "UC123");
            assert_eq!(*platform.calls.lock().unwrap(), vec![expected_call.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_resolve_not_found_does_not_fall_back_to_search() {
        let platform = LookupPlatform::default();
        let err = resolve_channel_id(&platform, &ChannelIdentifier::Handle("nobody".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::ChannelNotFound(ref s) if s == "@nobody"));
        assert_eq!(*platform.calls.lock().unwrap(), vec!["handle:nobody".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_non_ascii_handle_encodes_once() {
        use crate::youtube::DataApiClient;
        use serde_json::json;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("forHandle", "日本語チャンネル"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "UCjp" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DataApiClient::new(reqwest::Client::new(), "k").with_base_url(server.uri());
        let identifier = ChannelIdentifier::parse("https://www.youtube.com/@日本語チャンネル").unwrap();
        let id = resolve_channel_id(&client, &identifier).await.unwrap();
        assert_eq!(id, "UCjp");

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default().to_string();
        assert!(query.contains("forHandle=%E6%97%A5"), "{query}");
        assert!(!query.contains("%25"), "{query}");
    }

    #[tokio::test]
    async fn test_resolve_transport_error() {
        let platform = LookupPlatform {
            fail: true,
            ..Default::default()
        };
        let err = resolve_channel_id(&platform, &ChannelIdentifier::User("u".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::ResolutionFailure(ref m) if m.contains("network down")));
    }
}

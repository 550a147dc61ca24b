//! Property-based tests for the gateway's header and identifier invariants

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use storefront_gateway::proxy::headers::{
    filter_response_headers, forward_headers, RESPONSE_HEADER_ALLOW_LIST, X_FORWARDED_FOR,
    X_FORWARDED_PROTO, X_REQUEST_ID,
};
use storefront_gateway::proxy::types::{
    InboundRequest, RequestId, UpstreamUrl, MAX_REQUEST_ID_LEN,
};

pub mod generators {
    use super::*;
    use proptest::collection::vec;
    use proptest::string::string_regex;

    /// Header names as a backend might send them
    pub fn header_name() -> impl Strategy<Value = HeaderName> {
        string_regex("[a-z][a-z0-9-]{0,24}")
            .unwrap()
            .prop_filter_map("Invalid header name", |s| {
                HeaderName::from_bytes(s.as_bytes()).ok()
            })
    }

    /// Visible ASCII header values
    pub fn header_value() -> impl Strategy<Value = HeaderValue> {
        string_regex("[!-~]{1,32}")
            .unwrap()
            .prop_filter_map("Invalid header value", |s| HeaderValue::from_str(&s).ok())
    }

    /// Arbitrary upstream response header maps
    pub fn header_map() -> impl Strategy<Value = HeaderMap> {
        vec((header_name(), header_value()), 0..12).prop_map(|pairs| {
            let mut headers = HeaderMap::new();
            for (name, value) in pairs {
                headers.append(name, value);
            }
            headers
        })
    }

    /// Inbound requests with arbitrary client headers and bodies
    pub fn inbound_request() -> impl Strategy<Value = InboundRequest> {
        (header_map(), vec(any::<u8>(), 0..64), any::<Option<u32>>()).prop_map(
            |(headers, body, ip)| InboundRequest {
                method: Method::POST,
                uri: Uri::from_static("/api/orders"),
                headers,
                body: Bytes::from(body),
                client_ip: ip.map(|bits| IpAddr::V4(Ipv4Addr::from(bits))),
                request_id: RequestId::generate(),
            },
        )
    }
}

proptest! {
    #[test]
    fn relayed_headers_are_always_allow_listed(
        headers in generators::header_map(),
        include_request_id in any::<bool>(),
    ) {
        let filtered = filter_response_headers(&headers, include_request_id);

        for name in filtered.keys() {
            let allowed = RESPONSE_HEADER_ALLOW_LIST.contains(name)
                || (include_request_id && name.as_str() == X_REQUEST_ID);
            prop_assert!(allowed, "{} leaked through the filter", name);
        }
    }

    #[test]
    fn outbound_headers_never_copy_client_headers(request in generators::inbound_request()) {
        let outbound = forward_headers(&request, Some(&request.request_id));

        for name in outbound.keys() {
            prop_assert!(
                matches!(
                    name.as_str(),
                    "content-type" | X_FORWARDED_FOR | X_FORWARDED_PROTO | X_REQUEST_ID
                ),
                "unexpected outbound header {}",
                name
            );
        }
        prop_assert_eq!(outbound.contains_key("content-type"), !request.body.is_empty());
        prop_assert!(outbound.contains_key(X_FORWARDED_FOR));
    }

    #[test]
    fn accepted_request_ids_are_bounded_visible_ascii(candidate in "\\PC{0,160}") {
        if let Some(id) = RequestId::parse(&candidate) {
            prop_assert!(!id.as_str().is_empty());
            prop_assert!(id.as_str().len() <= MAX_REQUEST_ID_LEN);
            prop_assert!(id.as_str().bytes().all(|b| b.is_ascii_graphic()));
            prop_assert!(id.to_header_value().is_some());
        }
    }

    #[test]
    fn upstream_urls_lose_trailing_slashes(
        host in "[a-z]{1,12}",
        port in 1_u16..,
        slashes in 0_usize..4,
    ) {
        let raw = format!("http://{host}:{port}{}", "/".repeat(slashes));
        let url = UpstreamUrl::try_new(raw).unwrap();
        prop_assert!(!url.as_ref().ends_with('/'));
    }
}

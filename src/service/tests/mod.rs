use super::test_helpers::*;
use super::*;
use crate::config::ArchivePolicy;
use crate::error::Error;
use crate::types::{JobId, JobOptions, Status};
use std::sync::atomic::Ordering;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// Serve `body` at `route` and return the full URL
async fn serve(server: &MockServer, route: &str, body: &[u8]) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

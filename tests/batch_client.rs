use httpmock::{
    Method::{HEAD, POST},
    MockServer,
};
use odata_batch::{
    BatchClient, BatchConfig, BatchError, BatchRequest, BatchResultItem, HttpMethod, ParseMode,
    TokenPolicy,
};
use serde_json::json;

fn multipart_body(boundary: &str, parts: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (content_type, body) in parts {
        out.push_str(&format!(
            "--{boundary}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n\
             HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\n\r\n{body}\r\n"
        ));
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out
}

async fn mock_token<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
    let token = token.to_string();
    server
        .mock_async(|when, then| {
            when.method(HEAD)
                .path("/odata/")
                .header("x-csrf-token", "Fetch");
            then.status(200).header("x-csrf-token", token);
        })
        .await
}

#[tokio::test]
async fn results_follow_url_order() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let token_mock = mock_token(&server, "abc123").await;
    let response = multipart_body(
        "resp_1",
        &[
            ("application/json", r#"{"url":"Products"}"#),
            ("application/json", r#"{"url":"Suppliers"}"#),
            ("application/json", r#"{"url":"Categories"}"#),
        ],
    );
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/odata/$batch")
                .header("x-csrf-token", "abc123")
                .body_includes("GET Products HTTP/1.1\r\nAccept: application/json\r\n")
                .body_includes("GET Suppliers HTTP/1.1")
                .body_includes("GET Categories HTTP/1.1");
            then.status(202)
                .header("content-type", "multipart/mixed; boundary=resp_1")
                .body(response);
        })
        .await;

    let client = BatchClient::new(server.url("/odata/"));
    let results = client
        .create_multipart_request(&["Products", "Suppliers", "Categories"])
        .await?;

    token_mock.assert_async().await;
    batch_mock.assert_async().await;
    assert_eq!(
        results,
        vec![
            BatchResultItem::Json(json!({ "url": "Products" })),
            BatchResultItem::Json(json!({ "url": "Suppliers" })),
            BatchResultItem::Json(json!({ "url": "Categories" })),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn prepared_envelope_carries_fetched_token() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "abc123").await;

    let client = BatchClient::new(server.url("/odata/"));
    let envelope = client
        .prepare(vec![BatchRequest::get("Products")])
        .await?;

    assert_eq!(envelope.csrf_token(), Some("abc123"));
    let boundary = envelope
        .content_type()
        .and_then(|value| value.strip_prefix("multipart/mixed;boundary="))
        .expect("boundary");
    assert_eq!(boundary, envelope.boundary);
    assert_eq!(envelope.options.method, HttpMethod::Post);
    assert!(envelope.options.body.ends_with(&format!(
        "Accept: application/json\r\n\r\n\r\n--{boundary}--\r\n"
    )));
    assert_eq!(envelope.options.body.matches(&format!("--{boundary}")).count(), 2);
    Ok(())
}

#[tokio::test]
async fn missing_token_header_fails_before_posting() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(HEAD).path("/odata/");
            then.status(200);
        })
        .await;
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/odata/$batch");
            then.status(200);
        })
        .await;

    let client = BatchClient::new(server.url("/odata/"));
    let err = client
        .create_multipart_request(&["Products"])
        .await
        .expect_err("token fetch should fail");

    match &err {
        BatchError::TokenFetch(message) => assert_eq!(message, "Cannot fetch X-CSRF-Token."),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "Cannot fetch X-CSRF-Token.");
    token_mock.assert_async().await;
    batch_mock.assert_calls(0);
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_a_token_fetch_error() {
    let client = BatchClient::new("http://127.0.0.1:1/odata/");
    let err = client
        .create_multipart_request(&["Products"])
        .await
        .expect_err("connection should be refused");
    match err {
        BatchError::TokenFetch(message) => {
            assert!(!message.is_empty());
            assert_ne!(message, "Cannot fetch X-CSRF-Token.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn optional_token_policy_sends_without_header() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/odata/");
            then.status(405);
        })
        .await;
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/odata/$batch");
            then.status(200)
                .header("content-type", "multipart/mixed; boundary=r")
                .body(multipart_body("r", &[("text/plain", "42")]));
        })
        .await;

    let client =
        BatchClient::new(server.url("/odata/")).with_token_policy(TokenPolicy::Optional);
    let envelope = client.prepare(vec![BatchRequest::get("Count")]).await?;
    assert_eq!(envelope.csrf_token(), None);

    let results = client.create_multipart_request(&["Products/$count"]).await?;
    batch_mock.assert_async().await;
    assert_eq!(results, vec![BatchResultItem::Text("42".to_string())]);
    Ok(())
}

#[tokio::test]
async fn server_error_rejects_whole_batch() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "t").await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/odata/$batch");
            then.status(500).body("boom");
        })
        .await;

    let client = BatchClient::new(server.url("/odata/"));
    let err = client
        .create_multipart_request(&["A", "B"])
        .await
        .expect_err("500 should fail");

    assert_eq!(err.to_string(), "Failed to fetch data from the server.");
    match err {
        BatchError::Transport { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn legacy_mode_carries_content_type_between_parts() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "t").await;
    let response = [
        "--r",
        "Content-Type: application/http",
        "",
        "HTTP/1.1 200 OK",
        "Content-Type: application/json",
        "",
        r#"{"a":1}"#,
        "--r",
        "Content-Type: application/http",
        "",
        "HTTP/1.1 200 OK",
        "",
        "raw part two",
        "--r--",
        "",
    ]
    .join("\r\n");
    server
        .mock_async(|when, then| {
            when.method(POST).path("/odata/$batch");
            then.status(200).body(response);
        })
        .await;

    let client = BatchClient::new(server.url("/odata/"));
    let legacy = client
        .clone()
        .with_parse_mode(ParseMode::Legacy)
        .create_multipart_request(&["A", "B"])
        .await?;
    assert_eq!(
        legacy,
        vec![
            BatchResultItem::Json(json!({ "a": 1 })),
            BatchResultItem::Text("raw part two".to_string()),
        ]
    );

    let err = client
        .create_multipart_request(&["A", "B"])
        .await
        .expect_err("strict mode rejects the unlabeled part");
    assert!(matches!(err, BatchError::Parse(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn config_headers_and_query_params_reach_both_requests() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(HEAD)
                .path("/odata/")
                .query_param("sap-client", "100")
                .header("sap-language", "EN");
            then.status(200).header("x-csrf-token", "q");
        })
        .await;
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/odata/$batch")
                .query_param("sap-client", "100")
                .header("sap-language", "EN")
                .header("x-csrf-token", "q");
            then.status(200)
                .header("content-type", "multipart/mixed; boundary=r")
                .body(multipart_body("r", &[("application/json", "[1,2]")]));
        })
        .await;

    let mut config = BatchConfig::new(server.url("/odata/"));
    config
        .http_query_params
        .insert("sap-client".to_string(), "100".to_string());
    config
        .http_headers
        .insert("sap-language".to_string(), "EN".to_string());
    let client = BatchClient::from_config(config)?;
    let results = client.create_multipart_request(&["Numbers"]).await?;

    token_mock.assert_async().await;
    batch_mock.assert_async().await;
    assert_eq!(results, vec![BatchResultItem::Json(json!([1, 2]))]);
    Ok(())
}

#[tokio::test]
async fn oversized_response_is_rejected() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "t").await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/odata/$batch");
            then.status(200)
                .header("content-type", "multipart/mixed; boundary=r")
                .body(multipart_body("r", &[("text/plain", &"x".repeat(256))]));
        })
        .await;

    let mut config = BatchConfig::new(server.url("/odata/"));
    config.max_response_bytes = 64;
    let client = BatchClient::from_config(config)?;
    let err = client
        .create_multipart_request(&["Big"])
        .await
        .expect_err("body exceeds limit");
    assert!(matches!(err, BatchError::Parse(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn execute_exposes_part_statuses() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "t").await;
    let response = [
        "--r",
        "Content-Type: application/http",
        "",
        "HTTP/1.1 204 No Content",
        "",
        "",
        "--r",
        "Content-Type: application/http",
        "",
        "HTTP/1.1 404 Not Found",
        "Content-Type: application/json",
        "",
        r#"{"error":"missing"}"#,
        "--r--",
    ]
    .join("\r\n");
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/odata/$batch")
                .body_includes("PATCH Products(1) HTTP/1.1")
                .body_includes(r#"{"Price":3}"#);
            then.status(200).body(response);
        })
        .await;

    let client = BatchClient::new(server.url("/odata/"));
    let parts = client
        .execute(vec![
            BatchRequest::new(HttpMethod::Patch, "Products(1)")
                .with_header("Content-Type", "application/json")
                .with_body(r#"{"Price":3}"#),
            BatchRequest::get("Products(999)"),
        ])
        .await?;

    batch_mock.assert_async().await;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].status, Some(204));
    assert!(parts[0].is_success());
    assert_eq!(parts[1].status, Some(404));
    assert_eq!(parts[1].header("content-type"), Some("application/json"));
    Ok(())
}

#[tokio::test]
async fn one_shot_function_sends_single_part() -> odata_batch::Result<()> {
    if odata_batch::utils::test_support::should_skip_httpmock() {
        return Ok(());
    }

    let server = MockServer::start_async().await;
    let _token_mock = mock_token(&server, "t").await;
    let batch_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/odata/$batch")
                .body_includes("GET Products('a%20b') HTTP/1.1\r\nAccept: application/json\r\n\r\n\r\n--batch_");
            then.status(200)
                .header("content-type", "multipart/mixed; boundary=r")
                .body(multipart_body("r", &[("application/json", "{}")]));
        })
        .await;

    let results =
        odata_batch::create_multipart_request(&server.url("/odata/"), &["Products('a b')"]).await?;

    batch_mock.assert_async().await;
    assert_eq!(results, vec![BatchResultItem::Json(json!({}))]);
    Ok(())
}

//! Verify request building and error normalization against the JSON test
//! vectors stored in `test-vectors/`.
//!
//! Comparing parsed JSON (not raw strings) avoids false negatives from
//! field-ordering differences.

use taskflow_core::{
    ApiClient, ApiError, HttpMethod, HttpRequest, HttpResponse, MemoryCredentials, UpdateTask,
};

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let base_url = vectors["base_url"].as_str().unwrap();
    let token = vectors["token"].as_str().unwrap();
    let client = ApiClient::new(base_url, MemoryCredentials::with_token(token));

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_str().unwrap_or_default();

        let req: HttpRequest = match case["operation"].as_str().unwrap() {
            "list" => client.build_list_tasks(),
            "create" => client
                .build_create_task(case["input"]["title"].as_str().unwrap())
                .unwrap(),
            "update" => {
                let changes: UpdateTask = serde_json::from_value(case["input"].clone()).unwrap();
                client.build_update_task(id, &changes).unwrap()
            }
            "delete" => client.build_delete_task(id),
            "me" => client.build_current_user(),
            other => panic!("{name}: unknown operation {other}"),
        };

        let expected = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{base_url}{}", expected["path"].as_str().unwrap()), "{name}: path");
        assert_eq!(req.header("content-type"), Some("application/json"), "{name}: content type");
        assert_eq!(
            req.header("authorization"),
            Some(format!("Bearer {token}").as_str()),
            "{name}: authorization"
        );

        match req.body.as_deref() {
            Some(body) => {
                let body: serde_json::Value = serde_json::from_str(body).unwrap();
                assert_eq!(body, expected["body"], "{name}: body");
            }
            None => assert!(expected["body"].is_null(), "{name}: body should be present"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error normalization
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let client = ApiClient::anonymous("http://localhost:3000");
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["response"];
        let response = HttpResponse::new(
            sim["status"].as_u64().unwrap() as u16,
            sim["body"].as_str().unwrap(),
        );

        // Every parse path shares the same normalization.
        let errors = [
            client.parse_list_tasks(response.clone()).unwrap_err(),
            client.parse_task(response.clone()).unwrap_err(),
            client.parse_delete_task(response.clone()).unwrap_err(),
            client.parse_current_user(response).unwrap_err(),
        ];

        let status = case["expected_status"].as_u64().unwrap() as u16;
        let message = case["expected_message"].as_str().unwrap();
        for err in errors {
            match err {
                ApiError::Remote { status: s, message: m } => {
                    assert_eq!(s, status, "{name}: status");
                    assert_eq!(m, message, "{name}: message");
                }
                other => panic!("{name}: expected Remote, got {other:?}"),
            }
        }
    }
}

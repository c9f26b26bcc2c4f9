use std::sync::Arc;

use axum_test::TestServer;
use reqwest::StatusCode;
use serde_json::{Value, json};

use roster::{Catalog, InMemoryDataStore, RosterConfig, create_router};

const LIBRARY: &str = r#"
entities:
  - name: user
    fields:
      - { name: id, type: integer, identity: true }
      - { name: username, type: text, max_length: 100 }
      - { name: email, type: text, max_length: 100 }
      - { name: dateOfBirth, type: date }
      - { name: isActive, type: boolean }
  - name: book
    fields:
      - { name: isbn, type: text, identity: true, max_length: 13 }
      - { name: title, type: text }
      - { name: price, type: float, required: false }
      - { name: format, type: enum, values: [hardcover, paperback] }
"#;

fn server_for(yaml: &str) -> TestServer {
    let registry = RosterConfig::from_yaml(yaml).unwrap().registry().unwrap();
    let catalog = Catalog::new(&registry, Arc::new(InMemoryDataStore::new()));
    TestServer::new(create_router(&catalog)).unwrap()
}

fn ada() -> Value {
    json!({
        "id": 1,
        "username": "ada",
        "email": "a@x.com",
        "dateOfBirth": "1990-01-01",
        "isActive": true
    })
}

#[tokio::test]
async fn ada_example() {
    let server = server_for(LIBRARY);

    let created = server.post("/user/").json(&ada()).await;
    created.assert_status_ok();
    assert_eq!(created.json::<Value>(), ada());

    server.get("/user/1/").await.assert_json(&ada());
    server.get("/user/count/").await.assert_json(&json!({"count": 1}));
    server
        .get("/user/paginated/")
        .await
        .assert_json(&json!({"total": 1, "skip": 0, "limit": 100, "data": [ada()]}));

    server
        .post("/user/")
        .json(&ada())
        .await
        .assert_status(StatusCode::CONFLICT);
    server.get("/user/count/").await.assert_json(&json!({"count": 1}));
}

#[tokio::test]
async fn validation_reports_first_violation() {
    let server = server_for(LIBRARY);

    let mut body = ada();
    body["nickname"] = json!("al");
    body["isActive"] = json!("yes");
    let response = server.post("/user/").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let message = response.json::<Value>()["message"].as_str().unwrap().to_string();
    assert!(message.contains("'nickname'"), "{}", message);

    let response = server.post("/user/").json(&json!([ada()])).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let message = response.json::<Value>()["message"].as_str().unwrap().to_string();
    assert!(message.contains("'$body'"), "{}", message);
}

#[tokio::test]
async fn text_identities_and_optional_fields() {
    let server = server_for(LIBRARY);
    let book = json!({
        "isbn": "9780262510875",
        "title": "Structure and Interpretation of Computer Programs",
        "format": "paperback"
    });

    let created = server.post("/book/").json(&book).await;
    created.assert_status_ok();
    assert_eq!(created.json::<Value>()["price"], Value::Null);

    let fetched = server.get("/book/9780262510875/").await.json::<Value>();
    assert_eq!(fetched["title"], book["title"]);

    let found = server
        .get("/book/search/")
        .add_query_param("format", "paperback")
        .await
        .json::<Value>();
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    let mut bad = book.clone();
    bad["isbn"] = json!("9780262510876");
    bad["format"] = json!("scroll");
    server
        .post("/book/")
        .json(&bad)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .delete("/book/bulk/")
        .json(&json!(["9780262510875", "0000000000000"]))
        .await
        .assert_json(&json!({
            "deleted_count": 1,
            "not_found": ["0000000000000"],
            "message": "Successfully deleted 1 book entities"
        }));
}

#[tokio::test]
async fn page_limits_are_clamped() {
    let server = server_for(LIBRARY);
    for id in 1..=3 {
        let mut user = ada();
        user["id"] = json!(id);
        server.post("/user/").json(&user).await.assert_status_ok();
    }

    let page = server
        .get("/user/paginated/")
        .add_query_param("skip", -5)
        .add_query_param("limit", 5000)
        .await
        .json::<Value>();
    assert_eq!(page["skip"], json!(0));
    assert_eq!(page["limit"], json!(1000));
    assert_eq!(page["data"].as_array().map(Vec::len), Some(3));

    let page = server
        .get("/user/paginated/")
        .add_query_param("limit", 0)
        .await
        .json::<Value>();
    assert_eq!(page["limit"], json!(1));
    assert_eq!(page["data"][0]["id"], json!(1));
}

#[tokio::test]
async fn update_requires_matching_identity() {
    let server = server_for(LIBRARY);
    server.post("/user/").json(&ada()).await.assert_status_ok();

    let mut moved = ada();
    moved["id"] = json!(2);
    let response = server.put("/user/1/").json(&moved).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["kind"], json!("bad_request"));

    server
        .put("/user/2/")
        .json(&moved)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
    let server = server_for(LIBRARY);
    let response = server.get("/order/").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["kind"], json!("not_found"));
}

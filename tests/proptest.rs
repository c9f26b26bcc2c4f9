use std::collections::BTreeSet;
use std::sync::Arc;

use axum_test::TestServer;
use proptest::prelude::*;
use reqwest::StatusCode;
use serde_json::{Value, json};

use roster::{Catalog, InMemoryDataStore, SchemaRegistry, create_router, user_schema};

/// Test infrastructure for property testing the roster API
pub struct ApiTestServer {
    pub server: TestServer,
}

impl Default for ApiTestServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiTestServer {
    /// Create a new test server over a fresh in-memory data store
    pub fn new() -> Self {
        let registry = SchemaRegistry::new(vec![user_schema()]).unwrap();
        let catalog = Catalog::new(&registry, Arc::new(InMemoryDataStore::new()));
        let server = TestServer::new(create_router(&catalog)).unwrap();
        Self { server }
    }

    async fn create(&self, user: &Value) -> StatusCode {
        self.server.post("/user/").json(user).await.status_code()
    }

    async fn count(&self) -> u64 {
        let response = self.server.get("/user/count/").await;
        response.json::<Value>()["count"].as_u64().unwrap()
    }

    async fn list(&self) -> Vec<Value> {
        self.server.get("/user/").await.json()
    }
}

/// Property test strategies for generating test data
pub mod strategies {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::string::string_regex;

    /// Everything of a user except its identity
    #[derive(Debug, Clone)]
    pub struct UserFields {
        pub username: String,
        pub email: String,
        pub date_of_birth: String,
        pub is_active: bool,
    }

    impl UserFields {
        pub fn with_id(&self, id: i64) -> Value {
            json!({
                "id": id,
                "username": self.username,
                "email": self.email,
                "dateOfBirth": self.date_of_birth,
                "isActive": self.is_active
            })
        }
    }

    /// Strategy for generating valid user fields
    pub fn user_fields_strategy() -> impl Strategy<Value = UserFields> {
        (
            string_regex(r"[a-z][a-z0-9_]{0,29}").unwrap(),
            string_regex(r"[a-z]{1,20}@[a-z]{1,20}\.(com|org)").unwrap(),
            (1900i32..2024, 1u32..=12, 1u32..=28),
            any::<bool>(),
        )
            .prop_map(|(username, email, (y, m, d), is_active)| UserFields {
                username,
                email,
                date_of_birth: format!("{:04}-{:02}-{:02}", y, m, d),
                is_active,
            })
    }

    /// Strategy for generating a valid user with the given identity range
    pub fn user_strategy() -> impl Strategy<Value = Value> {
        (-10_000i64..10_000, user_fields_strategy()).prop_map(|(id, fields)| fields.with_id(id))
    }

    /// Strategy for generating sets of distinct identities
    pub fn id_set_strategy(max: usize) -> impl Strategy<Value = BTreeSet<i64>> {
        btree_set(-500i64..500, 0..max)
    }

    /// Strategy for generating a batch of users with distinct identities
    pub fn user_batch_strategy() -> impl Strategy<Value = Vec<Value>> {
        (btree_set(-500i64..500, 1..12), user_fields_strategy()).prop_map(|(ids, fields)| {
            ids.into_iter().map(|id| fields.with_id(id)).collect()
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    #[test]
    fn create_then_get_roundtrip(user in strategies::user_strategy()) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();

            prop_assert_eq!(test_server.create(&user).await, StatusCode::OK);

            let response = test_server.server
                .get(&format!("/user/{}/", user["id"]))
                .await;
            prop_assert_eq!(response.status_code(), StatusCode::OK);
            prop_assert_eq!(response.json::<Value>(), user);
            Ok(())
        })?;
    }

    #[test]
    fn full_replacement_update_is_idempotent(
        original in strategies::user_fields_strategy(),
        replacement in strategies::user_fields_strategy(),
        id in -100i64..100,
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            test_server.create(&original.with_id(id)).await;

            let path = format!("/user/{}/", id);
            let first = test_server.server.put(&path).json(&replacement.with_id(id)).await;
            let second = test_server.server.put(&path).json(&replacement.with_id(id)).await;

            prop_assert_eq!(first.status_code(), StatusCode::OK);
            prop_assert_eq!(second.status_code(), StatusCode::OK);
            prop_assert_eq!(first.json::<Value>(), second.json::<Value>());
            prop_assert_eq!(
                test_server.server.get(&path).await.json::<Value>(),
                replacement.with_id(id)
            );
            Ok(())
        })?;
    }

    #[test]
    fn count_equals_list_length(
        ids in strategies::id_set_strategy(30),
        fields in strategies::user_fields_strategy(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            for id in &ids {
                prop_assert_eq!(test_server.create(&fields.with_id(*id)).await, StatusCode::OK);
            }

            let list = test_server.list().await;
            prop_assert_eq!(test_server.count().await, list.len() as u64);
            prop_assert_eq!(list.len(), ids.len());
            Ok(())
        })?;
    }

    #[test]
    fn pages_are_contiguous_slices_of_the_list(
        ids in strategies::id_set_strategy(40),
        fields in strategies::user_fields_strategy(),
        skip in 0usize..50,
        limit in 1usize..20,
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            for id in &ids {
                test_server.create(&fields.with_id(*id)).await;
            }

            let list = test_server.list().await;
            let page = test_server.server
                .get("/user/paginated/")
                .add_query_param("skip", skip)
                .add_query_param("limit", limit)
                .await
                .json::<Value>();

            let expected: Vec<Value> = list.iter().skip(skip).take(limit).cloned().collect();
            prop_assert_eq!(page["data"].as_array().cloned().unwrap_or_default(), expected);
            prop_assert_eq!(page["total"].as_u64(), Some(test_server.count().await));
            prop_assert_eq!(page["skip"].as_u64(), Some(skip as u64));
            prop_assert_eq!(page["limit"].as_u64(), Some(limit as u64));
            Ok(())
        })?;
    }

    #[test]
    fn duplicate_identity_is_conflict(
        first in strategies::user_fields_strategy(),
        second in strategies::user_fields_strategy(),
        id in -100i64..100,
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            prop_assert_eq!(test_server.create(&first.with_id(id)).await, StatusCode::OK);
            prop_assert_eq!(test_server.create(&second.with_id(id)).await, StatusCode::CONFLICT);

            prop_assert_eq!(test_server.count().await, 1);
            let stored = test_server.server.get(&format!("/user/{}/", id)).await;
            prop_assert_eq!(stored.json::<Value>(), first.with_id(id));
            Ok(())
        })?;
    }

    #[test]
    fn bulk_create_with_one_invalid_item_stores_nothing(
        batch in strategies::user_batch_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            let bad_index = pick.index(batch.len());
            let mut batch = batch;
            if let Some(item) = batch[bad_index].as_object_mut() {
                item.remove("email");
            }

            let response = test_server.server.post("/user/bulk/").json(&batch).await;
            prop_assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

            let body = response.json::<Value>();
            let indices: Vec<u64> = body["errors"]
                .as_array()
                .map(|errors| errors.iter().filter_map(|e| e["index"].as_u64()).collect())
                .unwrap_or_default();
            prop_assert_eq!(indices, vec![bad_index as u64]);
            prop_assert_eq!(test_server.count().await, 0);
            Ok(())
        })?;
    }

    #[test]
    fn bulk_delete_reports_exactly_the_missing_ids(
        existing in strategies::id_set_strategy(20),
        requested in strategies::id_set_strategy(20),
        fields in strategies::user_fields_strategy(),
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            for id in &existing {
                test_server.create(&fields.with_id(*id)).await;
            }

            let requested: Vec<i64> = requested.into_iter().collect();
            let response = test_server.server.delete("/user/bulk/").json(&requested).await;
            prop_assert_eq!(response.status_code(), StatusCode::OK);

            let body = response.json::<Value>();
            let missing: Vec<i64> = requested
                .iter()
                .copied()
                .filter(|id| !existing.contains(id))
                .collect();
            let deleted = requested.len() - missing.len();
            prop_assert_eq!(body["not_found"].clone(), json!(missing));
            prop_assert_eq!(body["deleted_count"].as_u64(), Some(deleted as u64));
            prop_assert_eq!(test_server.count().await, (existing.len() - deleted) as u64);
            Ok(())
        })?;
    }

    #[test]
    fn delete_of_missing_id_leaves_storage_unchanged(
        ids in strategies::id_set_strategy(15),
        fields in strategies::user_fields_strategy(),
        missing in 500i64..1000,
    ) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let test_server = ApiTestServer::new();
            for id in &ids {
                test_server.create(&fields.with_id(*id)).await;
            }
            let before = test_server.list().await;

            let response = test_server.server.delete(&format!("/user/{}/", missing)).await;
            prop_assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
            prop_assert_eq!(test_server.list().await, before);
            Ok(())
        })?;
    }
}

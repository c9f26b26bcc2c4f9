//! # Record Command Handler
//!
//! This module handles the record commands of one entity: creation, retrieval, listing,
//! counting, paging, searching, updating, deletion, and the bulk variants.

use serde_json::Value;

use crate::commands::shared::{
    CommandContext, dispatch_command, identity_values, parse_i64_or_exit, parse_json_or_exit,
    parse_search_terms_or_exit, validate_args_count_or_exit,
};
use crate::data_store::DEFAULT_PAGE_LIMIT;
use crate::service::{BulkCreateResponse, BulkDeleteResponse, CountResponse};
use crate::{cli_utils, http_utils};

const RECORD_USAGE: &str = "Usage: rosterctl <entity> <create|get|list|count|page|search|update|delete|bulk-create|bulk-delete> [args...]";

/// Handles all record commands for `context.entity`.
///
/// # Arguments
/// * `args` - Command arguments (first element is the subcommand)
/// * `context` - Entity name, HTTP client and output format
pub async fn handle_record_command(args: &[String], context: &CommandContext<'_>) {
    dispatch_command!("record", RECORD_USAGE, args, context, {
        "create" => handle_create,
        "get" => handle_get,
        "list" => handle_list,
        "count" => handle_count,
        "page" => handle_page,
        "search" => handle_search,
        "update" => handle_update,
        "delete" => handle_delete,
        "bulk-create" => handle_bulk_create,
        "bulk-delete" => handle_bulk_delete,
    });
}

async fn handle_create(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "create",
        r#"Usage: rosterctl <entity> create <record-json>
Example: rosterctl user create '{"id":1,"username":"ada","email":"a@x.com","dateOfBirth":"1990-01-01","isActive":true}'"#,
    );

    let record = parse_json_or_exit(&args[1]);
    let created = http_utils::execute_or_exit(
        || context.client.post::<Value, Value>(context.entity, &record),
        &format!("Failed to create {}", context.entity),
    )
    .await;

    println!("Created {}:", context.entity);
    cli_utils::print_or_exit(&created, context.yaml, "record");
}

async fn handle_get(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(args, 2, 2, "get", "Usage: rosterctl <entity> get <id>");

    let path = format!("{}/{}", context.entity, args[1]);
    let record = http_utils::execute_or_exit(
        || context.client.get::<Value>(&path),
        &format!("Failed to get {} {}", context.entity, args[1]),
    )
    .await;

    cli_utils::print_or_exit(&record, context.yaml, "record");
}

async fn handle_list(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(args, 1, 1, "list", "Usage: rosterctl <entity> list");

    let records = http_utils::execute_or_exit(
        || context.client.get::<Vec<Value>>(context.entity),
        &format!("Failed to list {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&records, context.yaml, "records");
}

async fn handle_count(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(args, 1, 1, "count", "Usage: rosterctl <entity> count");

    let path = format!("{}/count", context.entity);
    let count = http_utils::execute_or_exit(
        || context.client.get::<CountResponse>(&path),
        &format!("Failed to count {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&count, context.yaml, "count");
}

/// Query pairs for `page [skip] [limit]`, defaulting to the first page of the server's size.
fn page_query(args: &[String]) -> [(&'static str, i64); 2] {
    let skip = args.get(1).map_or(0, |s| parse_i64_or_exit(s));
    let limit = args
        .get(2)
        .map_or(DEFAULT_PAGE_LIMIT as i64, |s| parse_i64_or_exit(s));
    [("skip", skip), ("limit", limit)]
}

async fn handle_page(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        1,
        3,
        "page",
        "Usage: rosterctl <entity> page [skip] [limit]",
    );

    let path = format!("{}/paginated", context.entity);
    let query = page_query(args);
    let page = http_utils::execute_or_exit(
        || context.client.get_with_query::<_, Value>(&path, &query),
        &format!("Failed to page {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&page, context.yaml, "page");
}

async fn handle_search(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        1,
        usize::MAX,
        "search",
        "Usage: rosterctl <entity> search [field=value...]",
    );

    let params = parse_search_terms_or_exit(&args[1..]);
    let path = format!("{}/search", context.entity);
    let records = http_utils::execute_or_exit(
        || context.client.get_with_query::<_, Vec<Value>>(&path, &params),
        &format!("Failed to search {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&records, context.yaml, "records");
}

async fn handle_update(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        3,
        3,
        "update",
        "Usage: rosterctl <entity> update <id> <record-json>",
    );

    let record = parse_json_or_exit(&args[2]);
    let path = format!("{}/{}", context.entity, args[1]);
    let updated = http_utils::execute_or_exit(
        || context.client.put::<Value, Value>(&path, &record),
        &format!("Failed to update {} {}", context.entity, args[1]),
    )
    .await;

    println!("Updated {}:", context.entity);
    cli_utils::print_or_exit(&updated, context.yaml, "record");
}

async fn handle_delete(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(args, 2, 2, "delete", "Usage: rosterctl <entity> delete <id>");

    let path = format!("{}/{}", context.entity, args[1]);
    let deleted = http_utils::execute_or_exit(
        || context.client.delete::<Value>(&path),
        &format!("Failed to delete {} {}", context.entity, args[1]),
    )
    .await;

    println!("Deleted {}:", context.entity);
    cli_utils::print_or_exit(&deleted, context.yaml, "record");
}

async fn handle_bulk_create(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "bulk-create",
        "Usage: rosterctl <entity> bulk-create <records-json-array>",
    );

    let records = parse_json_or_exit(&args[1]);
    if !records.is_array() {
        cli_utils::exit_with_usage_error(
            "bulk-create expects a JSON array of records",
            "Usage: rosterctl <entity> bulk-create '[{...}, {...}]'",
        );
    }
    let path = format!("{}/bulk", context.entity);
    let response = http_utils::execute_or_exit(
        || context.client.post::<Value, BulkCreateResponse>(&path, &records),
        &format!("Failed to bulk create {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&response, context.yaml, "bulk create result");
}

async fn handle_bulk_delete(args: &[String], context: &CommandContext<'_>) {
    validate_args_count_or_exit(
        args,
        2,
        usize::MAX,
        "bulk-delete",
        "Usage: rosterctl <entity> bulk-delete <id>...",
    );

    let ids = identity_values(&args[1..]);
    let path = format!("{}/bulk", context.entity);
    let response = http_utils::execute_or_exit(
        || {
            context
                .client
                .delete_with_body::<_, BulkDeleteResponse>(&path, &ids)
        },
        &format!("Failed to bulk delete {}", context.entity),
    )
    .await;

    cli_utils::print_or_exit(&response, context.yaml, "bulk delete result");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn page_query_defaults() {
        assert_eq!(page_query(&strings(&["page"])), [("skip", 0), ("limit", 100)]);
        assert_eq!(page_query(&strings(&["page", "20"])), [("skip", 20), ("limit", 100)]);
        assert_eq!(
            page_query(&strings(&["page", "5", "10"])),
            [("skip", 5), ("limit", 10)]
        );
    }

    #[tokio::test]
    async fn page_query_outlives_the_request_closure() {
        let client = http_utils::RosterClient::new("http://127.0.0.1:9".to_string());
        let path = "user/paginated".to_string();
        let query = page_query(&strings(&["page", "1", "2"]));
        let request = || client.get_with_query::<_, Value>(&path, &query);
        assert!(request().await.is_err());
    }
}

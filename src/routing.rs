//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    routing::get,
};

use crate::{
    AppState, Error, endpoints,
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        get_category_endpoint, update_category_endpoint,
    },
    expense::{
        create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
        get_expenses_endpoint, update_expense_endpoint,
    },
    summary::{get_bar_chart_summary_endpoint, get_pie_chart_summary_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::EXPENSES,
            get(get_expenses_endpoint).post(create_expense_endpoint),
        )
        .route(
            endpoints::BAR_CHART_SUMMARY,
            get(get_bar_chart_summary_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(get_expense_endpoint)
                .put(update_expense_endpoint)
                .delete(delete_expense_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::PIE_CHART_SUMMARY,
            get(get_pie_chart_summary_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .fallback(get_unknown_route)
        .with_state(state)
}

/// The fallback handler for routes that do not exist.
async fn get_unknown_route() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": Error::NotFound.to_string() })),
    )
}

#[cfg(test)]
mod router_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::UtcOffset;

    use crate::{AppState, endpoints, endpoints::format_endpoint};

    use super::build_router;

    fn new_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        let state = AppState::new(connection, UtcOffset::UTC, Default::default())
            .expect("Could not create app state");

        TestServer::try_new(build_router(state)).expect("Could not create test server")
    }

    async fn create_category(server: &TestServer, name: &str) -> i64 {
        let response = server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "name": name }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["category"]["id"]
            .as_i64()
            .expect("category id missing")
    }

    async fn create_expense(server: &TestServer, category_id: i64, amount: f64, date: &str) -> i64 {
        let response = server
            .post(endpoints::EXPENSES)
            .json(&json!({
                "categoryId": category_id,
                "amount": amount,
                "description": "test expense",
                "date": date,
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["expense"]["id"]
            .as_i64()
            .expect("expense id missing")
    }

    #[tokio::test]
    async fn expense_listing_envelope_has_pagination_fields() {
        let server = new_test_server();
        let category_id = create_category(&server, "Groceries").await;
        for day in ["2024-01-05T09:00:00Z", "2024-01-05T21:00:00Z"] {
            create_expense(&server, category_id, 10.0, day).await;
        }

        let response = server
            .get(endpoints::EXPENSES)
            .add_query_param("date", "2024-01-05")
            .add_query_param("limit", "1")
            .add_query_param("page", "2")
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["total"], 2);
        assert_eq!(body["page"], 2);
        assert_eq!(body["limit"], 1);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["category"]["name"], "Groceries");
    }

    #[tokio::test]
    async fn expense_round_trip() {
        let server = new_test_server();
        let groceries = create_category(&server, "Groceries").await;
        let transport = create_category(&server, "Transport").await;
        let expense_id =
            create_expense(&server, groceries, 15.0, "2024-01-05T12:00:00Z").await;

        let expense_path = format_endpoint(endpoints::EXPENSE, expense_id);

        let response = server.get(&expense_path).await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["data"]["amount"], 15.0);
        assert_eq!(body["data"]["categoryId"], groceries);

        let response = server
            .put(&expense_path)
            .json(&json!({
                "categoryId": transport,
                "amount": 2.5,
                "description": "bus fare",
            }))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["updatedData"]["categoryId"], transport);
        assert_eq!(body["updatedData"]["amount"], 2.5);

        let response = server.delete(&expense_path).await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["message"],
            "Expense deleted successfully"
        );

        let response = server.get(&expense_path).await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn create_expense_with_negative_amount_is_rejected() {
        let server = new_test_server();
        let category_id = create_category(&server, "Groceries").await;

        let response = server
            .post(endpoints::EXPENSES)
            .json(&json!({ "categoryId": category_id, "amount": -5.0 }))
            .await;

        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn deleting_category_in_use_conflicts() {
        let server = new_test_server();
        let category_id = create_category(&server, "Groceries").await;
        create_expense(&server, category_id, 1.0, "2024-01-05T12:00:00Z").await;

        let response = server
            .delete(&format_endpoint(endpoints::CATEGORY, category_id))
            .await;

        response.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn bar_chart_summary_sums_by_day() {
        let server = new_test_server();
        let category_id = create_category(&server, "Groceries").await;
        create_expense(&server, category_id, 10.0, "2024-01-05T01:00:00Z").await;
        create_expense(&server, category_id, 2.5, "2024-01-05T23:00:00Z").await;
        create_expense(&server, category_id, 4.0, "2024-01-07T12:00:00Z").await;

        let response = server.get(endpoints::BAR_CHART_SUMMARY).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["date"], "2024-01-05");
        assert_eq!(data[0]["amount"], 12.5);
        assert_eq!(data[1]["date"], "2024-01-07");
        assert_eq!(data[1]["amount"], 4.0);
    }

    #[tokio::test]
    async fn pie_chart_summary_counts_per_category() {
        let server = new_test_server();
        let a = create_category(&server, "A").await;
        create_category(&server, "B").await;
        create_expense(&server, a, 1.0, "2024-01-05T12:00:00Z").await;
        create_expense(&server, a, 2.0, "2024-01-05T13:00:00Z").await;

        let response = server.get(endpoints::PIE_CHART_SUMMARY).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["categoryName"], "A");
        assert_eq!(data[0]["visitors"], 2);
        assert_eq!(data[0]["fill"], "var(--chart-1)");
        assert_eq!(data[1]["categoryName"], "B");
        assert_eq!(data[1]["visitors"], 0);
        assert_eq!(data[1]["fill"], "var(--chart-2)");
    }

    #[tokio::test]
    async fn deleting_expense_decrements_category_count() {
        let server = new_test_server();
        let category_id = create_category(&server, "Groceries").await;
        let expense_id = create_expense(&server, category_id, 1.0, "2024-01-05T12:00:00Z").await;
        create_expense(&server, category_id, 2.0, "2024-01-05T13:00:00Z").await;

        server
            .delete(&format_endpoint(endpoints::EXPENSE, expense_id))
            .await
            .assert_status_ok();

        let body = server.get(endpoints::PIE_CHART_SUMMARY).await.json::<Value>();
        assert_eq!(body["data"][0]["visitors"], 1);

        let listing = server.get(endpoints::EXPENSES).await.json::<Value>();
        let ids: Vec<i64> = listing["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|expense| expense["id"].as_i64().unwrap())
            .collect();
        assert!(!ids.contains(&expense_id));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let server = new_test_server();

        let response = server.get("/api/nonsense").await;

        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        assert!(response.json::<Value>()["error"].is_string());
    }
}

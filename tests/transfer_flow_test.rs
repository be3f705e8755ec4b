mod common;

use assert_matches::assert_matches;
use common::{lookup_json, receipt_json, stock_json, TestApi};
use pyrhouse_client::catalog::CatalogApi;
use pyrhouse_client::transfers::{
    ResolutionState, RowFailure, RowKind, RowOutcome, SubmissionCoordinator, SubmissionState,
    TransferDraft,
};
use pyrhouse_client::{DraftError, RowError, ServiceError, SubmissionError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_lookup(api: &TestApi, code: &str, id: i64, category: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/assets/pyrcode/{}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_json(id, category)))
        .mount(&api.server)
        .await;
}

fn coordinator() -> SubmissionCoordinator {
    SubmissionCoordinator::new(Duration::from_secs(5))
}

#[tokio::test]
async fn single_item_code_transfer_is_created() {
    let api = TestApi::new().await;
    mount_lookup(&api, "TEST123", 42, "Projector").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transfers"))
        .and(body_json(json!({
            "from_location_id": 1,
            "location_id": 2,
            "assets": [{"id": 42}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(receipt_json(31)))
        .expect(1)
        .mount(&api.server)
        .await;

    let mut draft = TransferDraft::new(1);
    draft.set_destination(Some(2));
    let rows = draft.rows_mut();
    let row = rows.add_row(RowKind::ItemCode);
    rows.set_code(row, "TEST123").unwrap();

    let outcome = rows.resolve_item_code(row, &api.client).await.unwrap();
    let grown = assert_matches!(
        outcome,
        RowOutcome::Resolved { resolved_id: 42, grown: Some(grown), .. } => grown
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.focused(), Some(grown));
    assert!(rows.row(row).unwrap().is_locked());

    let mut submission = coordinator();
    let snapshot = submission.request_confirmation(&draft, &[]).unwrap();
    assert_eq!(snapshot.lines().len(), 1);
    assert_eq!(snapshot.lines()[0].code.as_deref(), Some("TEST123"));

    let navigation = submission.confirm(&api.client).await.unwrap();
    assert_eq!(navigation.route(), "/transfers/31");
}

#[tokio::test]
async fn repeated_code_is_refused_without_a_second_lookup() {
    let api = TestApi::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/assets/pyrcode/TEST123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_json(42, "Projector")))
        .expect(1)
        .mount(&api.server)
        .await;

    let mut draft = TransferDraft::new(1);
    let rows = draft.rows_mut();
    let first = rows.add_row(RowKind::ItemCode);
    rows.set_code(first, "TEST123").unwrap();
    rows.resolve_item_code(first, &api.client).await.unwrap();

    let second = rows.add_row(RowKind::ItemCode);
    rows.set_code(second, " test123 ").unwrap();
    let err = rows.resolve_item_code(second, &api.client).await.unwrap_err();
    assert_eq!(err, RowError::DuplicateCode("test123".into()));

    let item = rows.row(second).unwrap().item_code().unwrap();
    assert_eq!(item.state, ResolutionState::Failure);
    assert_eq!(item.failure, Some(RowFailure::Duplicate));
    assert_eq!(rows.resolved_codes(), vec!["TEST123"]);
}

#[tokio::test]
async fn unknown_code_fails_the_row_and_can_be_retried() {
    let api = TestApi::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/assets/pyrcode/TYPO"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .mount(&api.server)
        .await;
    mount_lookup(&api, "TEST123", 42, "Projector").await;

    let mut draft = TransferDraft::new(1);
    let rows = draft.rows_mut();
    let row = rows.add_row(RowKind::ItemCode);
    rows.set_code(row, "TYPO").unwrap();

    let outcome = rows.resolve_item_code(row, &api.client).await.unwrap();
    assert_eq!(
        outcome,
        RowOutcome::Failed {
            row_id: row,
            reason: RowFailure::NotFound
        }
    );
    assert_eq!(rows.len(), 1);
    assert!(!rows.is_validating());

    rows.set_code(row, "TEST123").unwrap();
    let outcome = rows.resolve_item_code(row, &api.client).await.unwrap();
    assert_matches!(outcome, RowOutcome::Resolved { resolved_id: 42, .. });
}

#[tokio::test]
async fn mixed_transfer_carries_stock_and_participants() {
    let api = TestApi::new().await;
    mount_lookup(&api, "TEST123", 42, "Projector").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stocks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([stock_json(5, "Cable XLR", 5, 1)])),
        )
        .mount(&api.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transfers"))
        .and(body_json(json!({
            "from_location_id": 1,
            "location_id": 2,
            "assets": [{"id": 42}],
            "stocks": [{"id": 5, "quantity": 3}],
            "users": [{"id": 4}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(receipt_json(77)))
        .expect(1)
        .mount(&api.server)
        .await;

    let mut draft = TransferDraft::new(1);
    draft.set_destination(Some(2));
    draft.add_participant(4);

    let rows = draft.rows_mut();
    let code_row = rows.add_row(RowKind::ItemCode);
    rows.set_code(code_row, "TEST123").unwrap();
    rows.resolve_item_code(code_row, &api.client).await.unwrap();

    let stock_lines = api.client.fetch_stock_lines(1).await.unwrap();
    let stock_row = rows.add_row(RowKind::StockLine);
    rows.select_stock_line(stock_row, &stock_lines[0]).unwrap();
    assert_eq!(rows.set_quantity(stock_row, 3).unwrap(), 3);

    let mut submission = coordinator();
    submission.request_confirmation(&draft, &stock_lines).unwrap();
    let navigation = submission.confirm(&api.client).await.unwrap();
    assert_eq!(navigation.route(), "/transfers/77");
}

#[tokio::test]
async fn same_location_is_caught_before_any_request() {
    let api = TestApi::new().await;
    mount_lookup(&api, "TEST123", 42, "Projector").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transfers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(receipt_json(1)))
        .expect(0)
        .mount(&api.server)
        .await;

    let mut draft = TransferDraft::new(1);
    draft.set_destination(Some(1));
    let rows = draft.rows_mut();
    let row = rows.add_row(RowKind::ItemCode);
    rows.set_code(row, "TEST123").unwrap();
    rows.resolve_item_code(row, &api.client).await.unwrap();

    let mut submission = coordinator();
    let err = submission.request_confirmation(&draft, &[]).unwrap_err();
    assert_eq!(err, SubmissionError::Draft(DraftError::SameLocation));
    assert_eq!(submission.state(), &SubmissionState::Idle);
}

#[tokio::test]
async fn rejected_submission_keeps_the_draft_for_another_try() {
    let api = TestApi::new().await;
    mount_lookup(&api, "TEST123", 42, "Projector").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transfers"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "asset already in transit"})),
        )
        .up_to_n_times(1)
        .mount(&api.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transfers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(receipt_json(32)))
        .mount(&api.server)
        .await;

    let mut draft = TransferDraft::new(1);
    draft.set_destination(Some(2));
    let rows = draft.rows_mut();
    let row = rows.add_row(RowKind::ItemCode);
    rows.set_code(row, "TEST123").unwrap();
    rows.resolve_item_code(row, &api.client).await.unwrap();

    let mut submission = coordinator();
    submission.request_confirmation(&draft, &[]).unwrap();
    let err = submission.confirm(&api.client).await.unwrap_err();
    assert_eq!(
        err,
        SubmissionError::Service(ServiceError::InvalidData("asset already in transit".into()))
    );
    assert_eq!(submission.state(), &SubmissionState::Idle);
    assert_eq!(draft.rows().resolved_codes(), vec!["TEST123"]);

    submission.request_confirmation(&draft, &[]).unwrap();
    let navigation = submission.confirm(&api.client).await.unwrap();
    assert_eq!(navigation.route(), "/transfers/32");
}

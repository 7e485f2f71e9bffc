use coaching_sheet_sync::adapters::{HandlerResponse, SUCCESS_BODY, handle, run_direct};
use coaching_sheet_sync::cleaning::SchemaPolicy;
use coaching_sheet_sync::load::MemoryStore;
use coaching_sheet_sync::pipeline::{PipelineOptions, SyncPipeline};
use coaching_sheet_sync::source::CsvSheetSource;
use coaching_sheet_sync::types::RawSheet;

fn sheet() -> RawSheet {
    RawSheet::new(
        vec!["member_id".into(), "gfy_7d_pct".into()],
        vec![vec!["A1".into(), "60%".into()]],
    )
}

fn lenient() -> PipelineOptions {
    PipelineOptions {
        schema_policy: SchemaPolicy::Lenient,
        ..Default::default()
    }
}

#[test]
fn success_is_status_200() {
    let pipeline = SyncPipeline::new(sheet(), MemoryStore::new(), lenient());
    let response = handle(&pipeline);

    assert_eq!(response, HandlerResponse::ok(SUCCESS_BODY));
    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["body"], SUCCESS_BODY);
}

#[test]
fn failure_is_status_500_with_error_prefix() {
    let store = MemoryStore::new().refuse_connections();
    let pipeline = SyncPipeline::new(sheet(), store, lenient());
    let response = handle(&pipeline);

    assert_eq!(response.status_code, 500);
    assert_eq!(response.body, "Error: load failed: connect: connection refused");
}

#[test]
fn response_round_trips_through_json() {
    let parsed: HandlerResponse =
        serde_json::from_str(r#"{"statusCode":500,"body":"Error: boom"}"#).unwrap();
    assert_eq!(parsed, HandlerResponse::error("boom"));
}

#[test]
fn direct_run_writes_summary_and_exit_code() {
    let store = MemoryStore::new();
    let pipeline = SyncPipeline::new(
        CsvSheetSource::new("tests/fixtures/clean_data.csv"),
        store.clone(),
        PipelineOptions::default(),
    );

    let mut out = Vec::new();
    let outcome = run_direct(&pipeline, &mut out).unwrap();
    let line = String::from_utf8(out).unwrap();

    assert!(outcome.is_success());
    assert!(line.starts_with("ok: sync completed: 4 rows read, 3 inserted"), "{line}");
    assert_eq!(store.row_count(), 3);
}

#[test]
fn direct_run_failure_names_the_stage() {
    let pipeline = SyncPipeline::new(
        CsvSheetSource::new("tests/fixtures/does_not_exist.csv"),
        MemoryStore::new(),
        PipelineOptions::default(),
    );

    let mut out = Vec::new();
    let outcome = run_direct(&pipeline, &mut out).unwrap();

    assert!(!outcome.is_success());
    assert!(String::from_utf8(out).unwrap().starts_with("error [reading]: source unavailable"));
}

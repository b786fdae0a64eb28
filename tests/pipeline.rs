use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::thread;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::json;

use footstats_etl::config::RunConfig;
use footstats_etl::error::PipelineError;
use footstats_etl::gold::GOLD_COLUMNS;
use footstats_etl::http_client::http_client;
use footstats_etl::{bronze, clean, gold, pipeline, silver, stats_api};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_payload() -> Vec<serde_json::Value> {
    stats_api::parse_stats_payload(&read_fixture("player_season_stats.json"))
        .expect("fixture payload should parse")
}

fn run_stages(conn: &mut Connection, payload: &[serde_json::Value]) {
    bronze::replace_raw_table(conn, payload).expect("bronze stage");
    silver::normalize_bronze(conn).expect("silver stage");
    clean::clean_normalized(conn).expect("clean stage");
    gold::derive_gold(conn).expect("gold stage");
}

fn dump_gold(conn: &Connection) -> Vec<Vec<SqlValue>> {
    let mut stmt = conn
        .prepare("SELECT * FROM player_stats_gold ORDER BY player_id, season_id")
        .expect("gold should exist");
    let count = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..count).map(|i| row.get::<_, SqlValue>(i)).collect()
        })
        .expect("dump gold");
    rows.map(|r| r.expect("gold row")).collect()
}

#[test]
fn normalizer_is_one_to_one() {
    let mut conn = Connection::open_in_memory().expect("open db");
    let payload = fixture_payload();
    let raw = bronze::replace_raw_table(&mut conn, &payload).expect("bronze stage");
    let normalized = silver::normalize_bronze(&mut conn).expect("silver stage");
    assert_eq!(raw, payload.len());
    assert_eq!(normalized, raw);
}

#[test]
fn dedup_keeps_one_row_per_key_last_wins() {
    let mut conn = Connection::open_in_memory().expect("open db");
    run_stages(&mut conn, &fixture_payload());

    let (count, goals): (i64, f64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(goals) FROM player_stats_clean
             WHERE player_id = 9 AND season_id = 52376",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query duplicate key");
    assert_eq!(count, 1);
    // The fixture repeats (9, 52376); the later row carries 6 goals.
    assert_eq!(goals, 6.0);

    let dup_keys: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                 SELECT player_id, season_id FROM player_stats_clean
                 GROUP BY player_id, season_id HAVING COUNT(*) > 1
             )",
            [],
            |row| row.get(0),
        )
        .expect("query dup keys");
    assert_eq!(dup_keys, 0);
}

#[test]
fn clean_rows_have_no_nulls() {
    let mut conn = Connection::open_in_memory().expect("open db");
    run_stages(&mut conn, &fixture_payload());

    let (name, team, goals, tackles, pass_acc): (String, String, f64, f64, f64) = conn
        .query_row(
            "SELECT player_name, team_name, goals, tackles, passes_accuracy_percent
             FROM player_stats_clean WHERE player_id = 10",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )
        .expect("query null-filled row");
    assert_eq!(name, "Unknown");
    assert_eq!(team, "Unknown");
    assert_eq!(goals, 0.0);
    assert_eq!(tackles, 0.0);
    assert_eq!(pass_acc, 0.0);
}

#[test]
fn zero_appearances_yields_guarded_rates() {
    let mut conn = Connection::open_in_memory().expect("open db");
    run_stages(&mut conn, &fixture_payload());

    let (goal_per_app, ga_per_90): (f64, f64) = conn
        .query_row(
            "SELECT goal_per_appearance, goal_assist_per_90
             FROM player_stats_gold WHERE player_id = 7",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query guarded row");
    // 3 goals over 0 appearances: denominator guarded to 1, not null.
    assert_eq!(goal_per_app, 3.0);
    assert_eq!(ga_per_90, 270.0);
}

#[test]
fn pipeline_is_idempotent() {
    let mut conn = Connection::open_in_memory().expect("open db");
    let payload = fixture_payload();
    run_stages(&mut conn, &payload);
    let first = dump_gold(&conn);
    run_stages(&mut conn, &payload);
    let second = dump_gold(&conn);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn gold_schema_is_exactly_the_published_columns() {
    let mut conn = Connection::open_in_memory().expect("open db");
    run_stages(&mut conn, &fixture_payload());

    let stmt = conn
        .prepare("SELECT * FROM player_stats_gold")
        .expect("gold should exist");
    let names = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, GOLD_COLUMNS);

    // The fixture carries an unmapped upstream field; it lands in bronze
    // but must never leak into gold without an explicit mapping.
    let bronze_stmt = conn
        .prepare("SELECT * FROM player_stats_bronze")
        .expect("bronze should exist");
    assert!(
        bronze_stmt
            .column_names()
            .iter()
            .any(|name| *name == "stats.expected_goals")
    );
    assert!(!names.iter().any(|name| name.contains("expected_goals")));
}

#[test]
fn missing_source_column_aborts_normalization() {
    let mut conn = Connection::open_in_memory().expect("open db");
    let payload = vec![json!({
        "seasonId": 52376,
        "uniqueTournamentId": 8,
        "player": {"playerId": 1, "name": "X", "birthdayTimestamp": 0,
                   "age": 20, "position": "F", "nationality": "Italy"},
        "team": {"teamId": 2, "name": "Y"}
        // no stats block at all
    })];
    bronze::replace_raw_table(&mut conn, &payload).expect("bronze stage");
    let err = silver::normalize_bronze(&mut conn).unwrap_err();
    match err {
        PipelineError::Schema { column } => assert_eq!(column, "stats.appearances"),
        other => panic!("expected schema error, got {other}"),
    }
}

#[test]
fn non_numeric_key_field_aborts_cleaning() {
    let mut conn = Connection::open_in_memory().expect("open db");
    let mut payload = fixture_payload();
    payload[0]["player"]["playerId"] = json!("not-a-number");
    bronze::replace_raw_table(&mut conn, &payload).expect("bronze stage");
    silver::normalize_bronze(&mut conn).expect("silver stage");
    let err = clean::clean_normalized(&mut conn).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::TypeCoercion {
            column: "player_id",
            ..
        }
    ));
}

/// Serve exactly one canned HTTP response on a local port and return the
/// URL to reach it.
fn spawn_one_shot_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let addr = listener.local_addr().expect("listener addr");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

#[test]
fn upstream_server_error_is_fatal_and_leaves_bronze_untouched() {
    let mut conn = Connection::open_in_memory().expect("open db");
    run_stages(&mut conn, &fixture_payload());
    let before: i64 = conn
        .query_row("SELECT COUNT(*) FROM player_stats_bronze", [], |row| {
            row.get(0)
        })
        .expect("count bronze");

    let config = RunConfig {
        api_url: spawn_one_shot_server("HTTP/1.1 500 Internal Server Error", "boom"),
        ..RunConfig::default()
    };
    let client = http_client().expect("build client");
    let err = pipeline::run(&mut conn, client, &config).unwrap_err();
    match &err {
        PipelineError::Transport(msg) => {
            assert!(msg.contains("500"), "unexpected transport message: {msg}");
        }
        other => panic!("expected transport error, got {other}"),
    }

    let after: i64 = conn
        .query_row("SELECT COUNT(*) FROM player_stats_bronze", [], |row| {
            row.get(0)
        })
        .expect("count bronze");
    assert_eq!(before, after);
}

#[test]
fn failed_clean_stage_leaves_previous_clean_table() {
    let mut conn = Connection::open_in_memory().expect("open db");
    let payload = fixture_payload();
    run_stages(&mut conn, &payload);
    let before: i64 = conn
        .query_row("SELECT COUNT(*) FROM player_stats_clean", [], |row| {
            row.get(0)
        })
        .expect("count clean");

    // Re-run with a poisoned key field: cleaning must fail without
    // touching the committed clean table.
    let mut poisoned = payload.clone();
    poisoned[0]["player"]["playerId"] = json!("zzz");
    bronze::replace_raw_table(&mut conn, &poisoned).expect("bronze stage");
    silver::normalize_bronze(&mut conn).expect("silver stage");
    assert!(clean::clean_normalized(&mut conn).is_err());

    let after: i64 = conn
        .query_row("SELECT COUNT(*) FROM player_stats_clean", [], |row| {
            row.get(0)
        })
        .expect("count clean");
    assert_eq!(before, after);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use tkv_core::{KeyValueStore, RecoveryCoordinator, RecoveryError, RecoveryReport, StoreError};

fn db_params(dir: &TempDir) -> SqliteParams {
    SqliteParams::new(dir.path().join("transactions.db"))
}

async fn recover(
    params: &SqliteParams,
) -> (SqliteTransactionLogger, KeyValueStore, RecoveryReport) {
    let mut logger = SqliteTransactionLogger::open(params).unwrap();
    let store = KeyValueStore::new();
    let report = RecoveryCoordinator::new()
        .initialize(&mut logger, &store)
        .await
        .unwrap();
    (logger, store, report)
}

fn rows(params: &SqliteParams) -> Vec<(i64, i64, String, String)> {
    let conn = Connection::open(&params.path).unwrap();
    let mut stmt = conn
        .prepare("SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn creates_table_and_numbers_rows() {
    let dir = TempDir::new().unwrap();
    let params = db_params(&dir);

    let (mut logger, _, report) = recover(&params).await;
    assert_eq!(report.events_applied, 0);
    logger.write_put("a", "1").await.unwrap();
    logger.write_delete("b").await.unwrap();
    logger.write_put("a", "2").await.unwrap();
    logger.close().await.unwrap();

    assert_eq!(logger.last_sequence(), 3);
    assert_eq!(
        rows(&params),
        vec![
            (1, 2, "a".to_string(), "1".to_string()),
            (2, 1, "b".to_string(), String::new()),
            (3, 2, "a".to_string(), "2".to_string()),
        ]
    );
}

#[tokio::test]
async fn reopen_replays_existing_rows() {
    let dir = TempDir::new().unwrap();
    let params = db_params(&dir);
    let (mut logger, _, _) = recover(&params).await;
    logger.write_put("a", "1").await.unwrap();
    logger.write_delete("b").await.unwrap();
    logger.write_put("a", "2").await.unwrap();
    logger.close().await.unwrap();
    drop(logger);

    let (mut logger, store, report) = recover(&params).await;

    assert_eq!(report.events_applied, 3);
    assert_eq!(report.last_sequence, 3);
    assert_eq!(store.get("a").unwrap(), "2");
    assert_eq!(store.get("b"), Err(StoreError::NoSuchKey));

    logger.write_put("c", "with\ttab and space").await.unwrap();
    logger.close().await.unwrap();
    let last = rows(&params).pop().unwrap();
    assert_eq!(last, (4, 2, "c".to_string(), "with\ttab and space".to_string()));
}

#[tokio::test]
async fn existing_table_is_reused() {
    let dir = TempDir::new().unwrap();
    let params = db_params(&dir);
    {
        let conn = Connection::open(&params.path).unwrap();
        conn.execute_batch(
            "CREATE TABLE transactions (
                sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL
            );
            INSERT INTO transactions (event_type, key, value) VALUES (2, 'k', 'v');",
        )
        .unwrap();
    }

    let (mut logger, store, report) = recover(&params).await;

    assert_eq!(report.events_applied, 1);
    assert_eq!(store.get("k").unwrap(), "v");
    logger.close().await.unwrap();
}

#[tokio::test]
async fn unknown_event_type_aborts_replay() {
    let dir = TempDir::new().unwrap();
    let params = db_params(&dir);
    drop(SqliteTransactionLogger::open(&params).unwrap());
    {
        let conn = Connection::open(&params.path).unwrap();
        conn.execute_batch(
            "INSERT INTO transactions (event_type, key, value) VALUES (2, 'a', '1');
             INSERT INTO transactions (event_type, key, value) VALUES (9, 'b', '2');",
        )
        .unwrap();
    }
    let mut logger = SqliteTransactionLogger::open(&params).unwrap();

    let result = RecoveryCoordinator::new()
        .initialize(&mut logger, &KeyValueStore::new())
        .await;

    assert!(matches!(
        result,
        Err(RecoveryError::Replay(LogError::Corrupted { line: 2, .. }))
    ));
    assert!(matches!(
        logger.write_put("c", "3").await,
        Err(LogError::NotRunning)
    ));
}

#[test]
fn unreachable_database_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let params = SqliteParams::new(dir.path().join("missing").join("transactions.db"));

    let result = SqliteTransactionLogger::open(&params);

    assert!(matches!(result, Err(LogError::Database(_))));
}

#[tokio::test]
async fn write_before_run_is_rejected() {
    let dir = TempDir::new().unwrap();
    let logger = SqliteTransactionLogger::open(&db_params(&dir)).unwrap();

    assert!(matches!(
        logger.write_delete("a").await,
        Err(LogError::NotRunning)
    ));
}

#[tokio::test]
async fn empty_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut logger, _, _) = recover(&db_params(&dir)).await;

    assert!(matches!(
        logger.write_put("", "v").await,
        Err(LogError::InvalidEvent(_))
    ));
    logger.close().await.unwrap();
}

#[tokio::test]
async fn writes_after_close_fail() {
    let dir = TempDir::new().unwrap();
    let (mut logger, _, _) = recover(&db_params(&dir)).await;
    logger.close().await.unwrap();

    assert!(matches!(
        logger.write_put("a", "1").await,
        Err(LogError::Closed)
    ));
    assert!(matches!(logger.read_events(), Err(LogError::Closed)));
}

mod round_trip {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Put(String, String),
        Delete(String),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        let key = prop_oneof!["[ab\\\\\t\r\n]", "(\\PC|[\\\\\t\r\n'\"]){1,8}"];
        let value = "(\\PC|[\\\\\t\r\n '\"]){0,16}";
        prop_oneof![
            3 => (key.clone(), value).prop_map(|(k, v)| Op::Put(k, v)),
            1 => key.prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn restart_rebuilds_the_same_state(ops in proptest::collection::vec(arb_op(), 0..24)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let dir = TempDir::new().unwrap();
                let params = db_params(&dir);
                let direct = KeyValueStore::new();

                let (mut logger, _, _) = recover(&params).await;
                for op in &ops {
                    match op {
                        Op::Put(k, v) => {
                            logger.write_put(k, v).await.unwrap();
                            direct.put(k, v);
                        }
                        Op::Delete(k) => {
                            logger.write_delete(k).await.unwrap();
                            direct.delete(k);
                        }
                    }
                }
                logger.close().await.unwrap();
                drop(logger);

                let (mut logger, rebuilt, report) = recover(&params).await;
                prop_assert_eq!(report.events_applied, ops.len() as u64);
                prop_assert_eq!(rebuilt.snapshot(), direct.snapshot());
                logger.close().await.unwrap();
                Ok(())
            })?;
        }
    }
}

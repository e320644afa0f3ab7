use super::*;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ledger_path(dir: &TempDir) -> PathBuf {
    dir.path().join("kfdl-state.txt")
}

#[tokio::test]
async fn missing_file_loads_as_empty_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::load(ledger_path(&dir)).await;

    assert!(ledger.is_empty().await);
    assert!(!ledger.is_dirty().await);
}

#[tokio::test]
async fn short_line_is_skipped_and_rest_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    std::fs::write(
        &path,
        "kfdl-save\t1\t0\n\
         2024-04-26\thttps://a.example/1.mp3\tSUCCESSFUL\n\
         2024-04-25\thttps://a.example/2.mp3\n\
         2024-04-24\thttps://a.example/3.mp3\tFAILED\n",
    )
    .unwrap();

    let ledger = Ledger::load(&path).await;

    assert_eq!(ledger.len().await, 2);
    assert_eq!(
        ledger.state_of(date(2024, 4, 26)).await,
        Some(DownloadState::Successful)
    );
    assert_eq!(ledger.state_of(date(2024, 4, 25)).await, None);
    assert_eq!(
        ledger.state_of(date(2024, 4, 24)).await,
        Some(DownloadState::Failed)
    );
}

#[tokio::test]
async fn invalid_header_loads_as_empty_ledger() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    std::fs::write(
        &path,
        "some-other-tool\t1\t0\n2024-04-26\thttps://a.example/1.mp3\tSUCCESSFUL\n",
    )
    .unwrap();

    let ledger = Ledger::load(&path).await;

    assert!(ledger.is_empty().await);
}

#[tokio::test]
async fn duplicate_dates_keep_the_first_entry() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    std::fs::write(
        &path,
        "kfdl-save\t1\t0\n\
         2024-04-26\thttps://a.example/first.mp3\tSUCCESSFUL\n\
         2024-04-26\thttps://a.example/second.mp3\tFAILED\n",
    )
    .unwrap();

    let ledger = Ledger::load(&path).await;

    let entry = ledger.get(date(2024, 4, 26)).await.unwrap();
    assert_eq!(entry.download_link, "https://a.example/first.mp3");
    assert_eq!(entry.state, DownloadState::Successful);
}

#[tokio::test]
async fn identical_upsert_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::new(ledger_path(&dir));

    assert!(
        ledger
            .upsert(date(2024, 1, 22), "https://a.example/1.mp3", DownloadState::Queued)
            .await
    );
    ledger.force_save().await.unwrap();
    assert!(!ledger.is_dirty().await);

    let changed = ledger
        .upsert(date(2024, 1, 22), "https://a.example/1.mp3", DownloadState::Queued)
        .await;

    assert!(!changed);
    assert!(!ledger.is_dirty().await);
}

#[tokio::test]
async fn upsert_replaces_entry_and_entries_are_newest_first() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::new(ledger_path(&dir));

    ledger
        .upsert(date(2024, 1, 20), "https://a.example/20.mp3", DownloadState::Queued)
        .await;
    ledger
        .upsert(date(2024, 1, 22), "https://a.example/22.mp3", DownloadState::Queued)
        .await;
    ledger
        .upsert(date(2024, 1, 21), "https://a.example/21.mp3", DownloadState::Queued)
        .await;
    ledger
        .upsert(
            date(2024, 1, 20),
            "https://b.example/20.mp3",
            DownloadState::Downloading,
        )
        .await;

    let entries = ledger.entries().await;
    let dates: Vec<NaiveDate> = entries.iter().map(|e| e.date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 22), date(2024, 1, 21), date(2024, 1, 20)]
    );
    assert_eq!(entries[2].download_link, "https://b.example/20.mp3");
    assert_eq!(entries[2].state, DownloadState::Downloading);
}

#[tokio::test]
async fn saved_ledger_loads_back_identically() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    let ledger = Ledger::new(&path);
    ledger
        .upsert(date(2024, 4, 26), "https://a.example/1.mp3", DownloadState::Successful)
        .await;
    ledger
        .upsert(date(2024, 4, 25), "https://a.example/2.mp3", DownloadState::Failed)
        .await;

    assert!(ledger.force_save().await.unwrap());

    let reloaded = Ledger::load(&path).await;
    assert_eq!(reloaded.entries().await, ledger.entries().await);
    assert!(!reloaded.is_dirty().await);
}

#[tokio::test]
async fn save_writes_expected_file_without_leftover_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    let ledger = Ledger::new(&path);
    ledger
        .upsert(date(2024, 4, 25), "https://a.example/2.mp3", DownloadState::Failed)
        .await;
    ledger
        .upsert(date(2024, 4, 26), "https://a.example/1.mp3", DownloadState::Successful)
        .await;

    ledger.force_save().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "kfdl-save\t1\t0\n\
         2024-04-26\thttps://a.example/1.mp3\tSUCCESSFUL\n\
         2024-04-25\thttps://a.example/2.mp3\tFAILED\n"
    );
    assert!(!dir.path().join("kfdl-state.txt.tmp").exists());
}

#[tokio::test]
async fn force_save_without_changes_does_not_write() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    let ledger = Ledger::new(&path);

    assert!(!ledger.force_save().await.unwrap());
    assert!(!path.exists());
}

#[tokio::test]
async fn save_if_due_writes_every_change() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    let ledger = Ledger::new(&path);
    let interval = Duration::from_secs(3600);

    ledger
        .upsert(date(2024, 1, 22), "https://a.example/1.mp3", DownloadState::Queued)
        .await;
    assert!(ledger.save_if_due(interval).await.unwrap());

    // A change right after a save is still written
    ledger
        .upsert(
            date(2024, 1, 22),
            "https://a.example/1.mp3",
            DownloadState::Successful,
        )
        .await;
    assert!(ledger.save_if_due(interval).await.unwrap());
    assert!(!ledger.is_dirty().await);
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .contains("2024-01-22\thttps://a.example/1.mp3\tSUCCESSFUL\n"));

    // Nothing changed, nothing written
    assert!(!ledger.save_if_due(interval).await.unwrap());
    assert!(!ledger.save_if_due(Duration::ZERO).await.unwrap());
}

#[tokio::test]
async fn save_if_due_skips_clean_ledger() {
    let dir = TempDir::new().unwrap();
    let path = ledger_path(&dir);
    let ledger = Ledger::new(&path);

    assert!(!ledger.save_if_due(Duration::ZERO).await.unwrap());
    assert!(!path.exists());
}

#[tokio::test]
async fn save_creates_missing_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("nested").join("kfdl-state.txt");
    let ledger = Ledger::new(&path);
    ledger
        .upsert(date(2024, 1, 22), "https://a.example/1.mp3", DownloadState::Queued)
        .await;

    ledger.force_save().await.unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn failed_save_keeps_ledger_dirty() {
    let dir = TempDir::new().unwrap();
    // A regular file where the parent directory should be
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let ledger = Ledger::new(blocker.join("kfdl-state.txt"));
    ledger
        .upsert(date(2024, 1, 22), "https://a.example/1.mp3", DownloadState::Queued)
        .await;

    let result = ledger.force_save().await;

    assert!(matches!(
        result,
        Err(Error::Ledger(LedgerError::Io { .. }))
    ));
    assert!(ledger.is_dirty().await);
}

#[tokio::test]
async fn record_uses_effective_url() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::new(ledger_path(&dir));
    let item = Item::new(date(2024, 1, 22), "Episode", "https://feed.example/1.mp3");

    ledger.record(&item, DownloadState::Queued).await;
    assert_eq!(
        ledger.get(item.date).await.unwrap().download_link,
        "https://feed.example/1.mp3"
    );

    let resolved = item.with_download_url("https://official.example/1.mp3");
    ledger.record(&resolved, DownloadState::Downloading).await;
    assert_eq!(
        ledger.get(item.date).await.unwrap().download_link,
        "https://official.example/1.mp3"
    );
}

#[tokio::test]
async fn concurrent_upserts_keep_one_entry_per_date() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::new(ledger_path(&dir));

    let mut handles = Vec::new();
    for i in 0..40u32 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let day = date(2024, 3, 1 + (i % 10));
            let state = if i % 2 == 0 {
                DownloadState::Downloading
            } else {
                DownloadState::Queued
            };
            ledger
                .upsert(day, format!("https://a.example/{i}.mp3"), state)
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ledger.len().await, 10);
    ledger.force_save().await.unwrap();
    let reloaded = Ledger::load(ledger.path().to_path_buf()).await;
    assert_eq!(reloaded.len().await, 10);
}

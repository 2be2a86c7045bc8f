use chrono::Duration;
use storage::repository::{
    BucketQuery, DailyStatRepository, DateList, ProgressCounts, StorageError, VocabularyLookup,
    WordRecordRepository,
};
use storage::sqlite::SqliteRepository;
use vocab_core::model::{
    ActivityKind, DateRange, LearnerId, SortField, SortOrder, SortSpec, VocabularyEntry, WordId,
    WordRecord,
};
use vocab_core::scheduler::{Bucket, Scheduler};
use vocab_core::time::{fixed_clock, fixed_now};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn unstarted(learner: u64, word: u64, created_offset_secs: i64) -> WordRecord {
    WordRecord::new_unstarted(
        LearnerId::new(learner),
        WordId::new(word),
        fixed_now() + Duration::seconds(created_offset_secs),
    )
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_progress_and_audit_trail() {
    let repo = connect("memdb_roundtrip").await;
    let scheduler = Scheduler::new();
    let clock = fixed_clock();
    let today = clock.today();

    let mut record = unstarted(1, 7, 0);
    repo.upsert_record(&record).await.unwrap();

    let transition = scheduler.start(&record, today).unwrap();
    record.apply_transition(&transition, clock.now());
    repo.upsert_record(&record).await.unwrap();
    repo.append_date(
        record.learner_id(),
        record.word_id(),
        DateList::for_activity(transition.activity),
        transition.date,
    )
    .await
    .unwrap();

    let fetched = repo
        .get_record(LearnerId::new(1), WordId::new(7))
        .await
        .unwrap()
        .expect("record exists");
    assert_eq!(fetched, record);
    assert_eq!(fetched.actual_learn_dates(), &[today]);
    assert!(fetched.actual_review_dates().is_empty());
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn append_date_on_missing_record_is_not_found() {
    let repo = connect("memdb_append_missing").await;
    let err = repo
        .append_date(
            LearnerId::new(1),
            WordId::new(99),
            DateList::Review,
            fixed_clock().today(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn buckets_partition_by_due_date_and_level() {
    let repo = connect("memdb_buckets").await;
    let scheduler = Scheduler::new();
    let clock = fixed_clock();
    let start_day = clock.today().add_days(-5);

    // words 1..=3 started five days ago are due on day -3, i.e. overdue today
    for word in 1..=3 {
        let mut record = unstarted(1, word, i64::try_from(word).unwrap());
        let t = scheduler.start(&record, start_day).unwrap();
        record.apply_transition(&t, clock.now());
        repo.upsert_record(&record).await.unwrap();
    }
    // word 4 started two days ago is due today
    let mut due_today = unstarted(1, 4, 4);
    let t = scheduler.start(&due_today, clock.today().add_days(-2)).unwrap();
    due_today.apply_transition(&t, clock.now());
    repo.upsert_record(&due_today).await.unwrap();
    // words 5 and 6 untouched, plus a word of another learner
    repo.upsert_record(&unstarted(1, 5, 5)).await.unwrap();
    repo.upsert_record(&unstarted(1, 6, 6)).await.unwrap();
    repo.upsert_record(&unstarted(2, 5, 5)).await.unwrap();

    let learner = LearnerId::new(1);
    let today = clock.today();
    let max = scheduler.max_level();
    let count = |bucket| repo.count_bucket(learner, bucket, today, max);
    assert_eq!(count(Bucket::New).await.unwrap(), 2);
    assert_eq!(count(Bucket::Review).await.unwrap(), 1);
    assert_eq!(count(Bucket::Overdue).await.unwrap(), 3);

    let query = BucketQuery {
        bucket: Bucket::Overdue,
        today,
        max_level: max,
        sort: SortSpec::new(SortField::CreatedAt, SortOrder::Desc),
        limit: 2,
        skip: 0,
    };
    let page: Vec<u64> = repo
        .query_bucket(learner, &query)
        .await
        .unwrap()
        .iter()
        .map(|r| r.word_id().value())
        .collect();
    assert_eq!(page, vec![3, 2]);

    let next = BucketQuery { skip: 2, ..query };
    let page: Vec<u64> = repo
        .query_bucket(learner, &next)
        .await
        .unwrap()
        .iter()
        .map(|r| r.word_id().value())
        .collect();
    assert_eq!(page, vec![1]);

    let new_query = BucketQuery {
        bucket: Bucket::New,
        sort: SortSpec::oldest_first(),
        limit: 10,
        ..query
    };
    let fresh: Vec<u64> = repo
        .query_bucket(learner, &new_query)
        .await
        .unwrap()
        .iter()
        .map(|r| r.word_id().value())
        .collect();
    assert_eq!(fresh, vec![5, 6]);

    assert_eq!(repo.count_started_on(learner, start_day).await.unwrap(), 3);
    assert_eq!(
        repo.count_progress(learner, max).await.unwrap(),
        ProgressCounts {
            total: 6,
            started: 4,
            mastered: 0
        }
    );
}

#[tokio::test]
async fn upsert_update_leaves_audit_lists_alone() {
    let repo = connect("memdb_upsert_lists").await;
    let record = unstarted(1, 1, 0);
    let today = fixed_clock().today();

    repo.upsert_record(&record).await.unwrap();
    repo.append_date(record.learner_id(), record.word_id(), DateList::Review, today)
        .await
        .unwrap();
    repo.upsert_record(&record).await.unwrap();

    let stored = repo
        .get_record(record.learner_id(), record.word_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.actual_review_dates(), &[today]);
}

#[tokio::test]
async fn delete_reports_whether_a_row_went_away() {
    let repo = connect("memdb_delete").await;
    let record = unstarted(1, 1, 0);
    repo.upsert_record(&record).await.unwrap();

    assert!(repo.delete_record(LearnerId::new(1), WordId::new(1)).await.unwrap());
    assert!(!repo.delete_record(LearnerId::new(1), WordId::new(1)).await.unwrap());
    assert!(
        repo.get_record(LearnerId::new(1), WordId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn daily_stats_accumulate_per_day() {
    let repo = connect("memdb_daily").await;
    let learner = LearnerId::new(3);
    let today = fixed_clock().today();
    let yesterday = today.add_days(-1);

    repo.increment(learner, yesterday, ActivityKind::Review)
        .await
        .unwrap();
    repo.increment(learner, today, ActivityKind::Learn)
        .await
        .unwrap();
    repo.increment(learner, today, ActivityKind::Learn)
        .await
        .unwrap();
    let stat = repo
        .increment(learner, today, ActivityKind::Review)
        .await
        .unwrap();
    assert_eq!((stat.learned_count, stat.reviewed_count), (2, 1));

    let stored = repo.get_stat(learner, today).await.unwrap().unwrap();
    assert_eq!(stored, stat);
    assert!(
        repo.get_stat(learner, today.add_days(1))
            .await
            .unwrap()
            .is_none()
    );

    let range = DateRange::new(today.add_days(-7), today).unwrap();
    let listed = repo.list_stats(learner, range).await.unwrap();
    let dates: Vec<_> = listed.iter().map(|s| s.date).collect();
    assert_eq!(dates, vec![yesterday, today]);
}

#[tokio::test]
async fn vocabulary_lookup_skips_missing_and_caps_batches() {
    let repo = connect("memdb_vocab").await;
    let entry = VocabularyEntry::new(WordId::new(1), "candid")
        .with_pronunciation("us", "/ˈkændɪd/")
        .with_translation(Some("adj."), "honest and direct");
    repo.upsert_vocabulary_entry(&entry).await.unwrap();

    let found = repo
        .entries_by_ids(&[WordId::new(1), WordId::new(2)])
        .await
        .unwrap();
    assert_eq!(found, vec![entry]);

    assert!(repo.entries_by_ids(&[]).await.unwrap().is_empty());

    let too_many: Vec<WordId> = (1..=21).map(WordId::new).collect();
    let err = repo.entries_by_ids(&too_many).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::BatchTooLarge {
            requested: 21,
            max: 20
        }
    ));
}

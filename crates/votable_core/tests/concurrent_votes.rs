use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;
use votable_core::db::open_db;
use votable_core::{
    install_vote_schema, Polarity, SqliteVotableRepository, VotableId, VotableRepository,
    VoteRecorder, VoteSchema, VoteService, VoterId,
};

const THREADS: usize = 8;
const VOTES_PER_THREAD: usize = 25;

fn prepare(path: &Path) -> VotableId {
    let schema = VoteSchema::default_schema();
    let mut conn = open_db(path).unwrap();
    install_vote_schema(&mut conn, &schema).unwrap();
    let repo = SqliteVotableRepository::try_new(&conn, schema).unwrap();
    repo.create_votable(Uuid::new_v4()).unwrap()
}

#[test]
fn concurrent_records_for_distinct_voters_all_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let id = prepare(&path);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo =
                    SqliteVotableRepository::try_new(&conn, VoteSchema::default_schema()).unwrap();
                let recorder = VoteRecorder::new(&repo);
                barrier.wait();
                for _ in 0..VOTES_PER_THREAD {
                    let voter = VoterId::from(Uuid::new_v4());
                    assert!(recorder.record(id, &voter, Polarity::Up).unwrap().is_applied());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqliteVotableRepository::try_new(&conn, VoteSchema::default_schema()).unwrap();
    let votable = repo.get_votable(id).unwrap().unwrap();
    let expected = (THREADS * VOTES_PER_THREAD) as i64;
    assert_eq!(votable.upvotes, expected);
    assert_eq!(votable.upvoters.len() as i64, expected);
}

#[test]
fn same_voter_racing_itself_counts_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("racing.db");
    let id = prepare(&path);
    let voter = VoterId::from(Uuid::new_v4());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let path = path.clone();
            let voter = voter.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = VoteService::new(
                    SqliteVotableRepository::try_new(&conn, VoteSchema::default_schema())
                        .unwrap(),
                );
                barrier.wait();
                if index % 2 == 0 {
                    service.upvote(id, &voter).unwrap();
                } else {
                    service.downvote(id, &voter).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqliteVotableRepository::try_new(&conn, VoteSchema::default_schema()).unwrap();
    let votable = repo.get_votable(id).unwrap().unwrap();
    let up = votable.count(Polarity::Up).unwrap();
    let down = votable.count(Polarity::Down).unwrap();

    // Counters always mirror set sizes, and the voter holds at most one
    // vote per polarity no matter how the casts interleave.
    assert_eq!(up, votable.upvoters.len() as i64);
    assert_eq!(down, votable.voters(Polarity::Down).unwrap().len() as i64);
    assert!(up <= 1);
    assert!(down <= 1);
}

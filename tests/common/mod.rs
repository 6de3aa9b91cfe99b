#![allow(dead_code)]

use isit_metrics::db::Database;
use isit_metrics::models::{Poll, PollType, Side};
use std::sync::Arc;

pub async fn create_test_db() -> Arc<Database> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("isit_metrics_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite:{}", path.display());
    Arc::new(
        Database::connect(&url, 1)
            .await
            .expect("failed to create test database"),
    )
}

/// A small game: two levels in stage 0 and one quad sorting level in stage 1.
pub struct Catalog {
    pub colors: Poll,
    pub sky: Poll,
    pub animals: Poll,
    pub quad: Poll,
}

pub fn sample_catalog() -> Catalog {
    let colors = Poll::new(PollType::MultipleChoice, 0, 1, 1)
        .with_object("red", 10, None)
        .with_object("green", 30, None)
        .with_object("blue", 5, None);
    let sky = Poll::new(PollType::IsitText, 0, 1, 2)
        .with_object("sun", 3, Some(Side::Is))
        .with_object("moon", 2, Some(Side::It));
    let animals = Poll::new(PollType::IsitImage, 0, 2, 1)
        .with_object("cat", 0, Some(Side::Is))
        .with_object("dog", 0, Some(Side::It));
    let mut quad = Poll::new(PollType::QuadSorting, 1, 1, 1)
        .with_object("a", 0, None)
        .with_object("b", 0, None)
        .with_object("c", 0, None)
        .with_object("d", 0, None);
    quad.quad_scores.insert("a|b".to_string(), 6);
    quad.quad_scores.insert("c|d".to_string(), 9);

    Catalog {
        colors,
        sky,
        animals,
        quad,
    }
}

pub async fn seed_catalog(db: &Database) -> Catalog {
    let catalog = sample_catalog();
    for poll in [&catalog.colors, &catalog.sky, &catalog.animals, &catalog.quad] {
        db.create_poll(poll).await.expect("failed to seed poll");
    }
    catalog
}

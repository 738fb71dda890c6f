use std::time::Instant;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};

use scribe::auth::{create_session, session_cookie};
use scribe::config::Config;
use scribe::core::db;
use scribe::follow::follow_user;
use scribe::posts::{create_post, NewPost};
use scribe::users::create_user;
use scribe::{handlers, AppState};

const NUM_AUTHORS: usize = 20;
const POSTS_PER_AUTHOR: usize = 50;
const FOLLOWED_AUTHORS: usize = 10;

#[ignore]
#[actix_web::test]
async fn perf_feed_pagination() {
    let media = tempfile::tempdir().unwrap();
    let config = Config {
        media_root: media.path().to_path_buf(),
        index_cache_seconds: 0,
        ..Config::default()
    };
    let pool = db::connect_in_memory().await.unwrap();
    let state = web::Data::new(AppState::new(config, pool));

    println!("\n=== Performance Test ===");
    println!("Creating {} authors with {} posts each...", NUM_AUTHORS, POSTS_PER_AUTHOR);

    let seed_start = Instant::now();
    let reader = create_user(&state.db, "reader", "password123").await.unwrap();
    for i in 0..NUM_AUTHORS {
        let author = create_user(&state.db, &format!("perf_author_{}", i), "password123")
            .await
            .unwrap();
        for j in 0..POSTS_PER_AUTHOR {
            create_post(
                &state.db,
                NewPost {
                    author_id: author.id,
                    text: format!("Post {} by author {}", j, i),
                    group_id: None,
                    image: None,
                },
            )
            .await
            .unwrap();
        }
        if i < FOLLOWED_AUTHORS {
            follow_user(&state.db, reader.id, author.id).await.unwrap();
        }
    }
    println!("Seeded in {:?}", seed_start.elapsed());

    let token = create_session(&state.db, reader.id).await.unwrap();
    let cookie: Cookie<'static> = session_cookie(&token, 24);
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let feed_pages = FOLLOWED_AUTHORS * POSTS_PER_AUTHOR / 10;
    let feed_start = Instant::now();
    for page in 1..=feed_pages {
        let req = test::TestRequest::get()
            .uri(&format!("/follow/?page={}", page))
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let feed_elapsed = feed_start.elapsed();

    let index_pages = NUM_AUTHORS * POSTS_PER_AUTHOR / 10;
    let index_start = Instant::now();
    for page in 1..=index_pages {
        let req = test::TestRequest::get().uri(&format!("/?page={}", page)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let index_elapsed = index_start.elapsed();

    println!("\n=== Results ===");
    println!(
        "Feed: {} pages in {:?} ({:?} per page)",
        feed_pages,
        feed_elapsed,
        feed_elapsed / feed_pages as u32
    );
    println!(
        "Index: {} pages in {:?} ({:?} per page)",
        index_pages,
        index_elapsed,
        index_elapsed / index_pages as u32
    );
}

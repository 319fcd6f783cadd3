/// Search synchronization tests
///
/// The search hook keeps an index in step with saves and deletes.
/// Run with: cargo test --test search_tests
mod common;

use common::{Topic, engine};
use contentdb::entities::{Entity, Page, Post, Site};
use contentdb::search::SearchIndexer;
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[tokio::test]
async fn test_published_content_is_indexed() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let site = Uuid::new_v4();

    let mut published = Post::new("Hello", "hello", vec![site]);
    published.publish();
    let id = posts.add(published, None).await.unwrap().item.id();
    posts
        .add(Post::new("Draft", "draft", vec![site]), None)
        .await
        .unwrap();

    assert_eq!(fx.index.len().await, 1);
    let document = fx.index.get("content.post", id).await.unwrap();
    assert_eq!(document.title, "Hello");
    assert_eq!(document.site_ids, vec![site]);
}

#[tokio::test]
async fn test_unpublish_and_delete_remove_document() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();

    let mut item = Post::new("Hello", "hello", vec![Uuid::new_v4()]);
    item.publish();
    let id = posts.add(item, None).await.unwrap().item.id();
    assert_eq!(fx.index.len().await, 1);

    let mut stored = posts.get_by_id(id, None).await.unwrap().unwrap();
    stored.unpublish();
    posts.update(stored, None).await.unwrap();
    assert!(fx.index.is_empty().await);

    let mut stored = posts.get_by_id(id, None).await.unwrap().unwrap();
    stored.publish();
    posts.update(stored, None).await.unwrap();
    assert_eq!(fx.index.len().await, 1);

    posts.delete(id, None).await.unwrap();
    assert!(fx.index.is_empty().await);
}

#[tokio::test]
async fn test_unchanged_update_leaves_index_alone() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();

    let mut item = Post::new("Hello", "hello", vec![Uuid::new_v4()]);
    item.publish();
    let id = posts.add(item, None).await.unwrap().item.id();
    fx.index.delete("content.post", id).await.unwrap();

    let stored = posts.get_by_id(id, None).await.unwrap().unwrap();
    let result = posts.update(stored, None).await.unwrap();
    assert!(result.changes.is_empty());
    assert!(fx.index.is_empty().await);
}

#[tokio::test]
async fn test_offline_index_does_not_fail_saves() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    fx.index.set_offline(true);

    let mut item = Post::new("Hello", "hello", vec![Uuid::new_v4()]);
    item.publish();
    let result = posts.add(item, None).await.unwrap();
    assert!(result.is_saved());
    assert_eq!(posts.count(None).await.unwrap(), 1);

    fx.index.set_offline(false);
    assert!(fx.index.is_empty().await);
}

#[tokio::test]
async fn test_targets_sections_pages_not_sites() {
    let fx = engine(|b| b);
    let sites = fx.cms.repository::<Site>().unwrap();
    let pages = fx.cms.repository::<Page>().unwrap();
    let topics = fx.cms.repository::<Topic>().unwrap();

    let site = sites.add(Site::new("Main", "main"), None).await.unwrap().item;
    assert!(fx.index.is_empty().await);

    let mut page = Page {
        title: "About".into(),
        url: "about".into(),
        site_ids: vec![site.id()],
        is_published: true,
        ..Default::default()
    };
    page = pages.add(page, None).await.unwrap().item;
    assert!(fx.index.get("page", page.id()).await.is_some());

    let mut topic = Topic::new("News", "news", vec![site.id()]);
    topic.is_published = true;
    let topic = topics.add(topic, None).await.unwrap().item;
    assert!(fx.index.get("section.topic", topic.id()).await.is_some());
    assert_eq!(fx.index.len().await, 2);
}

/// Repository tests
///
/// Add / update / delete pipeline, change detection and family scoping.
/// Run with: cargo test --test repository_tests
mod common;

use common::{Article, ArticleData, BannerProperties, Topic, engine};
use contentdb::entities::{ContentBlock, Entity, Post, Site};
use contentdb::properties::{PropertiesEntry, PropertiesQuantity};
use contentdb::repository::PropertyChange;
use contentdb::{FieldValue, MutationStatus, Query};
use pretty_assertions::assert_eq;
use std::time::Duration;
use uuid::Uuid;

fn post(title: &str, url: &str, site: Uuid) -> Post {
    Post::new(title, url, vec![site])
}

#[tokio::test]
async fn test_add_then_get_by_id() {
    let fx = engine(|b| b.content_properties::<BannerProperties>());
    let posts = fx.cms.repository::<Post>().unwrap();
    let site = Uuid::new_v4();

    let result = posts.add(post("Hello", "hello", site), None).await.unwrap();
    assert!(result.is_saved());
    assert!(result.is_valid());
    assert!(result.changes.is_empty());
    let id = result.item.id();
    assert!(!id.is_nil());
    assert_eq!(result.item.meta.date_added, result.item.meta.date_updated);

    let loaded = posts.get_by_id(id, None).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Hello");
    assert_eq!(loaded.url, "hello");
    assert_eq!(loaded.site_ids, vec![site]);
    assert_eq!(loaded.meta.date_added, result.item.meta.date_added);

    // banner and seo are both applicable to content
    let keys: Vec<&str> = loaded.properties().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["banner", "seo"]);
}

#[tokio::test]
async fn test_invalid_add_is_not_persisted() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();

    let result = posts.add(Post::new("", "empty", vec![]), None).await.unwrap();
    assert_eq!(result.status, MutationStatus::Invalid);
    assert!(!result.is_saved());
    assert!(result.validation.has_failure_for("title"));
    assert!(result.validation.has_failure_for("site_ids"));

    assert_eq!(posts.count(None).await.unwrap(), 0);
    assert_eq!(fx.storage.row_count(Post::TABLE).await, 0);
    assert_eq!(fx.cms.stats().commits, 0);
}

#[tokio::test]
async fn test_update_without_changes() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let id = posts
        .add(post("Hello", "hello", Uuid::new_v4()), None)
        .await
        .unwrap()
        .item
        .id();

    let loaded = posts.get_by_id(id, None).await.unwrap().unwrap();
    let result = posts.update(loaded, None).await.unwrap();
    assert!(result.is_saved());
    assert!(result.changes.is_empty());
}

#[tokio::test]
async fn test_update_reports_changes() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let added = posts
        .add(post("Hello", "hello", Uuid::new_v4()), None)
        .await
        .unwrap()
        .item;

    let mut item = posts.get_by_id(added.id(), None).await.unwrap().unwrap();
    item.blocks
        .push(ContentBlock::new("text", 0, serde_json::json!({ "text": "body" })));
    item.title = "Hello again".into();

    let result = posts.update(item, None).await.unwrap();
    assert!(result.is_saved());
    let names: Vec<&str> = result.changes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["title", "blocks"]);
    assert_eq!(
        result.changes[0],
        PropertyChange {
            name: "title".into(),
            old_value: FieldValue::Text("Hello".into()),
            new_value: FieldValue::Text("Hello again".into()),
        }
    );

    assert_eq!(result.item.meta.date_added, added.meta.date_added);
    assert!(result.item.meta.date_updated >= added.meta.date_updated);

    let stored = posts.get_by_id(added.id(), None).await.unwrap().unwrap();
    assert_eq!(stored.title, "Hello again");
    assert_eq!(stored.blocks.len(), 1);
}

#[tokio::test]
async fn test_update_with_rebuilt_item_keeps_date_added() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let site = Uuid::new_v4();
    let added = posts
        .add(post("Hello", "hello", site), None)
        .await
        .unwrap()
        .item;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut rebuilt = post("Hello", "hello", site);
    rebuilt.meta.id = added.id();

    let result = posts.update(rebuilt, None).await.unwrap();
    assert!(result.is_saved());
    assert!(result.changes.is_empty());
    assert_eq!(result.item.meta.date_added, added.meta.date_added);
    assert!(result.item.meta.date_updated > added.meta.date_updated);

    let stored = posts.get_by_id(added.id(), None).await.unwrap().unwrap();
    assert_eq!(stored.meta.date_added, added.meta.date_added);
}

#[tokio::test]
async fn test_update_missing_item_is_not_found() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let mut item = post("Ghost", "ghost", Uuid::new_v4());
    item.meta.id = Uuid::new_v4();

    let err = posts.update(item, None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let id = posts
        .add(post("Hello", "hello", Uuid::new_v4()), None)
        .await
        .unwrap()
        .item
        .id();

    let deleted = posts.delete(id, None).await.unwrap();
    assert_eq!(deleted.title, "Hello");
    assert!(posts.get_by_id(id, None).await.unwrap().is_none());

    let err = posts.delete(id, None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_url_unique_per_site() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let site_a = Uuid::new_v4();
    let site_b = Uuid::new_v4();

    assert!(posts.add(post("One", "hello", site_a), None).await.unwrap().is_saved());

    let clash = posts.add(post("Two", "hello", site_a), None).await.unwrap();
    assert_eq!(clash.status, MutationStatus::Invalid);
    assert!(clash.validation.has_failure_for("url"));

    let other_site = posts.add(post("Three", "hello", site_b), None).await.unwrap();
    assert!(other_site.is_saved());
    assert_eq!(posts.count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_variants_share_table_but_not_results() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let articles = fx.cms.repository::<Article>().unwrap();
    let site = Uuid::new_v4();

    posts.add(post("Post", "post", site), None).await.unwrap();
    let mut article = Article::new("Article", "article", vec![site]);
    article.data = ArticleData { reading_minutes: 7 };
    let article_id = articles.add(article, None).await.unwrap().item.id();

    assert_eq!(fx.storage.row_count(Post::TABLE).await, 2);
    assert_eq!(posts.count(None).await.unwrap(), 1);
    assert_eq!(articles.count(None).await.unwrap(), 1);
    assert!(posts.get_by_id(article_id, None).await.unwrap().is_none());

    let stored = articles.get_by_id(article_id, None).await.unwrap().unwrap();
    assert_eq!(stored.data.reading_minutes, 7);
    assert_eq!(articles.discriminator(), Some("article"));
}

#[tokio::test]
async fn test_get_all_counts_unpaginated_filter() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();
    let site = Uuid::new_v4();
    for n in 1..=5 {
        let mut item = post(&format!("Post {}", n), &format!("post-{}", n), site);
        if n % 2 == 0 {
            item.publish();
        }
        posts.add(item, None).await.unwrap();
    }
    posts
        .add(post("Elsewhere", "elsewhere", Uuid::new_v4()), None)
        .await
        .unwrap();

    let query = Query::<Post>::new()
        .for_site(site)
        .order_by_str("-title")
        .unwrap()
        .page(1, 2);
    let (items, total) = posts.get_all(Some(&query)).await.unwrap();
    assert_eq!(total, 5);
    let titles: Vec<&str> = items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Post 5", "Post 4"]);

    let published = Query::<Post>::new().for_site(site).published();
    assert_eq!(posts.count(Some(&published)).await.unwrap(), 2);

    let first = posts
        .get(&Query::<Post>::new().order_by(|p| p.url.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.url, "elsewhere");
}

#[tokio::test]
async fn test_get_by_ids_skips_missing() {
    let fx = engine(|b| b);
    let sites = fx.cms.repository::<Site>().unwrap();
    let a = sites.add(Site::new("A", "a"), None).await.unwrap().item.id();
    let b = sites.add(Site::new("B", "b"), None).await.unwrap().item.id();

    let found = sites
        .get_by_ids(&[a, Uuid::new_v4(), b], None)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_get_by_ids_returns_repeated_id_once() {
    let fx = engine(|b| b);
    let sites = fx.cms.repository::<Site>().unwrap();
    let a = sites.add(Site::new("A", "a"), None).await.unwrap().item.id();
    let b = sites.add(Site::new("B", "b"), None).await.unwrap().item.id();

    let found = sites.get_by_ids(&[a, a, b, a], None).await.unwrap();
    let ids: Vec<Uuid> = found.iter().map(|site| site.id()).collect();
    assert_eq!(ids, vec![a, b]);
}

#[tokio::test]
async fn test_new_entity_has_default_properties() {
    let fx = engine(|b| b.section_properties::<BannerProperties>());
    let topics = fx.cms.repository::<Topic>().unwrap();

    let topic = topics.new_entity().await.unwrap();
    assert!(topic.id().is_nil());
    let banner = topic
        .properties()
        .iter()
        .find(|entry| entry.key == "banner")
        .unwrap();
    assert_eq!(
        banner.value::<BannerProperties>(None),
        Some(&BannerProperties::default())
    );
    assert!(!banner.values[0].persisted);
}

#[tokio::test]
async fn test_properties_saved_with_entity() {
    let fx = engine(|b| b.section_properties::<BannerProperties>());
    let topics = fx.cms.repository::<Topic>().unwrap();

    let mut topic = topics.new_entity().await.unwrap();
    topic.title = "News".into();
    topic.url = "news".into();
    topic.site_ids = vec![Uuid::new_v4()];
    topic
        .meta
        .properties
        .iter_mut()
        .find(|entry| entry.key == "banner")
        .and_then(|entry| entry.value_mut::<BannerProperties>(None))
        .unwrap()
        .text = "Breaking".into();

    let commits = fx.cms.stats().commits;
    let result = topics.add(topic, None).await.unwrap();
    assert!(result.is_saved());
    // row and properties record land in one commit
    assert_eq!(fx.cms.stats().commits, commits + 1);
    assert_eq!(fx.storage.row_count("properties").await, 1);

    let mut stored = topics
        .get_by_id(result.item.id(), None)
        .await
        .unwrap()
        .unwrap();
    let banner: BannerProperties = fx.cms.properties().get(&mut stored, None).await.unwrap();
    assert_eq!(banner.text, "Breaking");
}

#[tokio::test]
async fn test_failed_properties_leave_nothing_pending() {
    let fx = engine(|b| b);
    let posts = fx.cms.repository::<Post>().unwrap();

    let mut item = post("Hello", "hello", Uuid::new_v4());
    item.meta.properties.push(PropertiesEntry {
        key: "retired".into(),
        title: "Retired".into(),
        quantity: PropertiesQuantity::OnePerEntity,
        values: vec![],
    });

    assert!(posts.add(item, None).await.is_err());
    assert_eq!(fx.cms.data_context().pending_count().await, 0);
    assert_eq!(fx.storage.row_count("content_items").await, 0);

    // a later unrelated commit does not pick up the failed row
    posts
        .add(post("Other", "other", Uuid::new_v4()), None)
        .await
        .unwrap();
    assert_eq!(fx.storage.row_count("content_items").await, 1);
}

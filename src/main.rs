use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contentdb::entities::{ContentBlock, Entity, Post, PostData, Section, Site, TypedData};
use contentdb::properties::SeoPropertiesSet;
use contentdb::search::InMemorySearchIndex;
use contentdb::{CmsBuilder, CmsConfig, Query, StorageConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "contentdb")]
#[command(about = "Inspection tooling for the ContentDB data layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed an in-memory engine and print its content with properties
    Demo {
        #[arg(long, default_value_t = 3)]
        posts: usize,
    },
    /// Validate configuration from a storage url or the CMS_* environment
    CheckConfig {
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct BlogData {
    description: String,
}

impl TypedData for BlogData {
    const DISCRIMINATOR: &'static str = "blog";
    const TITLE: &'static str = "Blog";
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Demo { posts } => demo(posts).await,
        Command::CheckConfig { url } => check_config(url.as_deref()),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("contentdb=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn check_config(url: Option<&str>) -> Result<()> {
    let config = match url {
        Some(url) => CmsConfig::from_url(url),
        None => CmsConfig::from_env(),
    }
    .context("failed to read configuration")?;
    config.validate().context("invalid configuration")?;

    println!("storage: {}", config.storage.driver());
    println!("validation: {}", config.enable_validation);
    println!("search sync: {}", config.enable_search_sync);
    println!("seo: {}", config.enable_seo);
    Ok(())
}

async fn demo(count: usize) -> Result<()> {
    let index = Arc::new(InMemorySearchIndex::new());
    let cms = CmsBuilder::new(CmsConfig::new(StorageConfig::in_memory("demo")))
        .section::<BlogData>()
        .content::<PostData>()
        .search_indexer(index.clone())
        .build()?;

    let sites = cms.repository::<Site>()?;
    let site = sites
        .add(Site::new("Main site", "main"), None)
        .await?
        .item;

    let sections = cms.repository::<Section<BlogData>>()?;
    let mut blog = Section::<BlogData>::new("News", "news", vec![site.id()]);
    blog.is_published = true;
    let blog = sections.add(blog, None).await?.item;

    let posts = cms.repository::<Post>()?;
    posts.begin_batch();
    for n in 1..=count {
        let mut post = Post::new(format!("Post {}", n), format!("post-{}", n), vec![site.id()]);
        post.section_ids.push(blog.id());
        post.blocks.push(ContentBlock::new(
            "text",
            0,
            serde_json::json!({ "text": format!("Body of post {}", n) }),
        ));
        if n % 2 == 1 {
            post.publish();
        }
        let result = posts.add(post, None).await?;
        if !result.is_valid() {
            for failure in result.validation.failures() {
                println!("rejected: {}", failure);
            }
        }
    }
    posts.finish_batch().await?;

    let mut first = posts
        .get(&Query::<Post>::new().for_site(site.id()).order_by_str("title")?)
        .await?
        .context("no posts seeded")?;
    let seo = SeoPropertiesSet {
        title: first.title.clone(),
        description: "Featured post".into(),
        ..Default::default()
    };
    cms.properties().set(&mut first, Some(site.id()), seo).await?;

    let query = Query::<Post>::new().for_site(site.id()).order_by_str("-is_published,title")?;
    let (items, total) = posts.get_all(Some(&query)).await?;
    info!(total, "posts loaded");

    println!("site {} ({})", site.title, site.id());
    println!("section {} [{}]", blog.title, Section::<BlogData>::type_name());
    for post in &items {
        let seo = post
            .properties()
            .iter()
            .find(|entry| entry.key == "seo")
            .and_then(|entry| entry.value::<SeoPropertiesSet>(Some(site.id())))
            .map(|seo| seo.description.clone())
            .unwrap_or_default();
        println!(
            "  {:<10} /{:<10} published={:<5} seo='{}'",
            post.title, post.url, post.is_published, seo
        );
    }

    let stats = cms.stats();
    println!(
        "{} posts, {} indexed, {} commits, {} queries",
        total,
        index.len().await,
        stats.commits,
        stats.queries
    );
    Ok(())
}

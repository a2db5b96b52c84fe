//! Seed data for mock mode. This is the only fixture set; both the dashboard
//! demo and the mock store read from here.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::db::memory::Tables;
use crate::models::ai_task::AiTask;
use crate::models::article::Article;
use crate::models::hot_topic::HotTopic;
use crate::models::status::{AiTaskStatus, AiTaskType, ArticleStatus};
use crate::models::template::Template;

pub fn tables(now: DateTime<Utc>) -> Tables {
    let days_ago = |d: i64| now - Duration::days(d);

    let market_brief = Template {
        id: Uuid::new_v4(),
        name: "Market brief".into(),
        description: Some("Short daily price-action summary".into()),
        category: Some("market".into()),
        content: "{coin} moved {change} in the last 24h. Key drivers: {drivers}.".into(),
        usage_count: 12,
        created_at: days_ago(30),
        updated_at: days_ago(2),
    };
    let project_spotlight = Template {
        id: Uuid::new_v4(),
        name: "Project spotlight".into(),
        description: Some("Deep dive into a single protocol".into()),
        category: Some("analysis".into()),
        content: "What is {project}? {project} is a {sector} protocol that {pitch}.".into(),
        usage_count: 4,
        created_at: days_ago(21),
        updated_at: days_ago(21),
    };

    let topic = |keyword: &str, volume: i64, source: &str, age: i64| HotTopic {
        id: Uuid::new_v4(),
        keyword: keyword.into(),
        volume,
        source: Some(source.into()),
        related_articles: Vec::new(),
        created_at: days_ago(age),
        updated_at: days_ago(age),
    };
    let bitcoin_etf = topic("Bitcoin ETF", 48_000, "google_trends", 3);
    let eth_staking = topic("Ethereum staking", 15_500, "twitter", 5);
    let memecoins = topic("Solana memecoins", 9_200, "twitter", 1);
    let defi_hack = topic("DeFi exploit", 3_100, "news", 7);

    let article = |title: &str,
                   status: ArticleStatus,
                   template: Option<&Template>,
                   topic: Option<&HotTopic>,
                   age: i64| {
        let created = days_ago(age);
        Article {
            id: Uuid::new_v4(),
            title: title.into(),
            summary: Some(format!("{title}: what happened and why it matters.")),
            content: format!("<p>{title}</p>"),
            cover_image: None,
            category: template.and_then(|t| t.category.clone()),
            keywords: topic.map(|t| vec![t.keyword.clone()]).unwrap_or_default(),
            status,
            template_id: template.map(|t| t.id),
            hot_topic_id: topic.map(|t| t.id),
            created_at: created,
            updated_at: created,
            published_at: (status == ArticleStatus::Published).then_some(created),
        }
    };
    let articles = vec![
        article(
            "Spot Bitcoin ETFs see record inflows",
            ArticleStatus::Published,
            Some(&market_brief),
            Some(&bitcoin_etf),
            3,
        ),
        article(
            "Liquid staking after the Shanghai upgrade",
            ArticleStatus::Pending,
            Some(&project_spotlight),
            Some(&eth_staking),
            2,
        ),
        article(
            "Memecoin season on Solana",
            ArticleStatus::Draft,
            None,
            Some(&memecoins),
            1,
        ),
        article(
            "Weekly market wrap",
            ArticleStatus::Rejected,
            Some(&market_brief),
            None,
            6,
        ),
    ];

    let ai_tasks = vec![AiTask {
        id: Uuid::new_v4(),
        name: "Title ideas: Bitcoin ETF".into(),
        task_type: AiTaskType::Title,
        status: AiTaskStatus::Completed,
        input_data: json!({ "keyword": "Bitcoin ETF" }),
        result_data: Some(json!({ "text": "Spot Bitcoin ETFs see record inflows" })),
        created_at: days_ago(3),
        completed_at: Some(days_ago(3)),
    }];

    Tables {
        articles,
        templates: vec![market_brief, project_spotlight],
        hot_topics: vec![bitcoin_etf, eth_staking, memecoins, defi_hack],
        ai_tasks,
        images: Vec::new(),
    }
}

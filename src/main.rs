use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pharma_research::aggregator::Aggregator;
use pharma_research::ai::{rank_similar, AiClient, Enricher, QuotaTracker, TrendAnalyzer};
use pharma_research::batch::BatchProcessor;
use pharma_research::config::{get_config, load_config, Config};
use pharma_research::models::{Article, SearchQuery};
use pharma_research::sources::SourceRegistry;
use pharma_research::store::ArticleStore;
use pharma_research::utils::CacheService;
use is_terminal::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pharma Research - Search pharmaceutical literature across multiple sources
#[derive(Parser, Debug)]
#[command(name = "pharma-research")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search pharmaceutical literature across PubMed, Semantic Scholar and CrossRef", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable caching for this command (useful for testing fresh results)
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Available literature sources
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "pubmed")]
    Pubmed,
    #[value(name = "semantic")]
    Semantic,
    #[value(name = "crossref")]
    CrossRef,
    #[value(name = "all")]
    All,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for articles across all sources, merged and deduplicated
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Source to search (default: all)
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Maximum number of merged results
        #[arg(long, short, default_value_t = 10)]
        max_results: usize,

        /// Number of merged results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Year filter (e.g., "2020" or "2018-2022")
        #[arg(long)]
        year: Option<String>,

        /// Author filter
        #[arg(long, short)]
        author: Option<String>,

        /// Skip abstract backfill via DOI lookups
        #[arg(long)]
        no_backfill: bool,
    },

    /// Look up an article by DOI
    Doi {
        /// Digital Object Identifier
        doi: String,
    },

    /// Summarize an article's abstract (AI, with abstract-prefix fallback)
    Summarize {
        /// DOI or source-specific article ID
        id: String,
    },

    /// Find articles similar to a given one via embeddings
    Similar {
        /// DOI or source-specific article ID of the target article
        id: String,

        /// Search query used to gather candidates (default: the article title)
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of similar articles to return
        #[arg(long, short, default_value_t = 5)]
        limit: usize,
    },

    /// Analyze topic trends across recent search results
    Trends {
        /// Search query defining the corpus
        query: String,

        /// Window size in days (1-90)
        #[arg(long, short, default_value_t = 30)]
        days: i64,

        /// Number of articles to analyze
        #[arg(long, short, default_value_t = 30)]
        max_results: usize,
    },

    /// List available sources and their capabilities
    #[command(alias = "ls")]
    Sources {
        /// Show detailed information about each source
        #[arg(long, short)]
        detailed: bool,
    },

    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show cache status and statistics
    Stats,

    /// Clear all cached data
    Clear,
}

/// Everything a command handler needs
struct App {
    config: Config,
    registry: Arc<SourceRegistry>,
    store: Arc<ArticleStore>,
    aggregator: Aggregator,
    enricher: Arc<Enricher>,
    quotas: Arc<QuotaTracker>,
    quiet: bool,
}

impl App {
    fn new(config: Config, quiet: bool) -> Result<Self> {
        let registry = Arc::new(
            SourceRegistry::with_config(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?,
        );

        let cache = Arc::new(CacheService::from_config(config.cache.clone()));
        cache.initialize()?;

        let store = Arc::new(ArticleStore::new());
        let aggregator = Aggregator::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            config.search.clone(),
        );

        let ai_client = AiClient::new(&config.ai, config.api_keys.openai.clone())?;
        let quotas = Arc::new(QuotaTracker::new(&config.quotas));
        let enricher = Arc::new(Enricher::new(
            ai_client,
            Arc::clone(&cache),
            Arc::clone(&quotas),
        ));

        Ok(Self {
            config,
            registry,
            store,
            aggregator,
            enricher,
            quotas,
            quiet,
        })
    }

    fn ai_client(&self) -> Result<AiClient> {
        Ok(AiClient::new(
            &self.config.ai,
            self.config.api_keys.openai.clone(),
        )?)
    }

    fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.quiet || !std::io::stderr().is_terminal() {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }

    /// Run an aggregated search and persist the results into the store
    async fn search_and_store(&self, query: &SearchQuery) -> Vec<Article> {
        let spinner = self.spinner(&format!(
            "Searching {} sources...",
            self.registry.searchable().len()
        ));

        let result = self.aggregator.search(query).await;

        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        for (source, count) in &result.source_counts {
            tracing::info!("{}: {} results", source, count);
        }
        if !result.failed_sources.is_empty() && !self.quiet {
            eprintln!(
                "{} sources failed: {}",
                "warning:".yellow().bold(),
                result.failed_sources.join(", ")
            );
        }

        self.store.upsert_all(result.articles.clone());
        result.articles
    }

    /// Resolve a DOI or a source-specific article ID to an article
    async fn resolve_article(&self, ident: &str) -> Option<Article> {
        if ident.starts_with("10.") {
            return self.aggregator.get_by_doi(ident).await;
        }
        for source in self.registry.all() {
            match source.get_by_id(ident).await {
                Ok(article) => return Some(article),
                Err(e) => tracing::debug!("ID lookup on {} failed: {}", source.id(), e),
            }
        }
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("pharma_research={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        load_config(Some(config_path))?
    } else {
        get_config()
    };

    if cli.no_cache {
        config.cache.enabled = false;
    }

    match cli.command {
        Commands::Search {
            query,
            source,
            max_results,
            offset,
            year,
            author,
            no_backfill,
        } => {
            if no_backfill {
                config.search.abstract_backfill_budget = 0;
            }
            let app = App::new(config, cli.quiet)?;

            let mut search_query = SearchQuery::new(query.as_str())
                .max_results(max_results)
                .offset(offset);
            if let Some(year) = year {
                search_query = search_query.year(year);
            }
            if let Some(author) = author {
                search_query = search_query.author(author);
            }

            let articles = match source {
                SourceArg::All => app.search_and_store(&search_query).await,
                s => {
                    // Single-source search bypasses the merge pipeline
                    let src = app
                        .registry
                        .get_required(source_to_id(s))
                        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                    let response = src
                        .search(&search_query)
                        .await
                        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                    app.store.upsert_all(response.articles.clone());
                    response.articles
                }
            };

            output_articles(&articles, cli.output);
        }

        Commands::Doi { doi } => {
            let app = App::new(config, cli.quiet)?;

            match app.aggregator.get_by_doi(&doi).await {
                Some(article) => output_articles(&[article], cli.output),
                None => anyhow::bail!("Article not found in any source: {}", doi),
            }
        }

        Commands::Summarize { id } => {
            let app = App::new(config, cli.quiet)?;

            let article = app
                .resolve_article(&id)
                .await
                .ok_or_else(|| anyhow::anyhow!("Article not found in any source: {}", id))?;

            let spinner = app.spinner("Summarizing...");
            let summary = app.enricher.summarize(&article).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            if std::io::stdout().is_terminal() {
                println!("{}", article.title.bold());
                if !article.authors.is_empty() {
                    println!("{}", article.authors.dimmed());
                }
                println!();
                println!("{}", summary);
            } else {
                println!(
                    "{}",
                    serde_json::json!({
                        "doi": article.doi,
                        "title": article.title,
                        "summary": summary,
                    })
                );
            }
        }

        Commands::Similar { id, query, limit } => {
            let app = App::new(config, cli.quiet)?;

            if !app.enricher.is_enabled() {
                anyhow::bail!("Similarity search requires an AI API key (set OPENAI_API_KEY)");
            }

            let target = app
                .resolve_article(&id)
                .await
                .ok_or_else(|| anyhow::anyhow!("Article not found in any source: {}", id))?;
            let target_id = app.store.upsert(target.clone());

            // Gather a candidate pool, then embed it through the batch worker
            let candidate_query = query.unwrap_or_else(|| target.title.clone());
            let search_query = SearchQuery::new(candidate_query.as_str()).max_results(limit * 4);
            app.search_and_store(&search_query).await;

            let spinner = app.spinner("Computing embeddings...");
            let batch_config = pharma_research::config::BatchConfig {
                batch_size: app.store.len(),
                request_delay_ms: 0,
                ..app.config.batch.clone()
            };
            BatchProcessor::run_cycle(&app.store, &app.enricher, &batch_config).await;

            let target_embedding = app
                .enricher
                .embed_article(&target)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Could not embed target article"))?;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            let ranked = rank_similar(
                &target_embedding,
                app.store.with_embedding(),
                limit,
                Some(target_id.as_str()),
            );

            if ranked.is_empty() {
                anyhow::bail!("No comparable articles found");
            }

            output_similar(&ranked, cli.output);
        }

        Commands::Trends {
            query,
            days,
            max_results,
        } => {
            let app = App::new(config, cli.quiet)?;

            let search_query = SearchQuery::new(query.as_str()).max_results(max_results);
            app.search_and_store(&search_query).await;

            let records = app.store.recent(days.clamp(1, 90));
            let analyzer = TrendAnalyzer::new(app.ai_client()?, Arc::clone(&app.quotas));

            let spinner = app.spinner("Analyzing trends...");
            let report = analyzer.analyze(&records, days).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            if std::io::stdout().is_terminal() && cli.output == OutputFormat::Auto {
                println!(
                    "{} ({} articles, last {} days)",
                    "Topic trends".bold(),
                    report.article_count,
                    report.period_days
                );
                print_trend_section("Frequent topics", &report.frequent_topics);
                print_trend_section("Emerging themes", &report.emerging_themes);
                print_trend_section("Notable shifts", &report.notable_shifts);
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Commands::Sources { detailed } => {
            let app = App::new(config, cli.quiet)?;

            let mut sources: Vec<_> = app.registry.all().collect();
            sources.sort_by_key(|s| s.id().to_string());

            for src in sources {
                if detailed {
                    println!("{} ({})", src.name(), src.id());
                    println!("  Capabilities: {:?}", src.capabilities());
                } else {
                    println!("{} - {}", src.id(), src.name());
                }
            }
        }

        Commands::Cache { command } => {
            let cache = CacheService::from_config(config.cache.clone());
            cache.initialize()?;

            match command {
                CacheCommands::Stats => {
                    let stats = cache.stats();
                    if !stats.enabled {
                        println!("Cache: disabled");
                    } else {
                        println!("Cache: enabled");
                        println!("Directory: {}", stats.cache_dir.display());
                        println!(
                            "Search cache: {} items ({} KB)",
                            stats.search_count, stats.search_size_kb
                        );
                        println!("AI cache: {} items ({} KB)", stats.ai_count, stats.ai_size_kb);
                        println!("Total size: {} KB", stats.total_size_kb);
                        println!("Search TTL: {} seconds", stats.ttl_search.as_secs());
                        println!("Embedding TTL: {} seconds", stats.ttl_embedding.as_secs());
                    }
                }
                CacheCommands::Clear => {
                    cache.clear_all()?;
                    if !cli.quiet {
                        eprintln!("Cache cleared.");
                    }
                }
            }
        }
    }

    Ok(())
}

fn source_to_id(source: SourceArg) -> &'static str {
    match source {
        SourceArg::Pubmed => "pubmed",
        SourceArg::Semantic => "semantic",
        SourceArg::CrossRef => "crossref",
        SourceArg::All => unreachable!(),
    }
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate_display(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn output_articles(articles: &[Article], format: OutputFormat) {
    match resolve_format(format) {
        OutputFormat::Json => match serde_json::to_string_pretty(articles) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize results: {}", e),
        },
        OutputFormat::Plain => {
            for article in articles {
                println!("{} - {} ({})", article.title, article.authors, article.source);
                println!("  URL: {}", article.url);
                if let Some(ref doi) = article.doi {
                    println!("  DOI: {}", doi);
                }
                if let Some(ref journal) = article.journal {
                    println!("  Journal: {}", journal);
                }
                println!();
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Authors", "Source", "Year", "DOI"]);

            for article in articles {
                let year = article
                    .year()
                    .map(|y| y.to_string())
                    .unwrap_or_default();

                table.add_row(vec![
                    Cell::new(truncate_display(&article.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate_display(&article.authors, 30)),
                    Cell::new(article.source.to_string()),
                    Cell::new(year),
                    Cell::new(article.doi.as_deref().unwrap_or("")),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
}

fn output_similar(ranked: &[pharma_research::ai::SimilarArticle], format: OutputFormat) {
    match resolve_format(format) {
        OutputFormat::Json => {
            let items: Vec<_> = ranked
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "score": s.score,
                        "title": s.article.article.title,
                        "doi": s.article.article.doi,
                        "url": s.article.article.url,
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&items) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize results: {}", e),
            }
        }
        OutputFormat::Plain => {
            for s in ranked {
                println!("{:.3}  {}", s.score, s.article.article.title);
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Score", "Title", "Source", "DOI"]);

            for s in ranked {
                table.add_row(vec![
                    Cell::new(format!("{:.3}", s.score)),
                    Cell::new(truncate_display(&s.article.article.title, 50)),
                    Cell::new(s.article.article.source.to_string()),
                    Cell::new(s.article.article.doi.as_deref().unwrap_or("")),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
}

fn print_trend_section(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}", heading.underline());
    for item in items {
        println!("  - {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["pharma-research", "search", "statins"]);
        match &cli.command {
            Commands::Search {
                query, max_results, offset, ..
            } => {
                assert_eq!(query, "statins");
                assert_eq!(*max_results, 10);
                assert_eq!(*offset, 0);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_with_options() {
        let cli = Cli::parse_from([
            "pharma-research",
            "search",
            "metformin",
            "--max-results",
            "25",
            "--offset",
            "10",
            "--year",
            "2020-2023",
            "--no-backfill",
        ]);
        match &cli.command {
            Commands::Search {
                query,
                max_results,
                offset,
                year,
                no_backfill,
                ..
            } => {
                assert_eq!(query, "metformin");
                assert_eq!(*max_results, 25);
                assert_eq!(*offset, 10);
                assert_eq!(year.as_deref(), Some("2020-2023"));
                assert!(*no_backfill);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_doi_command() {
        let cli = Cli::parse_from(["pharma-research", "doi", "10.1234/test"]);
        match &cli.command {
            Commands::Doi { doi } => assert_eq!(doi, "10.1234/test"),
            _ => panic!("Expected Doi command"),
        }
    }

    #[test]
    fn test_cli_trends_defaults() {
        let cli = Cli::parse_from(["pharma-research", "trends", "oncology"]);
        match &cli.command {
            Commands::Trends { query, days, max_results } => {
                assert_eq!(query, "oncology");
                assert_eq!(*days, 30);
                assert_eq!(*max_results, 30);
            }
            _ => panic!("Expected Trends command"),
        }
    }

    #[test]
    fn test_cli_similar_command() {
        let cli = Cli::parse_from([
            "pharma-research",
            "similar",
            "10.1234/test",
            "--limit",
            "3",
        ]);
        match &cli.command {
            Commands::Similar { id, limit, query } => {
                assert_eq!(id, "10.1234/test");
                assert_eq!(*limit, 3);
                assert!(query.is_none());
            }
            _ => panic!("Expected Similar command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["pharma-research", "-vv", "--no-cache", "sources"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_cache);
        assert!(matches!(cli.command, Commands::Sources { .. }));
    }

    #[test]
    fn test_cli_output_format() {
        let cli = Cli::parse_from(["pharma-research", "-o", "json", "sources"]);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_truncate_display() {
        assert_eq!(truncate_display("short", 50), "short");
        let long = "x".repeat(60);
        let truncated = truncate_display(&long, 50);
        assert_eq!(truncated.chars().count(), 50);
        assert!(truncated.ends_with("..."));
    }
}

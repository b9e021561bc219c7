use anyhow::{Context, Result};
use catalog_match::cli::{Cli, Commands, RunArgs};
use catalog_match::config::Config;
use catalog_match::dataset::load_dataset;
use catalog_match::export;
use catalog_match::matcher::{
    CacheFile, CacheLoadStatus, CatalogTarget, MatchSettings, MatchSummary, MatchingEngine,
    OpenAiClient, SettingsOverrides,
};
use catalog_match::registry::CatalogRegistry;
use catalog_match_common::MatchKind;
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("設定ファイルの読み込みに失敗")?;

    match cli.command {
        Commands::Run(args) => run_match(args, &config).await?,

        Commands::Register { file, name } => {
            println!("📤 catalog-match - カタログ登録\n");

            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .with_context(|| format!("登録名を決められません: {}", file.display()))?,
            };

            let service = OpenAiClient::new(config.service_config()?)?;
            let mut registry = CatalogRegistry::load(&config.registry_path)?;

            println!("- アップロード中: {}", file.display());
            let handle = registry
                .register(&service, &name, &file)
                .await
                .with_context(|| format!("カタログ登録に失敗: {}", file.display()))?;
            println!("✔ 登録しました: {} → {}", handle.catalog_name, handle.external_reference);
            println!("  登録ファイル: {}", registry.path().display());
        }

        Commands::Catalogs => {
            let registry = CatalogRegistry::load(&config.registry_path)?;
            if registry.is_empty() {
                println!("登録済みカタログはありません: {}", registry.path().display());
            } else {
                println!("登録済みカタログ ({}件):", registry.len());
                for (name, entry) in registry.list() {
                    println!(
                        "  {}  {}  {}  ({})",
                        name,
                        entry.file_id,
                        entry.source_path.display(),
                        entry.registered_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Commands::Columns { file, sheet } => {
            let dataset = load_dataset(&file, sheet.as_deref())?;
            println!("{} ({}行)", dataset.name(), dataset.len());
            for column in dataset.schema().columns() {
                println!("  {} ({})", column.name, column.kind);
            }
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  エンドポイント: {}", config.base_url);
                println!("  モデル: {}", config.model);
                println!(
                    "  アシスタントID: {}",
                    config.assistant_id.as_deref().unwrap_or("未設定")
                );
                println!(
                    "  ポーリング: {}ms x 最大{}回 / {}秒",
                    config.poll_interval_ms, config.max_poll_attempts, config.poll_deadline_seconds
                );
                println!("  キャッシュ: {}", config.cache_path.display());
                println!("  登録ファイル: {}", config.registry_path.display());
                println!(
                    "  APIキー: {}",
                    if config.get_api_key().is_ok() { "設定済み" } else { "未設定" }
                );
            }
        }

        Commands::Cache { clear, info, yes, path } => {
            let cache_path = path.unwrap_or_else(|| config.cache_path.clone());
            run_cache(&cache_path, clear, info, yes)?;
        }
    }

    Ok(())
}

async fn run_match(args: RunArgs, config: &Config) -> Result<()> {
    println!("🔎 catalog-match - カタログ照合\n");

    let output = args.output_path();
    export::ExportFormat::from_path(&output)
        .with_context(|| format!("出力形式を判定できません: {}", output.display()))?;

    // 1. 読み込み
    println!("[1/3] データを読み込み中...");
    let source = load_dataset(&args.source, args.sheet.as_deref())
        .with_context(|| format!("ソース表を読み込めません: {}", args.source.display()))?;
    let catalog = match &args.catalog {
        Some(path) => Some(
            load_dataset(path, args.catalog_sheet.as_deref())
                .with_context(|| format!("カタログ表を読み込めません: {}", path.display()))?,
        ),
        None => None,
    };
    println!(
        "✔ ソース {}行{}\n",
        source.len(),
        catalog
            .as_ref()
            .map(|c| format!(" / カタログ {}行", c.len()))
            .unwrap_or_default()
    );

    let base_settings = match &args.settings {
        Some(path) => MatchSettings::load(path)?,
        None => MatchSettings::default(),
    };
    let settings = base_settings.apply_overrides(SettingsOverrides {
        rules: args.rules.clone(),
        source_identifier_column: args.identifier_column.clone(),
        target_identifier_column: args.target_identifier_column.clone(),
        exclusive: args.exclusive,
        max_candidates: args.max_candidates,
    })?;

    let corpus = match &args.registered {
        Some(name) => Some(CatalogRegistry::load(&config.registry_path)?.handle(name)?),
        None => None,
    };
    let target = match (&corpus, &catalog) {
        (Some(corpus), catalog) => CatalogTarget::Corpus {
            corpus,
            catalog: catalog.as_ref(),
        },
        (None, Some(catalog)) => CatalogTarget::Inline(catalog),
        (None, None) => anyhow::bail!("--catalog か --registered を指定してください"),
    };
    if corpus.is_some() && config.assistant_id.is_none() {
        anyhow::bail!("登録済みカタログ照合には assistant_id の設定が必要です");
    }

    let service_config = config.service_config_optional_key();
    if service_config.api_key.is_none() {
        warn!("APIキーが未設定のため直接照合のみ行います（残りの行はエラーとして記録）");
    }
    let service = OpenAiClient::new(service_config)?;

    let mut cache = if args.no_cache {
        None
    } else {
        let (cache, status) = CacheFile::load(&config.cache_path);
        match status {
            CacheLoadStatus::Loaded => println!("- キャッシュ: {}件", cache.len()),
            CacheLoadStatus::Missing => {}
            CacheLoadStatus::Corrupt | CacheLoadStatus::VersionMismatch => {
                warn!(path = %config.cache_path.display(), "キャッシュを読み込めないため空から開始します")
            }
        }
        Some(cache)
    };

    // 2. 照合
    println!("[2/3] 照合中...");
    let progress = ProgressBar::new(source.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "  {bar:40.cyan/blue} {pos}/{len} ({elapsed})",
    )?);

    let engine = MatchingEngine::new(&service, &settings, config.poll_policy());
    let report = engine
        .run(&source, target, cache.as_mut(), |done, _| {
            progress.set_position(done as u64)
        })
        .await;
    progress.finish_and_clear();
    println!("✔ 照合完了\n");

    // 3. 保存
    println!("[3/3] 結果を保存中...");
    export::export_results(&report.rows, source.schema(), &output)
        .with_context(|| format!("結果を保存できません: {}", output.display()))?;
    println!("✔ 結果を保存: {}\n", output.display());

    print_summary(&report.summary);
    Ok(())
}

fn print_summary(summary: &MatchSummary) {
    println!("サマリー:");
    for kind in MatchKind::ALL {
        println!("  {}: {}", kind, summary.count(kind));
    }
    println!("  スキップ（空行）: {}", summary.skipped);
    println!("  キャッシュヒット: {}", summary.cache_hits);
    println!("  サービス呼び出し: {}", summary.service_calls);
    if !summary.cache_persisted {
        println!("  ⚠ キャッシュを保存できませんでした");
    }
}

fn run_cache(cache_path: &Path, clear: bool, info: bool, yes: bool) -> Result<()> {
    if info || !clear {
        if cache_path.exists() {
            let (cache, _) = CacheFile::load(cache_path);
            println!("キャッシュ情報:");
            println!("  パス: {}", cache_path.display());
            println!("  件数: {}", cache.len());
            for (kind, count) in cache.count_by_kind() {
                println!("    {}: {}", kind, count);
            }
            if let Ok(meta) = std::fs::metadata(cache_path) {
                println!("  サイズ: {} bytes", meta.len());
            }
        } else {
            println!("キャッシュファイルが存在しません: {}", cache_path.display());
        }
    }

    if clear {
        let confirmed = yes
            || Confirm::new()
                .with_prompt(format!("{} を削除しますか？", cache_path.display()))
                .default(false)
                .interact()?;
        if !confirmed {
            println!("中止しました");
            return Ok(());
        }

        if CacheFile::clear(cache_path)? {
            println!("✔ キャッシュを削除しました: {}", cache_path.display());
        } else {
            println!("キャッシュファイルが存在しません");
        }
    }

    Ok(())
}

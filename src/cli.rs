use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-match")]
#[command(about = "仕入先エクスポートとカタログの照合ツール（直接一致 + AI意味照合）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// エクスポート表をカタログと照合して結果を出力
    #[command(visible_alias = "match")]
    Run(RunArgs),

    /// カタログファイルを登録（アップロード）
    Register {
        /// カタログファイル（CSV/Excel）
        #[arg(required = true)]
        file: PathBuf,

        /// 登録名（省略時はファイル名）
        #[arg(short, long)]
        name: Option<String>,
    },

    /// 登録済みカタログの一覧
    Catalogs,

    /// 表の列構成を表示
    Columns {
        /// CSV/Excel ファイル
        #[arg(required = true)]
        file: PathBuf,

        /// シート名（Excelのみ）
        #[arg(long)]
        sheet: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,

        /// 削除時の確認を省略
        #[arg(short, long)]
        yes: bool,

        /// キャッシュファイル（省略時は設定値）
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// 照合元のエクスポート表（CSV/Excel）
    #[arg(required = true)]
    pub source: PathBuf,

    /// カタログ表（プロンプトに候補として含める）
    #[arg(short, long, required_unless_present = "registered")]
    pub catalog: Option<PathBuf>,

    /// 登録済みカタログ名（`register` で登録したもの）
    #[arg(long)]
    pub registered: Option<String>,

    /// 出力ファイル（.csv/.xlsx/.json、省略時は <source>_matched.xlsx）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 照合設定JSON
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// 直接照合ルール（LABEL:SOURCE=TARGET、複数指定可）
    #[arg(short, long = "rule")]
    pub rules: Vec<String>,

    /// 空なら照合しないソース側の識別子列
    #[arg(long)]
    pub identifier_column: Option<String>,

    /// 結果に書き出すカタログ側の識別子列
    #[arg(long)]
    pub target_identifier_column: Option<String>,

    /// カタログ行を1件のソース行にしか直接一致させない
    #[arg(long)]
    pub exclusive: bool,

    /// プロンプトに含めるカタログ行の上限
    #[arg(long)]
    pub max_candidates: Option<usize>,

    /// ソース表のシート名
    #[arg(long)]
    pub sheet: Option<String>,

    /// カタログ表のシート名
    #[arg(long)]
    pub catalog_sheet: Option<String>,

    /// キャッシュを使わない
    #[arg(long)]
    pub no_cache: bool,
}

impl RunArgs {
    /// 出力パス（省略時はソースと同じ場所に xlsx）
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let stem = self
                    .source
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "export".to_string());
                self.source.with_file_name(format!("{}_matched.xlsx", stem))
            }
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogMatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`catalog-match config --set-api-key YOUR_KEY` で設定するか OPENAI_API_KEY を指定してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("データ読み込みエラー: {0}")]
    Load(String),

    #[error("補完サービス呼び出しエラー: {0}")]
    Service(String),

    #[error("補完サービスがタイムアウトしました: {0}")]
    Timeout(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    Parse(String),

    #[error("未登録のカタログです: {0}（`catalog-match register` で登録してください）")]
    UnknownCatalog(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel読み込みエラー: {0}")]
    Excel(#[from] calamine::Error),

    #[error("Excel生成エラー: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] catalog_match_common::Error),
}

pub type Result<T> = std::result::Result<T, CatalogMatchError>;

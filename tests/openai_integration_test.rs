use catalog_match::config::Config;
use catalog_match::matcher::{CompletionService, OpenAiClient};
use catalog_match_common::prompts::SYSTEM_PROMPT;
use catalog_match_common::{build_inline_prompt, parse_text_response, ContextColumns, Dataset, CellValue, MatchKind, MatchingRule, PromptOptions, Row};

#[tokio::test]
async fn openai_inline_match_integration() {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {}
        _ => {
            eprintln!("OPENAI_API_KEY not set; skipping integration test");
            return;
        }
    }

    let config = Config::default();
    let client = OpenAiClient::new(config.service_config().expect("service config"))
        .expect("client");

    let catalog = Dataset::from_records(
        "catalog",
        vec!["item_no".into(), "name".into()],
        vec![
            vec![CellValue::from_text("U-100"), CellValue::from_text("Solid Bronze Cremation Urn, Adult")],
            vec![CellValue::from_text("C-200"), CellValue::from_text("Oak Veneer Casket")],
        ],
    )
    .expect("catalog");
    let row = Row::new(vec![
        ("sku".into(), CellValue::from_text("X-1")),
        ("title".into(), CellValue::from_text("Adult bronze urn for cremains")),
    ]);
    let rules = vec![MatchingRule::new("Name", "title", "name")];
    let context = ContextColumns::default();
    let options = PromptOptions {
        rules: &rules,
        context: &context,
        target_identifier_column: Some("item_no"),
        max_candidates: None,
    };

    let prompt = build_inline_prompt(&row, &catalog, &[0, 1], &options);
    let response = client
        .complete(SYSTEM_PROMPT, &prompt)
        .await
        .expect("completion failed");

    let verdict = parse_text_response(&response);
    assert_ne!(verdict.kind, MatchKind::Error);
    if verdict.kind == MatchKind::Semantic {
        assert_eq!(verdict.matched_target_ref.as_deref(), Some("U-100"));
    }
}

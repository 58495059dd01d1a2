use page_translator::services::prompt::render_prompt;

#[test]
fn translation_prompt_snapshot() {
    let texts = vec![
        "Faster startup".to_string(),
        "Fixed a crash when saving".to_string(),
        "See the <b>changelog</b> for details".to_string(),
    ];
    let prompt = render_prompt(&texts, "ja", "Release notes").unwrap();
    insta::assert_snapshot!(prompt);
}

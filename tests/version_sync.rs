#[test]
fn readme_deps_match_cargo_toml() {
    version_sync::assert_markdown_deps_updated!("README.md");
}

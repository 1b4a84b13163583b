use tokengate::settings::*;

fn main() -> anyhow::Result<()> {
    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:#?}", project_settings);

    match project_settings.auth.signing_key() {
        Ok(key) => println!("Signing key present ({} bytes)", key.len()),
        Err(e) => println!("Signing key missing: {}", e),
    }

    Ok(())
}

use super::Parser;

/// Token authentication service.
#[derive(Parser, Debug)]
pub struct Cli {
    /// Settings file; defaults to settings/dev.toml or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
    /// Overrides `http.address`.
    #[arg(long)]
    pub address: Option<String>,
}

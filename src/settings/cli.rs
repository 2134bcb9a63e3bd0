use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "waypoint", about = "User accounts and token sessions over HTTP")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,
}

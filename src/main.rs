use anyhow::Result;
use clap::Parser;
use ghota::{
    commands::{self, FlashOptions, config::Config},
    flash::FlashRegion,
};
use std::path::PathBuf;

/// ghota - GitHub Release OTA
///
/// Query GitHub releases and flash their firmware or filesystem images.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// This is useful for accessing private repositories or avoiding rate limits.
///
/// Examples:
///   ghota latest owner/repo                          # Print the latest release tag
///   ghota flash owner/repo@v1.2.0 -o firmware.bin    # Download a firmware image
#[derive(Parser, Debug)]
#[command(author, version = env!("GHOTA_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", env = "GHOTA_API_URL", global = true)]
    pub api_url: Option<String>,

    /// PEM certificate to trust in addition to the built-in roots
    #[arg(long = "ca-file", value_name = "PATH", global = true)]
    pub ca_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the tags of every release
    Tags(RepoArgs),

    /// Print the tag of the latest release
    Latest(RepoArgs),

    /// Print a release as JSON
    Show(ShowArgs),

    /// Download a release asset and write it as a firmware or filesystem image
    Flash(FlashArgs),
}

#[derive(clap::Args, Debug)]
pub struct RepoArgs {
    /// The GitHub repository in the format "owner/repo"
    #[arg(value_name = "OWNER/REPO")]
    pub repo: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// The GitHub repository in the format "owner/repo" or "owner/repo@tag"
    #[arg(value_name = "OWNER/REPO[@TAG]")]
    pub repo: String,

    /// Release tag (defaults to the latest release)
    #[arg(long, short = 't')]
    pub tag: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct FlashArgs {
    /// The GitHub repository in the format "owner/repo" or "owner/repo@tag"
    #[arg(value_name = "OWNER/REPO[@TAG]")]
    pub repo: String,

    /// File the image is written to
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: PathBuf,

    /// Release tag (defaults to the latest release)
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Asset name (defaults to firmware.bin or spiffs.bin by region)
    #[arg(long, short = 'a')]
    pub asset: Option<String>,

    /// Target region: firmware or filesystem
    #[arg(long, short = 'r', default_value = "firmware")]
    pub region: FlashRegion,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = Config::new(ghota::runtime::RealRuntime, cli.api_url, cli.ca_file.as_deref())?;

    match cli.command {
        Commands::Tags(args) => commands::tags(config, &args.repo).await?,
        Commands::Latest(args) => commands::latest(config, &args.repo).await?,
        Commands::Show(args) => commands::show(config, &args.repo, args.tag).await?,
        Commands::Flash(args) => {
            commands::flash(
                config,
                FlashOptions {
                    repo: args.repo,
                    output: args.output,
                    tag: args.tag,
                    asset: args.asset,
                    region: args.region,
                },
            )
            .await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_tags_parsing() {
        let cli = Cli::try_parse_from(["ghota", "tags", "owner/repo"]).unwrap();
        match cli.command {
            Commands::Tags(args) => assert_eq!(args.repo, "owner/repo"),
            _ => panic!("Expected Tags command"),
        }
        assert_eq!(cli.ca_file, None);
    }

    #[test]
    fn test_cli_show_tag_parsing() {
        let cli = Cli::try_parse_from(["ghota", "show", "owner/repo", "--tag", "v1.0.0"]).unwrap();
        match cli.command {
            Commands::Show(args) => {
                assert_eq!(args.repo, "owner/repo");
                assert_eq!(args.tag.as_deref(), Some("v1.0.0"));
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_cli_flash_parsing() {
        let cli = Cli::try_parse_from([
            "ghota",
            "flash",
            "owner/repo@v2",
            "-o",
            "/tmp/spiffs.bin",
            "--region",
            "spiffs",
        ])
        .unwrap();
        match cli.command {
            Commands::Flash(args) => {
                assert_eq!(args.repo, "owner/repo@v2");
                assert_eq!(args.output, PathBuf::from("/tmp/spiffs.bin"));
                assert_eq!(args.region, FlashRegion::Filesystem);
                assert_eq!(args.asset, None);
            }
            _ => panic!("Expected Flash command"),
        }
    }

    #[test]
    fn test_cli_flash_defaults_to_firmware() {
        let cli = Cli::try_parse_from(["ghota", "flash", "owner/repo", "-o", "fw.bin"]).unwrap();
        match cli.command {
            Commands::Flash(args) => assert_eq!(args.region, FlashRegion::Firmware),
            _ => panic!("Expected Flash command"),
        }
    }

    #[test]
    fn test_cli_flash_requires_output() {
        assert!(Cli::try_parse_from(["ghota", "flash", "owner/repo"]).is_err());
    }

    #[test]
    fn test_cli_flash_rejects_unknown_region() {
        let result =
            Cli::try_parse_from(["ghota", "flash", "owner/repo", "-o", "x", "-r", "bootloader"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_options_parsing() {
        let cli = Cli::try_parse_from([
            "ghota",
            "--api-url",
            "http://localhost:8080",
            "--ca-file",
            "/etc/ssl/corp.pem",
            "latest",
            "owner/repo",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(cli.ca_file, Some(PathBuf::from("/etc/ssl/corp.pem")));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["ghota", "owner/repo"]).is_err());
    }
}

use anyhow::{bail, Context};
use dropzone_scans::migration::load_definitions;
use dropzone_scans::{export_scans, import_scans, AuthMode, ScanClient, ScanServerConfig};

use crate::args::{AuthArg, ScanServerArgs, ScansCommand};

fn server_config(args: ScanServerArgs) -> anyhow::Result<ScanServerConfig> {
    let mut config = match (args.base_url, args.host) {
        (Some(base_url), _) => ScanServerConfig::new(base_url, args.username, args.password),
        (None, Some(host)) => ScanServerConfig::for_host(&host, args.username, args.password),
        (None, None) => bail!("either --host or --base-url is required"),
    };
    config.auth_mode = match args.auth {
        AuthArg::Basic => AuthMode::Basic,
        AuthArg::Json => AuthMode::Json,
    };
    config.accept_invalid_certs = !args.verify_tls;
    config.scans_path = args.scans_path;
    Ok(config)
}

async fn connect(args: ScanServerArgs) -> anyhow::Result<ScanClient> {
    let client = ScanClient::new(server_config(args)?)?;
    client
        .authenticate()
        .await
        .with_context(|| format!("Could not authenticate with {}", client.config().base_url))?;
    Ok(client)
}

pub async fn run_scans(cmd: ScansCommand) -> anyhow::Result<()> {
    match cmd {
        ScansCommand::Export {
            server,
            keyword,
            out_dir,
        } => {
            let client = connect(server).await?;
            let summary = export_scans(&client, &keyword, &out_dir).await?;
            println!(
                "{} scans matched '{keyword}', {} detailed, {} failed",
                summary.matched,
                summary.detailed,
                summary.failed.len()
            );
            println!("{}", summary.scans_file.display());
            println!("{}", summary.detailed_file.display());
            println!("{}", summary.failed_file.display());
        }
        ScansCommand::Import { server, file } => {
            let definitions = load_definitions(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let client = connect(server).await?;
            let results = import_scans(&client, &definitions).await;

            println!("{}", serde_json::to_string_pretty(&results)?);
            let failed = results.iter().filter(|r| !r.created).count();
            if failed > 0 {
                bail!("{failed} of {} scans failed to import", results.len());
            }
        }
    }
    Ok(())
}

use anyhow::Context;
use dropzone_cloud::transfer::{chunked_download, download_folder, download_to_dir, upload_file};
use dropzone_cloud::BlobConfig;

use crate::args::BlobCommand;

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_blob(cmd: BlobCommand) -> anyhow::Result<()> {
    let config = BlobConfig::from_env().context("Invalid blob configuration")?;
    let store = config.build_store().await;

    match cmd {
        BlobCommand::List { prefix } => {
            let entries = store.list(prefix.as_deref()).await?;
            print_json(&entries)?;
        }
        BlobCommand::Upload { path, name } => {
            let uploaded = upload_file(store.as_ref(), &path, name.as_deref()).await?;
            print_json(&uploaded)?;
        }
        BlobCommand::Download { name, dir } => {
            let path = download_to_dir(store.as_ref(), &name, &dir).await?;
            println!("{}", path.display());
        }
        BlobCommand::Folder { prefix } => {
            let files = download_folder(store.as_ref(), &prefix).await?;
            print_json(&files)?;
        }
        BlobCommand::Chunked { name, dir } => {
            let dir = dir.unwrap_or_else(|| config.staging_dir.clone());
            let result = chunked_download(store.as_ref(), &name, &dir, config.chunk_size).await?;
            print_json(&result)?;
        }
    }
    Ok(())
}

//! The `greyscale run` command: a local end-to-end run of every stage.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use greyscale_core::{
    Config, FileDiscovery, IdentityGenerator, LocalDeployment, Naming, ObjectLocation,
    RandomIdentity,
};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image file or directory to upload as source objects
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory to write derived images, records and the gallery page to
    #[arg(short, long)]
    pub output: PathBuf,

    /// Source bucket to upload into (defaults to the first configured one)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Source keys to remove after the uploads have settled
    #[arg(long = "remove", value_name = "KEY")]
    pub remove: Vec<String>,

    /// Seed for record identities, for reproducible runs
    #[arg(long, env = "GREYSCALE_IDENTITY_SEED")]
    pub seed: Option<u64>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    let input = expand(&args.input);
    let output = expand(&args.output);

    let bucket = match args.bucket {
        Some(bucket) => bucket,
        None => config
            .deployment
            .source_buckets
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No source bucket configured; pass --bucket"))?,
    };
    if !config.deployment.source_buckets.contains(&bucket) {
        config.deployment.source_buckets.push(bucket.clone());
    }

    let files = FileDiscovery::new(&config.deployment).discover(&input);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", input);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s), {} byte(s) total",
        files.len(),
        FileDiscovery::total_size(&files)
    );

    let identities: Arc<dyn IdentityGenerator> = match args.seed {
        Some(seed) => Arc::new(RandomIdentity::seeded(seed, config.index.identity_length)),
        None => Arc::new(RandomIdentity::new(config.index.identity_length)),
    };
    let deployment = LocalDeployment::start(&config, identities);

    for file in &files {
        let bytes = tokio::fs::read(&file.path).await?;
        let location = ObjectLocation::new(&bucket, &file.key);
        tracing::debug!("Uploading {:?} as {}", file.path, location);
        deployment
            .upload(&location, bytes, &content_type_for(&file.key))
            .await?;
    }
    deployment.settle().await;

    for key in &args.remove {
        tracing::info!("Removing {}/{}", bucket, key);
        deployment.remove(&ObjectLocation::new(&bucket, key)).await?;
    }
    deployment.settle().await;

    let summary = write_outputs(&deployment, &config, &output).await?;
    println!(
        "{} derived image(s), {} record(s), {} error(s); gallery at {}",
        summary.derived,
        summary.records,
        summary.errors,
        summary.gallery.display()
    );
    Ok(())
}

struct Summary {
    derived: usize,
    records: usize,
    errors: usize,
    gallery: PathBuf,
}

async fn write_outputs(
    deployment: &LocalDeployment,
    config: &Config,
    output: &Path,
) -> anyhow::Result<Summary> {
    let local = deployment.local();
    tokio::fs::create_dir_all(output).await?;

    let naming = Naming::new(config);
    let mut derived = 0;
    for source_bucket in &config.deployment.source_buckets {
        for location in local.blobs.list(&naming.derived_bucket(source_bucket)) {
            let Some(object) = local.blobs.object(&location) else {
                continue;
            };
            let path = output_path(output, &location);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, object.bytes).await?;
            derived += 1;
        }
    }

    let records = local.documents.items(&config.index.table);
    let records_path = output.join("records.json");
    tokio::fs::write(&records_path, serde_json::to_vec_pretty(&records)?).await?;

    let page = ObjectLocation::new(&config.gallery.bucket, &config.gallery.key);
    let gallery = output_path(output, &page);
    if let Some(object) = local.blobs.object(&page) {
        if let Some(parent) = gallery.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&gallery, object.bytes).await?;
    }

    let errors = local.topics.messages(&config.topics.errors);
    for error in &errors {
        tracing::warn!("{}", error);
    }

    Ok(Summary {
        derived,
        records: records.len(),
        errors: errors.len(),
        gallery,
    })
}

/// `output/bucket/key`, dropping any component that could escape `output`.
fn output_path(output: &Path, location: &ObjectLocation) -> PathBuf {
    let mut path = output.join(sanitize(&location.bucket));
    for part in location.key.split('/') {
        let part = sanitize(part);
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

fn sanitize(part: &str) -> String {
    match Path::new(part).components().next() {
        Some(Component::Normal(name)) if Path::new(part).components().count() == 1 => {
            name.to_string_lossy().into_owned()
        }
        _ => String::new(),
    }
}

fn content_type_for(key: &str) -> String {
    let ext = Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        "" => "application/octet-stream".to_string(),
        other => format!("image/{other}"),
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("dir/b.png"), "image/png");
        assert_eq!(content_type_for("c.tif"), "image/tiff");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_output_path_stays_inside() {
        let root = Path::new("/out");
        assert_eq!(
            output_path(root, &ObjectLocation::new("site-convert", "converted-trips/a.jpg")),
            PathBuf::from("/out/site-convert/converted-trips/a.jpg")
        );
        assert_eq!(
            output_path(root, &ObjectLocation::new("site", "../../etc/passwd")),
            PathBuf::from("/out/site/etc/passwd")
        );
    }

    #[tokio::test]
    async fn test_run_writes_outputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let img = image::DynamicImage::new_rgb8(4, 4);
        img.save(input.path().join("a.png")).unwrap();
        img.save(input.path().join("b.png")).unwrap();

        let args = RunArgs {
            input: input.path().to_path_buf(),
            output: output.path().to_path_buf(),
            bucket: Some("site".to_string()),
            remove: vec!["b.png".to_string()],
            seed: Some(7),
        };
        execute(args, Config::default()).await.unwrap();

        let derived = output.path().join("site-convert");
        assert!(derived.join("converted-a.png").exists());
        assert!(!derived.join("converted-b.png").exists());

        let records: Vec<serde_json::Value> = serde_json::from_slice(
            &std::fs::read(output.path().join("records.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["sourceKey"], "a.png");

        let page =
            std::fs::read_to_string(output.path().join("greyscale-website/index.html")).unwrap();
        assert!(page.contains("converted-a.png"));
        assert!(!page.contains("converted-b.png"));
    }
}

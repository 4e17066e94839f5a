use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fractal::server::{build_router, serve};
use fractal::{AbortSignal, ComposedApp, Composer, DirectoryResolver, Settings};
use tracing_subscriber::EnvFilter;

mod app;

#[derive(Parser)]
#[command(name = "fractal-gateway")]
#[command(version)]
#[command(about = "Serve or inspect a fractal application tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the tree and serve it over HTTP
    Serve(ServeArgs),
    /// Compose the tree and print the mount structure
    Structure(StructureArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Settings file (TOML format)
    #[arg(long, env = "FRACTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the settings
    #[arg(long)]
    bind: Option<String>,

    /// Directory of the root unit, overriding the settings
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log every discovery decision at info level
    #[arg(long)]
    verbose: bool,
}

#[derive(Parser)]
struct StructureArgs {
    #[arg(long, env = "FRACTAL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    root: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Exit with an error when any unit failed to mount
    #[arg(long)]
    strict: bool,

    #[arg(long)]
    verbose: bool,
}

fn load_settings(
    config: Option<&PathBuf>,
    root: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(config.map(PathBuf::as_path))
        .context("failed to load settings")?;
    if let Some(root) = root {
        settings.root_dir = root;
    }
    if verbose {
        settings.verbose_discovery = true;
    }
    Ok(settings)
}

/// Run the composition pass off the async runtime. Ctrl-c during the pass
/// aborts it.
async fn compose(settings: Arc<Settings>) -> anyhow::Result<ComposedApp> {
    let abort = AbortSignal::new();
    let watcher = {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, aborting composition");
                abort.raise();
            }
        })
    };

    let pass = tokio::task::spawn_blocking(move || {
        let root = DirectoryResolver::root_location_of(&settings.root_dir);
        let catalog = app::catalog(&root, settings.clone());
        Composer::new(DirectoryResolver::new(&settings.root_dir, catalog))
            .with_max_depth(settings.max_depth)
            .with_verbose(settings.verbose_discovery)
            .with_abort(abort)
            .compose(&root)
    })
    .await;
    watcher.abort();

    let composed = pass.context("composition task failed")??;
    for failure in composed.registry.failures() {
        tracing::warn!("unmounted {}", failure);
    }
    Ok(composed)
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = load_settings(args.config.as_ref(), args.root, args.verbose)?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }
    let settings = Arc::new(settings);
    tracing::info!(
        app = %settings.app_name,
        environment = %settings.environment,
        root = %settings.root_dir.display(),
        "starting gateway"
    );

    let composed = compose(settings.clone()).await?;
    tracing::info!(
        routes = composed.registry.mounted_routes().len(),
        failures = composed.registry.failures().len(),
        "application composed"
    );
    let router = build_router(composed, &settings);
    serve(router, &settings.bind_addr).await?;
    Ok(())
}

async fn run_structure(args: StructureArgs) -> anyhow::Result<()> {
    let settings = Arc::new(load_settings(args.config.as_ref(), args.root, args.verbose)?);
    let composed = compose(settings).await?;
    let report = composed.registry.report();

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    if args.strict && !report.failures.is_empty() {
        anyhow::bail!("{} unit(s) failed to mount", report.failures.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fractal=info,fractal_gateway=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Structure(args) => run_structure(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    fn demo_settings() -> Settings {
        Settings {
            root_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("app"),
            expose_structure: true,
            app_name: "Octopus App".to_string(),
            ..Settings::default()
        }
    }

    async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_demo_status_reports_capabilities() {
        let settings = Arc::new(demo_settings());
        let composed = compose(settings.clone()).await.unwrap();
        let router = build_router(composed, &settings);

        let (status, body) = get_json(router.clone(), "/conversations/messages/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Feature messages is ready!");
        assert_eq!(body["app"], "Octopus App");
        assert_eq!(
            body["capabilities"],
            serde_json::json!(["config", "membership", "routing"])
        );

        let (status, body) = get_json(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "healthy" }));

        let (status, body) = get_json(router, "/conversations/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not Found");
    }

    #[tokio::test]
    async fn test_demo_structure_endpoint() {
        let settings = Arc::new(demo_settings());
        let composed = compose(settings.clone()).await.unwrap();
        let router = build_router(composed, &settings);

        let (status, body) = get_json(router, "/_structure").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["root"], "app");
        assert_eq!(body["failures"], serde_json::json!([]));
        let locations: Vec<&str> = body["units"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["location"].as_str().unwrap())
            .collect();
        assert_eq!(
            locations,
            vec![
                "app",
                "app/bots",
                "app/conversations",
                "app/conversations/messages",
                "app/conversations/participants",
                "app/users",
            ]
        );
    }

    #[test]
    fn test_cli_parses_structure_flags() {
        let cli = Cli::try_parse_from(["fractal-gateway", "structure", "--json", "--strict"]).unwrap();
        match cli.command {
            Commands::Structure(args) => {
                assert!(args.json);
                assert!(args.strict);
                assert!(!args.verbose);
            }
            Commands::Serve(_) => panic!("expected structure command"),
        }
    }
}

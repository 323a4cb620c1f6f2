use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xrayscan::auth::{hash_password, verify_password};
use xrayscan::core::db::{NewUser, Role, ScanDb, ScanRepository, User, UserRepository};
use xrayscan::notify::LogNotifier;
use xrayscan::report::render_text_report;
use xrayscan::service::{ScanService, Upload};
use xrayscan::{ClassificationResult, DefectDetector, DetectorConfig, ImageSource};

#[derive(Parser)]
#[command(name = "xrayscan")]
#[command(about = "Score X-ray images for defects and keep a scan history")]
#[command(version)]
struct Cli {
    /// Detector configuration (TOML)
    #[arg(long, global = true, value_name = "FILE", env = "XRAYSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, default_value = "xrayscan.db", env = "XRAYSCAN_DB")]
    db: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single image without touching the database
    Analyze {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Filename hint to score instead of the file's own name
        #[arg(long)]
        filename: Option<String>,

        /// Seed for marker placement (defaults to a digest of the image)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload an image through the scan service, saving it for a signed-in user
    Submit {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Username or email
        #[arg(long)]
        user: Option<String>,

        #[arg(long, env = "XRAYSCAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Directory uploads are stored in
        #[arg(long, default_value = "uploads", env = "XRAYSCAN_UPLOADS")]
        uploads: PathBuf,
    },

    /// Create a user account
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "XRAYSCAN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create the admin account if it does not exist
    CreateAdmin {
        #[arg(long, env = "XRAYSCAN_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List a user's most recent scans
    History {
        #[arg(long)]
        user: String,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Scan counts for one user, or for everyone
    Stats {
        #[arg(long)]
        user: Option<String>,
    },

    /// List all users with their scan counts
    Users,

    /// Print the report for one of a user's scans
    Report {
        scan_id: i64,

        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "xrayscan=debug" } else { "xrayscan=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => DetectorConfig::default(),
    };
    let detector = DefectDetector::new(config);

    match args.command {
        Command::Analyze {
            image_path,
            filename,
            seed,
            json,
        } => {
            let filename = filename.or_else(|| {
                image_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            let source = ImageSource::path(&image_path);

            let result = match seed {
                Some(seed) => detector.detect_with_rng(
                    &source,
                    filename.as_deref(),
                    &mut StdRng::seed_from_u64(seed),
                ),
                None => detector.detect(&source, filename.as_deref()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, args.verbose);
            }
        }

        Command::Submit {
            image_path,
            user,
            password,
            uploads,
        } => {
            let db = ScanDb::new(&args.db).await?;
            let user = match user {
                Some(login) => Some(login_user(&db, &login, password.as_deref()).await?),
                None => None,
            };

            let bytes = tokio::fs::read(&image_path)
                .await
                .with_context(|| format!("Failed to read {:?}", image_path))?;
            let filename = image_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let service =
                ScanService::new(detector, db.clone(), uploads, Arc::new(LogNotifier)).await?;
            let response = service
                .analyze_upload(Upload { filename, bytes }, user.as_ref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            db.close().await;
        }

        Command::Register {
            username,
            email,
            password,
        } => {
            let db = ScanDb::new(&args.db).await?;
            if username.is_empty() || email.is_empty() || password.is_empty() {
                anyhow::bail!("All fields are required");
            }
            let user = db
                .add_user(&NewUser {
                    username,
                    email,
                    password_hash: hash_password(&password),
                    role: Role::User,
                })
                .await?;
            info!("Registered user {} (id {})", user.username, user.id);
            println!("Registration successful: {}", user.username);
        }

        Command::CreateAdmin { password } => {
            let db = ScanDb::new(&args.db).await?;
            let (admin, created) = db.ensure_admin(&hash_password(&password)).await?;
            if created {
                println!("Admin user created: {}", admin.username);
            } else {
                println!("Admin user already exists");
            }
        }

        Command::History { user, limit } => {
            let db = ScanDb::new(&args.db).await?;
            let user = find_user(&db, &user).await?;
            let scans = db.recent_scans(user.id, limit).await?;
            if scans.is_empty() {
                println!("No scans recorded for {}.", user.username);
            }
            for scan in scans {
                println!(
                    "#{:<5} {:<14} {:>6.2}%  defects: {}  {}",
                    scan.id,
                    scan.result.label(),
                    scan.confidence,
                    scan.defect_count,
                    scan.original_filename
                );
            }
        }

        Command::Stats { user } => {
            let db = ScanDb::new(&args.db).await?;
            let user_id = match user {
                Some(login) => Some(find_user(&db, &login).await?.id),
                None => None,
            };
            let stats = db.scan_stats(user_id).await?;
            println!("Total scans:   {}", stats.total);
            println!("Defective:     {}", stats.defective);
            println!("Non-defective: {}", stats.non_defective);

            if user_id.is_none() {
                let months = db.monthly_stats(12).await?;
                if !months.is_empty() {
                    println!("\nMonth     Total  Defective  Non-defective");
                }
                for month in months {
                    println!(
                        "{}  {:>5}  {:>9}  {:>13}",
                        month.month, month.total, month.defective, month.non_defective
                    );
                }
            }
        }

        Command::Users => {
            let db = ScanDb::new(&args.db).await?;
            for user in db.list_users_with_scan_counts().await? {
                println!(
                    "{:<5} {:<20} {:<30} {:<6} scans: {}",
                    user.id,
                    user.username,
                    user.email,
                    user.role.as_str(),
                    user.scan_count
                );
            }
        }

        Command::Report { scan_id, user } => {
            let db = ScanDb::new(&args.db).await?;
            let user = find_user(&db, &user).await?;
            let scan = db
                .get_scan(scan_id, user.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Scan not found"))?;
            print!("{}", render_text_report(&scan, &user)?);
        }
    }

    Ok(())
}

async fn find_user(db: &ScanDb, login: &str) -> anyhow::Result<User> {
    db.find_user_by_login(login)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No such user: {}", login))
}

async fn login_user(db: &ScanDb, login: &str, password: Option<&str>) -> anyhow::Result<User> {
    let password = password.ok_or_else(|| anyhow::anyhow!("Username and password are required"))?;
    match db.find_user_by_login(login).await? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => anyhow::bail!("Invalid credentials"),
    }
}

fn print_result(result: &ClassificationResult, verbose: bool) {
    println!("\n=== X-Ray Analysis Result ===");
    println!("Status:     {}", result.status.label());
    println!("Confidence: {}", result.confidence_label());

    if let Some(error) = &result.error {
        println!("Note:       {}", error);
    }

    if !result.defect_locations.is_empty() {
        println!("\nMarked regions:");
        for (i, loc) in result.defect_locations.iter().enumerate() {
            println!("  Region {} at ({}%, {}%)", i + 1, loc.x, loc.y);
        }
    }

    if verbose {
        if let Some(details) = &result.details {
            println!("\nDefect probability:  {:.4}", details.defect_probability);
            println!("Filename score:      {:.2}", details.filename_score);
            println!("Content probability: {:.2}", details.content_probability);
            if let Some(features) = &details.features {
                println!("Mean intensity:      {:.4}", features.mean_intensity);
                println!("Std intensity:       {:.4}", features.std_intensity);
                println!("Contrast:            {:.4}", features.contrast);
                println!("Edge density:        {:.4}", features.edge_density);
                println!(
                    "Gradient mean/std:   {:.2} / {:.2}",
                    features.texture.gradient_mean, features.texture.gradient_std
                );
            }
        }
    }
}

use std::path::PathBuf;

use clap::Parser;
use englearn::{
    config::Config,
    progress::{self, ChapterStatus},
    store::DocStore,
    syllabus::{Curriculum, PathName, Syllabus, chapter::ChapterId},
    utils::init_log,
    video::{self, Video},
};

/// Maintenance tool for the English learning store.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Path to the toml config file
    #[arg(short, long, env = "ENGLEARN_CONFIG", default_value = "englearn.toml")]
    config: PathBuf,
    /// Overrides the database from the config file
    #[arg(short, long, env = "ENGLEARN_DATABASE")]
    database: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    Syllabus {
        #[command(subcommand)]
        command: SyllabusCommand,
    },
    Video {
        #[command(subcommand)]
        command: VideoCommand,
    },
    /// Show one user's progress
    Progress { uid: String },
    Leaderboard {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Debug, clap::Subcommand)]
enum SyllabusCommand {
    /// List learning paths
    Paths,
    /// List the chapters of a path in order
    List { path: PathName },
    /// Merge chapters from a toml file into a path
    Import { path: PathName, file: PathBuf },
    DeleteChapter { path: PathName, chapter: ChapterId },
    DeletePath { path: PathName },
}

#[derive(Debug, clap::Subcommand)]
enum VideoCommand {
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
    Add {
        #[arg(short, long)]
        title: String,
        /// Video id or YouTube link
        #[arg(short, long)]
        youtube: String,
        #[arg(short, long)]
        category: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _guard = init_log(None).ok();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let database = args.database.unwrap_or(config.store.database);
    let store = DocStore::connect(&database, config.store.max_connections).await?;
    let curriculum = Curriculum::new(store.clone(), config.store.syllabus_cache_capacity);

    match args.command {
        Commands::Syllabus { command } => match command {
            SyllabusCommand::Paths => {
                for path in curriculum.list_paths().await? {
                    println!("{}", path);
                }
            }
            SyllabusCommand::List { path } => {
                let syllabus = curriculum.syllabus(&path).await?;
                for (id, chapter) in syllabus.iter() {
                    println!("{:<20} {:<40} {} questions", id, chapter.title, chapter.quiz.len());
                }
            }
            SyllabusCommand::Import { path, file } => {
                let content = std::fs::read_to_string(&file)?;
                let syllabus: Syllabus = toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("invalid syllabus {}: {}", file.display(), e))?;
                let count = curriculum.import(&path, syllabus).await?;
                println!("Imported {} chapters into {}", count, path);
            }
            SyllabusCommand::DeleteChapter { path, chapter } => {
                curriculum.delete_chapter(&path, &chapter).await?;
                println!("Deleted chapter {}/{}", path, chapter);
            }
            SyllabusCommand::DeletePath { path } => {
                curriculum.delete_path(&path).await?;
                println!("Deleted learning path {}", path);
            }
        },
        Commands::Video { command } => match command {
            VideoCommand::List { category } => {
                for v in video::list_videos(&store, category.as_deref()).await? {
                    println!("{:<22} {:<12} {:<14} {}", v.id, v.youtube_id, v.category, v.title);
                }
            }
            VideoCommand::Add {
                title,
                youtube,
                category,
                description,
            } => {
                let video = Video {
                    title,
                    description,
                    youtube_id: youtube,
                    category,
                };
                let entry = video::create_video(&store, video).await?;
                println!("Video created with id: {}", entry.id);
            }
            VideoCommand::Delete { id } => {
                video::delete_video(&store, &id).await?;
                println!("Deleted video {}", id);
            }
        },
        Commands::Progress { uid } => {
            let summary = progress::get_progress(&store, &uid).await?;
            println!(
                "{}: {} points, level {}, streak {}",
                summary.user_id, summary.points, summary.level, summary.daily_streak
            );
            for (path, chapters) in &summary.paths {
                let completed = chapters
                    .values()
                    .filter(|s| **s == ChapterStatus::Completed)
                    .count();
                println!("  {:<20} {} completed", path, completed);
                for (id, status) in chapters {
                    println!("    {:<20} {:?}", id, status);
                }
            }
        }
        Commands::Leaderboard { limit } => {
            for entry in progress::leaderboard(&store, limit).await? {
                println!(
                    "{:>3}. {:<30} {:>6} points  level {}",
                    entry.rank, entry.user_id, entry.points, entry.level
                );
            }
        }
    }
    Ok(())
}

//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Uploads videos to the host and registers them with the moments backend.
#[derive(Parser, Debug)]
#[command(author, version, about = "Upload videos to moments")]
pub struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Owner of the uploaded videos
    #[arg(long)]
    pub user_id: Option<String>,

    /// Title for every uploaded video (defaults to the file name)
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Register the videos as private
    #[arg(long)]
    pub private: bool,

    /// Chunk size in bytes (overrides the config file)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// List registered videos and exit
    #[arg(long)]
    pub list: bool,

    /// Video files to upload
    pub files: Vec<PathBuf>,
}

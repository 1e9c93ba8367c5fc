use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-slimming",
    about = "Batch image compression through the TinyPNG service",
    long_about = "img-slimming sends PNG and JPEG images to the TinyPNG compression service and writes \
                  the compressed copies to an output directory. The API key and the directories and \
                  prefixes you use are cached locally so repeated runs need no re-entry.",
    version,
    after_help = "EXAMPLES:\n  \
    img-slimming compress ./images ./compressed\n  \
    img-slimming compress \"a.png,b.jpg\" ./out -p min\n  \
    img-slimming compress\n  \
    img-slimming key\n  \
    img-slimming history"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Directory for the cached key and history",
        long_help = "Directory holding the cached API key and usage history. \
                     Defaults to img-slimming under the user configuration directory."
    )]
    pub storage_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Compression service base URL (default: https://api.tinify.com)"
    )]
    pub endpoint: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds (default: 60)")]
    pub timeout: Option<u64>,

    #[arg(short = 'q', long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Print per-file diagnostics")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Compress images through the remote service",
        long_about = "Compress a single image, every image directly inside a directory, or a \
                      comma-separated list of images. Only .png, .jpg and .jpeg files are sent."
    )]
    Compress {
        #[arg(
            help = "Input file, directory, or comma-separated file list",
            long_help = "A single image file, a directory (not searched recursively), \
                         or a comma-separated list of image files. When omitted, pick \
                         a previously used input or type a new one."
        )]
        input: Option<String>,

        #[arg(
            help = "Output directory path",
            long_help = "Output directory path. When omitted, pick a previously used \
                         directory or type a new one."
        )]
        output: Option<PathBuf>,

        #[arg(
            short = 'p',
            long,
            help = "Prefix for output file names",
            long_help = "Write each image as <PREFIX>_<name> instead of <name>. \
                         Offered from history when INPUT or OUTPUT is prompted for."
        )]
        prefix: Option<String>,

        #[arg(
            short = 'k',
            long,
            help = "API key to validate and use instead of the cached one"
        )]
        key: Option<String>,
    },

    #[command(about = "Validate and store an API key")]
    Key {
        #[arg(help = "API key (prompted for when omitted)")]
        key: Option<String>,
    },

    #[command(about = "Show previously used directories and prefixes")]
    History,
}

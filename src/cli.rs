use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use crate::error::{ZipError, ZipResult};
use crate::io::ObjectLocator;
use crate::zip::{DEFAULT_CONCURRENCY, DEFAULT_SLACK, ExtractorOptions};

#[derive(Parser, Debug)]
#[command(name = "zipspy")]
#[command(version)]
#[command(
    about = "Extract files from zip archives in S3 without downloading the entire archive",
    long_about = None
)]
#[command(after_help = "Examples:\n  \
  zipspy extract -b myBucket -k myKey -f plan.txt\n  \
  zipspy extract -b myBucket -k myKey -f plan.txt -o my/directory/plan.txt\n  \
  zipspy extract -b myBucket -k myKey -f plan1.txt,path/to/plan3.txt,directory/\n  \
  zipspy extract -b myBucket -k myKey -f plan1.txt -o plan1.txt -f plan2.txt -o plan2.txt\n  \
  zipspy list -l -b myBucket -k myKey")]
pub struct Cli {
    /// S3-compatible endpoint to read from with unsigned, path-style requests
    /// instead of AWS S3
    #[arg(long, global = true, env = "ZIPSPY_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Read objects from DIR/<bucket>/<key> instead of the network
    #[arg(
        long,
        global = true,
        env = "ZIPSPY_LOCAL_ROOT",
        value_name = "DIR",
        conflicts_with = "endpoint"
    )]
    pub local_root: Option<PathBuf>,

    /// More logging (-vv for even more)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one or more files from a zip archive
    Extract(ExtractArgs),
    /// List the files in a zip archive
    List(ListArgs),
}

/// Which archive to read
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Name of the bucket
    #[arg(short = 'b', long)]
    pub bucket: String,

    /// Key (object name) of the zip archive
    #[arg(short = 'k', long)]
    pub key: String,
}

impl TargetArgs {
    pub fn locator(&self) -> ObjectLocator {
        ObjectLocator::new(&self.bucket, &self.key)
    }
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Names of the files/paths to extract (e.g. plan.txt, path/to/plan.txt, directory/).
    /// Any file whose path contains a term is extracted.
    #[arg(
        short = 'f',
        long = "file",
        value_name = "TERM",
        required = true,
        num_args = 1..,
        value_delimiter = ','
    )]
    pub terms: Vec<String>,

    /// File(s) to write output to: none for stdout, one for everything,
    /// or one per search term. Repeat `-o` for several; paths are never
    /// split on commas.
    #[arg(short = 'o', long = "out", value_name = "PATH", num_args = 1..)]
    pub outputs: Vec<PathBuf>,

    /// Range requests in flight at once
    #[arg(long, env = "ZIPSPY_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Extra bytes fetched with each file to cover its local header
    #[arg(long, env = "ZIPSPY_SLACK", default_value_t = DEFAULT_SLACK)]
    pub slack: u64,
}

/// Where extracted files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destinations {
    Stdout,
    /// Everything appended to one file
    Single(PathBuf),
    /// One file per search term, in term order
    PerTerm(Vec<PathBuf>),
}

impl ExtractArgs {
    /// Search terms with stray whitespace and empty entries (`-f a, b`) removed.
    pub fn search_terms(&self) -> Vec<String> {
        self.terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Check the output count against the term count.
    pub fn destinations(&self) -> ZipResult<Destinations> {
        let terms = self.search_terms().len();
        match self.outputs.as_slice() {
            [] => Ok(Destinations::Stdout),
            [single] => Ok(Destinations::Single(single.clone())),
            many if many.len() == terms => Ok(Destinations::PerTerm(many.to_vec())),
            many => Err(ZipError::Configuration(format!(
                "must specify one output file for every search term ({} outputs for {} terms)",
                many.len(),
                terms
            ))),
        }
    }

    pub fn options(&self) -> ExtractorOptions {
        ExtractorOptions {
            slack: self.slack,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show sizes, compression ratio and timestamps
    #[arg(short = 'l', long)]
    pub long: bool,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn extract_args(args: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(["zipspy", "extract", "-b", "bucket", "-k", "key"]
            .iter()
            .chain(args))
        .unwrap();
        match cli.command {
            Command::Extract(args) => args,
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn terms_split_on_commas_and_repeat() {
        let args = extract_args(&["-f", "plan1.txt,", "plan2.txt", "-f", "dir/"]);
        assert_eq!(args.search_terms(), ["plan1.txt", "plan2.txt", "dir/"]);
        assert_eq!(args.target.locator(), ObjectLocator::new("bucket", "key"));
    }

    #[test]
    fn no_outputs_means_stdout() {
        let args = extract_args(&["-f", "a", "-f", "b"]);
        assert_eq!(args.destinations().unwrap(), Destinations::Stdout);
    }

    #[test]
    fn one_output_takes_everything() {
        let args = extract_args(&["-f", "a,b", "-o", "all.txt"]);
        assert_eq!(
            args.destinations().unwrap(),
            Destinations::Single(PathBuf::from("all.txt"))
        );
    }

    #[test]
    fn outputs_pair_with_terms() {
        let args = extract_args(&["-f", "a", "-o", "a.out", "-f", "b", "-o", "b.out"]);
        assert_eq!(
            args.destinations().unwrap(),
            Destinations::PerTerm(vec![PathBuf::from("a.out"), PathBuf::from("b.out")])
        );
    }

    #[test]
    fn mismatched_outputs_are_a_configuration_error() {
        let args = extract_args(&["-f", "a,b,c", "-o", "x", "-o", "y"]);
        assert!(matches!(
            args.destinations(),
            Err(ZipError::Configuration(_))
        ));
    }

    #[test]
    fn output_paths_keep_their_commas() {
        let args = extract_args(&["-f", "a,b", "-o", "reports/q1,q2.txt"]);
        assert_eq!(
            args.destinations().unwrap(),
            Destinations::Single(PathBuf::from("reports/q1,q2.txt"))
        );
    }

    #[test]
    fn terms_are_required() {
        assert!(Cli::try_parse_from(["zipspy", "extract", "-b", "b", "-k", "k"]).is_err());
    }

    #[test]
    fn verbosity() {
        let cli = Cli::try_parse_from(["zipspy", "-vv", "list", "-b", "b", "-k", "k"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Debug);
        let cli = Cli::try_parse_from(["zipspy", "list", "-q", "-b", "b", "-k", "k"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Error);
    }
}

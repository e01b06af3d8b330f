use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "delve")]
#[command(about = "delve - route a query to the backend that fits it, with fallback")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  delve search \"papers on diffusion models\"        Classify, then search
  delve search \"rust async\" --backend hackernews   Skip classification
  delve classify \"where is lake baikal\"            Show the routing decision
  delve multi \"crispr\" --backends pubmed,openalex  Query several backends
  delve status                                     Backends, breakers, cache

\x1b[1;36mConfiguration:\x1b[0m
  ~/.config/delve/config.toml                      Engine settings (TOML)
  TAVILY_API_KEY, EXA_API_KEY, WOLFRAM_APP_ID      Enable gated backends
  ANTHROPIC_API_KEY                                Model classification")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Verbose output (-v: core debug logs, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a query and search the chosen backend, falling back on failure
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  delve search \"papers on transformer attention\"
  delve search \"monet water lilies\" --limit 5
  delve search \"tokio runtime\" --backend github --exclude-domain gist.github.com")]
    Search {
        /// The search query
        query: String,
        /// Start at this backend instead of classifying
        #[arg(short, long)]
        backend: Option<String>,
        /// Maximum number of results
        #[arg(short, long, default_value_t = delve_core::search::DEFAULT_MAX_RESULTS)]
        limit: usize,
        /// Only keep results from these domains (repeatable)
        #[arg(long = "include-domain", value_name = "DOMAIN")]
        include_domains: Vec<String>,
        /// Drop results from these domains (repeatable)
        #[arg(long = "exclude-domain", value_name = "DOMAIN")]
        exclude_domains: Vec<String>,
    },

    /// Query several backends at once, without fallback
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  delve multi \"attention is all you need\" --backends semantic_scholar,openalex")]
    Multi {
        /// The search query
        query: String,
        /// Comma-separated backend ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        backends: Vec<String>,
        /// Maximum number of results per backend
        #[arg(short, long, default_value_t = delve_core::search::DEFAULT_MAX_RESULTS)]
        limit: usize,
    },

    /// Show how a query would be routed
    Classify {
        /// The query to classify
        query: String,
    },

    /// Show backend availability, circuit breakers and cache statistics
    Status,

    /// List the classification rules in match order
    Rules,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors and tables
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::parse_from([
            "delve",
            "search",
            "rust",
            "--backend",
            "github",
            "--include-domain",
            "github.com",
            "--include-domain",
            "docs.rs",
            "--output",
            "json",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Search {
                query,
                backend,
                limit,
                include_domains,
                ..
            } => {
                assert_eq!(query, "rust");
                assert_eq!(backend.as_deref(), Some("github"));
                assert_eq!(limit, 10);
                assert_eq!(include_domains, vec!["github.com", "docs.rs"]);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_multi_backends() {
        let cli = Cli::parse_from(["delve", "multi", "q", "--backends", "pubmed,openalex", "-v"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Multi { backends, .. } => assert_eq!(backends, vec!["pubmed", "openalex"]),
            _ => panic!("expected multi"),
        }
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tix_entity::Status;

#[derive(Parser)]
#[command(name = "tix", about = "Distributed ticket tracking on signed operation logs", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository root
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    pub repo: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a tix repository
    Init(InitArgs),
    /// Manage identities
    User(UserArgs),
    /// Open a new ticket
    New(NewArgs),
    /// List tickets
    Ls(LsArgs),
    /// Show a ticket
    Show(ShowArgs),
    /// Add a comment to a ticket
    Comment(CommentArgs),
    /// Move a ticket to another status
    Status(StatusArgs),
    /// Add or remove labels
    Label(LabelArgs),
    /// Assign a ticket
    Assign(AssignArgs),
    /// Manage the change control board of a ticket
    Ccb(CcbArgs),
    /// Manage remotes
    Remote(RemoteArgs),
    /// Fetch and merge from a remote
    Pull(SyncArgs),
    /// Push to a remote
    Push(SyncArgs),
    /// Remove a ticket, locally or on a remote too
    Rm(RmArgs),
    /// Edit the shared tracker configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create an identity, and make it the user if none is set
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        login: String,
    },
    /// List identities
    Ls,
}

#[derive(Args)]
pub struct NewArgs {
    #[arg(short, long)]
    pub title: String,
    #[arg(short, long, default_value = "")]
    pub message: String,
    #[arg(short, long, default_value = "workflow:eng")]
    pub workflow: String,
    #[arg(short, long)]
    pub repo: Option<String>,
    #[arg(long)]
    pub impact: Vec<String>,
    #[arg(long)]
    pub checklist: Vec<String>,
    /// `<status>:<user>`, repeatable
    #[arg(long)]
    pub ccb: Vec<String>,
    #[arg(short, long)]
    pub assignee: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SortBy {
    Id,
    Creation,
    Edit,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(short, long)]
    pub status: Vec<Status>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub ccb: Option<String>,
    #[arg(long)]
    pub ccb_pending: Option<String>,
    #[arg(long)]
    pub actor: Option<String>,
    #[arg(long)]
    pub participant: Option<String>,
    #[arg(short, long)]
    pub label: Vec<String>,
    #[arg(long)]
    pub no_label: Vec<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, value_enum, default_value = "edit")]
    pub sort: SortBy,
    #[arg(long, value_enum, default_value = "desc")]
    pub direction: SortDirection,
}

#[derive(Args)]
pub struct ShowArgs {
    pub ticket: String,
}

#[derive(Args)]
pub struct CommentArgs {
    pub ticket: String,
    #[arg(short, long)]
    pub message: String,
}

#[derive(Args)]
pub struct StatusArgs {
    pub ticket: String,
    pub status: Status,
    /// Skip workflow checks
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub action: LabelAction,
}

#[derive(Subcommand)]
pub enum LabelAction {
    Add {
        ticket: String,
        #[arg(required = true)]
        labels: Vec<String>,
        #[arg(long)]
        allow_deprecated: bool,
    },
    Rm {
        ticket: String,
        #[arg(required = true)]
        labels: Vec<String>,
    },
}

#[derive(Args)]
pub struct AssignArgs {
    pub ticket: String,
    pub user: String,
}

#[derive(Args)]
pub struct CcbArgs {
    #[command(subcommand)]
    pub action: CcbAction,
}

#[derive(Subcommand)]
pub enum CcbAction {
    Add { ticket: String, user: String, status: Status },
    Rm { ticket: String, user: String, status: Status },
    Approve { ticket: String, status: Status },
    Block { ticket: String, status: Status },
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: Option<RemoteAction>,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    Add { name: String, path: PathBuf },
}

#[derive(Args)]
pub struct SyncArgs {
    #[arg(default_value = "origin")]
    pub remote: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub ticket: String,
    /// Also delete it on this remote
    #[arg(long)]
    pub remote: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Register a new label
    Label { label: String },
    /// List every label a ticket may carry
    Labels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["tix", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(InitArgs { path: None })));
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn parse_new() {
        let cli = Cli::try_parse_from([
            "tix", "new", "-t", "Crash", "-r", "repo:core", "--ccb", "vetted:ann", "--impact",
            "impact:docs",
        ])
        .unwrap();
        if let Command::New(args) = cli.command {
            assert_eq!(args.title, "Crash");
            assert_eq!(args.workflow, "workflow:eng");
            assert_eq!(args.repo, Some("repo:core".into()));
            assert_eq!(args.ccb, vec!["vetted:ann"]);
            assert_eq!(args.impact, vec!["impact:docs"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_ls_filters() {
        let cli = Cli::try_parse_from([
            "tix", "ls", "-s", "proposed", "-s", "InProgress", "--assignee", "bob", "--sort",
            "creation", "--direction", "asc",
        ])
        .unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.status, vec![Status::Proposed, Status::InProgress]);
            assert_eq!(args.assignee, Some("bob".into()));
            assert!(matches!(args.sort, SortBy::Creation));
            assert!(matches!(args.direction, SortDirection::Asc));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_status() {
        let cli = Cli::try_parse_from(["tix", "status", "abc", "vetted", "--force"]).unwrap();
        if let Command::Status(args) = cli.command {
            assert_eq!(args.status, Status::Vetted);
            assert!(args.force);
        } else {
            panic!("wrong command");
        }
        assert!(Cli::try_parse_from(["tix", "status", "abc", "nowhere"]).is_err());
    }

    #[test]
    fn parse_label_needs_labels() {
        assert!(Cli::try_parse_from(["tix", "label", "add", "abc"]).is_err());
        let cli = Cli::try_parse_from(["tix", "label", "rm", "abc", "repo:core"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Label(LabelArgs { action: LabelAction::Rm { .. } })
        ));
    }

    #[test]
    fn parse_ccb() {
        let cli = Cli::try_parse_from(["tix", "ccb", "approve", "abc", "vetted"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Ccb(CcbArgs { action: CcbAction::Approve { status: Status::Vetted, .. } })
        ));
    }

    #[test]
    fn parse_sync_defaults_to_origin() {
        let cli = Cli::try_parse_from(["tix", "pull"]).unwrap();
        if let Command::Pull(args) = cli.command {
            assert_eq!(args.remote, "origin");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_rm_remote() {
        let cli = Cli::try_parse_from(["tix", "rm", "abc", "--remote", "origin"]).unwrap();
        if let Command::Rm(args) = cli.command {
            assert_eq!(args.ticket, "abc");
            assert_eq!(args.remote, Some("origin".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["tix", "-v", "-C", "/tmp/x", "ls"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.repo, PathBuf::from("/tmp/x"));
    }
}

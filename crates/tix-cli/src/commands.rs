use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use tix_cache::{BugCache, Direction, Filter, NewBugOpts, OrderBy, Query, RepoCache};
use tix_config::Label;
use tix_entity::{Snapshot, Status};
use tix_repo::Repository;
use tix_types::EntityId;
use tracing::warn;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let root = cli.repo.as_path();
    match cli.command {
        Command::Init(args) => cmd_init(args, root),
        Command::Remote(args) => cmd_remote(args, root),
        Command::User(args) => with_cache(root, |c| cmd_user(c, args)),
        Command::New(args) => with_cache(root, |c| cmd_new(c, args)),
        Command::Ls(args) => with_cache(root, |c| cmd_ls(c, args)),
        Command::Show(args) => with_cache(root, |c| cmd_show(c, args)),
        Command::Comment(args) => with_cache(root, |c| cmd_comment(c, args)),
        Command::Status(args) => with_cache(root, |c| cmd_status(c, args)),
        Command::Label(args) => with_cache(root, |c| cmd_label(c, args)),
        Command::Assign(args) => with_cache(root, |c| cmd_assign(c, args)),
        Command::Ccb(args) => with_cache(root, |c| cmd_ccb(c, args)),
        Command::Pull(args) => with_cache(root, |c| cmd_pull(c, args)),
        Command::Push(args) => with_cache(root, |c| cmd_push(c, args)),
        Command::Rm(args) => with_cache(root, |c| cmd_rm(c, args)),
        Command::Config(args) => with_cache(root, |c| cmd_config(c, args)),
    }
}

/// Run `f` against the opened cache, then close it. The command's own
/// error wins over a failure to close.
fn with_cache(
    root: &Path,
    f: impl FnOnce(&RepoCache) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let cache = open(root)?;
    let result = f(&cache);
    let closed = cache.close();
    if let (Err(_), Err(e)) = (&result, &closed) {
        warn!(error = %e, "failed to close the cache");
    }
    result?;
    Ok(closed?)
}

fn open(root: &Path) -> anyhow::Result<RepoCache> {
    let repo = Repository::open(root)
        .with_context(|| format!("opening repository at {}", root.display()))?;
    Ok(RepoCache::open(Arc::new(repo))?)
}

fn resolve_user(cache: &RepoCache, query: &str) -> anyhow::Result<EntityId> {
    Ok(cache.resolve_identity_excerpt_matcher(|i| i.matches(query))?.id)
}

fn name_of(cache: &RepoCache, id: EntityId) -> String {
    cache
        .resolve_identity_excerpt(id)
        .map(|i| i.display_name())
        .unwrap_or_else(|_| id.human())
}

fn format_time(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| unix.to_string())
}

fn done(bug: &BugCache, what: &str) -> anyhow::Result<()> {
    bug.commit_as_needed()?;
    println!("{} {} {}", "✓".green().bold(), what, bug.id().human().yellow());
    Ok(())
}

fn cmd_init(args: InitArgs, root: &Path) -> anyhow::Result<()> {
    let path = args.path.as_deref().unwrap_or(root);
    Repository::init(path)?;
    println!("{} Initialized tix repository in {}", "✓".green().bold(), path.display().to_string().bold());
    Ok(())
}

fn cmd_remote(args: RemoteArgs, root: &Path) -> anyhow::Result<()> {
    let repo = Repository::open(root)?;
    match args.action {
        Some(RemoteAction::Add { name, path }) => {
            repo.add_remote_path(&name, &path)?;
            println!("Added remote {} → {}", name.bold(), path.display().to_string().blue());
        }
        None => {
            let remotes = repo.config().remotes;
            if remotes.is_empty() {
                println!("No remotes configured.");
            }
            for (name, path) in remotes {
                println!("{}\t{}", name.bold(), path.display());
            }
        }
    }
    Ok(())
}

fn cmd_user(cache: &RepoCache, args: UserArgs) -> anyhow::Result<()> {
    match args.action {
        UserAction::Create { name, email, login } => {
            let identity = cache.new_identity(&name, &email, &login)?;
            let id = identity.id();
            println!("{} Created identity {}", "✓".green().bold(), id.human().yellow());
            if cache.user_identity_excerpt().is_err() {
                cache.set_user_identity(id)?;
                println!("  Set as the user of this repository");
            }
        }
        UserAction::Ls => {
            let user = cache.user_identity_excerpt().ok().map(|u| u.id);
            for id in cache.all_identity_ids() {
                let excerpt = cache.resolve_identity_excerpt(id)?;
                let marker = if Some(id) == user { "*" } else { " " };
                println!("{marker} {} {}", id.human().yellow(), excerpt.display_name());
            }
        }
    }
    Ok(())
}

fn cmd_new(cache: &RepoCache, args: NewArgs) -> anyhow::Result<()> {
    let mut opts = NewBugOpts::new(args.title, args.message, Label::new(args.workflow));
    opts.repo = args.repo.map(Label::new);
    opts.impact = args.impact.into_iter().map(Label::new).collect();
    opts.checklists = args.checklist.into_iter().map(Label::new).collect();
    for entry in &args.ccb {
        let (status, user) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("expected <status>:<user>, got {entry}"))?;
        let status: Status = status.parse()?;
        let user = resolve_user(cache, user)?;
        opts.ccb_members.entry(status).or_default().push(user);
    }
    opts.assignee = args
        .assignee
        .as_deref()
        .map(|a| resolve_user(cache, a))
        .transpose()?;

    let bug = cache.new_bug(opts)?;
    println!("{} Created ticket {}", "✓".green().bold(), bug.id().human().yellow());
    Ok(())
}

fn cmd_ls(cache: &RepoCache, args: LsArgs) -> anyhow::Result<()> {
    let mut filters = Vec::new();
    if !args.status.is_empty() {
        filters.push(Filter::Status(args.status));
    }
    let matchers: [(Option<String>, fn(String) -> Filter); 7] = [
        (args.author, Filter::Author),
        (args.assignee, Filter::Assignee),
        (args.ccb, Filter::Ccb),
        (args.ccb_pending, Filter::CcbPending),
        (args.actor, Filter::Actor),
        (args.participant, Filter::Participant),
        (args.title, Filter::Title),
    ];
    for (value, filter) in matchers {
        if let Some(value) = value {
            filters.push(filter(value));
        }
    }
    filters.extend(args.label.into_iter().map(|l| Filter::Label(Label::new(l))));
    filters.extend(
        args.no_label
            .into_iter()
            .map(|l| Filter::not(Filter::Label(Label::new(l)))),
    );

    let order_by = match args.sort {
        SortBy::Id => OrderBy::Id,
        SortBy::Creation => OrderBy::Creation,
        SortBy::Edit => OrderBy::Edit,
    };
    let direction = match args.direction {
        SortDirection::Asc => Direction::Ascending,
        SortDirection::Desc => Direction::Descending,
    };
    let query = Query {
        filter: (!filters.is_empty()).then_some(Filter::All(filters)),
        order_by,
        direction,
    };

    for id in cache.query_bugs(&query) {
        let bug = cache.resolve_bug_excerpt(id)?;
        let labels: Vec<&str> = bug.labels.iter().map(Label::as_str).collect();
        println!(
            "{} {:<10} {} {}",
            id.human().yellow(),
            bug.status.to_string().cyan(),
            bug.title,
            labels.join(" ").dimmed()
        );
    }
    Ok(())
}

fn cmd_show(cache: &RepoCache, args: ShowArgs) -> anyhow::Result<()> {
    let bug = cache.resolve_bug_prefix(&args.ticket)?;
    print_snapshot(cache, &bug.snapshot());
    Ok(())
}

fn print_snapshot(cache: &RepoCache, snap: &Snapshot) {
    println!("{} {}", snap.id.human().yellow(), snap.title.bold());
    println!(
        "{} opened this ticket {}",
        name_of(cache, snap.author),
        format_time(snap.create_time).dimmed()
    );
    println!("status: {}", snap.status.to_string().cyan());
    if let Some(assignee) = snap.assignee {
        println!("assignee: {}", name_of(cache, assignee));
    }
    if !snap.labels.is_empty() {
        let labels: Vec<&str> = snap.labels.iter().map(Label::as_str).collect();
        println!("labels: {}", labels.join(", "));
    }
    for ccb in &snap.ccb {
        println!("ccb: {} for {} ({})", name_of(cache, ccb.user), ccb.status, ccb.state);
    }
    for (label, state) in snap.checklist_compound_states() {
        println!("checklist: {label} [{state}]");
    }
    for (n, comment) in snap.comments.iter().enumerate() {
        let edited = if comment.edited { " (edited)" } else { "" };
        println!(
            "\n{} {} {}{}",
            format!("#{n}").bold(),
            name_of(cache, comment.author),
            format_time(comment.unix_time).dimmed(),
            edited
        );
        println!("{}", comment.message);
    }
}

fn cmd_comment(cache: &RepoCache, args: CommentArgs) -> anyhow::Result<()> {
    let bug = cache.resolve_bug_prefix(&args.ticket)?;
    bug.add_comment(&args.message)?;
    done(&bug, "Commented on")
}

fn cmd_status(cache: &RepoCache, args: StatusArgs) -> anyhow::Result<()> {
    let bug = cache.resolve_bug_prefix(&args.ticket)?;
    if args.force {
        bug.force_set_status(args.status)?;
    } else {
        bug.set_status(args.status)?;
    }
    done(&bug, &format!("Set {} on", args.status))
}

fn cmd_label(cache: &RepoCache, args: LabelArgs) -> anyhow::Result<()> {
    let (ticket, add, remove, allow_deprecated) = match args.action {
        LabelAction::Add { ticket, labels, allow_deprecated } => {
            (ticket, labels, Vec::new(), allow_deprecated)
        }
        LabelAction::Rm { ticket, labels } => (ticket, Vec::new(), labels, false),
    };
    let add: Vec<Label> = add.into_iter().map(Label::new).collect();
    let remove: Vec<Label> = remove.into_iter().map(Label::new).collect();

    let bug = cache.resolve_bug_prefix(&ticket)?;
    let results = bug.change_labels(&add, &remove, allow_deprecated)?;
    for result in &results {
        if result.is_applied() {
            println!("  {}", result.to_string().green());
        } else {
            println!("  {}", result.to_string().red());
        }
    }
    if !results.iter().any(|r| r.is_applied()) {
        bail!("no label changed");
    }
    done(&bug, "Labelled")
}

fn cmd_assign(cache: &RepoCache, args: AssignArgs) -> anyhow::Result<()> {
    let user = resolve_user(cache, &args.user)?;
    let bug = cache.resolve_bug_prefix(&args.ticket)?;
    bug.set_assignee(user)?;
    done(&bug, "Assigned")
}

fn cmd_ccb(cache: &RepoCache, args: CcbArgs) -> anyhow::Result<()> {
    match args.action {
        CcbAction::Add { ticket, user, status } => {
            let user = resolve_user(cache, &user)?;
            let bug = cache.resolve_bug_prefix(&ticket)?;
            bug.ccb_add(user, status)?;
            done(&bug, "Added a CCB member to")
        }
        CcbAction::Rm { ticket, user, status } => {
            let user = resolve_user(cache, &user)?;
            let bug = cache.resolve_bug_prefix(&ticket)?;
            bug.ccb_rm(user, status)?;
            done(&bug, "Removed a CCB member from")
        }
        CcbAction::Approve { ticket, status } => {
            let bug = cache.resolve_bug_prefix(&ticket)?;
            bug.ccb_approve(status)?;
            done(&bug, "Approved")
        }
        CcbAction::Block { ticket, status } => {
            let bug = cache.resolve_bug_prefix(&ticket)?;
            bug.ccb_block(status)?;
            done(&bug, "Blocked")
        }
    }
}

fn cmd_pull(cache: &RepoCache, args: SyncArgs) -> anyhow::Result<()> {
    let result = cache.pull(&args.remote)?;
    println!(
        "Pulled from {}: {} new, {} updated, {} unchanged",
        args.remote.bold(),
        result.bugs.new.len().to_string().green(),
        result.bugs.updated.len().to_string().green(),
        result.bugs.unchanged
    );
    for id in &result.bugs.new {
        println!("  {} {}", "new".green(), id.human().yellow());
    }
    for id in &result.bugs.updated {
        println!("  {} {}", "updated".cyan(), id.human().yellow());
    }
    for update in &result.configs {
        println!("  config {update:?}");
    }
    for failure in &result.failures {
        eprintln!("  {}", failure.red());
    }
    result.into_result()?;
    Ok(())
}

fn cmd_push(cache: &RepoCache, args: SyncArgs) -> anyhow::Result<()> {
    let result = cache.push(&args.remote)?;
    for rejected in &result.rejected {
        eprintln!("  {} {} ({})", "rejected".red(), rejected.name, rejected.reason);
    }
    let result = result.into_result()?;
    println!(
        "Pushed to {}: {} refs, {} objects",
        args.remote.bold(),
        result.refs_updated.len().to_string().green(),
        result.objects_sent
    );
    Ok(())
}

fn cmd_rm(cache: &RepoCache, args: RmArgs) -> anyhow::Result<()> {
    let id = match &args.remote {
        Some(remote) => cache.remove_bug_remote(&args.ticket, remote)?,
        None => cache.remove_bug(&args.ticket)?,
    };
    println!("{} Removed ticket {}", "✓".green().bold(), id.human().yellow());
    Ok(())
}

fn cmd_config(cache: &RepoCache, args: ConfigArgs) -> anyhow::Result<()> {
    match args.action {
        ConfigAction::Label { label } => {
            cache.add_label(Label::new(label.as_str()))?;
            println!("{} Added label {}", "✓".green().bold(), label.bold());
        }
        ConfigAction::Labels => {
            for label in cache.valid_labels() {
                println!("{label}");
            }
        }
    }
    Ok(())
}

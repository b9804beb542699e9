use std::path::PathBuf;

use clap::Parser;
use khidma_cli::cli_args::{
    Cli, Command, FormatArg, NoteCommand, NoteOwner, ReportCommand, RetreatCommand, RoleArg,
    ServantCommand, ServanteeCommand, parse_date,
};
use khidma_core::models::{NoteTarget, Role};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("khidma").chain(args.iter().copied()))
        .unwrap_or_else(|err| panic!("failed to parse {args:?}: {err}"))
}

#[test]
fn global_flags_are_accepted_after_subcommands() {
    let cli = parse(&["dashboard", "--api-url", "http://10.0.0.5:3000", "-v"]);
    assert_eq!(cli.api_url.as_deref(), Some("http://10.0.0.5:3000"));
    assert!(cli.verbose);
    assert!(matches!(cli.command, Command::Dashboard));
}

#[test]
fn servantee_list_defaults_to_first_page() {
    let cli = parse(&["servantees", "list", "--search", "Mina"]);
    let Command::Servantees(ServanteeCommand::List(args)) = cli.command else {
        panic!("expected servantees list");
    };
    assert_eq!(args.page, 1);
    assert_eq!(args.limit, None);
    assert_eq!(args.search.as_deref(), Some("Mina"));
}

#[test]
fn page_zero_is_rejected() {
    assert!(Cli::try_parse_from(["khidma", "retreats", "list", "--page", "0"]).is_err());
    assert!(Cli::try_parse_from(["khidma", "servants", "list", "--limit", "500"]).is_err());
}

#[test]
fn servantee_edit_only_sends_given_fields() {
    let cli = parse(&["servantees", "edit", "s1", "--phone", "0100"]);
    let Command::Servantees(ServanteeCommand::Edit(args)) = cli.command else {
        panic!("expected servantees edit");
    };
    let input = args.to_input();
    assert_eq!(input.name, None);
    assert_eq!(input.phone.as_deref(), Some("0100"));
}

#[test]
fn servantee_add_requires_a_name() {
    assert!(Cli::try_parse_from(["khidma", "servantees", "add"]).is_err());
    let cli = parse(&["servantees", "create", "Mina", "--church", "St. Mark"]);
    let Command::Servantees(ServanteeCommand::Add(args)) = cli.command else {
        panic!("expected servantees add");
    };
    assert_eq!(args.to_input().name.as_deref(), Some("Mina"));
}

#[test]
fn retreat_dates_accept_calendar_days() {
    let cli = parse(&[
        "retreats",
        "add",
        "Winter",
        "--start",
        "2025-01-10",
        "--end",
        "2025-01-12T18:00:00+02:00",
    ]);
    let Command::Retreats(RetreatCommand::Add(args)) = cli.command else {
        panic!("expected retreats add");
    };
    assert_eq!(
        args.start.map(|d| d.to_rfc3339()),
        Some("2025-01-10T00:00:00+00:00".to_string())
    );
    assert_eq!(
        args.end.map(|d| d.to_rfc3339()),
        Some("2025-01-12T16:00:00+00:00".to_string())
    );
    assert!(parse_date("next friday").is_err());
}

#[test]
fn attendance_commands_take_retreat_then_servantee() {
    let cli = parse(&["retreats", "attend", "r1", "s9"]);
    let Command::Retreats(RetreatCommand::Attend { retreat, servantee }) = cli.command else {
        panic!("expected retreats attend");
    };
    assert_eq!((retreat.as_str(), servantee.as_str()), ("r1", "s9"));
}

#[test]
fn servant_admin_flag_sets_role() {
    let cli = parse(&["servants", "add", "Fady", "fady@example.com", "--admin"]);
    let Command::Servants(ServantCommand::Add(args)) = cli.command else {
        panic!("expected servants add");
    };
    assert_eq!(args.role(), Role::Admin);
    assert_eq!(args.password, None);
}

#[test]
fn servant_edit_prompts_for_a_bare_password_flag() {
    let cli = parse(&["servants", "edit", "u1", "--role", "admin", "--password"]);
    let Command::Servants(ServantCommand::Edit(args)) = cli.command else {
        panic!("expected servants edit");
    };
    assert_eq!(args.role, Some(RoleArg::Admin));
    assert_eq!(args.password, Some(None));
    let changes = args.to_update();
    assert_eq!(changes.role, Some(Role::Admin));
    assert_eq!(changes.password, None);
    assert_eq!(changes.name, None);

    let cli = parse(&["servants", "update", "u1", "--email", "new@example.com"]);
    let Command::Servants(ServantCommand::Edit(args)) = cli.command else {
        panic!("expected servants edit");
    };
    assert_eq!(args.to_update().email.as_deref(), Some("new@example.com"));
    let unknown_role = ["khidma", "servants", "edit", "u1", "--role", "owner"];
    assert!(Cli::try_parse_from(unknown_role).is_err());
}

#[test]
fn retreat_edit_only_sends_given_fields() {
    let cli = parse(&[
        "retreats",
        "edit",
        "r1",
        "--location",
        "Anba Bishoy",
        "--end",
        "2025-02-01",
    ]);
    let Command::Retreats(RetreatCommand::Edit(args)) = cli.command else {
        panic!("expected retreats edit");
    };
    let input = args.to_input();
    assert_eq!(input.name, None);
    assert_eq!(input.start_date, None);
    assert_eq!(input.location.as_deref(), Some("Anba Bishoy"));
    assert_eq!(
        input.end_date.map(|d| d.to_rfc3339()),
        Some("2025-02-01T00:00:00+00:00".to_string())
    );
}

#[test]
fn servantee_history_takes_an_id() {
    let cli = parse(&["servantees", "history", "s1"]);
    assert!(matches!(
        cli.command,
        Command::Servantees(ServanteeCommand::History { ref id }) if id == "s1"
    ));
    assert!(Cli::try_parse_from(["khidma", "servantees", "history"]).is_err());
}

#[test]
fn notes_name_their_owner_kind() {
    let cli = parse(&["notes", "add", "retreat", "r1", "Bring blankets"]);
    let Command::Notes(NoteCommand::Add { owner, id, content }) = cli.command else {
        panic!("expected notes add");
    };
    assert_eq!(owner, NoteOwner::Retreat);
    assert_eq!(NoteTarget::from(owner), NoteTarget::Retreat);
    assert_eq!((id.as_str(), content.as_str()), ("r1", "Bring blankets"));

    assert!(Cli::try_parse_from(["khidma", "notes", "list", "user", "u1"]).is_err());
}

#[test]
fn search_requires_both_ends_of_the_range() {
    assert!(Cli::try_parse_from(["khidma", "search", "--from", "r1"]).is_err());
    let cli = parse(&["search", "--from", "r1", "--to", "r3", "--not-attended"]);
    let Command::Search(args) = cli.command else {
        panic!("expected search");
    };
    assert!(args.not_attended);
}

#[test]
fn report_output_directory_is_optional() {
    let cli = parse(&["report", "attendees", "r1"]);
    let Command::Report(ReportCommand::Attendees(args)) = cli.command else {
        panic!("expected attendees report");
    };
    assert_eq!(args.format, FormatArg::Text);
    assert_eq!(args.out, None);

    let cli = parse(&["report", "missing", "r1", "--format", "json", "--out"]);
    let Command::Report(ReportCommand::Missing(args)) = cli.command else {
        panic!("expected missing report");
    };
    assert_eq!(args.format, FormatArg::Json);
    assert_eq!(args.out, Some(None));

    let cli = parse(&["report", "missing", "r1", "--out", "/tmp/reports"]);
    let Command::Report(ReportCommand::Missing(args)) = cli.command else {
        panic!("expected missing report");
    };
    assert_eq!(args.out, Some(Some(PathBuf::from("/tmp/reports"))));
}

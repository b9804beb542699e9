use chrono::{DateTime, Utc};
use khidma_core::attendance::{self, AttendanceFilter};
use khidma_core::auth;
use khidma_core::models::{Page, Retreat, RetreatInput, Servant, ServantInput, Servantee};
use khidma_core::resources::{ListQuery, notes, retreats, servantees, servants};
use khidma_core::{DashboardStats, ReportError, ReportFormat, RetreatReport};
use rpassword::prompt_password;

use crate::cli_args::{
    ListArgs, LoginArgs, NoteCommand, ReportArgs, ReportCommand, RetreatCommand, SearchArgs,
    ServantCommand, ServanteeCommand,
};
use crate::session::Workspace;

const NO_VALUE: &str = "-";

fn err_string(err: impl std::fmt::Display) -> String {
    err.to_string()
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(NO_VALUE)
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NO_VALUE.to_string())
}

fn list_query(args: &ListArgs, default_limit: u32) -> ListQuery {
    let query = ListQuery::page(args.page, args.limit.unwrap_or(default_limit));
    match &args.search {
        Some(term) => query.with_search(term.clone()),
        None => query,
    }
}

fn print_page_footer<T>(page: &Page<T>, query: &ListQuery) {
    match (page.pages(), page.total()) {
        (Some(pages), Some(total)) => println!("\nPage {} of {} ({total} total)", query.page, pages),
        (Some(pages), None) => println!("\nPage {} of {}", query.page, pages),
        _ => println!("\n{} shown", page.items().len()),
    }
    if page.has_more(query.page) {
        println!("Next: --page {}", query.page + 1);
    }
}

fn print_servantees<'a>(rows: impl IntoIterator<Item = &'a Servantee>) {
    println!("{:<26} {:<28} {:<16} {}", "ID", "Name", "Phone", "Church");
    for s in rows {
        println!(
            "{:<26} {:<28} {:<16} {}",
            s.id,
            s.name,
            or_dash(s.phone.as_deref()),
            or_dash(s.church.as_deref())
        );
    }
}

fn print_retreats(rows: &[Retreat]) {
    println!(
        "{:<26} {:<28} {:<10} {:<10} {:>9}",
        "ID", "Name", "Start", "End", "Attendees"
    );
    for r in rows {
        println!(
            "{:<26} {:<28} {:<10} {:<10} {:>9}",
            r.id,
            r.name,
            format_date(r.start_date),
            format_date(r.end_date),
            r.attendees.len()
        );
    }
}

fn print_servants(rows: &[Servant]) {
    println!("{:<26} {:<28} {:<32} {}", "ID", "Name", "Email", "Role");
    for s in rows {
        println!("{:<26} {:<28} {:<32} {}", s.id, s.name, s.email, s.role.label());
    }
}

fn read_password(provided: Option<String>, prompt: &str) -> Result<String, String> {
    match provided {
        Some(value) => Ok(value),
        None => prompt_password(prompt).map_err(|err| format!("Failed to read password: {err}")),
    }
}

pub(crate) async fn login(ws: &Workspace, args: LoginArgs) -> Result<(), String> {
    let password = read_password(args.password, "Password: ")?;
    let claims = auth::login(&ws.client, &args.email, &password)
        .await
        .map_err(|err| format!("Login failed: {err}"))?;
    let role = if claims.is_admin() { "admin" } else { "servant" };
    println!("Logged in as {} ({role}).", claims.email);
    if !claims.is_admin() {
        eprintln!("Warning: administrative commands require the Admin role.");
    }
    Ok(())
}

pub(crate) async fn logout(ws: &Workspace) -> Result<(), String> {
    auth::logout(&ws.client).await;
    println!("Logged out.");
    Ok(())
}

pub(crate) fn whoami(ws: &Workspace) -> Result<(), String> {
    if !ws.is_signed_in() {
        println!("Not logged in.");
        return Ok(());
    }
    match auth::current_claims(&ws.client) {
        Some(claims) => {
            println!("{}", claims.name.as_deref().unwrap_or(&claims.email));
            println!("  email: {}", claims.email);
            println!("  admin: {}", if claims.is_admin() { "yes" } else { "no" });
            if let Some(expires) = claims.expires_at() {
                println!("  token expires: {}", expires.to_rfc3339());
            }
        }
        None => println!("Logged in (cookie session; no user details available)."),
    }
    Ok(())
}

pub(crate) async fn servantee_command(
    ws: &Workspace,
    command: ServanteeCommand,
) -> Result<(), String> {
    let client = &ws.client;
    match command {
        ServanteeCommand::List(args) => {
            let query = list_query(&args, ws.config.listing.page_size);
            let page = servantees::list(client, &query).await.map_err(err_string)?;
            print_servantees(page.items());
            print_page_footer(&page, &query);
        }
        ServanteeCommand::Show { id } => {
            let s = servantees::get(client, &id).await.map_err(err_string)?;
            println!("{} ({})", s.name, s.id);
            println!("  phone:     {}", or_dash(s.phone.as_deref()));
            println!("  church:    {}", or_dash(s.church.as_deref()));
            println!("  education: {}", or_dash(s.education.as_deref()));
            println!("  year:      {}", or_dash(s.year.as_deref()));
            println!("  added:     {}", format_date(s.created_at));
            let history = retreats::for_servantee(client, &s.id)
                .await
                .map_err(err_string)?;
            println!("  retreats:  {}", history.len());
            match attendance::latest(&history) {
                Some(last) => println!(
                    "  last:      {} ({})",
                    last.name,
                    format_date(last.start_date)
                ),
                None => println!("  last:      no retreats yet"),
            }
        }
        ServanteeCommand::History { id } => {
            let mut history = retreats::for_servantee(client, &id)
                .await
                .map_err(err_string)?;
            if history.is_empty() {
                println!("No retreats attended yet.");
                return Ok(());
            }
            attendance::sort_by_start(&mut history);
            print_retreats(&history);
        }
        ServanteeCommand::Add(args) => {
            let created = servantees::create(client, &args.to_input())
                .await
                .map_err(err_string)?;
            println!("Created servantee '{}' ({})", created.name, created.id);
        }
        ServanteeCommand::Edit(args) => {
            let updated = servantees::update(client, &args.id, &args.to_input())
                .await
                .map_err(err_string)?;
            println!("Updated servantee '{}'", updated.name);
        }
        ServanteeCommand::Delete { id } => {
            servantees::delete(client, &id).await.map_err(err_string)?;
            println!("Deleted servantee {id}");
        }
    }
    Ok(())
}

pub(crate) async fn retreat_command(ws: &Workspace, command: RetreatCommand) -> Result<(), String> {
    let client = &ws.client;
    match command {
        RetreatCommand::List(args) => {
            let query = list_query(&args, ws.config.listing.page_size);
            let page = retreats::list(client, &query).await.map_err(err_string)?;
            print_retreats(page.items());
            print_page_footer(&page, &query);
        }
        RetreatCommand::Show { id } => {
            let r = retreats::get(client, &id).await.map_err(err_string)?;
            println!("{} ({})", r.name, r.id);
            println!("  dates:    {} .. {}", format_date(r.start_date), format_date(r.end_date));
            println!("  location: {}", or_dash(r.location.as_deref()));
            println!("  attendees ({}):", r.attendees.len());
            for attendee in &r.attendees {
                println!("    {} {}", attendee.id(), attendee.name().unwrap_or(""));
            }
        }
        RetreatCommand::Add(args) => {
            let input = RetreatInput {
                name: Some(args.name),
                start_date: args.start,
                end_date: args.end,
                location: args.location,
            };
            let created = retreats::create(client, &input).await.map_err(err_string)?;
            println!("Created retreat '{}' ({})", created.name, created.id);
        }
        RetreatCommand::Edit(args) => {
            let updated = retreats::update(client, &args.id, &args.to_input())
                .await
                .map_err(err_string)?;
            println!("Updated retreat '{}'", updated.name);
        }
        RetreatCommand::Delete { id } => {
            retreats::delete(client, &id).await.map_err(err_string)?;
            println!("Deleted retreat {id}");
        }
        RetreatCommand::Attend { retreat, servantee } => {
            let updated = retreats::add_attendee(client, &retreat, &servantee)
                .await
                .map_err(err_string)?;
            println!(
                "'{}' now has {} attendee(s)",
                updated.name,
                updated.attendees.len()
            );
        }
        RetreatCommand::Unattend { retreat, servantee } => {
            let updated = retreats::remove_attendee(client, &retreat, &servantee)
                .await
                .map_err(err_string)?;
            println!(
                "'{}' now has {} attendee(s)",
                updated.name,
                updated.attendees.len()
            );
        }
    }
    Ok(())
}

pub(crate) async fn servant_command(ws: &Workspace, command: ServantCommand) -> Result<(), String> {
    let client = &ws.client;
    match command {
        ServantCommand::List(args) => {
            let query = list_query(&args, ws.config.listing.page_size);
            let page = servants::list(client, &query).await.map_err(err_string)?;
            print_servants(page.items());
            print_page_footer(&page, &query);
        }
        ServantCommand::Add(args) => {
            let role = args.role();
            let password = read_password(args.password, "Password for the new servant: ")?;
            let input = ServantInput {
                name: args.name,
                email: args.email,
                password,
                role,
            };
            let created = servants::create(client, &input).await.map_err(err_string)?;
            println!(
                "Created {} '{}' ({})",
                created.role.label(),
                created.name,
                created.id
            );
        }
        ServantCommand::Edit(args) => {
            let mut changes = args.to_update();
            if let Some(None) = args.password {
                changes.password = Some(read_password(None, "New password: ")?);
            }
            let updated = servants::update(client, &args.id, &changes)
                .await
                .map_err(err_string)?;
            println!("Updated {} '{}'", updated.role.label(), updated.name);
        }
        ServantCommand::Delete { id } => {
            servants::delete(client, &id).await.map_err(err_string)?;
            println!("Deleted servant {id}");
        }
    }
    Ok(())
}

pub(crate) async fn note_command(ws: &Workspace, command: NoteCommand) -> Result<(), String> {
    let client = &ws.client;
    match command {
        NoteCommand::List { owner, id } => {
            let found = notes::list(client, owner.into(), &id)
                .await
                .map_err(err_string)?;
            if found.is_empty() {
                println!("No notes.");
            }
            for note in found {
                println!("[{}] {} {}", note.id, format_date(note.created_at), note.content);
            }
        }
        NoteCommand::Add { owner, id, content } => {
            let note = notes::create(client, owner.into(), &id, &content)
                .await
                .map_err(err_string)?;
            println!("Added note {}", note.id);
        }
        NoteCommand::Edit { note, content } => {
            notes::update(client, &note, &content)
                .await
                .map_err(err_string)?;
            println!("Updated note {note}");
        }
        NoteCommand::Delete { note } => {
            notes::delete(client, &note).await.map_err(err_string)?;
            println!("Deleted note {note}");
        }
    }
    Ok(())
}

pub(crate) async fn search(ws: &Workspace, args: SearchArgs) -> Result<(), String> {
    let mut all_retreats = retreats::fetch_all(&ws.client).await.map_err(err_string)?;
    attendance::sort_by_start(&mut all_retreats);
    if attendance::attendee_ids_in_range(&all_retreats, &args.from, &args.to).is_none() {
        return Err(format!(
            "Unknown retreat in range {}..{}; run `khidma retreats list` for ids.",
            args.from, args.to
        ));
    }

    let all_servantees = servantees::fetch_all(&ws.client)
        .await
        .map_err(err_string)?;
    let filter = if args.not_attended {
        AttendanceFilter::NotAttended
    } else {
        AttendanceFilter::Attended
    };
    let matches = attendance::resolve_range(
        &all_retreats,
        &args.from,
        &args.to,
        &all_servantees,
        filter,
    );

    print_servantees(matches.iter().copied());
    println!("\n{} servantee(s)", matches.len());
    Ok(())
}

pub(crate) async fn dashboard(ws: &Workspace) -> Result<(), String> {
    let client = &ws.client;
    let all_servantees = servantees::fetch_all(client).await.map_err(err_string)?;
    let all_servants = servants::all(client).await.map_err(err_string)?;
    let all_retreats = retreats::fetch_all(client).await.map_err(err_string)?;

    let stats = DashboardStats::compute(
        &all_servantees,
        all_servants.len(),
        &all_retreats,
        Utc::now(),
    );
    println!(
        "New servantees this month: {} ({:+}% vs. {} last month)",
        stats.new_servantees, stats.new_servantees_change, stats.new_servantees_last_month
    );
    println!("Servants: {}", stats.servants);
    match &stats.next_retreat {
        Some(next) => println!(
            "Next retreat: {} on {}",
            next.name,
            next.start_date.format("%Y-%m-%d")
        ),
        None => println!("Next retreat: none scheduled"),
    }
    Ok(())
}

pub(crate) async fn report(ws: &Workspace, command: ReportCommand) -> Result<(), String> {
    let (report, args) = match command {
        ReportCommand::Attendees(args) => {
            let retreat = retreats::get(&ws.client, &args.retreat)
                .await
                .map_err(err_string)?;
            (RetreatReport::attendees(&retreat), args)
        }
        ReportCommand::Missing(args) => {
            let retreat = retreats::get(&ws.client, &args.retreat)
                .await
                .map_err(err_string)?;
            let all_servantees = servantees::fetch_all(&ws.client)
                .await
                .map_err(err_string)?;
            (RetreatReport::missing(&retreat, &all_servantees), args)
        }
    };
    emit_report(ws, &report, &args)
}

fn emit_report(ws: &Workspace, report: &RetreatReport, args: &ReportArgs) -> Result<(), String> {
    let format = ReportFormat::from(args.format);
    let Some(out) = &args.out else {
        if report.is_empty() {
            println!("{}: nothing to report.", report.title());
            return Ok(());
        }
        print!("{}", report.render(format).map_err(err_string)?);
        return Ok(());
    };

    let directory = out
        .clone()
        .unwrap_or_else(|| ws.config.export.directory());
    match report.write_to(&directory, format) {
        Ok(path) => {
            println!("Wrote {}", path.display());
            Ok(())
        }
        Err(ReportError::Empty) => {
            println!("{}: nothing to report; no file written.", report.title());
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}

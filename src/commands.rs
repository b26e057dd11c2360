use std::io::Write;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::{
    brew_session,
    cli::{AddArgs, Commands, EditArgs, SettingsArgs, TasteArgs},
    entries::EntryRepository,
    form::{format_number, EntryForm, TasteField},
    models::CoffeeEntry,
    settings::{BrewSettings, SettingsStore},
    stats::{BrewStats, StatsMemo},
    storage::KeyValueStorage,
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

fn print_json(out: &mut impl Write, value: &impl serde::Serialize) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Case-insensitive substring match on the bean type. An empty query
/// matches everything.
pub fn matches_search(entry: &CoffeeEntry, query: &str) -> bool {
    entry
        .bean_type
        .to_lowercase()
        .contains(&query.to_lowercase())
}

/// Runs one subcommand against an already loaded repository.
pub async fn execute<S: KeyValueStorage>(
    command: Commands,
    repo: &EntryRepository<S>,
    settings: &SettingsStore,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::List(args) => {
            let entries = repo.entries();
            let query = args.search.unwrap_or_default();
            let shown: Vec<&CoffeeEntry> = entries
                .iter()
                .filter(|entry| matches_search(entry, &query))
                .collect();
            if args.json {
                return print_json(out, &shown);
            }
            if entries.is_empty() {
                writeln!(out, "no entries yet")?;
            } else if shown.is_empty() {
                writeln!(out, "no entries match '{query}'")?;
            }
            for entry in shown {
                writeln!(out, "{}", list_line(entry))?;
            }
        }
        Commands::Show(args) => {
            let Some(entry) = repo.get_one(&args.id).await else {
                bail!("no entry with id {}", args.id);
            };
            if args.json {
                return print_json(out, &entry);
            }
            write!(out, "{}", detail(&entry))?;
        }
        Commands::Add(args) => {
            let created = repo.create(form_for_add(args).submit(now)?).await?;
            writeln!(out, "saved {}", created.id)?;
        }
        Commands::Edit(args) => {
            let Some(existing) = repo.get_one(&args.id).await else {
                bail!("no entry with id {}", args.id);
            };
            let id = existing.id.clone();
            let updated = form_for_edit(&existing, args).submit(now)?.with_id(id);
            repo.update(updated).await?;
            writeln!(out, "updated {}", existing.id)?;
        }
        Commands::Delete(args) => {
            repo.remove(&args.id).await?;
            writeln!(out, "deleted {}", args.id)?;
        }
        Commands::Stats(args) => {
            let mut memo = StatsMemo::new();
            let stats = memo.get(&repo.entries(), now);
            if args.json {
                return print_json(out, stats);
            }
            write!(out, "{}", stats_text(stats))?;
        }
        Commands::Brew(args) => {
            log_debug!("starting interactive brew for {}", args.bean);
            brew_session::run_interactive(repo, &settings.current(), args).await?;
        }
        Commands::Settings(args) => {
            let current = apply_settings(settings, &args)?;
            if args.json {
                return print_json(out, &current);
            }
            write!(out, "{}", settings_text(&current))?;
        }
    }
    Ok(())
}

/// Persists any requested change and returns the settings now in effect.
fn apply_settings(store: &SettingsStore, args: &SettingsArgs) -> Result<BrewSettings> {
    if args.reset {
        store.update(BrewSettings::default())?;
        return Ok(store.current());
    }
    if args.increments.is_none() && args.tick_ms.is_none() {
        return Ok(store.current());
    }
    let mut next = store.current();
    if let Some(increments) = &args.increments {
        next.pour_increments = increments.clone();
    }
    if let Some(tick_ms) = args.tick_ms {
        next.tick_interval_ms = tick_ms;
    }
    store.update(next)?;
    log_debug!("settings updated");
    Ok(store.current())
}

fn settings_text(settings: &BrewSettings) -> String {
    let increments: Vec<String> = settings
        .pour_increments
        .iter()
        .map(|step| format!("{step:+}"))
        .collect();
    format!(
        "pour increments  {}\ntick interval    {} ms\n",
        increments.join(" "),
        settings.tick_interval_ms
    )
}

fn apply_taste(form: &mut EntryForm, taste: TasteArgs) {
    let fields = [
        (TasteField::Acidity, taste.acidity),
        (TasteField::Sweetness, taste.sweetness),
        (TasteField::Bitterness, taste.bitterness),
        (TasteField::Aroma, taste.aroma),
        (TasteField::Overall, taste.overall),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            form.set_taste(field, value);
        }
    }
}

fn form_for_add(args: AddArgs) -> EntryForm {
    let mut form = EntryForm::new();
    form.set_bean_type(args.bean);
    form.set_temperature(args.temperature);
    form.set_bean_amount(args.bean_amount);
    form.set_steps(args.steps);
    apply_taste(&mut form, args.taste);
    if let Some(notes) = args.notes {
        form.set_notes(notes);
    }
    form.set_date(args.date);
    form
}

fn form_for_edit(existing: &CoffeeEntry, args: EditArgs) -> EntryForm {
    let mut form = EntryForm::from_entry(existing);
    if let Some(bean) = args.bean {
        form.set_bean_type(bean);
    }
    if let Some(temperature) = args.temperature {
        form.set_temperature(temperature);
    }
    if let Some(bean_amount) = args.bean_amount {
        form.set_bean_amount(bean_amount);
    }
    if !args.steps.is_empty() {
        form.set_steps(args.steps);
    }
    apply_taste(&mut form, args.taste);
    if let Some(notes) = args.notes {
        form.set_notes(notes);
    }
    form
}

fn list_line(entry: &CoffeeEntry) -> String {
    format!(
        "{}  {}  {}  {} g / {} g  rating {:.1}",
        entry.id,
        entry.date.format(DATE_FORMAT),
        entry.bean_type,
        format_number(entry.bean_amount),
        format_number(entry.water_amount),
        entry.taste.headline_rating()
    )
}

fn detail(entry: &CoffeeEntry) -> String {
    let taste = entry.taste;
    let mut text = format!(
        "{}\n{}\n\nbean amount  {} g\nwater        {} g\ntemperature  {} °C\n\npours\n",
        entry.bean_type,
        entry.date.format(DATE_FORMAT),
        format_number(entry.bean_amount),
        format_number(entry.water_amount),
        format_number(entry.temperature),
    );
    for (index, (step, running)) in entry.cumulative_steps().iter().enumerate() {
        text.push_str(&format!(
            "  {}. {:>4}s  {:>5} g  (total {} g)\n",
            index + 1,
            step.time,
            format_number(step.grams),
            format_number(*running)
        ));
    }
    text.push_str(&format!(
        "\ntaste\n  acidity {}  sweetness {}  bitterness {}  aroma {}  overall {}\n",
        taste.acidity, taste.sweetness, taste.bitterness, taste.aroma, taste.overall
    ));
    if !entry.notes.is_empty() {
        text.push_str(&format!("\nnotes\n  {}\n", entry.notes));
    }
    text
}

fn stats_text(stats: &BrewStats) -> String {
    format!(
        "entries         {}\nthis week       {}\nfavorite bean   {}\naverage rating  {:.1}\n{}\n",
        stats.total_entries,
        stats.weekly_count,
        stats.favorite_bean,
        stats.average_rating,
        stats.recent_trend
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use clap::Parser;

    use super::*;
    use crate::{cli::Cli, entries::EntryStore, storage::MemoryStorage};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 5, 9, 0, 0).unwrap()
    }

    fn repo() -> EntryRepository<MemoryStorage> {
        EntryRepository::new(EntryStore::new(MemoryStorage::new()))
    }

    async fn run_with(
        repo: &EntryRepository<MemoryStorage>,
        settings: &SettingsStore,
        args: &[&str],
    ) -> Result<String> {
        let cli = Cli::try_parse_from(args)?;
        repo.load().await;
        let mut out = Vec::new();
        execute(cli.command, repo, settings, now(), &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    async fn run(repo: &EntryRepository<MemoryStorage>, args: &[&str]) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let settings = SettingsStore::new(dir.path().join("settings.json"))?;
        run_with(repo, &settings, args).await
    }

    const ADD: [&str; 12] = [
        "brewlog",
        "add",
        "--bean",
        "Colombia",
        "--temp",
        "90",
        "--bean-amount",
        "14",
        "--step",
        "0:40",
        "--step",
        "45:200",
    ];

    #[tokio::test]
    async fn add_then_show_prints_cumulative_pours() {
        let repo = repo();
        run(&repo, &ADD).await.expect("add");
        repo.load().await;
        let id = repo.entries()[0].id.clone();

        let shown = run(&repo, &["brewlog", "show", &id]).await.expect("show");
        assert!(shown.contains("Colombia"));
        assert!(shown.contains("(total 240 g)"));
        assert!(shown.contains("water        200 g"));
    }

    #[tokio::test]
    async fn add_without_steps_is_rejected() {
        let repo = repo();
        let err = run(&repo, &ADD[..8]).await.expect_err("no steps");
        assert!(err.to_string().contains("extraction step"));
        assert!(repo.store().get_entries().await.is_empty());
    }

    #[tokio::test]
    async fn edit_changes_only_the_given_fields() {
        let repo = repo();
        run(&repo, &ADD).await.expect("add");
        repo.load().await;
        let before = repo.entries()[0].clone();

        run(&repo, &["brewlog", "edit", &before.id, "--overall", "5", "--notes", "bright"])
            .await
            .expect("edit");
        let after = repo.get_one(&before.id).await.expect("still there");
        assert_eq!(after.taste.overall, 5);
        assert_eq!(after.notes, "bright");
        assert_eq!(after.date, before.date);
        assert_eq!(after.extraction_steps, before.extraction_steps);
    }

    #[tokio::test]
    async fn show_and_edit_of_unknown_id_fail_but_delete_succeeds() {
        let repo = repo();
        assert!(run(&repo, &["brewlog", "show", "nope"]).await.is_err());
        assert!(run(&repo, &["brewlog", "edit", "nope", "--bean", "x"]).await.is_err());
        let out = run(&repo, &["brewlog", "delete", "nope"]).await.expect("delete");
        assert_eq!(out, "deleted nope\n");
    }

    #[tokio::test]
    async fn stats_json_uses_camel_case() {
        let repo = repo();
        run(&repo, &ADD).await.expect("add");
        let out = run(&repo, &["brewlog", "stats", "--json"]).await.expect("stats");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["totalEntries"], 1);
        assert_eq!(value["weeklyCount"], 1);
        assert_eq!(value["favoriteBean"], "Colombia");
        assert_eq!(value["recentTrend"], "Lately you've been enjoying Colombia");
    }

    #[tokio::test]
    async fn list_on_empty_journal() {
        let repo = repo();
        let out = run(&repo, &["brewlog", "list"]).await.expect("list");
        assert_eq!(out, "no entries yet\n");
    }

    #[tokio::test]
    async fn list_search_matches_bean_type_ignoring_case() {
        let repo = repo();
        run(&repo, &ADD).await.expect("add colombia");
        let mut kenya = ADD;
        kenya[3] = "Kenya AA";
        run(&repo, &kenya).await.expect("add kenya");

        let out = run(&repo, &["brewlog", "list", "--search", "cOLom"])
            .await
            .expect("list");
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("Colombia"));

        let out = run(&repo, &["brewlog", "list", "--search", "aa", "--json"])
            .await
            .expect("list json");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(value[0]["beanType"], "Kenya AA");

        let out = run(&repo, &["brewlog", "list", "--search", "xyz"])
            .await
            .expect("list");
        assert_eq!(out, "no entries match 'xyz'\n");

        let out = run(&repo, &["brewlog", "list", "--search", ""])
            .await
            .expect("list");
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out, run(&repo, &["brewlog", "list"]).await.expect("list"));
    }

    #[tokio::test]
    async fn settings_command_updates_and_resets() {
        let repo = repo();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let settings = SettingsStore::new(path.clone()).expect("store");

        let out = run_with(&repo, &settings, &["brewlog", "settings"])
            .await
            .expect("show");
        assert_eq!(
            out,
            "pour increments  +100 +50 +10 +5 +1 -10\ntick interval    100 ms\n"
        );
        assert!(!path.exists());

        run_with(&repo, &settings, &["brewlog", "settings", "--increments", "20,-5"])
            .await
            .expect("update");
        let reopened = SettingsStore::new(path.clone()).expect("reopen");
        assert_eq!(reopened.current().pour_increments, vec![20.0, -5.0]);
        assert_eq!(reopened.current().tick_interval_ms, 100);

        let err = run_with(&repo, &settings, &["brewlog", "settings", "--increments", "0"])
            .await
            .expect_err("zero increment");
        assert!(err.to_string().contains("pour increment"));
        assert_eq!(settings.current().pour_increments, vec![20.0, -5.0]);

        let out = run_with(&repo, &settings, &["brewlog", "settings", "--reset", "--json"])
            .await
            .expect("reset");
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["tickIntervalMs"], 100);
        assert_eq!(settings.current(), BrewSettings::default());
    }
}

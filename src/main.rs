use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use plan_editor::api_connection::{HttpBackend, PlanBackend};
use plan_editor::cli::{parse_args, Command, EditSpec};
use plan_editor::config::EditorConfig;
use plan_editor::editor::{IngredientKey, MealKey, PlanEditor, SaveStatus};
use plan_editor::observability::init_tracing;

const DEFAULT_LOG_FILTER: &str = "plan_editor=info";

async fn expand_all<B: PlanBackend>(editor: &PlanEditor<B>) {
    let mut targets = Vec::new();
    {
        let store = editor.store().await;
        if let Some(plan) = store.edited() {
            for (d, day) in plan.days.iter().enumerate() {
                for (m, meal) in day.meals.iter().enumerate() {
                    if meal.is_recompute_eligible() && !store.is_expanded(MealKey::new(d, m)) {
                        targets.push((d, m));
                    }
                }
            }
        }
    }
    for (day, meal) in targets {
        editor.toggle_expanded(day, meal).await;
    }
}

async fn apply_edits<B: PlanBackend>(editor: &PlanEditor<B>, edits: &[EditSpec]) -> Result<()> {
    let resolved: Vec<(IngredientKey, &str)> = {
        let store = editor.store().await;
        let plan = store
            .edited()
            .ok_or_else(|| anyhow!("No weekly plan loaded"))?;
        edits
            .iter()
            .map(|edit| edit.resolve(plan).map(|key| (key, edit.quantity.as_str())))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|e| anyhow!(e))?
    };

    // Edits run together; each meal's recompute lands independently.
    let results = join_all(resolved.iter().map(|(key, quantity)| {
        editor.on_quantity_edit(key.day, key.meal, key.ingredient, quantity)
    }))
    .await;

    for result in results {
        result.context("Failed to apply edit")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env before reading any settings

    init_tracing(DEFAULT_LOG_FILTER)?;
    let cli = parse_args();

    let config = EditorConfig::from_env_with_overrides(|name| cli.override_for(name))
        .context("Invalid configuration")?;

    tracing::info!(
        base_url = %config.base_url,
        user_id = %config.user_id,
        ordering = %config.ordering,
        "starting plan editor"
    );

    let backend = HttpBackend::new(&config.base_url, config.request_timeout)
        .context("Failed to build HTTP client")?;
    let editor = PlanEditor::new(backend, config.user_id.clone(), config.ordering);

    editor
        .load_plan()
        .await
        .with_context(|| format!("Failed to load weekly plan for user '{}'", config.user_id))?;

    match cli.command {
        Command::Show { expand } => {
            if expand {
                expand_all(&editor).await;
            }
            println!("{}", editor.render().await);
        }
        Command::Edit {
            edits,
            dry_run,
            expand,
        } => {
            apply_edits(&editor, &edits).await?;
            if expand {
                expand_all(&editor).await;
            }

            if dry_run {
                println!("{}", editor.render().await);
                println!("Dry run: changes not saved.");
                return Ok(());
            }

            if !editor.is_dirty().await {
                println!("{}", editor.render().await);
                println!("Nothing to save.");
                return Ok(());
            }

            let saved = editor.save_plan().await;
            println!("{}", editor.render().await);
            saved.context("Failed to save weekly plan")?;

            if matches!(editor.store().await.save_status(), SaveStatus::Saved) {
                tracing::info!(edits = edits.len(), "edits saved");
            }
        }
    }

    Ok(())
}

use crate::app::{AppContext, Result, SiftError};
use crate::domain::{Category, Tab};
use crate::ingest;
use crate::store::Store;

pub async fn run_ingest(ctx: &AppContext) -> Result<()> {
    println!("Ingesting...");
    let summary = ingest::run_cycle(ctx).await?;

    for report in &summary.sources {
        println!(
            "{}: {} listed, {} new, {} fetched",
            report.source, report.listed, report.new, report.fetched
        );
        for native_id in &report.dropped {
            println!("  dropped {} after repeated fetch failures", native_id);
        }
    }
    println!(
        "Classified {} liked, {} disliked",
        summary.liked, summary.disliked
    );

    Ok(())
}

pub fn show_tab(ctx: &AppContext, tab: &str, limit: usize) -> Result<()> {
    let tab: Tab = tab.parse().map_err(SiftError::Config)?;
    let entries = ctx.store.get_tab(tab, limit)?;

    if entries.is_empty() {
        println!("No items");
        return Ok(());
    }

    for entry in entries {
        let marker = match entry.category {
            Some(Category::Liked) => "+",
            Some(Category::Disliked) => "-",
            None => " ",
        };
        println!("{} {}\n  {}", marker, entry.title, entry.source_url);
        println!("  id: {}", entry.id);
    }

    Ok(())
}

pub fn swipe(ctx: &AppContext, id: &str, action: &str) -> Result<()> {
    let category: Category = action.parse().map_err(SiftError::Config)?;

    match ctx.store.reclassify(id, category) {
        Ok(()) => {
            println!("{} -> {}", id, category.as_str());
            Ok(())
        }
        Err(SiftError::ItemNotFound(_)) => {
            println!("No item with id {}", id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub fn status(ctx: &AppContext) -> Result<()> {
    println!("Pending:          {}", ctx.store.pending_count()?);
    println!(
        "Liked history:    {}",
        ctx.store.history_count(Category::Liked)?
    );
    println!(
        "Disliked history: {}",
        ctx.store.history_count(Category::Disliked)?
    );
    Ok(())
}

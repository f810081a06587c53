use anyhow::Result;

use super::config::Config;
use crate::services::events;
use crate::types::{CreateEventRequest, Event};

pub async fn list(config: &Config) -> Result<()> {
    let response = events::all_events(&config.api).await?;
    if !response.success {
        anyhow::bail!("{}", response.msg);
    }

    let events = response.data.docs;
    if events.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for event in &events {
        println!("{}", summary_line(event));
    }
    Ok(())
}

pub async fn show(config: &Config, event_id: &str) -> Result<()> {
    let response = events::event_by_id(&config.api, event_id).await?;
    if !response.success {
        anyhow::bail!("{}", response.msg);
    }

    let event = response.data;
    println!("{}", event.event_title);
    println!("Id: {}", event.id);
    println!("Type: {}", event.event_type);
    println!("Date: {}", event.date);
    println!("Status: {}", event.status);
    println!("Registered: {}", event.registered_users.len());
    if !event.description.is_empty() {
        println!("\n{}", event.description);
    }
    Ok(())
}

pub async fn create(config: &Config, request: CreateEventRequest) -> Result<()> {
    let response = events::create_event(&config.api, &request).await?;
    if !response.success {
        anyhow::bail!("{}", response.msg);
    }

    println!("Created event {} ({})", response.data.event_title, response.data.id);
    Ok(())
}

pub async fn join(config: &Config, event_id: &str) -> Result<()> {
    let response = events::register_for_event(&config.api, event_id).await?;
    if !response.success {
        anyhow::bail!("{}", response.msg);
    }

    println!("Registered for {}", response.data.event_title);
    Ok(())
}

fn summary_line(event: &Event) -> String {
    format!(
        "{}  {}  [{}]  {}",
        event.id, event.date, event.status, event.event_title
    )
}

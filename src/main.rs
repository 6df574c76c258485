use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use skycast_services::{bootstrap, SessionState, SessionView};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    skycast_core::init()?;

    let mut app = skycast_core::App::new()?;
    tracing::info!("SkyCast started");

    println!("SkyCast - live weather with a short-range forecast");
    println!("  Config directory: {}", app.config().config_dir.display());
    println!("Type a city to track it, 'refresh' to sample again, 'quit' to exit.\n");

    let handle = bootstrap::start(app.config())
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    let mut views = handle.subscribe();
    let printer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            print_view(&view);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = line.trim();
        let result = match input {
            "quit" | "exit" => break,
            "refresh" => handle.refresh(),
            _ => handle.set_city(input),
        };
        if let Err(e) = result {
            tracing::warn!("{}", e);
            break;
        }
    }

    // Graceful shutdown
    handle.shutdown().await;
    // The view channel closes once the session stops; print what is left
    if let Err(e) = printer.await {
        tracing::warn!("View printer ended abnormally: {}", e);
    }
    app.shutdown()?;

    Ok(())
}

fn print_view(view: &SessionView) {
    let city = view.city.as_deref().unwrap_or("-");
    match view.state {
        SessionState::Idle => {}
        SessionState::Fetching => println!("[{}] fetching...", city),
        SessionState::Failed => println!(
            "[{}] {}",
            city,
            view.error_message.as_deref().unwrap_or("failed")
        ),
        SessionState::Ready => {
            if let Some(conditions) = &view.conditions {
                let r = &conditions.reading;
                println!(
                    "[{}] {:.1}°  {:.0}% humidity  {:.0} hPa  {}",
                    conditions.place,
                    r.temperature,
                    r.humidity,
                    r.pressure,
                    conditions.description.as_deref().unwrap_or("")
                );
            }
            match (view.prediction.next_temperature, view.prediction.next_humidity) {
                (Some(t), Some(h)) => println!(
                    "    next: {:.1}°  {:.0}% humidity  ({} samples)",
                    t,
                    h,
                    view.buffer.len()
                ),
                _ => println!("    {} samples, forecast pending", view.buffer.len()),
            }
        }
    }
}

use tokio::net::UdpSocket;

use super::config::Effective;
use super::domain::{Rng, Sensor};
use super::error::SimError;

// ═══════════════════════════════════════════════════════════════
//  Emit loop: reading → датаграмма → пауза
// ═══════════════════════════════════════════════════════════════

pub async fn run(args: &Effective) -> Result<(), SimError> {
    let mut rng = Rng::new(args.seed);
    let id = match &args.id {
        Some(id) => id.clone(),
        None => rng.next_intn(10_000).to_string(),
    };
    let sensor = Sensor::new(id, args.geofence.clone(), args.escape_probability);

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    tracing::info!(
        source_id = %sensor.id,
        gateway = %args.gateway,
        escape_probability = args.escape_probability,
        "sensor started"
    );

    let mut sent: u64 = 0;
    loop {
        let reading = sensor.reading(&mut rng);
        let payload = serde_json::to_vec(&reading)?;

        // Потеря датаграммы не останавливает сенсор
        match socket.send_to(&payload, &args.gateway).await {
            Ok(_) => {
                sent += 1;
                tracing::info!(
                    source_id = %reading.source_id,
                    temperature = %reading.temperature,
                    lat = reading.location.lat,
                    lon = reading.location.lon,
                    activity = reading.activity,
                    "reading sent"
                );
            }
            Err(e) => tracing::warn!(gateway = %args.gateway, error = %e, "send failed"),
        }

        if args.count.is_some_and(|n| sent >= n) {
            break;
        }

        let pause = rng.interval(args.min_interval, args.max_interval);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::info!(sent, "sensor stopped");
    Ok(())
}

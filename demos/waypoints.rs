// Drive a square through the runtime, waiting for each goal to complete
//
// Usage: cargo run --example waypoints -- [side]

use diffbase_zenoh_runtime::config::{TOPIC_CMD_NAV, TOPIC_POSE};
use diffbase_zenoh_runtime::messages::{NavCommand, PoseReport};
use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Duration;
use tracing::{info, warn};

const GOAL_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let side: f64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1.0);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_NAV).await?;
    let poses = session.declare_subscriber(TOPIC_POSE).await?;

    let corners = [
        (side, 0.0, FRAC_PI_2),
        (side, side, PI),
        (0.0, side, -FRAC_PI_2),
        (0.0, 0.0, 0.0),
    ];

    publisher.put(serde_json::to_string(&NavCommand::Reset)?).await?;

    for (x, y, theta) in corners {
        let goal = NavCommand::DriveTo {
            x,
            y,
            theta: Some(theta),
            smooth: false,
        };
        info!("Goal: {:?}", goal);
        publisher.put(serde_json::to_string(&goal)?).await?;

        // The first reports may predate the goal; wait until one shows it active
        let mut started = false;
        let wait = async {
            while let Ok(sample) = poses.recv_async().await {
                let payload = sample.payload().to_bytes();
                let Ok(report) = serde_json::from_slice::<PoseReport>(&payload) else {
                    continue;
                };
                if !report.nav_done {
                    started = true;
                } else if started {
                    return Some(report);
                }
            }
            None
        };

        match tokio::time::timeout(GOAL_TIMEOUT, wait).await {
            Ok(Some(report)) => info!(
                "Reached ({:.3}, {:.3}, {:.3})",
                report.x, report.y, report.theta
            ),
            Ok(None) => {
                warn!("Pose stream closed");
                break;
            }
            Err(_) => {
                // nav_done never reports failure; give up on our side
                warn!("Goal timed out, stopping");
                publisher
                    .put(serde_json::to_string(&NavCommand::Stop { smooth: false })?)
                    .await?;
                break;
            }
        }
    }

    Ok(())
}

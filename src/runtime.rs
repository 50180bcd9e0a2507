// Control loop with watchdog
// Note: the watchdog only guards direct velocity commands. Those are streamed
// by teleop, so if teleop dies the base must not keep driving. Goals are
// one-shot and run until done or replaced.

use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::base::{NavState, RobotBase};
use crate::config::{
    BaseConfig, CMD_TIMEOUT, TELEMETRY_HZ, TOPIC_CMD_NAV, TOPIC_HEALTH, TOPIC_POSE, TOPIC_RT_MOTORS,
};
use crate::messages::{MotorActuation, NavCommand, PoseReport, RuntimeHealth};
use crate::sim::{BaseHardware, SimulatedBase};

pub struct Runtime<H: BaseHardware> {
    base: RobotBase,
    hardware: H,
    velocity_cmd_at: Option<Instant>,
    health: RuntimeHealth,
}

impl<H: BaseHardware> Runtime<H> {
    pub fn new(base: RobotBase, hardware: H) -> Self {
        Self {
            base,
            hardware,
            velocity_cmd_at: None,
            health: RuntimeHealth::Ok,
        }
    }

    pub fn base(&self) -> &RobotBase {
        &self.base
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: NavCommand, now: Instant) {
        info!("Received command: {:?}", &cmd);
        self.velocity_cmd_at = match cmd {
            NavCommand::Velocity { .. } => Some(now),
            _ => None,
        };
        cmd.apply(&mut self.base);
        self.health = RuntimeHealth::Ok;
    }

    /// Run the watchdog, tick the base and push outputs to the motors
    pub fn step(&mut self, now: Instant) -> MotorActuation {
        self.check_watchdog(now);

        let ticks = self.hardware.read_encoders();
        self.base.update_at(now, ticks);

        let actuation = MotorActuation::from(&self.base);
        self.hardware.write_outputs(actuation.left, actuation.right);
        actuation
    }

    fn check_watchdog(&mut self, now: Instant) {
        let Some(received_at) = self.velocity_cmd_at else {
            return;
        };
        let cmd_age = now.saturating_duration_since(received_at);
        if cmd_age > CMD_TIMEOUT && matches!(self.base.nav_state(), NavState::DirectVelocity { .. }) {
            // Watchdog triggered - stop the robot
            warn!("Command stale ({:?} old), stopping robot", cmd_age);
            self.base.stop(true);
            self.velocity_cmd_at = None;
            self.health = RuntimeHealth::CmdStale;
        }
    }
}

pub async fn run(config: BaseConfig, loop_hz: u64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let base = RobotBase::from_config(&config)?;
    let hardware = SimulatedBase::new(config.ticks_per_unit);
    let mut runtime = Runtime::new(base, hardware);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_NAV).await?;
    let pub_actuation = session.declare_publisher(TOPIC_RT_MOTORS).await?;
    let pub_pose = session.declare_publisher(TOPIC_POSE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let loop_hz = loop_hz.max(1);
    let mut tick = interval(Duration::from_micros(1_000_000 / loop_hz));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let telemetry_every = (loop_hz / TELEMETRY_HZ).max(1);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        loop_hz,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_NAV);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_MOTORS, TOPIC_POSE, TOPIC_HEALTH
    );

    let mut count: u64 = 0;
    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending commands (non-blocking), applied in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<NavCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd, now);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Tick the base (includes watchdog logic)
        let actuation = runtime.step(now);

        // 3. Publish actuation
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_actuation.put(actuation_json).await?;

        // 4. Publish pose and health at the telemetry rate
        count = count.wrapping_add(1);
        if count % telemetry_every == 0 {
            let pose_json = serde_json::to_string(&PoseReport::from(runtime.base()))?;
            pub_pose.put(pose_json).await?;

            let health_json = serde_json::to_string(&runtime.health())?;
            pub_health.put(health_json).await?;
        }
    }
}

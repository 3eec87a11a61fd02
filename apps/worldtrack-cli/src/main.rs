use std::f32::consts::PI;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{Mat3, Vec2, Vec3};
use tracing_subscriber::EnvFilter;
use worldtrack_assets::{ColModel, InstanceKind, ModelId, ModelInfo, ModelStore};
use worldtrack_common::{EntityType, Rect, Transform};
use worldtrack_kernel::{World, WorldConfig};
use worldtrack_watch::{
    CleanupKind, MissionWatch, SimulationParams, MAX_CLEANUP, MAX_STUCK_CHECKS,
    MAX_UPSIDE_DOWN_CHECKS,
};

const CAR: ModelId = ModelId(1);
const PED: ModelId = ModelId(2);

#[derive(Parser)]
#[command(name = "worldtrack-cli", about = "Run entity tracking scenarios")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World config JSON. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model registry JSON. Needs models 1 (car) and 2 (ped).
    #[arg(short, long)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration and registry capacities
    Info,
    /// Leave a car on its roof and watch the upside-down check
    Flip {
        #[arg(short, long, default_value = "15")]
        ticks: u32,
        /// Milliseconds per tick
        #[arg(short, long, default_value = "100")]
        step_ms: u32,
    },
    /// Track a slow car with the stuck check
    Stuck {
        #[arg(short, long, default_value = "0.5")]
        radius: f32,
        /// Sampling interval in milliseconds
        #[arg(short, long, default_value = "2000")]
        interval: u32,
        /// Distance the car moves per tick
        #[arg(long, default_value = "0.0")]
        speed: f32,
        #[arg(short, long, default_value = "25")]
        ticks: u32,
        #[arg(long, default_value = "100")]
        step_ms: u32,
    },
    /// Point holders at a car, repoint one, then destroy the car
    References {
        #[arg(long, default_value = "3")]
        holders: usize,
    },
    /// Register mission entities and run the mission-end sweep
    Mission {
        #[arg(long, default_value = "3")]
        cars: usize,
        #[arg(long, default_value = "2")]
        peds: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => WorldConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WorldConfig::default(),
    };
    let models = match &cli.models {
        Some(path) => ModelStore::load(path)
            .with_context(|| format!("loading models {}", path.display()))?,
        None => builtin_models(),
    };

    match cli.command {
        Commands::Info => {
            println!("worldtrack-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("models: {}", models.len());
            println!(
                "watchdogs: cleanup={MAX_CLEANUP} upside_down={MAX_UPSIDE_DOWN_CHECKS} stuck={MAX_STUCK_CHECKS}"
            );
        }
        Commands::Flip { ticks, step_ms } => {
            let mut world = World::new(config, models);
            let car = world.spawn(
                EntityType::Vehicle,
                CAR,
                Transform {
                    position: Vec3::new(0.0, 0.0, 1.0),
                    rotation: Mat3::from_rotation_x(PI),
                },
            )?;
            let mut watch = MissionWatch::new();
            watch.upside_down.add(car.handle);
            println!("Flip check: {car} on its roof, {step_ms} ms per tick");

            for _ in 0..ticks {
                world.step(step_ms);
                watch.update(step_ms, world.time_ms(), &world);
                println!(
                    "t={:>6} ms  flipped_long_enough={}",
                    world.time_ms(),
                    watch.upside_down.has_been_flipped_long_enough(car.handle)
                );
            }
        }
        Commands::Stuck {
            radius,
            interval,
            speed,
            ticks,
            step_ms,
        } => {
            let mut world = World::new(config, models);
            let car = world.spawn(EntityType::Vehicle, CAR, Transform::at(Vec3::ZERO))?;
            world.set_velocity(car, Vec3::new(speed, 0.0, 0.0), Vec3::ZERO)?;
            let mut watch = MissionWatch::new();
            if !watch.stuck.add(car.handle, radius, interval, world.time_ms(), &world) {
                anyhow::bail!("stuck check refused {car}");
            }
            if let Some(rect) = world.bound_rect(car) {
                let travel = Vec2::new(speed * ticks as f32, 0.0);
                let end = Rect::new(rect.min + travel, rect.max + travel);
                if !world.grid().contains_rect(&end) {
                    anyhow::bail!(
                        "car would leave the world after {ticks} ticks at {speed}/tick; lower --speed or --ticks"
                    );
                }
            }
            println!("Stuck check: radius={radius} interval={interval} ms speed={speed}/tick");

            for _ in 0..ticks {
                world.step(step_ms);
                watch.update(step_ms, world.time_ms(), &world);
                let position = world.entity(car).map(|e| e.position()).unwrap_or_default();
                println!(
                    "t={:>6} ms  x={:>7.2}  stuck={}",
                    world.time_ms(),
                    position.x,
                    watch.stuck.is_stuck(car.handle)
                );
            }
        }
        Commands::References { holders } => {
            let mut world = World::new(config, models);
            let target = world.spawn(EntityType::Vehicle, CAR, Transform::at(Vec3::ZERO))?;
            let other = world.spawn(EntityType::Ped, PED, Transform::at(Vec3::new(10.0, 0.0, 0.0)))?;

            let mut slots = Vec::with_capacity(holders);
            for _ in 0..holders {
                let holder = world.alloc_holder(None);
                world.store_reference(holder, target)?;
                slots.push(holder);
            }
            if let Some(&last) = slots.last() {
                world.set_holder(last, Some(other));
            }
            println!(
                "{holders} holders point at {target}, last repointed to {other}; slots in use={}",
                world.references().in_use()
            );

            let pruned = world.prune_references(target)?;
            println!("pruned {pruned}; slots in use={}", world.references().in_use());

            world.destroy(target)?;
            for (i, holder) in slots.iter().enumerate() {
                let value = world
                    .holders()
                    .get(*holder)
                    .map_or_else(|| "null".to_string(), |id| id.to_string());
                println!("holder {i}: {value}");
            }
            println!(
                "slots free={} of {}",
                world.references().free_len(),
                world.references().capacity()
            );
        }
        Commands::Mission { cars, peds } => {
            let mut world = World::new(config, models);
            let mut watch = MissionWatch::new();
            let mut spawned = Vec::new();
            for i in 0..cars {
                let at = Transform::at(Vec3::new(i as f32 * 8.0, 0.0, 0.0));
                let id = world.spawn(EntityType::Vehicle, CAR, at)?;
                watch.cleanup.add(id.handle, CleanupKind::Vehicle);
                watch.upside_down.add(id.handle);
                spawned.push(id);
            }
            for i in 0..peds {
                let at = Transform::at(Vec3::new(i as f32 * 4.0, 20.0, 0.0));
                let id = world.spawn(EntityType::Ped, PED, at)?;
                watch.cleanup.add(id.handle, CleanupKind::Ped);
                spawned.push(id);
            }
            for id in &spawned {
                if let Some(entity) = world.entity_mut(*id) {
                    entity.flags.streaming_dont_delete = true;
                }
            }
            if let Some(&first) = spawned.first() {
                world.destroy(first)?;
                println!("destroyed {first} before mission end");
            }

            let mut params = SimulationParams {
                ped_density: 0.0,
                widescreen: true,
                streaming_disabled: true,
                ..SimulationParams::default()
            };
            let cleaned = watch.end_mission(&mut params, &mut world);
            println!(
                "cleaned {cleaned} of {} registered; upside-down tracked={}",
                spawned.len(),
                watch.upside_down.len()
            );
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }

    Ok(())
}

fn builtin_models() -> ModelStore {
    let mut models = ModelStore::new();
    models.register(
        CAR,
        ModelInfo::new(
            "car",
            ColModel::from_box(Vec3::new(-1.0, -2.5, 0.0), Vec3::new(1.0, 2.5, 1.5)),
            InstanceKind::Clump,
        ),
    );
    models.register(
        PED,
        ModelInfo::new(
            "ped",
            ColModel::from_box(Vec3::new(-0.4, -0.4, 0.0), Vec3::new(0.4, 0.4, 1.8)),
            InstanceKind::Clump,
        ),
    );
    models
}

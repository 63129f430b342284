//! Headless demo binary driving the Basalt frame scheduler.
//!
//! Registers a representative set of engine systems, builds the execution
//! graph, then runs a fixed number of frames over the worker pool and
//! reports per-system timings. Configuration is loaded from `config.ron`
//! and can be overridden via CLI flags, e.g.
//! `cargo run -p basalt-demo -- --workers 4 --dump-schedule true`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use tracing::info;

use basalt_config::{CliArgs, Config};
use basalt_frame::{FrameCallbacks, FrameOrchestrator, FramePhase};
use basalt_sched::{
    ComponentId, ComponentMask, ComponentRegistry, System, SystemMetadata, SystemScheduler,
    SystemStage, World,
};
use basalt_task::TaskPriority;

/// Frames to run before reporting and exiting.
const DEMO_FRAMES: u64 = 120;

/// Stand-in for a real engine system: burns a little CPU and counts runs.
struct BusyWorkSystem {
    iterations: u32,
    runs: Arc<AtomicU64>,
}

impl BusyWorkSystem {
    fn new(iterations: u32, runs: &Arc<AtomicU64>) -> Arc<Self> {
        Arc::new(Self {
            iterations,
            runs: Arc::clone(runs),
        })
    }
}

impl System for BusyWorkSystem {
    fn run(&self, _world: &World, _dt: f32) {
        let mut acc = 0u64;
        for value in 0..self.iterations {
            acc = acc.wrapping_mul(31).wrapping_add(u64::from(value));
        }
        std::hint::black_box(acc);
        self.runs.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("config"));
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);
    basalt_log::init_logging(None, cfg!(debug_assertions), Some(&config));

    let mut components = ComponentRegistry::new();
    let position = components.register("Position")?;
    let velocity = components.register("Velocity")?;
    let collider = components.register("Collider")?;
    let transform = components.register("Transform")?;
    let visibility = components.register("Visibility")?;
    let draw_list = components.register("DrawList")?;
    let mask = |ids: &[ComponentId]| {
        ids.iter()
            .fold(ComponentMask::EMPTY, |mask, id| mask.with(*id))
    };

    let system_runs = Arc::new(AtomicU64::new(0));
    let mut scheduler = SystemScheduler::new();
    scheduler.register(
        SystemMetadata::new("player_input", SystemStage::PreUpdate)
            .writes(mask(&[velocity]))
            .priority(10),
        BusyWorkSystem::new(2_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("physics_integrate", SystemStage::Update)
            .reads(mask(&[velocity]))
            .writes(mask(&[position]))
            .priority(10),
        BusyWorkSystem::new(20_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("collision_resolve", SystemStage::Update)
            .reads(mask(&[collider]))
            .writes(mask(&[position, velocity]))
            .priority(8)
            .after("physics_integrate"),
        BusyWorkSystem::new(15_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("ambience", SystemStage::Update).reads(mask(&[position])),
        BusyWorkSystem::new(1_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("transform_propagate", SystemStage::PostUpdate)
            .reads(mask(&[position]))
            .writes(mask(&[transform]))
            .priority(5),
        BusyWorkSystem::new(8_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("frustum_cull", SystemStage::PreRender)
            .reads(mask(&[transform]))
            .writes(mask(&[visibility]))
            .priority(7),
        BusyWorkSystem::new(6_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("draw_submit", SystemStage::Render)
            .reads(mask(&[visibility]))
            .writes(mask(&[draw_list]))
            .serial(),
        BusyWorkSystem::new(12_000, &system_runs),
    )?;
    scheduler.register(
        SystemMetadata::new("frame_report", SystemStage::PostRender).reads(mask(&[draw_list])),
        BusyWorkSystem::new(500, &system_runs),
    )?;

    let world = Arc::new(World::new(components));
    let mut orchestrator = FrameOrchestrator::new(scheduler, world, &config)?;

    if config.debug.dump_schedule_graph {
        println!("{}", orchestrator.scheduler().generate_visualization()?);
    }

    // User tasks around the system phases: an event pump ahead of input
    // handling and a low-priority sweep at the end of the frame.
    orchestrator.add_task_to_phase(FramePhase::Input, "pump_events", TaskPriority::High, |_| {
        Ok(())
    })?;
    {
        let runs = Arc::clone(&system_runs);
        orchestrator.add_task_to_phase(
            FramePhase::PostFrame,
            "scratch_sweep",
            TaskPriority::Low,
            move |_| {
                std::hint::black_box(runs.load(Ordering::Relaxed));
                Ok(())
            },
        )?;
    }
    orchestrator.add_task_dependency(FramePhase::PostFrame, "scratch_sweep", "frame_report");

    orchestrator.set_callbacks(FrameCallbacks {
        update: Some(Box::new(|frame| {
            if frame.frame_number % 60 == 0 {
                info!(
                    frame = frame.frame_number,
                    dt_ms = f64::from(frame.delta_time) * 1000.0,
                    "simulating"
                );
            }
        })),
        ..Default::default()
    });

    for _ in 0..DEMO_FRAMES {
        orchestrator.run_frame()?;
    }

    info!(
        frames = orchestrator.stats().frames_completed,
        system_runs = system_runs.load(Ordering::Relaxed),
        workers = orchestrator.worker_count(),
        "demo finished"
    );
    for (name, micros) in orchestrator.scheduler().execution_stats() {
        info!(system = %name, last_us = micros, "system runtime");
    }
    for phase in FramePhase::ALL {
        let stats = orchestrator.stats().phase(phase);
        info!(
            phase = %phase,
            last_us = stats.last_duration_us,
            partial_failures = stats.partial_failures,
            "phase runtime"
        );
    }

    Ok(())
}

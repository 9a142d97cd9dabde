use crate::files::save::{save_report, BakeReportData, SurfaceReport};
use bevy::app::ScheduleRunnerPlugin;
use bevy::log::{error, info};
use bevy::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use water::{
    SurfaceId, TableLoadTasks, TerrainSampler, WaterSurface, WaterSurfaceConfig,
    WaterSurfaceRegistry,
};

/// How often the headless loop polls the background loads.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Resource, Debug, Clone)]
pub struct BakeSettings {
    pub force: bool,
    pub report_path: Option<PathBuf>,
}

#[derive(Resource, Clone)]
pub struct BakeTerrain(pub Arc<dyn TerrainSampler>);

/// Report being assembled while loads complete.
#[derive(Resource, Debug, Default)]
pub struct BakeReport {
    pub data: BakeReportData,
    /// Manifest index of every registered surface
    pub pending: HashMap<SurfaceId, usize>,
    pub finished: bool,
}

/// Registers every configured surface; invalid ones go straight into the
/// report.
fn register_surfaces(
    configs: Vec<WaterSurfaceConfig>,
    registry: &mut WaterSurfaceRegistry,
    report: &mut BakeReport,
) {
    for (index, config) in configs.into_iter().enumerate() {
        match WaterSurface::new(config) {
            Ok(surface) => {
                let id = registry.insert(surface);
                report.pending.insert(id, index);
            }
            Err(err) => {
                error!("Water surface #{} is invalid: {}", index, err);
                report
                    .data
                    .surfaces
                    .push(SurfaceReport::failed(index, None, err.to_string()));
            }
        }
    }
}

fn spawn_table_loads(
    registry: Res<WaterSurfaceRegistry>,
    terrain: Res<BakeTerrain>,
    settings: Res<BakeSettings>,
    mut tasks: ResMut<TableLoadTasks>,
) {
    let ids: Vec<SurfaceId> = registry.iter().map(|(id, _)| id).collect();
    for id in ids {
        tasks.spawn_with(&registry, id, Arc::clone(&terrain.0), settings.force);
    }
    info!("Baking tables for {} water surface(s)", tasks.len());
}

fn collect_table_loads(
    mut registry: ResMut<WaterSurfaceRegistry>,
    mut tasks: ResMut<TableLoadTasks>,
    mut report: ResMut<BakeReport>,
    settings: Res<BakeSettings>,
    mut exit: EventWriter<AppExit>,
) {
    if report.finished {
        return;
    }

    for outcome in tasks.poll(&mut registry) {
        let Some(index) = report.pending.remove(&outcome.id) else {
            continue;
        };
        let entry = match (&outcome.result, registry.get(outcome.id)) {
            (Ok(_), Some(surface)) => SurfaceReport::from_surface(index, outcome.id, surface),
            (Err(err), _) => SurfaceReport::failed(index, Some(outcome.id), err.to_string()),
            (Ok(_), None) => continue,
        };
        report.data.surfaces.push(entry);
    }

    if !tasks.is_empty() {
        return;
    }

    report.finished = true;
    report.data.surfaces.sort_by_key(|surface| surface.index);
    let failures = report.data.failures();
    info!(
        "Baked {} water surface(s), {} failed",
        report.data.surfaces.len() - failures,
        failures
    );

    if let Some(path) = &settings.report_path {
        if let Err(err) = save_report(&report.data, path) {
            error!("Could not save bake report: {}", err);
            exit.write(AppExit::from_code(1));
            return;
        }
    }

    if failures > 0 {
        exit.write(AppExit::from_code(1));
    } else {
        exit.write(AppExit::Success);
    }
}

pub fn init(
    configs: Vec<WaterSurfaceConfig>,
    terrain: Arc<dyn TerrainSampler>,
    settings: BakeSettings,
) -> AppExit {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(POLL_INTERVAL)));
    app.add_plugins(bevy::log::LogPlugin::default());

    let mut registry = WaterSurfaceRegistry::default();
    let mut report = BakeReport::default();
    register_surfaces(configs, &mut registry, &mut report);

    app.insert_resource(registry);
    app.insert_resource(report);
    app.insert_resource(TableLoadTasks::default());
    app.insert_resource(BakeTerrain(terrain));
    app.insert_resource(settings);

    app.add_systems(Startup, spawn_table_loads);
    app.add_systems(Update, collect_table_loads);

    app.run()
}

use tracing::info;
use uncap::world::{wrap_angle, Collision, Motion, SetRecord};
use uncap::{AllocFlags, AllocRequest, EntryPoints, NodeHandle, ObjectGraph, UncapError, Vec3};

use super::redirect::DemoProcess;

pub(crate) const SPAWN_INTERVAL_TICKS: i32 = 20;
pub(crate) const MAX_SPINNERS: usize = 5;
const SPIN_PER_TICK: i32 = 0x400;
const SPAWNER_LIST: usize = 1;
const CAMERA_LIST: usize = 0;

pub(crate) struct DemoScene {
    pub(crate) camera: NodeHandle,
    pub(crate) spawner: NodeHandle,
}

/// Links a camera and a spawner into the graph through the host's
/// allocation entry point. The spawner keeps up to `MAX_SPINNERS` spinning
/// children alive, replacing the oldest.
pub(crate) fn populate(
    process: &mut DemoProcess,
    entry_points: &EntryPoints<DemoProcess>,
) -> Result<DemoScene, UncapError> {
    let camera = entry_points.allocate_object.invoke(
        process,
        AllocRequest {
            flags: AllocFlags::PRIMARY,
            index_hint: CAMERA_LIST,
            init: |node| node.tag = 1,
        },
    )?;
    let graph = process.runtime.graph_mut();
    graph.attach_root_hinted(camera);
    if let Some(entity) = graph.entity_mut(camera) {
        entity.position = Vec3::new(0.0, 10.0, -30.0);
        entity.scale = Vec3::ONE;
    }

    let spawner = entry_points.allocate_object.invoke(
        process,
        AllocRequest {
            flags: AllocFlags::SECONDARY,
            index_hint: SPAWNER_LIST,
            init: |node| {
                node.tag = 2;
                node.main = Some(run_spawner);
                node.teardown = Some(log_spawner_teardown);
            },
        },
    )?;
    let graph = process.runtime.graph_mut();
    graph.attach_root_hinted(spawner);
    let record = graph.set_records_mut().add(SetRecord::default());
    graph.bind_set_record(spawner, record);

    info!(
        camera = %camera,
        spawner = %spawner,
        "demo_scene_populated"
    );
    Ok(DemoScene { camera, spawner })
}

fn run_spawner(graph: &mut ObjectGraph, spawner: NodeHandle) {
    let Some(motion) = graph
        .node_mut(spawner)
        .and_then(|node| node.attachments_mut().secondary.as_mut())
    else {
        return;
    };
    motion.timer += 1;
    if motion.timer % SPAWN_INTERVAL_TICKS != 0 {
        return;
    }
    let wave = motion.timer / SPAWN_INTERVAL_TICKS;

    let flags = AllocFlags::PRIMARY | AllocFlags::SECONDARY | AllocFlags::AUX_B;
    let Ok(spinner) = graph.allocate(flags, 0, |node| {
        node.tag = 3;
        node.main = Some(run_spinner);
    }) else {
        return;
    };
    if let Some(node) = graph.node_mut(spinner) {
        let attachments = node.attachments_mut();
        if let Some(entity) = attachments.primary.as_mut() {
            entity.scale = Vec3::ONE;
            entity.collision = Some(Collision {
                center: Vec3::ZERO,
                radius: 0.5,
            });
        }
        attachments.secondary = Some(Motion {
            velocity: Vec3::new(0.05 * wave as f32, 0.0, 0.1),
            ..Motion::default()
        });
    }
    graph.attach_child(spawner, spinner);

    let children = graph.children(spawner);
    if children.len() > MAX_SPINNERS {
        graph.release(children[0]);
    }
}

fn run_spinner(graph: &mut ObjectGraph, spinner: NodeHandle) {
    let Some(node) = graph.node_mut(spinner) else {
        return;
    };
    let attachments = node.attachments_mut();
    let velocity = attachments
        .secondary
        .as_ref()
        .map(|motion| motion.velocity)
        .unwrap_or(Vec3::ZERO);
    if let Some(entity) = attachments.primary.as_mut() {
        entity.rotation.y = wrap_angle(entity.rotation.y + SPIN_PER_TICK);
        entity.position.x += velocity.x;
        entity.position.y += velocity.y;
        entity.position.z += velocity.z;
        let center = entity.position;
        entity.set_collision_center(center);
    }
}

fn log_spawner_teardown(graph: &mut ObjectGraph, spawner: NodeHandle) {
    info!(
        spawner = %spawner,
        children = graph.children(spawner).len(),
        "spawner_teardown"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use uncap::{Runtime, UncapConfig};

    use super::*;
    use crate::app::bootstrap::DemoSettings;
    use crate::app::redirect::InProcessRedirector;
    use crate::app::sim_host::SimHost;

    fn installed() -> (DemoProcess, EntryPoints<DemoProcess>) {
        let process = DemoProcess {
            runtime: Runtime::with_graph(UncapConfig::default(), ObjectGraph::new(), Instant::now())
                .expect("runtime"),
            host: SimHost::new(DemoSettings::default()),
        };
        let mut redirector = InProcessRedirector::default();
        process.runtime.install(&mut redirector).expect("install");
        (process, redirector.entry_points())
    }

    #[test]
    fn populate_links_camera_and_spawner_into_hinted_lists() {
        let (mut process, entry_points) = installed();
        let scene = populate(&mut process, &entry_points).expect("populate");
        let runtime = &process.runtime;

        assert_eq!(runtime.graph().root(CAMERA_LIST), Some(scene.camera));
        assert_eq!(runtime.graph().root(SPAWNER_LIST), Some(scene.spawner));
        assert!(runtime.tracker().contains(scene.camera));
        assert!(!runtime.tracker().contains(scene.spawner));
        assert_eq!(runtime.graph().node(scene.spawner).expect("spawner").tag, 2);
    }

    #[test]
    fn spawner_keeps_a_bounded_set_of_spinners() {
        let (mut process, entry_points) = installed();
        let scene = populate(&mut process, &entry_points).expect("populate");
        let runtime = &mut process.runtime;

        for _ in 0..(SPAWN_INTERVAL_TICKS * 8) {
            runtime.graph_mut().run_logic();
        }

        let children = runtime.graph().children(scene.spawner);
        assert_eq!(children.len(), MAX_SPINNERS);
        for child in children {
            let node = runtime.graph().node(child).expect("spinner");
            assert_eq!(node.origin(), Some(scene.spawner));
            assert!(node.attachments().aux_b.is_some());
        }
    }

    #[test]
    fn spinner_moves_and_drags_its_collision_center() {
        let mut graph = ObjectGraph::new();
        let spinner = graph
            .allocate(AllocFlags::PRIMARY | AllocFlags::SECONDARY, 0, |node| {
                node.main = Some(run_spinner);
            })
            .expect("allocate");
        assert!(graph.attach_root(0, spinner));
        if let Some(node) = graph.node_mut(spinner) {
            node.attachments_mut().secondary = Some(Motion {
                velocity: Vec3::new(1.0, 0.0, 0.0),
                ..Motion::default()
            });
            if let Some(entity) = node.attachments_mut().primary.as_mut() {
                entity.collision = Some(Collision::default());
            }
        }

        graph.run_logic();
        graph.run_logic();

        let entity = graph.entity(spinner).expect("entity");
        assert_eq!(entity.position.x, 2.0);
        assert_eq!(entity.rotation.y, SPIN_PER_TICK * 2);
        assert_eq!(entity.collision_center(), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn releasing_spawner_clears_its_placement_record() {
        let (mut process, entry_points) = installed();
        let scene = populate(&mut process, &entry_points).expect("populate");
        for _ in 0..SPAWN_INTERVAL_TICKS * 2 {
            process.runtime.graph_mut().run_logic();
        }

        assert!(entry_points.release_object.invoke(&mut process, scene.spawner));

        let runtime = &process.runtime;
        let record = runtime
            .graph()
            .set_records()
            .get(uncap::world::SetRecordId(0))
            .expect("record");
        assert_eq!(record.instance, None);
        assert_eq!(runtime.graph().live_count(), 1);
        assert_eq!(runtime.tracker().len(), 1);
    }
}

//! Support utilities for mesh and hierarchy operations.

use bevy::prelude::*;

/// Returns `entity` followed by all of its descendants, breadth first.
pub fn hierarchy(entity: Entity, children_query: &Query<&Children>) -> impl Iterator<Item = Entity> {
    std::iter::once(entity).chain(children_query.iter_descendants(entity))
}

/// Transforms every vertex position of `mesh` into world space.
/// Returns `None` if the mesh has no float3 position attribute.
pub fn world_positions(mesh: &Mesh, global_transform: &GlobalTransform) -> Option<Vec<Vec3>> {
    let positions = mesh
        .attribute(Mesh::ATTRIBUTE_POSITION)
        .and_then(|a| a.as_float3())?;

    Some(
        positions
            .iter()
            .map(|pos| global_transform.transform_point(Vec3::from_array(*pos)))
            .collect(),
    )
}

/// Collects world-space vertex positions from all meshes on an entity and its descendants.
pub fn extract_world_vertices(
    entity: Entity,
    children_query: &Query<&Children>,
    mesh_query: &Query<&Mesh3d>,
    global_transform_query: &Query<&GlobalTransform>,
    meshes: &Assets<Mesh>,
) -> Vec<Vec3> {
    let mut all_vertices = Vec::new();

    for mesh_entity in hierarchy(entity, children_query) {
        let Ok(mesh3d) = mesh_query.get(mesh_entity) else {
            continue;
        };
        let Some(mesh) = meshes.get(&mesh3d.0) else {
            continue;
        };
        let Ok(global_transform) = global_transform_query.get(mesh_entity) else {
            continue;
        };
        if let Some(vertices) = world_positions(mesh, global_transform) {
            all_vertices.extend(vertices);
        }
    }

    all_vertices
}

/// Axis-aligned `(min, max)` of a point set. `None` if empty or any bound is non-finite.
pub fn bounds_of(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    if points.iter().any(|point| !point.is_finite()) {
        return None;
    }

    let (min, max) = points.iter().fold(
        (Vec3::INFINITY, Vec3::NEG_INFINITY),
        |(min, max), point| (min.min(*point), max.max(*point)),
    );

    (min.is_finite() && max.is_finite()).then_some((min, max))
}

/// The 8 corners of the box spanned by `min` and `max`
pub fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

/// Names attached to a mesh entity and its parent node.
///
/// glTF primitives are spawned as children of the node that carries the authored name, so
/// both are considered.
pub fn node_names(
    entity: Entity,
    name_query: &Query<&Name>,
    parent_query: &Query<&ChildOf>,
) -> Vec<String> {
    let parent = parent_query.get(entity).ok().map(ChildOf::parent);

    std::iter::once(entity)
        .chain(parent)
        .filter_map(|e| name_query.get(e).ok())
        .map(|name| name.as_str().to_string())
        .collect()
}

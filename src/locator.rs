//! Decal locator: finds the sub-mesh that carries the customizable decal texture.
//!
//! An explicitly tagged mesh always wins. Otherwise the name heuristic applies: among textured
//! meshes whose name contains a decal token, the one with the largest world-space bounding
//! volume is chosen, ties going to the first in traversal order.

use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;

use crate::config::DecalConfig;
use crate::support::bounds_of;
use crate::support::hierarchy;
use crate::support::node_names;
use crate::support::world_positions;
use crate::uv::UvRect;

/// Marks the decal mesh explicitly. Place it on the mesh entity or its parent node.
#[derive(Component, Reflect, Debug, Default, Clone, Copy)]
#[reflect(Component)]
pub struct DecalTag {
    /// Overrides `DecalConfig::flip_y` for this mesh
    pub flip_y: Option<bool>,
}

/// Everything the selection step needs to know about one mesh
#[derive(Debug, Clone)]
pub struct DecalCandidate {
    pub entity:   Entity,
    /// Names of the mesh entity and its parent node
    pub names:    Vec<String>,
    pub tagged:   bool,
    pub textured: bool,
    /// World-space bounding-box volume
    pub volume:   f32,
}

/// The located decal. Created once per loaded asset.
#[derive(Reflect, Debug, Clone)]
pub struct DecalTarget {
    pub mesh_entity:  Entity,
    pub material:     Handle<StandardMaterial>,
    /// Pristine texture; never written to
    pub source_image: Handle<Image>,
    pub uv_rect:      UvRect,
    pub flip_y:       bool,
}

/// Picks the decal among `candidates`, which must be in traversal order.
pub fn select_decal<'a>(
    candidates: &'a [DecalCandidate],
    config: &DecalConfig,
) -> Option<&'a DecalCandidate> {
    if let Some(tagged) = candidates.iter().find(|c| c.tagged && c.textured) {
        return Some(tagged);
    }

    let mut best: Option<&DecalCandidate> = None;
    for candidate in candidates
        .iter()
        .filter(|c| c.textured && c.names.iter().any(|name| config.is_decal_name(name)))
    {
        // Strictly greater keeps the first of equal volumes
        if best.is_none_or(|b| candidate.volume > b.volume) {
            best = Some(candidate);
        }
    }
    best
}

/// UV bounds of the mesh's first UV channel, clamped to the unit square
pub fn mesh_uv_rect(mesh: &Mesh) -> Option<UvRect> {
    match mesh.attribute(Mesh::ATTRIBUTE_UV_0)? {
        VertexAttributeValues::Float32x2(uvs) => UvRect::from_uvs(uvs.iter().copied()),
        _ => None,
    }
}

/// World-space bounding-box volume (width × height × depth) of a mesh
pub fn mesh_world_volume(mesh: &Mesh, global_transform: &GlobalTransform) -> f32 {
    world_positions(mesh, global_transform)
        .and_then(|positions| bounds_of(&positions))
        .map_or(0.0, |(min, max)| {
            let size = max - min;
            size.x * size.y * size.z
        })
}

/// Walks `root` and its descendants and returns the decal target, if any.
///
/// Returns `None` when no mesh qualifies or when the chosen mesh has no UV coordinates.
#[allow(clippy::too_many_arguments)]
pub fn locate_decal(
    root: Entity,
    config: &DecalConfig,
    children_query: &Query<&Children>,
    mesh_query: &Query<(&Mesh3d, &MeshMaterial3d<StandardMaterial>, &GlobalTransform)>,
    name_query: &Query<&Name>,
    parent_query: &Query<&ChildOf>,
    tag_query: &Query<&DecalTag>,
    meshes: &Assets<Mesh>,
    materials: &Assets<StandardMaterial>,
) -> Option<DecalTarget> {
    let mut candidates = Vec::new();

    for entity in hierarchy(root, children_query) {
        let Ok((mesh3d, material, global_transform)) = mesh_query.get(entity) else {
            continue;
        };
        let Some(mesh) = meshes.get(&mesh3d.0) else {
            continue;
        };

        let textured = materials
            .get(&material.0)
            .is_some_and(|m| m.base_color_texture.is_some());
        let tag = tag_of(entity, tag_query, parent_query);

        candidates.push(DecalCandidate {
            entity,
            names: node_names(entity, name_query, parent_query),
            tagged: tag.is_some(),
            textured,
            volume: mesh_world_volume(mesh, global_transform),
        });
    }

    let chosen = select_decal(&candidates, config)?;
    let (mesh3d, material, _) = mesh_query.get(chosen.entity).ok()?;
    let source_image = materials.get(&material.0)?.base_color_texture.clone()?;

    let Some(uv_rect) = meshes.get(&mesh3d.0).and_then(mesh_uv_rect) else {
        warn!(
            "Decal mesh {:?} ({:?}) has no UV coordinates, compositing disabled",
            chosen.entity, chosen.names
        );
        return None;
    };

    let flip_y = tag_of(chosen.entity, tag_query, parent_query)
        .and_then(|tag| tag.flip_y)
        .unwrap_or(config.flip_y);

    info!(
        "Located decal mesh {:?} ({:?}) among {} meshes: uv={uv_rect:?} flip_y={flip_y}",
        chosen.entity,
        chosen.names,
        candidates.len()
    );

    Some(DecalTarget {
        mesh_entity: chosen.entity,
        material: material.0.clone(),
        source_image,
        uv_rect,
        flip_y,
    })
}

/// Every `StandardMaterial` used under `root`, excluding the decal's, without duplicates.
pub fn body_materials(
    root: Entity,
    decal_material: Option<&Handle<StandardMaterial>>,
    children_query: &Query<&Children>,
    material_query: &Query<&MeshMaterial3d<StandardMaterial>>,
) -> Vec<Handle<StandardMaterial>> {
    let decal_id = decal_material.map(Handle::id);
    let mut handles: Vec<Handle<StandardMaterial>> = Vec::new();

    for entity in hierarchy(root, children_query) {
        let Ok(material) = material_query.get(entity) else {
            continue;
        };
        let id = material.0.id();
        if Some(id) == decal_id || handles.iter().any(|h| h.id() == id) {
            continue;
        }
        handles.push(material.0.clone());
    }

    handles
}

fn tag_of<'a>(
    entity: Entity,
    tag_query: &'a Query<&DecalTag>,
    parent_query: &Query<&ChildOf>,
) -> Option<&'a DecalTag> {
    tag_query.get(entity).ok().or_else(|| {
        parent_query
            .get(entity)
            .ok()
            .and_then(|child_of| tag_query.get(child_of.parent()).ok())
    })
}

#[cfg(test)]
mod tests {
    use bevy::asset::RenderAssetUsages;
    use bevy::ecs::system::RunSystemOnce;
    use bevy::mesh::PrimitiveTopology;

    use super::*;

    fn candidate(name: &str, textured: bool, volume: f32) -> DecalCandidate {
        DecalCandidate {
            entity: Entity::PLACEHOLDER,
            names: vec![name.to_string()],
            tagged: false,
            textured,
            volume,
        }
    }

    #[test]
    fn picks_largest_textured_name_match() {
        let config = DecalConfig::default();
        let candidates = [
            candidate("BagBody", true, 50.0),
            candidate("logo_small", true, 0.5),
            candidate("LabelPanel", true, 4.0),
            candidate("decal_untextured", false, 9.0),
        ];
        let chosen = select_decal(&candidates, &config).unwrap();
        assert_eq!(chosen.names, vec!["LabelPanel".to_string()]);
    }

    #[test]
    fn equal_volumes_resolve_to_first() {
        let config = DecalConfig::default();
        let candidates = [
            candidate("Plane.001", true, 2.0),
            candidate("Plane.002", true, 2.0),
        ];
        let chosen = select_decal(&candidates, &config).unwrap();
        assert_eq!(chosen.names[0], "Plane.001");
    }

    #[test]
    fn explicit_tag_beats_heuristic() {
        let config = DecalConfig::default();
        let mut tagged = candidate("Front", true, 0.1);
        tagged.tagged = true;
        let candidates = [candidate("logo", true, 10.0), tagged];
        let chosen = select_decal(&candidates, &config).unwrap();
        assert_eq!(chosen.names[0], "Front");
    }

    #[test]
    fn no_candidate_means_no_decal() {
        let config = DecalConfig::default();
        let candidates = [candidate("Body", true, 10.0), candidate("logo", false, 1.0)];
        assert!(select_decal(&candidates, &config).is_none());
    }

    fn quad(uvs: Vec<[f32; 2]>, size: f32) -> Mesh {
        let h = size * 0.5;
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(
                Mesh::ATTRIBUTE_POSITION,
                vec![[-h, -h, 0.0], [h, -h, 0.1], [h, h, 0.0], [-h, h, 0.1]],
            )
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
    }

    #[test]
    fn uv_rect_comes_from_geometry() {
        let mesh = quad(vec![[0.2, 0.3], [0.8, 0.3], [0.8, 0.6], [0.2, 0.6]], 1.0);
        let rect = mesh_uv_rect(&mesh).unwrap();
        assert_eq!(rect.min_u, 0.2);
        assert_eq!(rect.max_v, 0.6);

        let bare = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        assert!(mesh_uv_rect(&bare).is_none());
    }

    #[test]
    fn locates_decal_in_hierarchy() {
        let mut world = World::new();
        let mut meshes = Assets::<Mesh>::default();
        let mut materials = Assets::<StandardMaterial>::default();
        let mut images = Assets::<Image>::default();

        let texture = images.add(Image::default());
        let textured = materials.add(StandardMaterial {
            base_color_texture: Some(texture.clone()),
            ..default()
        });
        let plain = materials.add(StandardMaterial::default());
        let uvs = vec![[0.1, 0.1], [0.4, 0.1], [0.4, 0.5], [0.1, 0.5]];

        let root = world.spawn(Name::new("chips_bag")).id();
        world.spawn((
            Name::new("Body"),
            Mesh3d(meshes.add(quad(uvs.clone(), 4.0))),
            MeshMaterial3d(plain.clone()),
            ChildOf(root),
        ));
        let small_logo = world
            .spawn((
                Name::new("logo_sticker"),
                Mesh3d(meshes.add(quad(uvs.clone(), 0.5))),
                MeshMaterial3d(textured.clone()),
                ChildOf(root),
            ))
            .id();
        let label_node = world.spawn((Name::new("FrontLabel"), ChildOf(root))).id();
        let label_mesh = world
            .spawn((
                Mesh3d(meshes.add(quad(uvs, 2.0))),
                MeshMaterial3d(textured.clone()),
                ChildOf(label_node),
            ))
            .id();

        world.insert_resource(meshes);
        world.insert_resource(materials);

        let found = world
            .run_system_once(
                move |children: Query<&Children>,
                      mesh_query: Query<(
                    &Mesh3d,
                    &MeshMaterial3d<StandardMaterial>,
                    &GlobalTransform,
                )>,
                      names: Query<&Name>,
                      parents: Query<&ChildOf>,
                      tags: Query<&DecalTag>,
                      meshes: Res<Assets<Mesh>>,
                      materials: Res<Assets<StandardMaterial>>| {
                    locate_decal(
                        root,
                        &DecalConfig::default(),
                        &children,
                        &mesh_query,
                        &names,
                        &parents,
                        &tags,
                        &meshes,
                        &materials,
                    )
                },
            )
            .unwrap()
            .unwrap();

        assert_ne!(found.mesh_entity, small_logo);
        assert_eq!(found.mesh_entity, label_mesh);
        assert_eq!(found.source_image.id(), texture.id());
        assert_eq!(found.uv_rect.max_u, 0.4);
        assert!(!found.flip_y);

        let bodies = world
            .run_system_once(
                move |children: Query<&Children>,
                      material_query: Query<&MeshMaterial3d<StandardMaterial>>| {
                    body_materials(root, Some(&textured), &children, &material_query)
                },
            )
            .unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].id(), plain.id());
    }
}

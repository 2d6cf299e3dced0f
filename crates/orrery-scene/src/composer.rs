//! Builds the scene graph from the body registry and the procedural fields.

use glam::{Quat, Vec3};
use orrery_config::{LightConfig, SceneConfig};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::field::{self, FieldParams, ParticleField};
use crate::graph::{NodeKind, NodePath, SceneNode, Transform};
use crate::registry::{BodyRegistry, CelestialBody, color_from_hex, ring_color};
use crate::starfield::Starfield;
use crate::textures::TextureKey;

/// Half-width of an orbit guide annulus.
pub const ORBIT_GUIDE_HALF_WIDTH: f32 = 0.1;
pub const ORBIT_GUIDE_OPACITY: f32 = 0.3;
/// Moon radius as a fraction of its parent's radius.
pub const MOON_RADIUS_FACTOR: f32 = 0.27;
/// Moon orbit distance as a multiple of its parent's radius.
pub const MOON_DISTANCE_FACTOR: f32 = 2.0;
pub const MOON_EMISSIVE: u32 = 0x333333;

const SUN_EMISSIVE: u32 = 0xeae839;

/// Surface shading parameters for a body or moon.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyMaterial {
    pub texture: TextureKey,
    /// Linear RGB emissive color, multiplied by the texture.
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub shininess: f32,
    pub bump_scale: f32,
    pub displacement_scale: f32,
    pub casts_shadow: bool,
    pub receives_shadow: bool,
}

impl BodyMaterial {
    fn for_body(body: &CelestialBody) -> Self {
        let (emissive, emissive_intensity) = if body.star {
            (color_from_hex(SUN_EMISSIVE) * 0.9, 5.0)
        } else {
            (Vec3::ZERO, 0.2)
        };
        Self {
            texture: body.texture,
            emissive,
            emissive_intensity,
            shininess: body.shininess,
            bump_scale: 0.02,
            displacement_scale: 0.05,
            casts_shadow: !body.star,
            receives_shadow: !body.star,
        }
    }

    fn moon() -> Self {
        Self {
            texture: TextureKey::Moon,
            emissive: color_from_hex(MOON_EMISSIVE),
            emissive_intensity: 0.1,
            shininess: 25.0,
            bump_scale: 0.0,
            displacement_scale: 0.0,
            casts_shadow: false,
            receives_shadow: false,
        }
    }
}

/// Where the animation driver finds one body's nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyBinding {
    /// Index into the registry.
    pub body: usize,
    /// Group node positioned on the orbit.
    pub group: NodePath,
    /// Sphere mesh node that spins.
    pub mesh: NodePath,
    pub moon: Option<NodePath>,
    /// Index into [`ComposedScene::fields`] of the body's particle ring.
    pub ring_field: Option<usize>,
}

/// A particle field and the node that carries its frame.
#[derive(Clone, Debug)]
pub struct FieldBinding {
    pub field: ParticleField,
    pub node: NodePath,
    /// Radius of the instanced icosahedron.
    pub instance_radius: f32,
}

/// Output of [`compose`].
#[derive(Clone, Debug)]
pub struct ComposedScene {
    pub root: SceneNode,
    pub registry: BodyRegistry,
    pub bindings: Vec<BodyBinding>,
    /// The asteroid belt first, then one ring field per ringed body.
    pub fields: Vec<FieldBinding>,
    pub starfield: Starfield,
    pub lights: LightConfig,
    pub skybox_tint: f32,
    pub seed: u64,
}

impl ComposedScene {
    pub fn body(&self, binding: &BodyBinding) -> &CelestialBody {
        &self.registry.bodies()[binding.body]
    }

    pub fn binding(&self, name: &str) -> Option<&BodyBinding> {
        self.bindings
            .iter()
            .find(|binding| self.body(binding).name == name)
    }
}

/// Compose the full scene. Identical inputs produce identical trees.
pub fn compose(registry: &BodyRegistry, config: &SceneConfig, seed: u64) -> ComposedScene {
    let mut seeds = ChaCha8Rng::seed_from_u64(seed);
    let mut root = SceneNode::group("scene");
    let mut fields = Vec::new();

    root.add_child(SceneNode::new(
        "skybox",
        NodeKind::Skybox {
            radius: config.skybox.radius,
            tint: config.skybox.tint,
        },
    ));
    root.add_child(SceneNode::new("ambient_light", NodeKind::AmbientLight));
    root.add_child(SceneNode::new("sun_light", NodeKind::PointLight));

    let starfield = Starfield::generate(&config.starfield, seeds.random());
    root.add_child(SceneNode::new("starfield", NodeKind::Starfield));

    let belt = field::generate(&FieldParams::from(&config.asteroid_belt), seeds.random());
    let belt_index = root.add_child(
        SceneNode::new("asteroid_belt", NodeKind::Field(fields.len()))
            .with_transform(Transform::from_rotation(Quat::from_rotation_x(belt.tilt))),
    );
    fields.push(FieldBinding {
        field: belt,
        node: vec![belt_index],
        instance_radius: config.asteroid_belt.instance_radius,
    });

    let mut bindings = Vec::with_capacity(registry.len());
    for (index, body) in registry.iter().enumerate() {
        if body.orbit_radius > 0.0 {
            root.add_child(SceneNode::new(
                format!("{}_orbit_guide", body.name),
                NodeKind::OrbitGuide {
                    inner_radius: body.orbit_radius - ORBIT_GUIDE_HALF_WIDTH,
                    outer_radius: body.orbit_radius + ORBIT_GUIDE_HALF_WIDTH,
                    color: color_from_hex(ring_color(&body.name)),
                    opacity: ORBIT_GUIDE_OPACITY,
                },
            ));
        }

        let mut group = SceneNode::group(format!("{}_group", body.name)).with_transform(
            Transform::from_translation(Vec3::new(body.orbit_radius, 0.0, 0.0)),
        );
        let mesh = group.add_child(SceneNode::new(
            body.name.clone(),
            NodeKind::Body {
                index,
                radius: body.radius,
                material: BodyMaterial::for_body(body),
            },
        ));

        let moon = body.has_moon.then(|| {
            group.add_child(
                SceneNode::new(
                    format!("{}_moon", body.name),
                    NodeKind::Moon {
                        parent: index,
                        radius: body.radius * MOON_RADIUS_FACTOR,
                        material: BodyMaterial::moon(),
                    },
                )
                .with_transform(Transform::from_translation(Vec3::new(
                    body.radius * MOON_DISTANCE_FACTOR,
                    0.0,
                    0.0,
                ))),
            )
        });

        let mut ring_field = None;
        let mut ring_node = None;
        if body.has_rings {
            let ring_config = &config.planet_ring;
            let ring = field::generate(&FieldParams::from(ring_config), seeds.random());
            let tilt = Transform::from_rotation(Quat::from_rotation_x(ring.tilt));
            group.add_child(
                SceneNode::new(
                    format!("{}_ring", body.name),
                    NodeKind::RingAnnulus {
                        inner_radius: ring_config.inner_radius,
                        outer_radius: ring_config.outer_radius,
                    },
                )
                .with_transform(tilt),
            );
            ring_node = Some(group.add_child(
                SceneNode::new(
                    format!("{}_ring_field", body.name),
                    NodeKind::Field(fields.len()),
                )
                .with_transform(tilt),
            ));
            ring_field = Some(fields.len());
            fields.push(FieldBinding {
                field: ring,
                node: Vec::new(),
                instance_radius: ring_config.instance_radius,
            });
        }

        let group_index = root.add_child(group);
        if let (Some(field_index), Some(node)) = (ring_field, ring_node) {
            fields[field_index].node = vec![group_index, node];
        }
        bindings.push(BodyBinding {
            body: index,
            group: vec![group_index],
            mesh: vec![group_index, mesh],
            moon: moon.map(|moon| vec![group_index, moon]),
            ring_field,
        });
    }

    log::info!(
        "Composed scene: {} bodies, {} nodes, {} field instances, {} stars",
        bindings.len(),
        root.count(),
        fields.iter().map(|f| f.field.len()).sum::<usize>(),
        starfield.len()
    );

    ComposedScene {
        root,
        registry: registry.clone(),
        bindings,
        fields,
        starfield,
        lights: config.lights.clone(),
        skybox_tint: config.skybox.tint,
        seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SceneConfig {
        let mut config = SceneConfig::default();
        config.asteroid_belt.count = 200;
        config.planet_ring.count = 100;
        config.starfield.count = 50;
        config
    }

    #[test]
    fn test_one_node_per_body() {
        let registry = BodyRegistry::extended();
        let scene = compose(&registry, &small_config(), 1);
        assert_eq!(scene.bindings.len(), registry.len());

        for binding in &scene.bindings {
            let body = scene.body(binding);
            let mesh = scene.root.node(&binding.mesh).unwrap();
            assert_eq!(mesh.name, body.name);
            assert!(matches!(mesh.kind, NodeKind::Body { index, .. } if index == binding.body));
            assert_eq!(binding.moon.is_some(), body.has_moon);
            assert_eq!(binding.ring_field.is_some(), body.has_rings);
        }
    }

    #[test]
    fn test_moon_and_ring_children() {
        let scene = compose(&BodyRegistry::extended(), &small_config(), 1);

        let earth = scene.binding("Earth").unwrap();
        let moon = scene.root.node(earth.moon.as_ref().unwrap()).unwrap();
        match &moon.kind {
            NodeKind::Moon { radius, material, .. } => {
                assert!((radius - 3.0 * 0.27).abs() < 1e-6);
                assert_eq!(material.shininess, 25.0);
                assert_eq!(material.texture, TextureKey::Moon);
            }
            other => panic!("unexpected moon kind {other:?}"),
        }
        assert_eq!(moon.transform.translation, Vec3::new(6.0, 0.0, 0.0));

        let saturn = scene.binding("Saturn").unwrap();
        let ring = &scene.fields[saturn.ring_field.unwrap()];
        assert_eq!(ring.field.len(), 100);
        let ring_node = scene.root.node(&ring.node).unwrap();
        assert!(matches!(ring_node.kind, NodeKind::Field(i) if i == saturn.ring_field.unwrap()));
        assert!(scene.root.find("Saturn_ring").is_some());
    }

    #[test]
    fn test_orbit_guides_skip_the_sun() {
        let scene = compose(&BodyRegistry::extended(), &small_config(), 1);
        let guides: Vec<_> = scene
            .root
            .children
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::OrbitGuide { inner_radius, outer_radius, opacity, .. } => {
                    Some((inner_radius, outer_radius, opacity))
                }
                _ => None,
            })
            .collect();
        assert_eq!(guides.len(), 8);
        let (inner, outer, opacity) = guides[2];
        assert!((inner - 59.9).abs() < 1e-4 && (outer - 60.1).abs() < 1e-4);
        assert_eq!(opacity, 0.3);
    }

    #[test]
    fn test_sun_material_is_emissive_and_shadowless() {
        let scene = compose(&BodyRegistry::extended(), &small_config(), 1);
        let sun = scene.binding("Sun").unwrap();
        let NodeKind::Body { material, .. } = &scene.root.node(&sun.mesh).unwrap().kind else {
            panic!("sun mesh is not a body");
        };
        assert_eq!(material.emissive_intensity, 5.0);
        assert!(material.emissive.x > 0.0);
        assert!(!material.casts_shadow && !material.receives_shadow);

        let mars = scene.binding("Mars").unwrap();
        let NodeKind::Body { material, .. } = &scene.root.node(&mars.mesh).unwrap().kind else {
            panic!("mars mesh is not a body");
        };
        assert_eq!(material.emissive, Vec3::ZERO);
        assert_eq!(material.emissive_intensity, 0.2);
        assert!(material.casts_shadow && material.receives_shadow);
    }

    #[test]
    fn test_building_twice_gives_identical_trees() {
        let registry = BodyRegistry::compact();
        let config = small_config();
        let a = compose(&registry, &config, 77);
        let b = compose(&registry, &config, 77);
        assert_eq!(a.root, b.root);
        assert_eq!(a.bindings, b.bindings);
        assert_eq!(a.starfield.positions, b.starfield.positions);
        for (fa, fb) in a.fields.iter().zip(&b.fields) {
            assert_eq!(fa.field, fb.field);
            assert_eq!(fa.node, fb.node);
        }
    }

    #[test]
    fn test_background_nodes_come_first() {
        let scene = compose(&BodyRegistry::extended(), &small_config(), 1);
        let kinds: Vec<_> = scene.root.children[..5].iter().map(|n| &n.kind).collect();
        assert!(matches!(kinds[0], NodeKind::Skybox { radius, .. } if *radius == 500.0));
        assert!(matches!(kinds[1], NodeKind::AmbientLight));
        assert!(matches!(kinds[2], NodeKind::PointLight));
        assert!(matches!(kinds[3], NodeKind::Starfield));
        assert!(matches!(kinds[4], NodeKind::Field(0)));
    }
}
